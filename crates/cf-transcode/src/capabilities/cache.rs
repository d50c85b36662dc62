use std::path::Path;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use parking_lot::RwLock;

use super::{probe_capabilities, Capabilities};

static GLOBAL: OnceLock<CapabilityCache> = OnceLock::new();

/// Process-wide holder of the current [`Capabilities`] snapshot.
///
/// Readers get an `Arc` to an immutable snapshot. A refresh builds a whole
/// new snapshot and swaps it in, so a reader never sees a partial update.
#[derive(Debug, Default)]
pub struct CapabilityCache {
    current: RwLock<Arc<Capabilities>>,
}

impl CapabilityCache {
    pub fn new(capabilities: Capabilities) -> Self {
        Self {
            current: RwLock::new(Arc::new(capabilities)),
        }
    }

    /// The shared cache, empty until the first [`replace`](Self::replace) or
    /// [`refresh`](Self::refresh).
    pub fn global() -> &'static CapabilityCache {
        GLOBAL.get_or_init(CapabilityCache::default)
    }

    pub fn current(&self) -> Arc<Capabilities> {
        self.current.read().clone()
    }

    /// Swap in a new snapshot.
    pub fn replace(&self, capabilities: Capabilities) -> Arc<Capabilities> {
        let next = Arc::new(capabilities);
        *self.current.write() = Arc::clone(&next);
        next
    }

    /// Re-probe the transcoder at `path` and swap in the result.
    pub async fn refresh(&self, path: &Path, timeout: Duration) -> Arc<Capabilities> {
        let capabilities = probe_capabilities(path, timeout).await;
        self.replace(capabilities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_does_not_touch_held_snapshots() {
        let cache = CapabilityCache::new(Capabilities::empty().with_encoders(["libx264"]));
        let before = cache.current();

        cache.replace(Capabilities::empty().with_encoders(["h264_nvenc"]));

        assert!(before.has_encoder("libx264"));
        assert!(!before.has_encoder("h264_nvenc"));
        assert!(cache.current().has_encoder("h264_nvenc"));
    }

    #[test]
    fn global_is_shared() {
        let a = CapabilityCache::global() as *const _;
        let b = CapabilityCache::global() as *const _;
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn refresh_with_missing_binary_clears_snapshot() {
        let cache = CapabilityCache::new(Capabilities::empty().with_filters(["scale"]));
        let caps = cache
            .refresh(Path::new("/nonexistent/ffmpeg"), Duration::from_secs(1))
            .await;
        assert!(caps.is_empty());
        assert!(cache.current().is_empty());
    }
}
