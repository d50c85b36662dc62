//! Unified error type for castforge.
//!
//! Every crate in the workspace funnels its failures into [`Error`]. The CLI
//! derives a process exit code from it via [`Error::exit_code`].

/// Unified error type covering all failure modes in castforge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The desired output state or configuration is invalid.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// An external tool (ffmpeg, ffprobe) could not be run or returned an error.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// Capability probe output could not be interpreted.
    #[error("Probe error: {0}")]
    Probe(String),

    /// A transcode pipeline could not be built for the given inputs.
    #[error("Pipeline error [{step}]: {message}")]
    Pipeline {
        /// The build stage that rejected the inputs.
        step: String,
        /// Human-readable error description.
        message: String,
    },

    /// A job or snapshot document could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to a process exit code for the CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Validation(_) => 2,
            Error::Io { .. } => 3,
            Error::Tool { .. } => 4,
            Error::Probe(_) => 5,
            Error::Pipeline { .. } => 6,
            Error::Serialization(_) => 7,
            Error::Internal(_) => 1,
        }
    }

    /// Convenience constructor for [`Error::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Pipeline`].
    pub fn pipeline(step: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Pipeline {
            step: step.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_display() {
        let err = Error::validation("time limit must be greater than zero");
        assert_eq!(
            err.to_string(),
            "Validation error: time limit must be greater than zero"
        );
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn io_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io { .. }));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn tool_display() {
        let err = Error::tool("ffmpeg", "exit code 1");
        assert_eq!(err.to_string(), "Tool error [ffmpeg]: exit code 1");
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn probe_display() {
        let err = Error::Probe("no encoder listing".into());
        assert_eq!(err.to_string(), "Probe error: no encoder listing");
    }

    #[test]
    fn pipeline_display() {
        let err = Error::pipeline("deinterlace", "no video stream");
        assert_eq!(err.to_string(), "Pipeline error [deinterlace]: no video stream");
        assert_eq!(err.exit_code(), 6);
    }

    #[test]
    fn serde_json_error_converts() {
        let parse: std::result::Result<u32, _> = serde_json::from_str("not json");
        let err = Error::from(parse.unwrap_err());
        assert!(matches!(err, Error::Serialization(_)));
        assert_eq!(err.exit_code(), 7);
    }

    #[test]
    fn result_alias() {
        fn ok_fn() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(ok_fn().unwrap(), 42);

        fn err_fn() -> Result<i32> {
            Err(Error::Internal("boom".into()))
        }
        assert!(err_fn().is_err());
    }
}
