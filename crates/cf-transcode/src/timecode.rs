//! Locale-independent rendering of times and decimals for ffmpeg arguments.

use std::time::Duration;

/// Render `d` as `HH:MM:SS`, with a `.fff` suffix when it has a sub-second part.
pub fn format_timestamp(d: Duration) -> String {
    let total = d.as_secs();
    let hours = total / 3600;
    let minutes = (total / 60) % 60;
    let seconds = total % 60;
    let millis = d.subsec_millis();

    if millis == 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
    }
}

/// Render `d` in milliseconds with as many decimals as needed (`1000.1`).
pub fn format_millis(d: Duration) -> String {
    let nanos = d.as_nanos();
    let whole = nanos / 1_000_000;
    let frac = nanos % 1_000_000;
    if frac == 0 {
        return whole.to_string();
    }

    let digits = format!("{frac:06}");
    format!("{whole}.{}", digits.trim_end_matches('0'))
}

/// Render a decimal with at least one fractional digit (`1.0`, `1.05`).
pub fn format_decimal(value: f64) -> String {
    let s = value.to_string();
    if s.contains('.') || s.contains('e') || !value.is_finite() {
        s
    } else {
        format!("{s}.0")
    }
}

/// Serde helpers to (de)serialize `Option<Duration>` as fractional seconds.
pub mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_f64(d.as_secs_f64()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<f64>::deserialize(deserializer)?;
        secs.map(|s| Duration::try_from_secs_f64(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_whole_seconds() {
        assert_eq!(format_timestamp(Duration::from_secs(1)), "00:00:01");
        assert_eq!(format_timestamp(Duration::from_secs(3723)), "01:02:03");
    }

    #[test]
    fn timestamp_with_millis() {
        assert_eq!(format_timestamp(Duration::from_millis(1500)), "00:00:01.500");
    }

    #[test]
    fn millis_keep_fraction_with_a_dot() {
        assert_eq!(format_millis(Duration::from_micros(1_000_100)), "1000.1");
        assert_eq!(format_millis(Duration::from_secs(54 * 60)), "3240000");
    }

    #[test]
    fn decimals_always_have_a_fraction() {
        assert_eq!(format_decimal(1.0), "1.0");
        assert_eq!(format_decimal(1.05), "1.05");
        assert_eq!(format_decimal(0.5), "0.5");
    }

    #[derive(serde::Serialize, serde::Deserialize)]
    struct Wrapper {
        #[serde(default, with = "duration_secs")]
        start: Option<Duration>,
    }

    #[test]
    fn duration_secs_roundtrip_and_reject_negative() {
        let w: Wrapper = serde_json::from_str(r#"{"start": 1.5}"#).unwrap();
        assert_eq!(w.start, Some(Duration::from_millis(1500)));

        let w: Wrapper = serde_json::from_str("{}").unwrap();
        assert_eq!(w.start, None);

        assert!(serde_json::from_str::<Wrapper>(r#"{"start": -1}"#).is_err());
        assert_eq!(
            serde_json::to_string(&Wrapper { start: Some(Duration::from_secs(2)) }).unwrap(),
            r#"{"start":2.0}"#
        );
    }
}
