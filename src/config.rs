use crate::error::{Result, SinkError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_HIGH_WATER_MARK: usize = 16;

/// Construction options for a sink.
///
/// On the wire `timeout` is a number of milliseconds; absent or `0` disables
/// idle flushing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SinkOptions {
    #[serde(default = "default_high_water_mark")]
    pub high_water_mark: usize,
    #[serde(default, with = "timeout_millis", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
}

fn default_high_water_mark() -> usize {
    DEFAULT_HIGH_WATER_MARK
}

impl Default for SinkOptions {
    fn default() -> Self {
        SinkOptions {
            high_water_mark: DEFAULT_HIGH_WATER_MARK,
            timeout: None,
        }
    }
}

impl SinkOptions {
    pub fn with_high_water_mark(mut self, high_water_mark: usize) -> Self {
        self.high_water_mark = high_water_mark;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = if timeout.is_zero() { None } else { Some(timeout) };
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.high_water_mark == 0 {
            return Err(SinkError::Configuration(
                "highWaterMark must be a positive integer".to_string(),
            ));
        }
        Ok(())
    }

    /// Load options from a JSON file, or fall back to environment variables
    /// (`BULKSINK_HIGH_WATER_MARK`, `BULKSINK_TIMEOUT_MS`) and then defaults.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        if let Some(path) = path.filter(|p| p.exists()) {
            match std::fs::read_to_string(path) {
                Ok(content) => match serde_json::from_str::<SinkOptions>(&content) {
                    Ok(options) => {
                        tracing::info!(
                            "Loaded sink options from {}: high_water_mark={}, timeout={:?}",
                            path.display(),
                            options.high_water_mark,
                            options.timeout
                        );
                        return options;
                    }
                    Err(e) => {
                        tracing::error!(
                            "Failed to parse {}: {}, using defaults",
                            path.display(),
                            e
                        );
                    }
                },
                Err(e) => {
                    tracing::error!("Failed to read {}: {}, using defaults", path.display(), e);
                }
            }
        }

        let high_water_mark = std::env::var("BULKSINK_HIGH_WATER_MARK")
            .ok()
            .and_then(|v| match v.trim().parse::<usize>() {
                Ok(n) if n > 0 => Some(n),
                _ => {
                    tracing::warn!(
                        "Ignoring invalid BULKSINK_HIGH_WATER_MARK={:?}, using {}",
                        v,
                        DEFAULT_HIGH_WATER_MARK
                    );
                    None
                }
            })
            .unwrap_or(DEFAULT_HIGH_WATER_MARK);

        let timeout = std::env::var("BULKSINK_TIMEOUT_MS")
            .ok()
            .and_then(|v| match v.trim().parse::<u64>() {
                Ok(ms) => Some(ms),
                Err(_) => {
                    tracing::warn!("Ignoring invalid BULKSINK_TIMEOUT_MS={:?}", v);
                    None
                }
            })
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis);

        SinkOptions {
            high_water_mark,
            timeout,
        }
    }
}

mod timeout_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let ms = Option::<u64>::deserialize(d)?;
        Ok(ms.filter(|ms| *ms > 0).map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    fn clear_env() {
        std::env::remove_var("BULKSINK_HIGH_WATER_MARK");
        std::env::remove_var("BULKSINK_TIMEOUT_MS");
    }

    #[test]
    fn test_default_high_water_mark_is_16() {
        let options = SinkOptions::default();
        assert_eq!(options.high_water_mark, 16);
        assert!(options.timeout.is_none());
    }

    #[test]
    fn test_deserialize_camel_case() {
        let options: SinkOptions =
            serde_json::from_str(r#"{"highWaterMark": 10, "timeout": 250}"#).unwrap();
        assert_eq!(options.high_water_mark, 10);
        assert_eq!(options.timeout, Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_deserialize_defaults_and_zero_timeout() {
        let options: SinkOptions = serde_json::from_str(r#"{"timeout": 0}"#).unwrap();
        assert_eq!(options.high_water_mark, 16);
        assert!(options.timeout.is_none());
    }

    #[test]
    fn test_serialize_huge_timeout_saturates() {
        let options = SinkOptions::default().with_timeout(Duration::MAX);
        let value = serde_json::to_value(&options).unwrap();
        assert_eq!(value["timeout"], serde_json::json!(u64::MAX));
        assert_eq!(value["highWaterMark"], 16);
    }

    #[test]
    fn test_validate_rejects_zero_high_water_mark() {
        let err = SinkOptions::default()
            .with_high_water_mark(0)
            .validate()
            .unwrap_err();
        assert!(matches!(err, SinkError::Configuration(_)));
    }

    #[test]
    #[serial]
    fn test_load_or_default_no_file_no_env() {
        clear_env();
        let temp_dir = tempfile::tempdir().unwrap();
        let options = SinkOptions::load_or_default(Some(&temp_dir.path().join("sink.json")));
        assert_eq!(options, SinkOptions::default());
    }

    #[test]
    #[serial]
    fn test_load_or_default_valid_file() {
        clear_env();
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("sink.json");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(br#"{"highWaterMark": 6, "timeout": 1000}"#)
            .unwrap();

        let options = SinkOptions::load_or_default(Some(&path));
        assert_eq!(options.high_water_mark, 6);
        assert_eq!(options.timeout, Some(Duration::from_secs(1)));
    }

    #[test]
    #[serial]
    fn test_load_or_default_invalid_json_falls_back() {
        clear_env();
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("sink.json");
        std::fs::write(&path, b"invalid json").unwrap();

        let options = SinkOptions::load_or_default(Some(&path));
        assert_eq!(options, SinkOptions::default());
    }

    #[test]
    #[serial]
    fn test_load_or_default_env_vars() {
        clear_env();
        std::env::set_var("BULKSINK_HIGH_WATER_MARK", "32");
        std::env::set_var("BULKSINK_TIMEOUT_MS", "500");

        let options = SinkOptions::load_or_default(None);
        clear_env();

        assert_eq!(options.high_water_mark, 32);
        assert_eq!(options.timeout, Some(Duration::from_millis(500)));
    }

    #[test]
    #[serial]
    fn test_load_or_default_ignores_bad_env_values() {
        clear_env();
        std::env::set_var("BULKSINK_HIGH_WATER_MARK", "0");
        std::env::set_var("BULKSINK_TIMEOUT_MS", "soon");

        let options = SinkOptions::load_or_default(None);
        clear_env();

        assert_eq!(options.high_water_mark, 16);
        assert!(options.timeout.is_none());
    }

    #[test]
    #[serial]
    fn test_file_takes_precedence_over_env() {
        clear_env();
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("sink.json");
        std::fs::write(&path, br#"{"highWaterMark": 4}"#).unwrap();
        std::env::set_var("BULKSINK_HIGH_WATER_MARK", "64");

        let options = SinkOptions::load_or_default(Some(&path));
        clear_env();

        assert_eq!(options.high_water_mark, 4);
    }
}
