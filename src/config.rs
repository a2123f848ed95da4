use std::path::Path;

use serde::Deserialize;

use crate::error::CoreError;
use crate::error::Result;

/// The configuration surface of this crate: the two compaction knobs and the
/// two fallback limits. Everything else the teacher's `Config` carries
/// (sandbox policy, approval policy, model provider registry, shell
/// environment policy, project docs) belongs to the peripheral surface this
/// crate does not implement.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub compression_threshold: f64,
    pub retention_ratio: f64,
    pub default_context_limit: usize,
    pub default_output_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            compression_threshold: 0.7,
            retention_ratio: 0.3,
            default_context_limit: 131_072,
            default_output_limit: 65_536,
        }
    }
}

impl Config {
    /// Loads configuration from an optional TOML file, falling back to
    /// [`Config::default`] for any field the file omits and when `path` is
    /// `None` or the file does not exist. Returns an error only when the
    /// file exists but fails to parse, or when parsed values fail
    /// validation.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) if path.exists() => {
                let raw = std::fs::read_to_string(path).map_err(|err| {
                    CoreError::InvalidConfig(format!(
                        "failed to read config file {}: {err}",
                        path.display()
                    ))
                })?;
                Self::from_toml_str(&raw)?
            }
            _ => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Config = toml::from_str(raw)
            .map_err(|err| CoreError::InvalidConfig(format!("invalid config toml: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let in_unit_range = |v: f64| v > 0.0 && v <= 1.0;
        if !in_unit_range(self.compression_threshold) {
            return Err(CoreError::InvalidConfig(format!(
                "compression_threshold must be in (0, 1], got {}",
                self.compression_threshold
            )));
        }
        if !in_unit_range(self.retention_ratio) {
            return Err(CoreError::InvalidConfig(format!(
                "retention_ratio must be in (0, 1], got {}",
                self.retention_ratio
            )));
        }
        if self.default_context_limit == 0 || self.default_output_limit == 0 {
            return Err(CoreError::InvalidConfig(
                "default_context_limit and default_output_limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.compression_threshold, 0.7);
        assert_eq!(config.retention_ratio, 0.3);
        assert_eq!(config.default_context_limit, 131_072);
        assert_eq!(config.default_output_limit, 65_536);
    }

    #[test]
    fn load_with_no_path_returns_defaults() {
        let config = Config::load(None).expect("load with no path cannot fail");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn partial_toml_overrides_only_named_fields() {
        let config = Config::from_toml_str("retention_ratio = 0.5\n").expect("valid toml");
        assert_eq!(config.retention_ratio, 0.5);
        assert_eq!(config.compression_threshold, 0.7);
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let result = Config::from_toml_str("compression_threshold = 1.5\n");
        assert!(result.is_err());
    }

    #[test]
    fn zero_context_limit_is_rejected() {
        let result = Config::from_toml_str("default_context_limit = 0\n");
        assert!(result.is_err());
    }
}
