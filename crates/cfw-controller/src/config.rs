//! # Controller Configuration
//!
//! Limits and logging settings with sane defaults and environment overrides.
//!
//! | Variable | Field | Default |
//! |----------|-------|---------|
//! | `CFW_MAX_BATCH_CALLS` | `max_batch_calls` | 256 |
//! | `CFW_MAX_SWEEP_ASSETS` | `max_sweep_assets` | 128 |
//! | `CFW_LOG_LEVEL` (then `RUST_LOG`) | `log_level` | `info` |

use crate::errors::ConfigError;
use std::env;

/// Controller configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Maximum calls accepted by one `deploy_and_execute`.
    pub max_batch_calls: usize,
    /// Maximum asset entries accepted by one `sweep`.
    pub max_sweep_assets: usize,
    /// Log filter used by `telemetry::init_logging`.
    pub log_level: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            max_batch_calls: 256,
            max_sweep_assets: 128,
            log_level: "info".to_string(),
        }
    }
}

impl ControllerConfig {
    /// Builds configuration from environment variables, falling back to
    /// defaults for anything unset.
    ///
    /// # Errors
    ///
    /// `InvalidVar` if a set variable does not parse, `ZeroLimit` if a limit
    /// is zero.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            max_batch_calls: parse_var("CFW_MAX_BATCH_CALLS")?.unwrap_or(defaults.max_batch_calls),
            max_sweep_assets: parse_var("CFW_MAX_SWEEP_ASSETS")?
                .unwrap_or(defaults.max_sweep_assets),
            log_level: env::var("CFW_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or(defaults.log_level),
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks that every limit is usable.
    ///
    /// # Errors
    ///
    /// `ZeroLimit` naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_batch_calls == 0 {
            return Err(ConfigError::ZeroLimit("max_batch_calls"));
        }
        if self.max_sweep_assets == 0 {
            return Err(ConfigError::ZeroLimit("max_sweep_assets"));
        }
        Ok(())
    }
}

fn parse_var(var: &'static str) -> Result<Option<usize>, ConfigError> {
    match env::var(var) {
        Ok(value) => match value.trim().parse::<usize>() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(ConfigError::InvalidVar { var, value }),
        },
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ControllerConfig::default();
        assert_eq!(config.max_batch_calls, 256);
        assert_eq!(config.max_sweep_assets, 128);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_limits_rejected() {
        let config = ControllerConfig {
            max_batch_calls: 0,
            ..ControllerConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroLimit("max_batch_calls"))
        );

        let config = ControllerConfig {
            max_sweep_assets: 0,
            ..ControllerConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroLimit("max_sweep_assets"))
        );
    }

    #[test]
    fn test_unset_var_parses_to_none() {
        assert_eq!(parse_var("CFW_TEST_SURELY_UNSET_VARIABLE"), Ok(None));
    }
}
