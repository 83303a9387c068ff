//! Configuration management for Rategate.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{RategateError, Result};
use crate::ratelimit::{
    AdmissionControl, Clock, KeyedLimiter, SlidingWindowConfig, SlidingWindowLog, TokenBucket,
    TokenBucketConfig,
};

/// Main configuration for a Rategate deployment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RategateConfig {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Limiter configuration
    #[serde(default)]
    pub limiter: LimiterConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON log lines instead of human readable ones
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Which algorithm to run and its fixed parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum LimiterConfig {
    /// Exact sliding window log
    SlidingWindow {
        /// Maximum admissions per window
        limit: usize,
        /// Window length in milliseconds
        window_ms: u64,
    },
    /// Continuously refilled token bucket
    TokenBucket {
        /// Maximum stored tokens
        capacity: u32,
        /// Tokens added per second
        refill_per_second: f64,
    },
}

impl Default for LimiterConfig {
    fn default() -> Self {
        LimiterConfig::TokenBucket {
            capacity: default_capacity(),
            refill_per_second: default_refill_per_second(),
        }
    }
}

fn default_capacity() -> u32 {
    10
}

fn default_refill_per_second() -> f64 {
    5.0
}

impl LimiterConfig {
    /// Check that the parameters describe a well-defined limiter.
    pub fn validate(&self) -> Result<()> {
        match self {
            LimiterConfig::SlidingWindow { .. } => Ok(()),
            LimiterConfig::TokenBucket {
                capacity,
                refill_per_second,
            } => TokenBucketConfig::new(*capacity, *refill_per_second).map(|_| ()),
        }
    }

    /// Build a keyed limiter for this configuration.
    pub fn build(&self, clock: Arc<dyn Clock>) -> Result<Box<dyn AdmissionControl>> {
        match self {
            LimiterConfig::SlidingWindow { limit, window_ms } => {
                let config = SlidingWindowConfig::new(*limit, Duration::from_millis(*window_ms));
                Ok(Box::new(KeyedLimiter::<SlidingWindowLog>::with_clock(config, clock)))
            }
            LimiterConfig::TokenBucket {
                capacity,
                refill_per_second,
            } => {
                let config = TokenBucketConfig::new(*capacity, *refill_per_second)?;
                Ok(Box::new(KeyedLimiter::<TokenBucket>::with_clock(config, clock)))
            }
        }
    }
}

impl RategateConfig {
    /// Load configuration from a YAML file.
    ///
    /// Does not log; the caller reports the loaded path once logging is up.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: RategateConfig = serde_yaml::from_str(yaml)
            .map_err(|e| RategateError::Config(format!("Failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the whole configuration.
    pub fn validate(&self) -> Result<()> {
        self.limiter.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::ManualClock;

    #[test]
    fn test_default_config() {
        let config = RategateConfig::default();
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
        assert_eq!(
            config.limiter,
            LimiterConfig::TokenBucket {
                capacity: 10,
                refill_per_second: 5.0
            }
        );
    }

    #[test]
    fn test_parse_sliding_window() {
        let yaml = r#"
logging:
  level: debug
limiter:
  algorithm: sliding_window
  limit: 5
  window_ms: 2000
"#;

        let config = RategateConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(
            config.limiter,
            LimiterConfig::SlidingWindow {
                limit: 5,
                window_ms: 2000
            }
        );
    }

    #[test]
    fn test_parse_token_bucket() {
        let yaml = r#"
limiter:
  algorithm: token_bucket
  capacity: 3
  refill_per_second: 0.5
"#;

        let config = RategateConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.logging.level, "info");
        assert_eq!(
            config.limiter,
            LimiterConfig::TokenBucket {
                capacity: 3,
                refill_per_second: 0.5
            }
        );
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = RategateConfig::from_yaml("{}").unwrap();
        assert_eq!(config.limiter, LimiterConfig::default());
    }

    #[test]
    fn test_rejects_unknown_algorithm() {
        let yaml = r#"
limiter:
  algorithm: leaky_bucket
  capacity: 3
"#;

        let result = RategateConfig::from_yaml(yaml);
        assert!(matches!(result, Err(RategateError::Config(_))));
    }

    #[test]
    fn test_rejects_negative_rate() {
        let yaml = r#"
limiter:
  algorithm: token_bucket
  capacity: 3
  refill_per_second: -2.0
"#;

        let result = RategateConfig::from_yaml(yaml);
        assert!(matches!(result, Err(RategateError::InvalidConfig(_))));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("rategate-{}.yaml", std::process::id()));
        std::fs::write(
            &path,
            "limiter:\n  algorithm: sliding_window\n  limit: 5\n  window_ms: 2000\n",
        )
        .unwrap();

        let result = RategateConfig::from_file(&path);
        std::fs::remove_file(&path).unwrap();

        assert_eq!(
            result.unwrap().limiter,
            LimiterConfig::SlidingWindow {
                limit: 5,
                window_ms: 2000
            }
        );
    }

    #[test]
    fn test_missing_file() {
        let result = RategateConfig::from_file("/nonexistent/rategate.yaml");
        assert!(matches!(result, Err(RategateError::Io(_))));
    }

    #[test]
    fn test_build_from_config() {
        let clock = Arc::new(ManualClock::new());

        let log = LimiterConfig::SlidingWindow {
            limit: 2,
            window_ms: 1000,
        }
        .build(clock.clone())
        .unwrap();
        assert_eq!(log.algorithm(), "sliding_window");
        assert!(log.admit("user"));
        assert!(log.admit("user"));
        assert!(!log.admit("user"));

        let bucket = LimiterConfig::default().build(clock.clone()).unwrap();
        assert_eq!(bucket.algorithm(), "token_bucket");
        for _ in 0..10 {
            assert!(bucket.admit("user"));
        }
        assert!(!bucket.admit("user"));

        clock.advance(Duration::from_millis(1000));
        assert!(log.admit("user"));
    }
}
