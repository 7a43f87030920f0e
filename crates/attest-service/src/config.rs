//! # Engine Configuration
//!
//! Read from environment variables with defaults. Invalid values are
//! rejected at startup rather than silently replaced.
//!
//! | Variable                  | Default | Meaning                          |
//! |---------------------------|---------|----------------------------------|
//! | `ENABLE_COMMITMENT`       | `true`  | register the commitment backend  |
//! | `ENABLE_STARK`            | `true`  | register the STARK backend       |
//! | `ENABLE_GROTH16`          | `false` | register Groth16 (needs engine)  |
//! | `ENABLE_PLONK`            | `false` | register PLONK (needs engine)    |
//! | `WORKER_CONCURRENCY`      | `10`    | worker tasks in the pool         |
//! | `JOB_MAX_RETRIES`         | `3`     | redeliveries after the first     |
//! | `TASK_TIMEOUT_SECS`       | `600`   | visibility timeout and job lease |
//! | `QUEUE_WEIGHTS`           | `6,3,1` | `high,normal,low` lane weights   |
//! | `WORKER_POLL_INTERVAL_MS` | `50`    | idle worker poll interval        |
//! | `MAX_BATCH_SIZE`          | `100`   | requests per batch               |
//! | `ATTEST_LOG_JSON`         | `false` | JSON log lines                   |

use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use attest_queue::{QueueConfig, WorkerConfig, DEFAULT_LANE_WEIGHTS};

/// Configuration errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("no proof systems enabled")]
    NoBackends,
}

/// Effective engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineConfig {
    pub enable_commitment: bool,
    pub enable_stark: bool,
    pub enable_groth16: bool,
    pub enable_plonk: bool,
    pub worker_concurrency: usize,
    pub job_max_retries: u32,
    pub task_timeout_secs: u64,
    pub queue_weights: [u32; 3],
    pub worker_poll_interval_ms: u64,
    pub max_batch_size: usize,
    pub log_json: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enable_commitment: true,
            enable_stark: true,
            enable_groth16: false,
            enable_plonk: false,
            worker_concurrency: 10,
            job_max_retries: 3,
            task_timeout_secs: 600,
            queue_weights: DEFAULT_LANE_WEIGHTS,
            worker_poll_interval_ms: 50,
            max_batch_size: 100,
            log_json: false,
        }
    }
}

impl EngineConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let d = Self::default();
        let config = Self {
            enable_commitment: flag(&lookup, "ENABLE_COMMITMENT", d.enable_commitment)?,
            enable_stark: flag(&lookup, "ENABLE_STARK", d.enable_stark)?,
            enable_groth16: flag(&lookup, "ENABLE_GROTH16", d.enable_groth16)?,
            enable_plonk: flag(&lookup, "ENABLE_PLONK", d.enable_plonk)?,
            worker_concurrency: positive(&lookup, "WORKER_CONCURRENCY", d.worker_concurrency)?,
            job_max_retries: number(&lookup, "JOB_MAX_RETRIES", d.job_max_retries)?,
            task_timeout_secs: positive(&lookup, "TASK_TIMEOUT_SECS", d.task_timeout_secs)?,
            queue_weights: match lookup("QUEUE_WEIGHTS") {
                Some(raw) => parse_weights(&raw)?,
                None => d.queue_weights,
            },
            worker_poll_interval_ms: positive(
                &lookup,
                "WORKER_POLL_INTERVAL_MS",
                d.worker_poll_interval_ms,
            )?,
            max_batch_size: positive(&lookup, "MAX_BATCH_SIZE", d.max_batch_size)?,
            log_json: flag(&lookup, "ATTEST_LOG_JSON", d.log_json)?,
        };
        if !(config.enable_commitment
            || config.enable_stark
            || config.enable_groth16
            || config.enable_plonk)
        {
            return Err(ConfigError::NoBackends);
        }
        Ok(config)
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }

    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            lane_weights: self.queue_weights,
            ..QueueConfig::default()
        }
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            concurrency: self.worker_concurrency,
            poll_interval: Duration::from_millis(self.worker_poll_interval_ms),
            ..WorkerConfig::default()
        }
    }
}

fn invalid(var: &'static str, value: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.into(),
    }
}

fn flag(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    let Some(raw) = lookup(var) else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(var, &raw, "expected true or false")),
    }
}

fn number<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        Some(raw) => raw.trim().parse().map_err(|e| invalid(var, &raw, format!("{e}"))),
        None => Ok(default),
    }
}

fn positive<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Default,
    T::Err: std::fmt::Display,
{
    let value = number(lookup, var, default)?;
    if value <= T::default() {
        return Err(invalid(
            var,
            &lookup(var).unwrap_or_default(),
            "must be greater than zero",
        ));
    }
    Ok(value)
}

/// Parse `high,normal,low` lane weights.
pub fn parse_weights(raw: &str) -> Result<[u32; 3], ConfigError> {
    const VAR: &str = "QUEUE_WEIGHTS";
    let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
    let [high, normal, low] = parts.as_slice() else {
        return Err(invalid(VAR, raw, "expected three comma-separated weights"));
    };
    let mut weights = [0u32; 3];
    for (slot, part) in weights.iter_mut().zip([high, normal, low]) {
        *slot = part
            .parse()
            .map_err(|e| invalid(VAR, raw, format!("{part:?}: {e}")))?;
        if *slot == 0 {
            return Err(invalid(VAR, raw, "weights must be non-zero"));
        }
    }
    Ok(weights)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<EngineConfig, ConfigError> {
        let env: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EngineConfig::from_lookup(|k| env.get(k).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let cfg = load(&[]).unwrap();
        assert_eq!(cfg, EngineConfig::default());
        assert_eq!(cfg.task_timeout(), Duration::from_secs(600));
        assert_eq!(cfg.worker_config().concurrency, 10);
        assert_eq!(cfg.queue_config().lane_weights, [6, 3, 1]);
    }

    #[test]
    fn overrides_are_applied() {
        let cfg = load(&[
            ("ENABLE_GROTH16", "true"),
            ("ENABLE_STARK", "off"),
            ("WORKER_CONCURRENCY", "4"),
            ("JOB_MAX_RETRIES", "0"),
            ("QUEUE_WEIGHTS", "8, 2, 1"),
            ("ATTEST_LOG_JSON", "1"),
        ])
        .unwrap();
        assert!(cfg.enable_groth16);
        assert!(!cfg.enable_stark);
        assert_eq!(cfg.worker_concurrency, 4);
        assert_eq!(cfg.job_max_retries, 0);
        assert_eq!(cfg.queue_weights, [8, 2, 1]);
        assert!(cfg.log_json);
    }

    #[test]
    fn bad_flag_is_rejected() {
        let err = load(&[("ENABLE_PLONK", "maybe")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "ENABLE_PLONK", .. }));
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let err = load(&[("WORKER_CONCURRENCY", "0")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                var: "WORKER_CONCURRENCY",
                value: "0".into(),
                reason: "must be greater than zero".into(),
            }
        );
    }

    #[test]
    fn non_numeric_is_rejected() {
        assert!(load(&[("TASK_TIMEOUT_SECS", "ten")]).is_err());
        assert!(load(&[("MAX_BATCH_SIZE", "-1")]).is_err());
    }

    #[test]
    fn weights_need_three_non_zero_parts() {
        assert!(parse_weights("6,3").is_err());
        assert!(parse_weights("6,3,1,1").is_err());
        assert!(parse_weights("6,0,1").is_err());
        assert!(parse_weights("a,b,c").is_err());
        assert_eq!(parse_weights("6,3,1").unwrap(), [6, 3, 1]);
    }

    #[test]
    fn all_backends_disabled_is_rejected() {
        let err = load(&[("ENABLE_COMMITMENT", "false"), ("ENABLE_STARK", "false")]).unwrap_err();
        assert_eq!(err, ConfigError::NoBackends);
    }

    #[test]
    fn config_serializes_for_display() {
        let json = serde_json::to_value(EngineConfig::default()).unwrap();
        assert_eq!(json["queue_weights"], serde_json::json!([6, 3, 1]));
        assert_eq!(json["max_batch_size"], 100);
    }
}
