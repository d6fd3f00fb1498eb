use anyhow::Result;
use dotenvy::dotenv;
use serde::Deserialize;
use std::str::FromStr;

use crate::error::InsightError;
use crate::services::insights::types::Granularity;

fn default_categorical_threshold() -> u64 {
    20
}

fn default_day_candle_limit() -> usize {
    80
}

fn default_high_null_threshold() -> f64 {
    10.0
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InsightConfig {
    /// Columns with a distribution and fewer unique values than this are categorical.
    #[serde(default = "default_categorical_threshold")]
    pub categorical_threshold: u64,
    /// Number of most recent rows kept for day candles.
    #[serde(default = "default_day_candle_limit")]
    pub day_candle_limit: usize,
    /// Null percentage above which a column costs quality points.
    #[serde(default = "default_high_null_threshold")]
    pub high_null_threshold: f64,
    #[serde(default)]
    pub default_granularity: Granularity,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            categorical_threshold: default_categorical_threshold(),
            day_candle_limit: default_day_candle_limit(),
            high_null_threshold: default_high_null_threshold(),
            default_granularity: Granularity::default(),
        }
    }
}

impl InsightConfig {
    pub fn from_env() -> Result<Self> {
        // Load .env file first
        dotenv().ok();

        let defaults = Self::default();
        Ok(InsightConfig {
            categorical_threshold: env_or(
                "INSIGHTS_CATEGORICAL_THRESHOLD",
                defaults.categorical_threshold,
            )?,
            day_candle_limit: env_or("INSIGHTS_DAY_CANDLE_LIMIT", defaults.day_candle_limit)?,
            high_null_threshold: env_or(
                "INSIGHTS_HIGH_NULL_THRESHOLD",
                defaults.high_null_threshold,
            )?,
            default_granularity: env_or(
                "INSIGHTS_DEFAULT_GRANULARITY",
                defaults.default_granularity,
            )?,
        })
    }
}

pub fn load_config() -> Result<InsightConfig> {
    let config = InsightConfig::from_env()?;
    tracing::debug!("Loaded insight configuration: {:?}", config);
    Ok(config)
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().map_err(|e| {
            anyhow::Error::from(InsightError::Config(format!(
                "Failed to parse {}={:?}: {}",
                key, raw, e
            )))
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = InsightConfig::default();
        assert_eq!(config.categorical_threshold, 20);
        assert_eq!(config.day_candle_limit, 80);
        assert_eq!(config.high_null_threshold, 10.0);
        assert_eq!(config.default_granularity, Granularity::Month);
    }

    #[test]
    fn env_or_parses_and_rejects() {
        std::env::set_var("INSIGHTS_TEST_ENV_OR_OK", " 35 ");
        std::env::set_var("INSIGHTS_TEST_ENV_OR_BAD", "many");

        assert_eq!(env_or::<u64>("INSIGHTS_TEST_ENV_OR_OK", 20).unwrap(), 35);
        assert_eq!(env_or::<u64>("INSIGHTS_TEST_ENV_OR_MISSING", 20).unwrap(), 20);
        assert!(env_or::<u64>("INSIGHTS_TEST_ENV_OR_BAD", 20).is_err());
    }

    #[test]
    fn deserializes_partial_config() {
        let config: InsightConfig =
            serde_json::from_str(r#"{"categorical_threshold": 50, "default_granularity": "WEEK"}"#)
                .unwrap();
        assert_eq!(config.categorical_threshold, 50);
        assert_eq!(config.day_candle_limit, 80);
        assert_eq!(config.default_granularity, Granularity::Week);
    }

    #[test]
    fn load_config_reads_overrides_from_env() {
        std::env::set_var("INSIGHTS_DAY_CANDLE_LIMIT", "40");
        std::env::set_var("INSIGHTS_DEFAULT_GRANULARITY", "week");
        let config = load_config().unwrap();
        assert_eq!(config.day_candle_limit, 40);
        assert_eq!(config.default_granularity, Granularity::Week);
        assert_eq!(config.categorical_threshold, 20);

        std::env::set_var("INSIGHTS_HIGH_NULL_THRESHOLD", "lots");
        let err = load_config().unwrap_err();
        assert!(err.to_string().contains("INSIGHTS_HIGH_NULL_THRESHOLD"));

        for key in [
            "INSIGHTS_DAY_CANDLE_LIMIT",
            "INSIGHTS_DEFAULT_GRANULARITY",
            "INSIGHTS_HIGH_NULL_THRESHOLD",
        ] {
            std::env::remove_var(key);
        }
    }
}
