use crate::config::InsightConfig;
use crate::models::DatasetProfile;

const HIGH_NULL_PENALTY: f64 = 2.0;
const UNIQUENESS_BONUS: f64 = 5.0;
const UNIQUENESS_BONUS_CUTOFF: f64 = 0.5;

pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// `100 - mean(nullPercentage)`; a profile without columns is fully complete.
pub fn completeness(profile: &DatasetProfile) -> f64 {
    if profile.columns.is_empty() {
        return 100.0;
    }
    let total: f64 = profile.columns.iter().map(|c| c.null_percentage).sum();
    100.0 - total / profile.columns.len() as f64
}

/// Mean of `uniqueCount / rowCount` across columns, as a ratio.
pub fn average_uniqueness(profile: &DatasetProfile) -> f64 {
    if profile.columns.is_empty() || profile.row_count == 0 {
        return 0.0;
    }
    let rows = profile.row_count as f64;
    let total: f64 = profile
        .columns
        .iter()
        .map(|c| c.unique_count as f64 / rows)
        .sum();
    total / profile.columns.len() as f64
}

#[derive(Debug, Clone)]
pub struct QualityScorer {
    high_null_threshold: f64,
}

impl Default for QualityScorer {
    fn default() -> Self {
        Self::from_config(&InsightConfig::default())
    }
}

impl QualityScorer {
    pub fn new(high_null_threshold: f64) -> Self {
        Self { high_null_threshold }
    }

    pub fn from_config(config: &InsightConfig) -> Self {
        Self::new(config.high_null_threshold)
    }

    /// Single 0-100 score from completeness, sparse columns and uniqueness.
    pub fn score(&self, profile: &DatasetProfile) -> f64 {
        if profile.columns.is_empty() {
            return 0.0;
        }

        let sparse_columns = profile
            .columns
            .iter()
            .filter(|c| c.null_percentage > self.high_null_threshold)
            .count();

        let mut score = completeness(profile) - HIGH_NULL_PENALTY * sparse_columns as f64;
        if average_uniqueness(profile) > UNIQUENESS_BONUS_CUTOFF {
            score += UNIQUENESS_BONUS;
        }

        round1(score.clamp(0.0, 100.0))
    }
}
