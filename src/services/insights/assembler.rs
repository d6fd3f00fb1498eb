use super::classifier::{Classification, FieldClassifier};
use super::geo::resolve_bubbles;
use super::market::MarketAggregator;
use super::quality::{average_uniqueness, completeness, round1, QualityScorer};
use super::types::{FieldRole, Granularity, Insights, ProfileSummary};
use crate::config::InsightConfig;
use crate::models::{DatasetProfile, ProfileDocument};

pub fn quality_label(completeness: f64) -> &'static str {
    if completeness > 95.0 {
        "Excellent"
    } else if completeness > 85.0 {
        "Good"
    } else {
        "Fair"
    }
}

pub fn summarize(profile: &DatasetProfile, classification: &Classification) -> ProfileSummary {
    let completeness = completeness(profile);
    ProfileSummary {
        completeness: round1(completeness),
        uniqueness: round1(average_uniqueness(profile) * 100.0),
        numeric_count: classification.count_where(|r| {
            r == FieldRole::Numeric
                || r.is_market()
                || matches!(r, FieldRole::GeoLat | FieldRole::GeoLng)
        }),
        categorical_count: classification
            .count_where(|r| matches!(r, FieldRole::Categorical | FieldRole::GeoCity)),
        text_count: classification.count_where(|r| r == FieldRole::Text),
        date_count: classification.count_where(|r| r == FieldRole::DateTime),
        bool_count: classification.count_where(|r| r == FieldRole::Boolean),
        quality_label: quality_label(completeness).to_string(),
    }
}

/// Stateless: every call rebuilds the snapshot from its inputs.
#[derive(Debug, Clone)]
pub struct InsightAssembler {
    config: InsightConfig,
    classifier: FieldClassifier,
    aggregator: MarketAggregator,
    scorer: QualityScorer,
}

impl Default for InsightAssembler {
    fn default() -> Self {
        Self::new(InsightConfig::default())
    }
}

impl InsightAssembler {
    pub fn new(config: InsightConfig) -> Self {
        Self {
            classifier: FieldClassifier::from_config(&config),
            aggregator: MarketAggregator::from_config(&config),
            scorer: QualityScorer::from_config(&config),
            config,
        }
    }

    pub fn config(&self) -> &InsightConfig {
        &self.config
    }

    pub fn classify(&self, document: &ProfileDocument) -> Classification {
        self.classifier
            .classify(&document.profile.columns, document.metadata())
    }

    /// `None` when there is no profile to analyze.
    pub fn assemble(
        &self,
        document: Option<&ProfileDocument>,
        granularity: Option<Granularity>,
    ) -> Option<Insights> {
        let Some(document) = document else {
            tracing::warn!("No dataset profile available, skipping insight assembly");
            return None;
        };
        let granularity = granularity.unwrap_or(self.config.default_granularity);
        Some(self.assemble_document(document, granularity))
    }

    pub fn assemble_document(
        &self,
        document: &ProfileDocument,
        granularity: Granularity,
    ) -> Insights {
        let classification = self.classify(document);
        let quality_score = self.scorer.score(&document.profile);
        let summary = summarize(&document.profile, &classification);

        let candles = classification
            .market_fields
            .as_ref()
            .map(|fields| self.aggregator.aggregate(&document.sample, fields, granularity));

        let geo_points = Some(resolve_bubbles(document)).filter(|points| !points.is_empty());

        tracing::info!(
            "Assembled insights for {} columns: quality={}, candles={}, geo points={}",
            document.profile.columns.len(),
            quality_score,
            candles.as_ref().map_or(0, Vec::len),
            geo_points.as_ref().map_or(0, Vec::len)
        );

        Insights {
            quality_score,
            summary,
            granularity,
            date_column: classification.date_column,
            market_fields: classification.market_fields,
            candles,
            geo_points,
            correlation: document.correlation.clone(),
            metadata: document.metadata.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ColumnProfile, CorrelationMatrix};

    fn doc() -> ProfileDocument {
        let column = |name: &str, ty: &str, nulls: f64, unique: u64| ColumnProfile {
            null_percentage: nulls,
            unique_count: unique,
            ..ColumnProfile::new(name, ty)
        };
        ProfileDocument::new(DatasetProfile {
            row_count: 100,
            column_count: 5,
            columns: vec![
                column("Open", "float64", 0.0, 90),
                column("Close", "float64", 0.0, 90),
                column("timestamp", "datetime", 0.0, 100),
                column("notes", "object", 40.0, 80),
                column("flag", "bool", 0.0, 2),
            ],
        })
    }

    #[test]
    fn missing_profile_means_no_insights() {
        assert!(InsightAssembler::default().assemble(None, None).is_none());
    }

    #[test]
    fn summary_counts_roles() {
        let document = doc();
        let assembler = InsightAssembler::default();
        let summary = summarize(&document.profile, &assembler.classify(&document));
        assert_eq!(summary.numeric_count, 2);
        assert_eq!(summary.date_count, 1);
        assert_eq!(summary.text_count, 1);
        assert_eq!(summary.bool_count, 1);
        assert_eq!(summary.categorical_count, 0);
        assert_eq!(summary.completeness, 92.0);
        assert_eq!(summary.uniqueness, 72.4);
        assert_eq!(summary.quality_label, "Good");
    }

    #[test]
    fn market_profile_without_sample_has_empty_candles() {
        let insights = InsightAssembler::default().assemble(Some(&doc()), None).unwrap();
        assert_eq!(insights.granularity, Granularity::Month);
        assert_eq!(insights.candles, Some(Vec::new()));
        assert!(insights.geo_points.is_none());
        assert_eq!(insights.date_column.as_deref(), Some("timestamp"));
        // 92 - 2 (notes) + 5 (uniqueness 0.724)
        assert_eq!(insights.quality_score, 95.0);
    }

    #[test]
    fn correlation_and_metadata_pass_through() {
        let mut document = doc();
        document.correlation = Some(CorrelationMatrix {
            columns: vec!["Open".into(), "Close".into()],
            values: vec![vec![1.0, 0.9], vec![0.9, 1.0]],
        });
        let insights = InsightAssembler::default()
            .assemble(Some(&document), Some(Granularity::Week))
            .unwrap();
        assert_eq!(insights.correlation, document.correlation);
        assert_eq!(insights.granularity, Granularity::Week);
    }

    #[test]
    fn assembling_twice_is_identical() {
        let document = doc();
        let assembler = InsightAssembler::default();
        assert_eq!(
            assembler.assemble(Some(&document), None),
            assembler.assemble(Some(&document), None)
        );
    }

    #[test]
    fn quality_labels() {
        assert_eq!(quality_label(99.0), "Excellent");
        assert_eq!(quality_label(95.0), "Good");
        assert_eq!(quality_label(60.0), "Fair");
    }
}
