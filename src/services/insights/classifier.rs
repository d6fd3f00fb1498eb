use once_cell::sync::Lazy;
use regex::Regex;

use super::types::{FieldRole, MarketFieldMap};
use crate::config::InsightConfig;
use crate::models::{ColumnProfile, Distribution, ProfileMetadata};

pub const OPEN_SYNONYMS: [&str; 3] = ["open", "opn", "start"];
pub const CLOSE_SYNONYMS: [&str; 5] = ["close", "cls", "price", "last", "end"];
pub const HIGH_SYNONYMS: [&str; 3] = ["high", "hi", "max"];
pub const LOW_SYNONYMS: [&str; 3] = ["low", "lo", "min"];

static DATE_NAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)date|time|timestamp|dt|period|day|month|year")
        .expect("Invalid regex: date name")
});

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnAssignment {
    pub name: String,
    pub role: FieldRole,
    /// Only one distinct value: zero variance.
    pub is_constant: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub assignments: Vec<ColumnAssignment>,
    pub market_fields: Option<MarketFieldMap>,
    pub date_column: Option<String>,
}

impl Classification {
    pub fn role_of(&self, name: &str) -> Option<FieldRole> {
        self.assignments
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.role)
    }

    pub fn columns_with(&self, role: FieldRole) -> Vec<&str> {
        self.assignments
            .iter()
            .filter(|a| a.role == role)
            .map(|a| a.name.as_str())
            .collect()
    }

    pub fn count_where(&self, predicate: impl Fn(FieldRole) -> bool) -> usize {
        self.assignments.iter().filter(|a| predicate(a.role)).count()
    }

    pub fn constant_columns(&self) -> Vec<&str> {
        self.assignments
            .iter()
            .filter(|a| a.is_constant)
            .map(|a| a.name.as_str())
            .collect()
    }

    /// Distribution of the first preferred column that has one, otherwise of
    /// the first categorical column.
    pub fn best_categorical<'a>(
        &self,
        columns: &'a [ColumnProfile],
        preferred: &[&str],
    ) -> Option<(&'a str, &'a Distribution)> {
        preferred
            .iter()
            .find_map(|pref| {
                columns
                    .iter()
                    .find(|c| c.name.eq_ignore_ascii_case(pref) && c.distribution.is_some())
            })
            .or_else(|| {
                columns.iter().find(|c| {
                    c.distribution.is_some()
                        && self.role_of(&c.name) == Some(FieldRole::Categorical)
                })
            })
            .and_then(|c| c.distribution.as_ref().map(|d| (c.name.as_str(), d)))
    }
}

/// Inputs shared by every role rule while classifying one profile.
pub struct RoleContext<'a> {
    pub market: Option<&'a MarketFieldMap>,
    pub date_column: Option<&'a str>,
    pub metadata: Option<&'a ProfileMetadata>,
    pub categorical_threshold: u64,
}

pub type RoleRule = fn(&RoleContext<'_>, &ColumnProfile) -> Option<FieldRole>;

/// Evaluated in order; the first rule returning a role wins.
pub const ROLE_RULES: [RoleRule; 9] = [
    geo_hint_role,
    market_role,
    date_role,
    boolean_role,
    categorical_hint_role,
    numeric_hint_role,
    categorical_role,
    numeric_role,
    text_role,
];

pub fn geo_hint_role(ctx: &RoleContext<'_>, column: &ColumnProfile) -> Option<FieldRole> {
    let geo = ctx.metadata?.geo_cols.as_ref()?;
    let name = Some(column.name.as_str());
    if geo.lat.as_deref() == name {
        Some(FieldRole::GeoLat)
    } else if geo.lng.as_deref() == name {
        Some(FieldRole::GeoLng)
    } else if geo.city.as_deref() == name {
        Some(FieldRole::GeoCity)
    } else {
        None
    }
}

pub fn market_role(ctx: &RoleContext<'_>, column: &ColumnProfile) -> Option<FieldRole> {
    let market = ctx.market?;
    let name = column.name.as_str();
    // open and close before the defaulted high/low slots
    [
        (market.open.as_str(), FieldRole::MarketOpen),
        (market.close.as_str(), FieldRole::MarketClose),
        (market.high.as_str(), FieldRole::MarketHigh),
        (market.low.as_str(), FieldRole::MarketLow),
    ]
    .into_iter()
    .find(|(field, _)| *field == name)
    .map(|(_, role)| role)
}

pub fn date_role(ctx: &RoleContext<'_>, column: &ColumnProfile) -> Option<FieldRole> {
    let hinted = ctx
        .metadata
        .map_or(false, |m| m.datetime_cols.iter().any(|c| *c == column.name));
    if ctx.date_column == Some(column.name.as_str()) || hinted || column.is_datetime_type() {
        Some(FieldRole::DateTime)
    } else {
        None
    }
}

pub fn boolean_role(_ctx: &RoleContext<'_>, column: &ColumnProfile) -> Option<FieldRole> {
    column.is_boolean_type().then_some(FieldRole::Boolean)
}

pub fn categorical_hint_role(ctx: &RoleContext<'_>, column: &ColumnProfile) -> Option<FieldRole> {
    ctx.metadata?
        .categorical_cols
        .iter()
        .any(|c| *c == column.name)
        .then_some(FieldRole::Categorical)
}

pub fn numeric_hint_role(ctx: &RoleContext<'_>, column: &ColumnProfile) -> Option<FieldRole> {
    ctx.metadata?
        .numerical_cols
        .iter()
        .any(|c| *c == column.name)
        .then_some(FieldRole::Numeric)
}

pub fn categorical_role(ctx: &RoleContext<'_>, column: &ColumnProfile) -> Option<FieldRole> {
    let enumerable = column.distribution.is_some()
        && (column.is_string_like() || column.unique_count < ctx.categorical_threshold);
    enumerable.then_some(FieldRole::Categorical)
}

pub fn numeric_role(_ctx: &RoleContext<'_>, column: &ColumnProfile) -> Option<FieldRole> {
    (column.is_numeric_type() || column.stats.is_some()).then_some(FieldRole::Numeric)
}

pub fn text_role(_ctx: &RoleContext<'_>, column: &ColumnProfile) -> Option<FieldRole> {
    column.is_string_like().then_some(FieldRole::Text)
}

/// First numeric-capable column named like one of `synonyms`. Exact names
/// win over substring hits so that e.g. `longitude` never shadows `low`.
pub fn find_market_column<'a>(columns: &'a [ColumnProfile], synonyms: &[&str]) -> Option<&'a str> {
    let candidates = || {
        columns
            .iter()
            .filter(|c| c.is_numeric_capable())
            .map(|c| (c, c.name.trim().to_lowercase()))
    };

    candidates()
        .find(|(_, name)| synonyms.iter().any(|k| name.as_str() == *k))
        .or_else(|| candidates().find(|(_, name)| synonyms.iter().any(|k| name.contains(*k))))
        .map(|(c, _)| c.name.as_str())
}

pub fn detect_market_fields(
    columns: &[ColumnProfile],
    date_column: Option<&str>,
) -> Option<MarketFieldMap> {
    let open = find_market_column(columns, &OPEN_SYNONYMS)?;
    let close = find_market_column(columns, &CLOSE_SYNONYMS)?;
    let high = find_market_column(columns, &HIGH_SYNONYMS).unwrap_or(open);
    let low = find_market_column(columns, &LOW_SYNONYMS).unwrap_or(close);

    Some(MarketFieldMap {
        open: open.to_string(),
        high: high.to_string(),
        low: low.to_string(),
        close: close.to_string(),
        date: date_column.map(str::to_string),
    })
}

pub fn select_date_column(
    columns: &[ColumnProfile],
    metadata: Option<&ProfileMetadata>,
) -> Option<String> {
    let hinted = metadata.and_then(|m| m.datetime_cols.first()).cloned();
    let typed = || columns.iter().find(|c| c.is_datetime_type()).map(|c| c.name.clone());
    let named = || {
        columns
            .iter()
            .find(|c| DATE_NAME_PATTERN.is_match(&c.name))
            .map(|c| c.name.clone())
    };

    hinted.or_else(typed).or_else(named)
}

#[derive(Debug, Clone)]
pub struct FieldClassifier {
    categorical_threshold: u64,
}

impl Default for FieldClassifier {
    fn default() -> Self {
        Self::from_config(&InsightConfig::default())
    }
}

impl FieldClassifier {
    pub fn new(categorical_threshold: u64) -> Self {
        Self { categorical_threshold }
    }

    pub fn from_config(config: &InsightConfig) -> Self {
        Self::new(config.categorical_threshold)
    }

    pub fn classify(
        &self,
        columns: &[ColumnProfile],
        metadata: Option<&ProfileMetadata>,
    ) -> Classification {
        let date_column = select_date_column(columns, metadata);
        let market_fields = detect_market_fields(columns, date_column.as_deref());

        let ctx = RoleContext {
            market: market_fields.as_ref(),
            date_column: date_column.as_deref(),
            metadata,
            categorical_threshold: self.categorical_threshold,
        };

        let assignments: Vec<ColumnAssignment> = columns
            .iter()
            .map(|column| ColumnAssignment {
                name: column.name.clone(),
                role: self.assign_role(&ctx, column),
                is_constant: column.is_constant(),
            })
            .collect();

        tracing::debug!(
            "Classified {} columns: market={:?}, date={:?}, constant={:?}",
            assignments.len(),
            market_fields.as_ref().map(|m| (&m.open, &m.close)),
            date_column,
            assignments.iter().filter(|a| a.is_constant).map(|a| &a.name).collect::<Vec<_>>()
        );

        Classification {
            assignments,
            market_fields,
            date_column,
        }
    }

    fn assign_role(&self, ctx: &RoleContext<'_>, column: &ColumnProfile) -> FieldRole {
        ROLE_RULES
            .iter()
            .find_map(|rule| rule(ctx, column))
            .unwrap_or(FieldRole::Unclassified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ColumnStats, GeoColumns};

    fn col(name: &str, data_type: &str, unique: u64) -> ColumnProfile {
        ColumnProfile {
            unique_count: unique,
            ..ColumnProfile::new(name, data_type)
        }
    }

    fn with_distribution(mut column: ColumnProfile) -> ColumnProfile {
        column.distribution = Some(Distribution {
            labels: vec!["a".into(), "b".into()],
            values: vec![3.0, 1.0],
        });
        column
    }

    #[test]
    fn open_close_only_defaults_high_and_low() {
        let columns = vec![col("Open", "float64", 10), col("Close", "float64", 10)];
        let market = detect_market_fields(&columns, None).unwrap();
        assert_eq!(market.open, "Open");
        assert_eq!(market.close, "Close");
        assert_eq!(market.high, "Open");
        assert_eq!(market.low, "Close");
    }

    #[test]
    fn market_requires_open_and_close() {
        let columns = vec![col("Open", "float64", 10), col("High", "float64", 10)];
        assert!(detect_market_fields(&columns, None).is_none());
    }

    #[test]
    fn string_columns_never_fill_market_slots() {
        let columns = vec![col("open_status", "object", 3), col("Close", "float64", 10)];
        assert!(detect_market_fields(&columns, None).is_none());
    }

    #[test]
    fn exact_names_beat_substring_hits() {
        let columns = vec![
            col("longitude", "float64", 100),
            col("Open", "float64", 10),
            col("High", "float64", 10),
            col("Low", "float64", 10),
            col("Close", "float64", 10),
        ];
        let market = detect_market_fields(&columns, Some("timestamp")).unwrap();
        assert_eq!(market.low, "Low");
        assert_eq!(market.high, "High");
        assert_eq!(market.date.as_deref(), Some("timestamp"));
    }

    #[test]
    fn synonyms_match_case_insensitive_substrings() {
        let columns = vec![
            col("Start_Value", "int64", 5),
            col("LAST_PRICE", "float64", 5),
            col("day_max", "float64", 5),
        ];
        let market = detect_market_fields(&columns, None).unwrap();
        assert_eq!(market.open, "Start_Value");
        assert_eq!(market.close, "LAST_PRICE");
        assert_eq!(market.high, "day_max");
        assert_eq!(market.low, "LAST_PRICE");
    }

    #[test]
    fn date_column_prefers_hint_then_type_then_name() {
        let columns = vec![
            col("period_label", "object", 12),
            col("created", "datetime64[ns]", 100),
        ];
        assert_eq!(select_date_column(&columns, None).as_deref(), Some("created"));

        let metadata = ProfileMetadata {
            datetime_cols: vec!["period_label".into()],
            ..Default::default()
        };
        assert_eq!(
            select_date_column(&columns, Some(&metadata)).as_deref(),
            Some("period_label")
        );

        let untyped = vec![col("amount", "float64", 5), col("Trade Day", "object", 30)];
        assert_eq!(select_date_column(&untyped, None).as_deref(), Some("Trade Day"));

        let none = vec![col("amount", "float64", 5)];
        assert!(select_date_column(&none, None).is_none());
    }

    #[test]
    fn constant_columns_are_flagged() {
        let columns = vec![col("region", "object", 1), col("amount", "float64", 40)];
        let classification = FieldClassifier::default().classify(&columns, None);
        assert_eq!(classification.constant_columns(), vec!["region"]);
        assert!(classification.assignments[0].is_constant);
        assert!(!classification.assignments[1].is_constant);
    }

    #[test]
    fn categorical_uses_configured_threshold() {
        let columns = vec![
            with_distribution(col("rating", "int64", 35)),
            with_distribution(col("segment", "object", 400)),
            with_distribution(col("stars", "int64", 5)),
        ];

        let strict = FieldClassifier::new(20).classify(&columns, None);
        assert_eq!(strict.role_of("rating"), Some(FieldRole::Numeric));
        assert_eq!(strict.role_of("segment"), Some(FieldRole::Categorical));
        assert_eq!(strict.role_of("stars"), Some(FieldRole::Categorical));

        let loose = FieldClassifier::new(50).classify(&columns, None);
        assert_eq!(loose.role_of("rating"), Some(FieldRole::Categorical));
    }

    #[test]
    fn missing_blocks_mean_role_not_applicable() {
        let columns = vec![col("email", "object", 900), col("mystery", "", 3)];
        let classification = FieldClassifier::default().classify(&columns, None);
        assert_eq!(classification.role_of("email"), Some(FieldRole::Text));
        assert_eq!(classification.role_of("mystery"), Some(FieldRole::Unclassified));
    }

    #[test]
    fn numeric_role_from_stats_block() {
        let mut score = col("score", "", 80);
        score.stats = Some(ColumnStats {
            min: Some(0.0),
            max: Some(1.0),
            mean: Some(0.5),
            median: Some(0.5),
        });
        let classification = FieldClassifier::default().classify(&[score], None);
        assert_eq!(classification.role_of("score"), Some(FieldRole::Numeric));
    }

    #[test]
    fn geo_roles_come_only_from_hints() {
        let columns = vec![
            col("latitude", "float64", 100),
            col("longitude", "float64", 100),
            col("city", "object", 20),
        ];
        let plain = FieldClassifier::default().classify(&columns, None);
        assert_eq!(plain.role_of("latitude"), Some(FieldRole::Numeric));
        assert_eq!(plain.role_of("city"), Some(FieldRole::Text));

        let metadata = ProfileMetadata {
            geo_cols: Some(GeoColumns {
                lat: Some("latitude".into()),
                lng: Some("longitude".into()),
                city: Some("city".into()),
            }),
            ..Default::default()
        };
        let hinted = FieldClassifier::default().classify(&columns, Some(&metadata));
        assert_eq!(hinted.role_of("latitude"), Some(FieldRole::GeoLat));
        assert_eq!(hinted.role_of("longitude"), Some(FieldRole::GeoLng));
        assert_eq!(hinted.role_of("city"), Some(FieldRole::GeoCity));
    }

    #[test]
    fn market_roles_assigned_once_per_column() {
        let columns = vec![
            col("Open", "float64", 10),
            col("Close", "float64", 10),
            col("timestamp", "datetime", 10),
            col("is_active", "bool", 2),
        ];
        let classification = FieldClassifier::default().classify(&columns, None);
        assert_eq!(classification.role_of("Open"), Some(FieldRole::MarketOpen));
        assert_eq!(classification.role_of("Close"), Some(FieldRole::MarketClose));
        assert_eq!(classification.role_of("timestamp"), Some(FieldRole::DateTime));
        assert_eq!(classification.role_of("is_active"), Some(FieldRole::Boolean));
        assert_eq!(classification.date_column.as_deref(), Some("timestamp"));
        assert_eq!(classification.count_where(|r| r.is_market()), 2);
    }

    #[test]
    fn best_categorical_prefers_named_column() {
        let columns = vec![
            with_distribution(col("device", "object", 4)),
            with_distribution(col("browser", "object", 6)),
        ];
        let classification = FieldClassifier::default().classify(&columns, None);

        let (name, _) = classification.best_categorical(&columns, &["browser"]).unwrap();
        assert_eq!(name, "browser");

        let (name, dist) = classification.best_categorical(&columns, &["status"]).unwrap();
        assert_eq!(name, "device");
        assert_eq!(dist.labels.len(), 2);
    }

    #[test]
    fn metadata_hints_override_cardinality_rules() {
        let columns = vec![
            with_distribution(col("stars", "int64", 5)),
            col("zip_code", "int64", 900),
            with_distribution(col("tier", "int64", 3)),
            col("is_active", "bool", 2),
        ];
        let metadata = ProfileMetadata {
            categorical_cols: vec!["zip_code".into(), "tier".into()],
            numerical_cols: vec!["stars".into(), "tier".into(), "is_active".into()],
            ..Default::default()
        };

        let plain = FieldClassifier::default().classify(&columns, None);
        assert_eq!(plain.role_of("stars"), Some(FieldRole::Categorical));
        assert_eq!(plain.role_of("zip_code"), Some(FieldRole::Numeric));

        let hinted = FieldClassifier::default().classify(&columns, Some(&metadata));
        assert_eq!(hinted.role_of("stars"), Some(FieldRole::Numeric));
        assert_eq!(hinted.role_of("zip_code"), Some(FieldRole::Categorical));
        // Categorical hint is checked before the numeric hint.
        assert_eq!(hinted.role_of("tier"), Some(FieldRole::Categorical));
        // Type-driven roles come before either hint.
        assert_eq!(hinted.role_of("is_active"), Some(FieldRole::Boolean));
        assert_eq!(hinted.columns_with(FieldRole::Categorical), ["zip_code", "tier"]);
        assert_eq!(hinted.columns_with(FieldRole::Numeric), ["stars"]);
    }
}
