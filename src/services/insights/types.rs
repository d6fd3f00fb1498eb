use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::models::{CorrelationMatrix, ProfileMetadata};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldRole {
    Numeric,
    Categorical,
    Text,
    DateTime,
    Boolean,
    GeoLat,
    GeoLng,
    GeoCity,
    MarketOpen,
    MarketHigh,
    MarketLow,
    MarketClose,
    Unclassified,
}

impl FieldRole {
    pub fn is_market(&self) -> bool {
        matches!(
            self,
            FieldRole::MarketOpen
                | FieldRole::MarketHigh
                | FieldRole::MarketLow
                | FieldRole::MarketClose
        )
    }
}

/// Time bucket size for market candles.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Granularity {
    Day,
    Week,
    #[default]
    Month,
    Year,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketFieldMap {
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// A plottable location with its label and marker radius.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoBubble {
    pub label: String,
    #[serde(flatten)]
    pub point: GeoPoint,
    pub radius: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candle {
    pub bucket_label: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSummary {
    pub completeness: f64,
    pub uniqueness: f64,
    pub numeric_count: usize,
    pub categorical_count: usize,
    pub text_count: usize,
    pub date_count: usize,
    pub bool_count: usize,
    pub quality_label: String,
}

/// Immutable analysis snapshot handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insights {
    pub quality_score: f64,
    pub summary: ProfileSummary,
    pub granularity: Granularity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_fields: Option<MarketFieldMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candles: Option<Vec<Candle>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo_points: Option<Vec<GeoBubble>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation: Option<CorrelationMatrix>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ProfileMetadata>,
}
