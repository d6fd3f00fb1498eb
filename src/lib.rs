//! Derives semantic insights from a tabular dataset profile: column roles,
//! a data-quality score, plottable geo points and OHLC candles.

pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod services;

pub use config::InsightConfig;
pub use error::{InsightError, InsightResult};
pub use models::{ColumnProfile, DatasetProfile, ProfileDocument, SampleRow};
pub use services::insights::{
    Candle, Classification, FieldRole, GeoBubble, GeoPoint, Granularity, InsightAssembler,
    Insights, MarketFieldMap,
};
pub use services::session::{AnalysisOutcome, AnalysisSession, ProfileProvider};
