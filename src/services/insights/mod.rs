pub mod assembler;
pub mod classifier;
pub mod geo;
pub mod market;
pub mod quality;
pub mod types;
pub mod utils;

pub use assembler::InsightAssembler;
pub use classifier::{Classification, FieldClassifier};
pub use market::MarketAggregator;
pub use quality::QualityScorer;
pub use types::*;
