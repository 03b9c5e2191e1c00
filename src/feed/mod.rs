//! Price Feed Aggregator.

pub mod aggregator;

pub use aggregator::{DeviationEvent, PriceAggregator};
