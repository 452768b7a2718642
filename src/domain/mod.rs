//! Domain layer - core pricing and aggregation logic

pub mod pricing;
pub mod sales;

pub use pricing::{BestOrderSelector, MarkupPolicy, OrderNormalizer};
pub use sales::SalesWindowAggregator;
