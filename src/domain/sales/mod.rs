pub mod aggregator;

pub use aggregator::SalesWindowAggregator;
