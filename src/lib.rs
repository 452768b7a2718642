//! Pricebook - external market price aggregation and conversion engine
//! Built with Domain-Driven Design principles

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod shared;

// Re-export main types for convenience
pub use application::PricingService;
pub use shared::config::{ConfigLoader, EngineConfig};
pub use shared::errors::{AppError, EngineError};
pub use shared::types::{NormalizedPrice, PricingResult, SalesWindowStats};
