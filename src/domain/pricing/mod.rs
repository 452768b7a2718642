//! Pricing domain - markup policy, normalization, selection

pub mod markup;
pub mod normalizer;
pub mod selector;

pub use markup::MarkupPolicy;
pub use normalizer::OrderNormalizer;
pub use selector::BestOrderSelector;
