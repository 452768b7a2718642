pub mod resolver;

pub use resolver::RateResolver;
