//! Infrastructure layer - upstream HTTP access and rate feeds

pub mod http;
pub mod orderbook;
pub mod rates;

pub use http::{HttpTransport, ReqwestTransport, ResilientFetcher};
pub use orderbook::{OrderBookClient, OrderStatus};
pub use rates::RateResolver;
