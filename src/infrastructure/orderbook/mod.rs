pub mod client;

pub use client::{OrderBookClient, OrderStatus};
