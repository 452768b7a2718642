//! Rolling sales-window aggregation over filled orders
//!
//! The upstream timestamp field name and format vary by deployment, so each
//! record is probed against several candidate fields and formats and skipped
//! when nothing parses. The window cutoff is re-applied client-side because
//! the upstream time filter is only best-effort. Every surviving record goes
//! through the same normalizer as the live price, so historical figures use
//! the identical conversion and markup pipeline.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use tracing::debug;

use crate::domain::pricing::OrderNormalizer;
use crate::shared::config::SalesConfig;
use crate::shared::types::{ConversionRates, RawOrder, SalesWindowStats};
use crate::shared::utils::{parse_timestamp, round_half_up};

/// Candidate timestamp fields, probed in order
const TIMESTAMP_FIELDS: &[&str] = &["updated_timestamp", "timestamp", "updated_at", "created_at"];

pub struct SalesWindowAggregator {
    config: SalesConfig,
}

impl SalesWindowAggregator {
    pub fn new(config: SalesConfig) -> Self {
        Self { config }
    }

    /// Start of the aggregation window, also sent upstream as a best-effort
    /// time filter
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(self.config.window_days)
    }

    /// Compute window stats from filled orders. Zero count means all
    /// monetary fields are zero.
    pub fn aggregate(
        &self,
        orders: &[RawOrder],
        normalizer: &OrderNormalizer,
        rates: &ConversionRates,
        markup: Decimal,
        now: DateTime<Utc>,
    ) -> SalesWindowStats {
        let cutoff = self.window_start(now);
        let mut sales: Vec<(DateTime<Utc>, Decimal)> = Vec::new();

        for order in orders {
            let Some(timestamp) = Self::order_timestamp(order) else {
                debug!(
                    "Skipping sale {}: no parseable timestamp",
                    order.order_id().unwrap_or_else(|| "?".to_string())
                );
                continue;
            };
            if timestamp < cutoff {
                continue;
            }
            let Some(normalized) = normalizer.normalize(order, rates, markup) else {
                continue;
            };
            sales.push((timestamp, normalized.price.local));
        }

        sales.sort_by_key(|(timestamp, _)| *timestamp);

        let count = sales.len() as u32;
        if count == 0 {
            return SalesWindowStats::empty(now);
        }

        let volume: Decimal = sales.iter().map(|(_, local)| *local).sum();
        let first = sales[0].1;
        let last = sales[sales.len() - 1].1;
        let pct_change = if count >= 2 && first > Decimal::ZERO {
            round_half_up((last - first) / first * Decimal::from(100), 2)
        } else {
            Decimal::ZERO
        };

        SalesWindowStats {
            volume_local: volume,
            sales_count: count,
            avg_local: round_half_up(volume / Decimal::from(count), 2),
            last_sale_local: last,
            pct_change,
            window_end: now,
        }
    }

    fn order_timestamp(order: &RawOrder) -> Option<DateTime<Utc>> {
        TIMESTAMP_FIELDS
            .iter()
            .find_map(|field| order.raw().get(*field).and_then(parse_timestamp))
    }
}
