//! Best-order selection
//!
//! The storefront only ever displays native-coin listings, so by default the
//! selector restricts the first pass to native-coin orders even when a
//! stable-token order is cheaper. That is a product policy, not a technical
//! necessity, hence the explicit toggle.

use tracing::debug;

use crate::shared::config::SelectionConfig;
use crate::shared::types::{Denomination, NormalizedOrder};

pub struct BestOrderSelector {
    config: SelectionConfig,
}

impl BestOrderSelector {
    pub fn new(config: SelectionConfig) -> Self {
        Self { config }
    }

    /// Pick the canonical "current price" order: cheapest by local-currency
    /// price, native-coin orders first when the policy is on, ties broken by
    /// first-seen order.
    pub fn select_best<'a>(&self, orders: &'a [NormalizedOrder]) -> Option<&'a NormalizedOrder> {
        if self.config.prefer_native_coin {
            let native_best = Self::min_by_local(
                orders
                    .iter()
                    .filter(|o| o.denomination == Denomination::NativeCoin),
            );
            if let Some(best) = native_best {
                return Some(best);
            }
            debug!("No native-coin orders, widening selection to all denominations");
        }
        Self::min_by_local(orders.iter())
    }

    fn min_by_local<'a, I>(orders: I) -> Option<&'a NormalizedOrder>
    where
        I: Iterator<Item = &'a NormalizedOrder>,
    {
        // reduce keeps the earlier element on ties, making selection stable
        orders.reduce(|best, candidate| {
            if candidate.price.local < best.price.local {
                candidate
            } else {
                best
            }
        })
    }
}
