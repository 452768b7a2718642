//! Markup multiplier resolution
//!
//! Precedence: per-product override -> process-wide global setting ->
//! hardcoded default. Resolved fresh on every invocation so a config change
//! is never shadowed by a stale cached multiplier.

use std::collections::HashMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::warn;

use crate::shared::config::MarkupConfig;

/// Applied when no override, no global setting and no valid default exist
const DEFAULT_MULTIPLIER: Decimal = dec!(1.30);

#[derive(Debug, Clone)]
pub struct MarkupPolicy {
    overrides: HashMap<String, Decimal>,
    global: Option<Decimal>,
    default_multiplier: Decimal,
}

impl MarkupPolicy {
    pub fn from_config(config: &MarkupConfig) -> Self {
        let overrides = config
            .overrides
            .iter()
            .filter_map(|(key, v)| match Decimal::from_f64_retain(*v) {
                Some(d) => Some((key.clone(), d)),
                None => {
                    warn!("Ignoring non-finite markup override for {}", key);
                    None
                }
            })
            .collect();
        Self {
            overrides,
            global: config.global_multiplier.and_then(Decimal::from_f64_retain),
            default_multiplier: Decimal::from_f64_retain(config.default_multiplier)
                .unwrap_or(DEFAULT_MULTIPLIER),
        }
    }

    /// Resolve the multiplier for a product. Never below 1: a markup that
    /// would discount the price is clamped and reported.
    pub fn resolve(&self, product_key: &str) -> Decimal {
        let multiplier = self
            .overrides
            .get(product_key)
            .copied()
            .or(self.global)
            .unwrap_or(self.default_multiplier);
        if multiplier < Decimal::ONE {
            warn!(
                "Markup {} for {} is below 1, clamping",
                multiplier, product_key
            );
            return Decimal::ONE;
        }
        multiplier
    }
}

impl Default for MarkupPolicy {
    fn default() -> Self {
        Self::from_config(&MarkupConfig::default())
    }
}
