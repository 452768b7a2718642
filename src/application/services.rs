//! Application services and use cases
//!
//! `PricingService` wires the infrastructure and domain pieces together and
//! is the single layer allowed to fail hard: `MarketplaceUnavailable` is
//! returned only when every pagination variant across all retries produced
//! nothing. A missing selected order or an empty sales history is a normal,
//! non-error outcome.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::domain::{BestOrderSelector, MarkupPolicy, OrderNormalizer, SalesWindowAggregator};
use crate::infrastructure::http::{HttpTransport, ReqwestTransport, ResilientFetcher};
use crate::infrastructure::orderbook::{OrderBookClient, OrderStatus};
use crate::infrastructure::rates::RateResolver;
use crate::shared::config::EngineConfig;
use crate::shared::errors::EngineError;
use crate::shared::types::{NormalizedOrder, PricingResult, SalesWindowStats};

/// Price aggregation service
pub struct PricingService {
    client: OrderBookClient,
    rates: RateResolver,
    normalizer: OrderNormalizer,
    markup: MarkupPolicy,
    selector: BestOrderSelector,
    aggregator: SalesWindowAggregator,
}

impl PricingService {
    /// Create the service with the production HTTP transport
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_transport(config, Arc::new(ReqwestTransport::new()))
    }

    /// Create the service over an explicit transport
    pub fn with_transport(config: &EngineConfig, transport: Arc<dyn HttpTransport>) -> Self {
        let fetcher = ResilientFetcher::new(transport);
        Self {
            client: OrderBookClient::new(
                fetcher.clone(),
                config.upstream.clone(),
                config.http.clone(),
            ),
            rates: RateResolver::new(fetcher, config.rates.clone()),
            normalizer: OrderNormalizer::new(config.precision.clone(), config.sanity.clone()),
            markup: MarkupPolicy::from_config(&config.markup),
            selector: BestOrderSelector::new(config.selection.clone()),
            aggregator: SalesWindowAggregator::new(config.sales.clone()),
        }
    }

    /// Current canonical price for a product.
    ///
    /// An order book with nothing selectable yields an empty result, not an
    /// error.
    pub async fn current_price(&self, product_key: &str) -> Result<PricingResult, EngineError> {
        info!("💰 Resolving current price for {}", product_key);
        let rates = self.rates.current_rates().await;
        let markup = self.markup.resolve(product_key);

        let raw_orders = self
            .client
            .fetch_all_orders(product_key, OrderStatus::Active, None)
            .await
            .ok_or_else(|| unavailable(product_key, "active"))?;

        let normalized: Vec<NormalizedOrder> = raw_orders
            .iter()
            .filter_map(|order| self.normalizer.normalize(order, &rates, markup))
            .collect();
        info!(
            "📊 {} of {} active orders normalized for {}",
            normalized.len(),
            raw_orders.len(),
            product_key
        );

        let result = match self.selector.select_best(&normalized) {
            Some(best) => PricingResult {
                derived_collection_address: best.order.sell_token_address(),
                selected_order: Some(best.order.clone()),
                prices: Some(best.price.clone()),
            },
            None => {
                info!("No selectable order for {}", product_key);
                PricingResult::empty()
            }
        };
        Ok(result)
    }

    /// Rolling sales-window stats for a product
    pub async fn sales_stats(&self, product_key: &str) -> Result<SalesWindowStats, EngineError> {
        info!("📈 Aggregating sales window for {}", product_key);
        let rates = self.rates.current_rates().await;
        let markup = self.markup.resolve(product_key);
        let now = Utc::now();

        let filled = self
            .client
            .fetch_all_orders(
                product_key,
                OrderStatus::Filled,
                Some(self.aggregator.window_start(now)),
            )
            .await
            .ok_or_else(|| unavailable(product_key, "filled"))?;

        Ok(self
            .aggregator
            .aggregate(&filled, &self.normalizer, &rates, markup, now))
    }

    /// Current price and sales stats together. Partial success is valid:
    /// only a total failure of both paths is an error.
    pub async fn full_quote(
        &self,
        product_key: &str,
    ) -> Result<(PricingResult, SalesWindowStats), EngineError> {
        let price = self.current_price(product_key).await;
        let stats = self.sales_stats(product_key).await;
        match (price, stats) {
            (Ok(price), Ok(stats)) => Ok((price, stats)),
            (Ok(price), Err(e)) => {
                warn!("Sales path failed for {}: {}", product_key, e);
                Ok((price, SalesWindowStats::empty(Utc::now())))
            }
            (Err(e), Ok(stats)) => {
                warn!("Price path failed for {}: {}", product_key, e);
                Ok((PricingResult::empty(), stats))
            }
            (Err(e), Err(_)) => Err(e),
        }
    }
}

fn unavailable(product_key: &str, status: &str) -> EngineError {
    EngineError::MarketplaceUnavailable(format!(
        "no usable response for {} ({} orders)",
        product_key, status
    ))
}
