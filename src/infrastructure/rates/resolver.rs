//! TTL-cached conversion rates from two independent spot providers
//!
//! One crypto spot price (native coin -> USD) and one forex rate
//! (USD -> local currency). Either provider failing substitutes that rate's
//! configured fallback constant, so `current_rates` never fails; freshness
//! is best-effort within the TTL.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::infrastructure::http::ResilientFetcher;
use crate::shared::config::RatesConfig;
use crate::shared::types::ConversionRates;
use crate::shared::utils::parse_decimal;

pub struct RateResolver {
    fetcher: ResilientFetcher,
    config: RatesConfig,
    // Snapshot swapped as a unit; concurrent refreshes at worst fetch twice
    cache: RwLock<Option<Arc<ConversionRates>>>,
}

impl RateResolver {
    pub fn new(fetcher: ResilientFetcher, config: RatesConfig) -> Self {
        Self {
            fetcher,
            config,
            cache: RwLock::new(None),
        }
    }

    /// Current (coin -> USD, USD -> local) rates, cached until the TTL
    /// expires. Never fails; stale or fallback values are acceptable.
    pub async fn current_rates(&self) -> Arc<ConversionRates> {
        let now = Utc::now();
        {
            let cached = self.cache.read().await;
            if let Some(rates) = cached.as_ref() {
                if !rates.is_expired(now) {
                    debug!("Rate cache hit, expires at {}", rates.expires_at);
                    return rates.clone();
                }
            }
        }

        let coin_to_usd = match self
            .fetch_rate(&self.config.coin_usd_url, &self.config.coin_usd_pointer)
            .await
        {
            Some(rate) => rate,
            None => {
                warn!(
                    "Coin spot price unavailable, using fallback {}",
                    self.config.fallback_coin_to_usd
                );
                decimal_or_zero(self.config.fallback_coin_to_usd)
            }
        };

        let usd_to_local = match self
            .fetch_rate(&self.config.fx_url, &self.config.fx_pointer)
            .await
        {
            Some(rate) => rate,
            None => {
                warn!(
                    "Forex rate unavailable, using fallback {}",
                    self.config.fallback_usd_to_local
                );
                decimal_or_zero(self.config.fallback_usd_to_local)
            }
        };

        let refreshed = Arc::new(ConversionRates {
            coin_to_usd,
            usd_to_local,
            expires_at: now + chrono::Duration::seconds(self.config.ttl_secs as i64),
        });
        info!(
            "💱 Rates refreshed: coin/usd={} usd/local={} (ttl {}s)",
            coin_to_usd, usd_to_local, self.config.ttl_secs
        );

        *self.cache.write().await = Some(refreshed.clone());
        refreshed
    }

    async fn fetch_rate(&self, url: &str, pointer: &str) -> Option<Decimal> {
        let payload = self
            .fetcher
            .fetch_json(
                url,
                &[],
                &[],
                Duration::from_secs(self.config.timeout_secs),
                self.config.max_retries,
                self.config.backoff_factor,
            )
            .await?;
        let rate = payload.pointer(pointer).and_then(parse_decimal)?;
        if rate <= Decimal::ZERO {
            warn!("Provider {} returned non-positive rate {}", url, rate);
            return None;
        }
        Some(rate)
    }
}

fn decimal_or_zero(value: f64) -> Decimal {
    Decimal::from_f64_retain(value).unwrap_or(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rust_decimal_macros::dec;

    use super::*;
    use crate::infrastructure::http::transport::mock::MockTransport;
    use crate::infrastructure::http::HttpTransport;

    fn resolver(transport: &Arc<MockTransport>, ttl_secs: u64) -> RateResolver {
        let config = RatesConfig {
            ttl_secs,
            max_retries: 1,
            backoff_factor: 0.0,
            ..RatesConfig::default()
        };
        RateResolver::new(
            ResilientFetcher::new(transport.clone() as Arc<dyn HttpTransport>),
            config,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetches_both_rates() {
        let transport = Arc::new(MockTransport::new(vec![
            MockTransport::ok(200, r#"{"ethereum": {"usd": 4700.0}}"#),
            MockTransport::ok(200, r#"{"rates": {"BRL": 5.40}}"#),
        ]));

        let rates = resolver(&transport, 600).current_rates().await;
        assert_eq!(rates.coin_to_usd, dec!(4700.0));
        assert_eq!(rates.usd_to_local, dec!(5.40));
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_hit_within_ttl() {
        let transport = Arc::new(MockTransport::new(vec![
            MockTransport::ok(200, r#"{"ethereum": {"usd": 4700.0}}"#),
            MockTransport::ok(200, r#"{"rates": {"BRL": 5.40}}"#),
        ]));

        let resolver = resolver(&transport, 600);
        let first = resolver.current_rates().await;
        let second = resolver.current_rates().await;
        assert_eq!(first, second);
        // the second call never touched the transport
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_cache_refetches() {
        let transport = Arc::new(MockTransport::new(vec![
            MockTransport::ok(200, r#"{"ethereum": {"usd": 4700.0}}"#),
            MockTransport::ok(200, r#"{"rates": {"BRL": 5.40}}"#),
            MockTransport::ok(200, r#"{"ethereum": {"usd": 4850.0}}"#),
            MockTransport::ok(200, r#"{"rates": {"BRL": 5.55}}"#),
        ]));

        // zero TTL: every call is a refresh
        let resolver = resolver(&transport, 0);
        let first = resolver.current_rates().await;
        let second = resolver.current_rates().await;
        assert_eq!(first.coin_to_usd, dec!(4700.0));
        assert_eq!(second.coin_to_usd, dec!(4850.0));
        assert_eq!(transport.request_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_provider_substitutes_fallback() {
        // crypto provider down, forex fine
        let transport = Arc::new(MockTransport::new(vec![
            MockTransport::ok(500, "boom"),
            MockTransport::ok(200, r#"{"rates": {"BRL": 5.40}}"#),
        ]));

        let rates = resolver(&transport, 600).current_rates().await;
        assert_eq!(rates.coin_to_usd, dec!(2500.0));
        assert_eq!(rates.usd_to_local, dec!(5.40));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_positive_rate_rejected() {
        let transport = Arc::new(MockTransport::new(vec![
            MockTransport::ok(200, r#"{"ethereum": {"usd": 0}}"#),
            MockTransport::ok(200, r#"{"rates": {"BRL": 5.40}}"#),
        ]));

        let rates = resolver(&transport, 600).current_rates().await;
        assert_eq!(rates.coin_to_usd, dec!(2500.0));
    }
}
