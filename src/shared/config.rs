//! Engine configuration loaded from Config.toml
//!
//! Every operational constant the engine uses is adjustable here: cache TTL,
//! per-call-site retry budgets and backoff factors, markup multipliers,
//! decimal precision, and the sanity-correction thresholds with their
//! emergency fallback rates. `Default` carries the reference values.

use std::collections::HashMap;
use std::fs;

use serde::{Deserialize, Serialize};

use crate::shared::errors::AppError;

/// Order-book upstream endpoint and pagination limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub orders_path: String,
    /// Metadata key the product identifier is matched against
    pub metadata_key: String,
    pub page_size: u32,
    /// Hard cap on pages per crawl; guarantees termination on cyclic cursors
    pub max_pages: u32,
    pub api_key: Option<String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.x.immutable.com".to_string(),
            orders_path: "/v3/orders".to_string(),
            metadata_key: "product_key".to_string(),
            page_size: 200,
            max_pages: 50,
            api_key: None,
        }
    }
}

/// Retry/timeout budget for order-book calls
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_factor: f64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            max_retries: 5,
            backoff_factor: 0.5,
        }
    }
}

/// Conversion-rate providers, cache TTL and per-rate fallbacks.
///
/// The TTL is deliberately generous (10 minutes) to keep rate-limit pressure
/// and tail latency on the spot-price providers low; freshness is
/// best-effort, not guaranteed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RatesConfig {
    pub ttl_secs: u64,
    /// Crypto spot-price endpoint returning the native coin price in USD
    pub coin_usd_url: String,
    /// JSON pointer to the numeric rate inside the coin_usd response
    pub coin_usd_pointer: String,
    /// Forex spot endpoint returning the USD -> local currency rate
    pub fx_url: String,
    /// JSON pointer to the numeric rate inside the fx response
    pub fx_pointer: String,
    /// Substituted when the crypto provider fails
    pub fallback_coin_to_usd: f64,
    /// Substituted when the forex provider fails
    pub fallback_usd_to_local: f64,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_factor: f64,
}

impl Default for RatesConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 600,
            coin_usd_url:
                "https://api.coingecko.com/api/v3/simple/price?ids=ethereum&vs_currencies=usd"
                    .to_string(),
            coin_usd_pointer: "/ethereum/usd".to_string(),
            fx_url: "https://open.er-api.com/v6/latest/USD".to_string(),
            fx_pointer: "/rates/BRL".to_string(),
            fallback_coin_to_usd: 2500.0,
            fallback_usd_to_local: 5.0,
            timeout_secs: 5,
            max_retries: 2,
            backoff_factor: 0.25,
        }
    }
}

/// Markup multiplier policy: per-product override -> global -> default
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkupConfig {
    pub default_multiplier: f64,
    pub global_multiplier: Option<f64>,
    /// Per-product overrides keyed by product identifier
    pub overrides: HashMap<String, f64>,
}

impl Default for MarkupConfig {
    fn default() -> Self {
        Self {
            default_multiplier: 1.30,
            global_multiplier: None,
            overrides: HashMap::new(),
        }
    }
}

/// Decimal-precision constants of the conversion pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrecisionConfig {
    pub native_decimals: u32,
    pub stable_decimals: u32,
    /// Scale of the coin leg in normalized prices
    pub coin_scale: u32,
    /// Scale of the USD and local legs in normalized prices
    pub fiat_scale: u32,
}

impl Default for PrecisionConfig {
    fn default() -> Self {
        Self {
            native_decimals: 18,
            stable_decimals: 6,
            coin_scale: 8,
            fiat_scale: 2,
        }
    }
}

/// Guard against a transient bad rate reading pricing a valuable asset near
/// zero. Thresholds are empirical, hence fully configurable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SanityConfig {
    pub enabled: bool,
    /// Coin amount above which an order is considered evidently valuable
    pub min_meaningful_coin: f64,
    /// Local-currency price below which the conversion looks implausible
    pub min_plausible_local: f64,
    pub fallback_coin_to_usd: f64,
    pub fallback_usd_to_local: f64,
}

impl Default for SanityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_meaningful_coin: 0.001,
            min_plausible_local: 1.0,
            fallback_coin_to_usd: 2500.0,
            fallback_usd_to_local: 5.0,
        }
    }
}

/// Best-order selection policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Storefront-parity policy: prefer native-coin listings even when a
    /// stable-token order is cheaper
    pub prefer_native_coin: bool,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            prefer_native_coin: true,
        }
    }
}

/// Sales-window aggregation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SalesConfig {
    pub window_days: i64,
}

impl Default for SalesConfig {
    fn default() -> Self {
        Self { window_days: 7 }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub upstream: UpstreamConfig,
    pub http: HttpConfig,
    pub rates: RatesConfig,
    pub markup: MarkupConfig,
    pub precision: PrecisionConfig,
    pub sanity: SanityConfig,
    pub selection: SelectionConfig,
    pub sales: SalesConfig,
}

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from Config.toml in the working directory
    pub fn load_config() -> Result<EngineConfig, AppError> {
        Self::load_from("Config.toml")
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &str) -> Result<EngineConfig, AppError> {
        let config_content = fs::read_to_string(path)
            .map_err(|e| AppError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let config: EngineConfig = toml::from_str(&config_content)
            .map_err(|e| AppError::ConfigError(format!("Failed to parse config file: {}", e)))?;

        Ok(config)
    }
}
