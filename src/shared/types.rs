//! Common types used across the application

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Buy-leg type tag the upstream uses for the native coin
pub const NATIVE_LEG_TYPE: &str = "ETH";
/// Buy-leg type tag the upstream uses for the USD stable token
pub const STABLE_LEG_TYPE: &str = "ERC20";

/// Supported payment denominations of an order's buy leg
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Denomination {
    /// 18-decimal fixed-point native coin
    NativeCoin,
    /// 6-decimal stable token, already USD-denominated
    StableToken,
}

/// Interpreted fields of an order's buy leg
#[derive(Debug, Clone, PartialEq)]
pub struct BuyLeg {
    pub leg_type: String,
    pub quantity: Decimal,
    pub decimals: u32,
    pub token_address: Option<String>,
}

/// One raw order record from the upstream order book.
///
/// The upstream is loosely typed, so the record is kept as opaque JSON and
/// only the fields the engine interprets are extracted on demand, each
/// defensively and failing to `None` rather than erroring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawOrder {
    raw: Value,
}

impl RawOrder {
    pub fn new(raw: Value) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Extract the buy leg. Quantity may arrive as a string or a number;
    /// decimals default from the leg type when the field is absent.
    pub fn buy_leg(&self) -> Option<BuyLeg> {
        let buy = self.raw.get("buy")?;
        let leg_type = buy.get("type")?.as_str()?.to_string();
        let data = buy.get("data")?;
        let quantity = crate::shared::utils::parse_decimal(data.get("quantity")?)?;
        let decimals = match data.get("decimals").and_then(Value::as_u64) {
            Some(d) => d as u32,
            None if leg_type == NATIVE_LEG_TYPE => 18,
            None if leg_type == STABLE_LEG_TYPE => 6,
            None => return None,
        };
        let token_address = data
            .get("token_address")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        Some(BuyLeg {
            leg_type,
            quantity,
            decimals,
            token_address,
        })
    }

    /// Token address of the sell leg, used as the derived collection address
    pub fn sell_token_address(&self) -> Option<String> {
        self.raw
            .pointer("/sell/data/token_address")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    /// Display metadata of the item being sold (name, image, rarity, ...)
    pub fn source_metadata(&self) -> Map<String, Value> {
        let mut meta = Map::new();
        if let Some(props) = self.raw.pointer("/sell/data/properties") {
            for key in ["name", "image_url", "rarity", "item_type", "attributes"] {
                if let Some(v) = props.get(key) {
                    meta.insert(key.to_string(), v.clone());
                }
            }
        }
        meta
    }

    /// Order id, best-effort, for log lines only
    pub fn order_id(&self) -> Option<String> {
        match self.raw.get("order_id") {
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(Value::String(s)) => Some(s.clone()),
            _ => None,
        }
    }
}

/// Conversion-rate snapshot with expiry.
///
/// Replaced wholesale on refresh, never mutated in place, so concurrent
/// readers always see a consistent (coin_to_usd, usd_to_local) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionRates {
    pub coin_to_usd: Decimal,
    pub usd_to_local: Decimal,
    pub expires_at: DateTime<Utc>,
}

impl ConversionRates {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Canonical markup-applied price triple
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPrice {
    /// Native-coin leg, 8 decimal places
    pub coin: Decimal,
    /// USD leg, 2 decimal places
    pub usd: Decimal,
    /// Local-currency leg, 2 decimal places
    pub local: Decimal,
}

/// A raw order together with its classification and converted price
#[derive(Debug, Clone)]
pub struct NormalizedOrder {
    pub order: RawOrder,
    pub denomination: Denomination,
    pub price: NormalizedPrice,
}

/// Rolling sales-window aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesWindowStats {
    pub volume_local: Decimal,
    pub sales_count: u32,
    pub avg_local: Decimal,
    pub last_sale_local: Decimal,
    pub pct_change: Decimal,
    pub window_end: DateTime<Utc>,
}

impl SalesWindowStats {
    /// Zero-valued stats for an empty window
    pub fn empty(window_end: DateTime<Utc>) -> Self {
        Self {
            volume_local: Decimal::ZERO,
            sales_count: 0,
            avg_local: Decimal::ZERO,
            last_sale_local: Decimal::ZERO,
            pct_change: Decimal::ZERO,
            window_end,
        }
    }
}

/// Primary engine output for the current-price path
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingResult {
    pub selected_order: Option<RawOrder>,
    pub prices: Option<NormalizedPrice>,
    pub derived_collection_address: Option<String>,
}

impl PricingResult {
    /// No order could be selected; a valid, non-error outcome
    pub fn empty() -> Self {
        Self {
            selected_order: None,
            prices: None,
            derived_collection_address: None,
        }
    }

    /// Display metadata of the selected order, empty when nothing selected
    pub fn source_metadata(&self) -> Map<String, Value> {
        self.selected_order
            .as_ref()
            .map(RawOrder::source_metadata)
            .unwrap_or_default()
    }
}
