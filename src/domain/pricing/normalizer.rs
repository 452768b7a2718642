//! Order normalization and currency conversion
//!
//! Maps one raw order plus a rate snapshot and a resolved markup multiplier
//! into the canonical (coin, USD, local) price triple. The pre-markup USD
//! stage deliberately goes through f64: the client-facing storefront
//! computes its display price the same way, and the engine's output must
//! match what end users see. All rounding is half-up.
//!
//! Orders whose buy leg is not one of the two supported denominations fail
//! closed and are excluded from selection and aggregation alike.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::shared::config::{PrecisionConfig, SanityConfig};
use crate::shared::types::{
    BuyLeg, ConversionRates, Denomination, NormalizedOrder, NormalizedPrice, RawOrder,
    NATIVE_LEG_TYPE, STABLE_LEG_TYPE,
};
use crate::shared::utils::round_half_up;

pub struct OrderNormalizer {
    precision: PrecisionConfig,
    sanity: SanityConfig,
}

struct Converted {
    price: NormalizedPrice,
    /// Pre-markup coin amount, input to the sanity check
    coin_amount: Decimal,
}

impl OrderNormalizer {
    pub fn new(precision: PrecisionConfig, sanity: SanityConfig) -> Self {
        Self { precision, sanity }
    }

    /// Normalize one order. `None` means the denomination is unsupported or
    /// the record is malformed; the order is then invisible downstream.
    pub fn normalize(
        &self,
        order: &RawOrder,
        rates: &ConversionRates,
        markup: Decimal,
    ) -> Option<NormalizedOrder> {
        let leg = order.buy_leg()?;
        if leg.quantity < Decimal::ZERO {
            return None;
        }
        let denomination = self.classify(&leg)?;

        let converted = self.convert(
            denomination,
            &leg,
            rates.coin_to_usd,
            rates.usd_to_local,
            markup,
        )?;
        let price = self.sanity_corrected(denomination, &leg, markup, converted, order)?;

        Some(NormalizedOrder {
            order: order.clone(),
            denomination,
            price,
        })
    }

    /// Explicit discriminated classification of the buy leg; anything but
    /// the two known (type, decimals) combinations is unsupported.
    fn classify(&self, leg: &BuyLeg) -> Option<Denomination> {
        match (leg.leg_type.as_str(), leg.decimals) {
            (NATIVE_LEG_TYPE, d) if d == self.precision.native_decimals => {
                Some(Denomination::NativeCoin)
            }
            (STABLE_LEG_TYPE, d) if d == self.precision.stable_decimals => {
                Some(Denomination::StableToken)
            }
            (leg_type, decimals) => {
                debug!(
                    "Unsupported denomination {}/{} decimals, skipping order",
                    leg_type, decimals
                );
                None
            }
        }
    }

    /// The conversion pipeline. Step order matters for reproducibility:
    /// 1. full-precision token amount (integer quantity / 10^decimals)
    /// 2. pre-markup USD via f64 multiply, rounded half-up to the fiat scale
    /// 3. pre-markup local from the *unrounded* USD, rounded likewise
    /// 4. markup applied to each leg independently
    fn convert(
        &self,
        denomination: Denomination,
        leg: &BuyLeg,
        coin_to_usd: Decimal,
        usd_to_local: Decimal,
        markup: Decimal,
    ) -> Option<Converted> {
        let scale = Decimal::from(10u64.checked_pow(leg.decimals)?);
        let amount = leg.quantity / scale;

        let (coin_amount, usd_unrounded) = match denomination {
            Denomination::NativeCoin => {
                let usd = amount.to_f64()? * coin_to_usd.to_f64()?;
                (amount, usd)
            }
            Denomination::StableToken => {
                // The stable token is already USD; derive the coin leg back
                // from the spot rate so all three legs are populated.
                let usd = amount.to_f64()?;
                let rate = coin_to_usd.to_f64()?;
                let coin = if rate > 0.0 {
                    Decimal::from_f64_retain(usd / rate)?
                } else {
                    Decimal::ZERO
                };
                (coin, usd)
            }
        };

        let fiat = self.precision.fiat_scale;
        let usd_pre = round_half_up(Decimal::from_f64_retain(usd_unrounded)?, fiat);
        let local_pre = round_half_up(
            Decimal::from_f64_retain(usd_unrounded * usd_to_local.to_f64()?)?,
            fiat,
        );

        let price = NormalizedPrice {
            coin: round_half_up(coin_amount * markup, self.precision.coin_scale),
            usd: round_half_up(usd_pre * markup, fiat),
            local: round_half_up(local_pre * markup, fiat),
        };
        Some(Converted { price, coin_amount })
    }

    /// Guard against a transient bad-rate reading: an evidently valuable
    /// coin amount priced implausibly low gets its fiat legs recomputed from
    /// the configured emergency fallback rates. The coin leg is kept.
    fn sanity_corrected(
        &self,
        denomination: Denomination,
        leg: &BuyLeg,
        markup: Decimal,
        converted: Converted,
        order: &RawOrder,
    ) -> Option<NormalizedPrice> {
        if !self.sanity.enabled {
            return Some(converted.price);
        }
        let min_coin = Decimal::from_f64_retain(self.sanity.min_meaningful_coin)?;
        let min_local = Decimal::from_f64_retain(self.sanity.min_plausible_local)?;
        if converted.coin_amount < min_coin || converted.price.local >= min_local {
            return Some(converted.price);
        }

        warn!(
            "Sanity correction for order {}: {} coin priced at {} local, recomputing from fallback rates",
            order.order_id().unwrap_or_else(|| "?".to_string()),
            converted.coin_amount,
            converted.price.local
        );
        let fallback = self.convert(
            denomination,
            leg,
            Decimal::from_f64_retain(self.sanity.fallback_coin_to_usd)?,
            Decimal::from_f64_retain(self.sanity.fallback_usd_to_local)?,
            markup,
        )?;
        Some(NormalizedPrice {
            coin: converted.price.coin,
            usd: fallback.price.usd,
            local: fallback.price.local,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use serde_json::json;

    use super::*;

    fn normalizer() -> OrderNormalizer {
        OrderNormalizer::new(PrecisionConfig::default(), SanityConfig::default())
    }

    fn rates(coin_to_usd: Decimal, usd_to_local: Decimal) -> ConversionRates {
        ConversionRates {
            coin_to_usd,
            usd_to_local,
            expires_at: Utc::now(),
        }
    }

    fn native_order(quantity: &str) -> RawOrder {
        RawOrder::new(json!({
            "order_id": 1,
            "buy": { "type": "ETH", "data": { "quantity": quantity, "decimals": 18 } }
        }))
    }

    fn stable_order(quantity: &str) -> RawOrder {
        RawOrder::new(json!({
            "order_id": 2,
            "buy": { "type": "ERC20", "data": { "quantity": quantity, "decimals": 6, "token_address": "0xstable" } }
        }))
    }

    #[test]
    fn test_reference_conversion() {
        // 0.05 coin @ 4700.00, fx 5.40, markup 30%
        let n = normalizer()
            .normalize(
                &native_order("50000000000000000"),
                &rates(dec!(4700.00), dec!(5.40)),
                dec!(1.30),
            )
            .unwrap();
        assert_eq!(n.denomination, Denomination::NativeCoin);
        assert_eq!(n.price.coin, dec!(0.065));
        assert_eq!(n.price.usd, dec!(305.50));
        assert_eq!(n.price.local, dec!(1649.70));
    }

    #[test]
    fn test_stable_token_is_usd_denominated() {
        // 235 USD in stable units mirrors the 0.05-coin reference order
        let n = normalizer()
            .normalize(
                &stable_order("235000000"),
                &rates(dec!(4700.00), dec!(5.40)),
                dec!(1.30),
            )
            .unwrap();
        assert_eq!(n.denomination, Denomination::StableToken);
        assert_eq!(n.price.usd, dec!(305.50));
        assert_eq!(n.price.local, dec!(1649.70));
        assert_eq!(n.price.coin, dec!(0.065));
    }

    #[test]
    fn test_unit_markup_passthrough() {
        let n = normalizer()
            .normalize(
                &native_order("1000000000000000000"),
                &rates(dec!(4700.00), dec!(5.40)),
                Decimal::ONE,
            )
            .unwrap();
        assert_eq!(n.price.coin, dec!(1));
        assert_eq!(n.price.usd, dec!(4700.00));
        assert_eq!(n.price.local, dec!(25380.00));
    }

    #[test]
    fn test_midpoint_rounds_away_from_zero() {
        // 0.001 coin @ 4712.345 -> usd_pre 4.71, local_pre 25.45;
        // 25.45 * 1.3 = 33.085, an exact midpoint
        let n = normalizer()
            .normalize(
                &native_order("1000000000000000"),
                &rates(dec!(4712.345), dec!(5.40)),
                dec!(1.30),
            )
            .unwrap();
        assert_eq!(n.price.local, dec!(33.09));
        assert_eq!(n.price.usd, dec!(6.12));
    }

    #[test]
    fn test_two_stage_rounding_consistency() {
        let cases = [
            ("10000000000000000", dec!(4700.00), dec!(5.40)),
            ("123456789012345678", dec!(4123.55), dec!(4.95)),
            ("777000000000000000", dec!(2999.99), dec!(6.10)),
        ];
        let markup = dec!(1.30);
        for (qty, coin_usd, fx) in cases {
            let n = normalizer()
                .normalize(&native_order(qty), &rates(coin_usd, fx), markup)
                .unwrap();
            // reproduce the documented pipeline independently
            let amount = qty.parse::<Decimal>().unwrap() / dec!(1000000000000000000);
            let usd_unrounded = amount.to_f64().unwrap() * coin_usd.to_f64().unwrap();
            let usd_pre = round_half_up(Decimal::from_f64_retain(usd_unrounded).unwrap(), 2);
            let local_pre = round_half_up(
                Decimal::from_f64_retain(usd_unrounded * fx.to_f64().unwrap()).unwrap(),
                2,
            );
            assert_eq!(n.price.usd, round_half_up(usd_pre * markup, 2));
            assert_eq!(n.price.local, round_half_up(local_pre * markup, 2));
        }
    }

    #[test]
    fn test_unsupported_denominations_fail_closed() {
        let rates = rates(dec!(4700.00), dec!(5.40));
        let unknown_type = RawOrder::new(json!({
            "buy": { "type": "DOGE", "data": { "quantity": "1000", "decimals": 8 } }
        }));
        assert!(normalizer()
            .normalize(&unknown_type, &rates, dec!(1.30))
            .is_none());

        let wrong_decimals = RawOrder::new(json!({
            "buy": { "type": "ETH", "data": { "quantity": "1000", "decimals": 9 } }
        }));
        assert!(normalizer()
            .normalize(&wrong_decimals, &rates, dec!(1.30))
            .is_none());

        let negative = RawOrder::new(json!({
            "buy": { "type": "ETH", "data": { "quantity": "-5", "decimals": 18 } }
        }));
        assert!(normalizer()
            .normalize(&negative, &rates, dec!(1.30))
            .is_none());
    }

    #[test]
    fn test_sanity_correction_triggers_on_implausible_price() {
        // A bad rate reading prices 0.05 coin at fractions of a unit
        let n = normalizer()
            .normalize(
                &native_order("50000000000000000"),
                &rates(dec!(0.01), dec!(5.40)),
                dec!(1.30),
            )
            .unwrap();
        // fiat legs recomputed from fallback rates 2500.0 / 5.0
        assert_eq!(n.price.usd, dec!(162.50));
        assert_eq!(n.price.local, dec!(812.50));
        // coin leg untouched
        assert_eq!(n.price.coin, dec!(0.065));
    }

    #[test]
    fn test_sanity_correction_respects_toggle() {
        let normalizer = OrderNormalizer::new(
            PrecisionConfig::default(),
            SanityConfig {
                enabled: false,
                ..SanityConfig::default()
            },
        );
        let n = normalizer
            .normalize(
                &native_order("50000000000000000"),
                &rates(dec!(0.01), dec!(5.40)),
                dec!(1.30),
            )
            .unwrap();
        assert_eq!(n.price.usd, dec!(0.00));
    }

    #[test]
    fn test_sanity_correction_ignores_dust_orders() {
        // Below the meaningful-coin threshold a near-zero price is plausible
        // and must not be rewritten, even under the same bad rate
        let n = normalizer()
            .normalize(
                &native_order("100000000000000"), // 0.0001 coin
                &rates(dec!(0.01), dec!(5.40)),
                dec!(1.30),
            )
            .unwrap();
        assert_eq!(n.price.usd, dec!(0.00));
        assert_eq!(n.price.local, dec!(0.00));
    }
}
