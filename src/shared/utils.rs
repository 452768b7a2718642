//! Utility functions and helpers

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::Value;

/// Epoch values above this are treated as milliseconds rather than seconds
const EPOCH_MILLIS_THRESHOLD: i64 = 1_000_000_000_000;

/// Best-effort coercion of a JSON value into a `Decimal`.
///
/// The upstream mixes numbers and numeric strings for the same fields, so
/// every monetary/quantity read goes through this one helper and each caller
/// decides its own fallback on `None`.
pub fn parse_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Decimal::from(i))
            } else if let Some(u) = n.as_u64() {
                Some(Decimal::from(u))
            } else {
                n.as_f64().and_then(Decimal::from_f64_retain)
            }
        }
        Value::String(s) => s.trim().parse::<Decimal>().ok(),
        _ => None,
    }
}

/// Round to `dp` decimal places, exact halves away from zero
pub fn round_half_up(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}

/// Best-effort timestamp coercion: integer epoch seconds (or milliseconds),
/// numeric-string epoch, or ISO-8601 string. `None` when nothing parses.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n.as_i64().and_then(epoch_to_datetime),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(epoch) = s.parse::<i64>() {
                return epoch_to_datetime(epoch);
            }
            DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        }
        _ => None,
    }
}

fn epoch_to_datetime(epoch: i64) -> Option<DateTime<Utc>> {
    if epoch <= 0 {
        return None;
    }
    if epoch >= EPOCH_MILLIS_THRESHOLD {
        DateTime::from_timestamp_millis(epoch)
    } else {
        DateTime::from_timestamp(epoch, 0)
    }
}

/// Truncate a response body for log lines
pub fn truncate_body(body: &str, max_chars: usize) -> String {
    if body.chars().count() <= max_chars {
        body.to_string()
    } else {
        let truncated: String = body.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}
