//! Order-book upstream client with cursor pagination
//!
//! The upstream is inconsistent across deployments: the continuation cursor
//! appears under several field names, and the sort-hint query parameters are
//! not honored everywhere. The crawl therefore tries the hinted query first,
//! probes a hint-free page when that comes back empty, and falls back to the
//! unhinted variant, with a hard page cap guaranteeing termination.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::infrastructure::http::ResilientFetcher;
use crate::shared::config::{HttpConfig, UpstreamConfig};
use crate::shared::types::RawOrder;

/// Order-book status filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Active,
    Filled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Active => "active",
            OrderStatus::Filled => "filled",
        }
    }
}

/// Клиент order book API с курсорной пагинацией
pub struct OrderBookClient {
    fetcher: ResilientFetcher,
    upstream: UpstreamConfig,
    http: HttpConfig,
}

impl OrderBookClient {
    pub fn new(fetcher: ResilientFetcher, upstream: UpstreamConfig, http: HttpConfig) -> Self {
        Self {
            fetcher,
            upstream,
            http,
        }
    }

    /// Fetch every order for a product.
    ///
    /// `None` means no query variant ever produced a parseable response; the
    /// orchestration layer treats that as total upstream unavailability.
    /// `Some(vec![])` is a genuinely empty order book.
    pub async fn fetch_all_orders(
        &self,
        product_key: &str,
        status: OrderStatus,
        updated_min: Option<DateTime<Utc>>,
    ) -> Option<Vec<RawOrder>> {
        let mut any_response = false;

        // Variant (a): with explicit sort hints
        if let Some(orders) = self.crawl(product_key, status, updated_min, true).await {
            any_response = true;
            if !orders.is_empty() {
                return Some(orders);
            }
            // Zero results can mean "empty book" or "hints not supported
            // here". One hint-free page tells the two apart.
            let probe_params = self.build_params(product_key, status, updated_min, false, None);
            if let Some(page) = self.fetch_page(&probe_params).await {
                if Self::extract_orders(&page).is_empty() {
                    debug!("Order book genuinely empty for {}", product_key);
                    return Some(Vec::new());
                }
                info!("Sort hints ignored by upstream, re-crawling without them");
            }
        }

        // Variant (b): no ordering hints
        match self.crawl(product_key, status, updated_min, false).await {
            Some(orders) => Some(orders),
            None if any_response => Some(Vec::new()),
            None => {
                warn!(
                    "Every order-book query variant failed for {} ({})",
                    product_key,
                    status.as_str()
                );
                None
            }
        }
    }

    /// Accumulate pages until the cursor runs out or the page cap is hit.
    /// `None` when not a single page could be fetched.
    async fn crawl(
        &self,
        product_key: &str,
        status: OrderStatus,
        updated_min: Option<DateTime<Utc>>,
        with_hints: bool,
    ) -> Option<Vec<RawOrder>> {
        let mut orders = Vec::new();
        let mut cursor: Option<String> = None;
        let mut got_page = false;

        for page_num in 0..self.upstream.max_pages {
            let params =
                self.build_params(product_key, status, updated_min, with_hints, cursor.as_deref());
            let Some(page) = self.fetch_page(&params).await else {
                break;
            };
            got_page = true;

            let batch = Self::extract_orders(&page);
            debug!(
                "Page {} for {}: {} orders (hints: {})",
                page_num + 1,
                product_key,
                batch.len(),
                with_hints
            );
            orders.extend(batch);

            match Self::extract_cursor(&page) {
                Some(next) => cursor = Some(next),
                None => break,
            }
            if page_num + 1 == self.upstream.max_pages {
                warn!(
                    "Page cap {} reached for {}, cursor still present",
                    self.upstream.max_pages, product_key
                );
            }
        }

        if got_page {
            Some(orders)
        } else {
            None
        }
    }

    async fn fetch_page(&self, params: &[(String, String)]) -> Option<Value> {
        let url = format!("{}{}", self.upstream.base_url, self.upstream.orders_path);
        self.fetcher
            .fetch_json(
                &url,
                params,
                &self.headers(),
                Duration::from_secs(self.http.timeout_secs),
                self.http.max_retries,
                self.http.backoff_factor,
            )
            .await
    }

    fn headers(&self) -> Vec<(String, String)> {
        match &self.upstream.api_key {
            Some(key) => vec![("x-api-key".to_string(), key.clone())],
            None => Vec::new(),
        }
    }

    fn build_params(
        &self,
        product_key: &str,
        status: OrderStatus,
        updated_min: Option<DateTime<Utc>>,
        with_hints: bool,
        cursor: Option<&str>,
    ) -> Vec<(String, String)> {
        let mut metadata_filter = Map::new();
        metadata_filter.insert(self.upstream.metadata_key.clone(), json!([product_key]));

        let mut params = vec![
            ("status".to_string(), status.as_str().to_string()),
            ("page_size".to_string(), self.upstream.page_size.to_string()),
            (
                "sell_metadata".to_string(),
                Value::Object(metadata_filter).to_string(),
            ),
        ];
        if with_hints {
            params.push(("order_by".to_string(), "buy_quantity".to_string()));
            params.push(("direction".to_string(), "asc".to_string()));
        }
        if let Some(min) = updated_min {
            params.push(("updated_min_timestamp".to_string(), min.to_rfc3339()));
        }
        if let Some(cursor) = cursor {
            params.push(("cursor".to_string(), cursor.to_string()));
        }
        params
    }

    /// Извлечь записи ордеров из страницы ответа
    fn extract_orders(page: &Value) -> Vec<RawOrder> {
        let records = if let Some(arr) = page.as_array() {
            Some(arr)
        } else {
            ["result", "records", "orders"]
                .iter()
                .find_map(|key| page.get(*key).and_then(Value::as_array))
        };
        records
            .map(|arr| arr.iter().cloned().map(RawOrder::new).collect())
            .unwrap_or_default()
    }

    /// The continuation cursor appears as a plain string under several known
    /// names, or nested inside a result object. Try each shape, stop when
    /// none match.
    fn extract_cursor(page: &Value) -> Option<String> {
        for key in ["cursor", "next_cursor", "next"] {
            if let Some(s) = page.get(key).and_then(Value::as_str) {
                if !s.is_empty() {
                    return Some(s.to_string());
                }
            }
        }
        if let Some(s) = page.pointer("/result/cursor").and_then(Value::as_str) {
            if !s.is_empty() {
                return Some(s.to_string());
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::infrastructure::http::transport::mock::MockTransport;
    use crate::infrastructure::http::HttpTransport;

    fn client(transport: &Arc<MockTransport>, max_pages: u32) -> OrderBookClient {
        let upstream = UpstreamConfig {
            max_pages,
            ..UpstreamConfig::default()
        };
        let http = HttpConfig {
            max_retries: 1,
            backoff_factor: 0.0,
            ..HttpConfig::default()
        };
        OrderBookClient::new(
            ResilientFetcher::new(transport.clone() as Arc<dyn HttpTransport>),
            upstream,
            http,
        )
    }

    fn order(id: u64) -> Value {
        json!({"order_id": id})
    }

    #[tokio::test(start_paused = true)]
    async fn test_accumulates_pages_until_cursor_ends() {
        let transport = Arc::new(MockTransport::new(vec![
            MockTransport::ok(
                200,
                &json!({"result": [order(1), order(2)], "cursor": "p2"}).to_string(),
            ),
            MockTransport::ok(200, &json!({"result": [order(3)]}).to_string()),
        ]));

        let orders = client(&transport, 50)
            .fetch_all_orders("sword-01", OrderStatus::Active, None)
            .await
            .unwrap();
        assert_eq!(orders.len(), 3);
        assert_eq!(transport.request_count(), 2);
        // the second request carried the cursor back
        let (_, params) = &transport.requests()[1];
        assert!(params.contains(&("cursor".to_string(), "p2".to_string())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_self_referencing_cursor_terminates_at_page_cap() {
        let page = json!({"result": [order(1)], "cursor": "loop"}).to_string();
        let transport = Arc::new(MockTransport::new(MockTransport::repeat(200, &page, 20)));

        let orders = client(&transport, 5)
            .fetch_all_orders("sword-01", OrderStatus::Active, None)
            .await
            .unwrap();
        assert_eq!(orders.len(), 5);
        assert_eq!(transport.request_count(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hint_fallback_when_probe_finds_orders() {
        let transport = Arc::new(MockTransport::new(vec![
            // variant (a): hints honored but nothing returned
            MockTransport::ok(200, &json!({"result": []}).to_string()),
            // probe without hints finds a record
            MockTransport::ok(200, &json!({"result": [order(1)]}).to_string()),
            // variant (b) full crawl
            MockTransport::ok(200, &json!({"result": [order(1)]}).to_string()),
        ]));

        let orders = client(&transport, 50)
            .fetch_all_orders("sword-01", OrderStatus::Active, None)
            .await
            .unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(transport.request_count(), 3);
        let requests = transport.requests();
        let hinted = |params: &Vec<(String, String)>| {
            params.iter().any(|(k, _)| k == "order_by")
        };
        assert!(hinted(&requests[0].1));
        assert!(!hinted(&requests[1].1));
        assert!(!hinted(&requests[2].1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_genuinely_empty_book() {
        let transport = Arc::new(MockTransport::new(vec![
            MockTransport::ok(200, &json!({"result": []}).to_string()),
            MockTransport::ok(200, &json!({"result": []}).to_string()),
        ]));

        let orders = client(&transport, 50)
            .fetch_all_orders("sword-01", OrderStatus::Active, None)
            .await;
        assert_eq!(orders, Some(Vec::new()));
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_total_failure_returns_none() {
        let transport = Arc::new(MockTransport::new(MockTransport::repeat(500, "down", 10)));

        let orders = client(&transport, 50)
            .fetch_all_orders("sword-01", OrderStatus::Filled, None)
            .await;
        assert!(orders.is_none());
    }

    #[test]
    fn test_cursor_shapes() {
        let cases = [
            (json!({"cursor": "abc"}), Some("abc")),
            (json!({"next_cursor": "def"}), Some("def")),
            (json!({"next": "ghi"}), Some("ghi")),
            (json!({"result": {"cursor": "jkl"}}), Some("jkl")),
            (json!({"cursor": ""}), None),
            (json!({"cursor": 17}), None),
            (json!({"done": true}), None),
        ];
        for (page, expected) in cases {
            assert_eq!(OrderBookClient::extract_cursor(&page), expected.map(String::from));
        }
    }

    #[test]
    fn test_order_array_shapes() {
        assert_eq!(
            OrderBookClient::extract_orders(&json!([order(1), order(2)])).len(),
            2
        );
        assert_eq!(
            OrderBookClient::extract_orders(&json!({"records": [order(1)]})).len(),
            1
        );
        assert_eq!(
            OrderBookClient::extract_orders(&json!({"orders": [order(1)]})).len(),
            1
        );
        assert!(OrderBookClient::extract_orders(&json!({"unknown": 1})).is_empty());
    }
}
