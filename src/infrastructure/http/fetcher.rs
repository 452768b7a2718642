//! Resilient HTTP fetching with retry, backoff and failure classification
//!
//! `fetch_json` never fails: transient upstream trouble (429/5xx, network
//! errors) is retried with exponential backoff and jitter, everything else
//! is logged and reported as `None`. Callers decide what absence of data
//! means for them.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::transport::HttpTransport;
use crate::shared::utils::truncate_body;

/// Response-body chars kept in diagnostic log lines
const LOG_BODY_MAX_CHARS: usize = 300;
/// Upper bound of the random jitter added to each backoff sleep, in seconds
const JITTER_MAX_SECS: f64 = 0.25;

/// Classification of a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureClass {
    /// Worth retrying: rate limiting, server-side errors, network trouble
    Transient,
    /// Contract or client problem; retrying cannot help
    Permanent,
}

fn classify_status(status: u16) -> FailureClass {
    match status {
        429 | 500 | 502 | 503 | 504 => FailureClass::Transient,
        _ => FailureClass::Permanent,
    }
}

/// Retrying JSON GET client over an [`HttpTransport`]
#[derive(Clone)]
pub struct ResilientFetcher {
    transport: Arc<dyn HttpTransport>,
}

impl ResilientFetcher {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    /// GET `url` and parse the body as JSON.
    ///
    /// Makes up to `max_retries` attempts. Backoff before attempt `n + 1` is
    /// `backoff_factor * 2^n` seconds plus jitter; sleeps are cooperative so
    /// a retry storm never blocks the runtime's workers.
    pub async fn fetch_json(
        &self,
        url: &str,
        params: &[(String, String)],
        headers: &[(String, String)],
        timeout: Duration,
        max_retries: u32,
        backoff_factor: f64,
    ) -> Option<Value> {
        for attempt in 0..max_retries {
            match self.transport.get(url, params, headers, timeout).await {
                Ok(response) if (200..300).contains(&response.status) => {
                    match serde_json::from_str::<Value>(&response.body) {
                        Ok(json) => return Some(json),
                        Err(e) => {
                            // A malformed 2xx payload is not transient
                            warn!(
                                "Unparseable response from {}: {} (body: {})",
                                url,
                                e,
                                truncate_body(&response.body, LOG_BODY_MAX_CHARS)
                            );
                            return None;
                        }
                    }
                }
                Ok(response) if response.status == 400 => {
                    // Parameter/contract problem on our side; surface it loudly
                    warn!(
                        "Bad request (400) from {}: {}",
                        url,
                        truncate_body(&response.body, LOG_BODY_MAX_CHARS)
                    );
                    return None;
                }
                Ok(response) => match classify_status(response.status) {
                    FailureClass::Transient => {
                        warn!(
                            "Transient status {} from {} (attempt {}/{})",
                            response.status,
                            url,
                            attempt + 1,
                            max_retries
                        );
                    }
                    FailureClass::Permanent => {
                        warn!(
                            "Unexpected status {} from {}: {}",
                            response.status,
                            url,
                            truncate_body(&response.body, LOG_BODY_MAX_CHARS)
                        );
                        return None;
                    }
                },
                Err(e) => {
                    warn!(
                        "Request to {} failed: {} (attempt {}/{})",
                        url,
                        e,
                        attempt + 1,
                        max_retries
                    );
                }
            }

            if attempt + 1 < max_retries {
                let delay = backoff_delay(backoff_factor, attempt);
                debug!("Backing off {:.2}s before retrying {}", delay.as_secs_f64(), url);
                sleep(delay).await;
            }
        }

        warn!("Giving up on {} after {} attempts", url, max_retries);
        None
    }
}

fn backoff_delay(backoff_factor: f64, attempt: u32) -> Duration {
    let base = backoff_factor * 2f64.powi(attempt as i32);
    let jitter: f64 = rand::thread_rng().gen_range(0.0..JITTER_MAX_SECS);
    Duration::from_secs_f64(base + jitter)
}
