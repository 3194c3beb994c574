//! Blocking JSON POST with retry, shared by the embedding and generator
//! backends.
//!
//! Retry strategy:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)
//!
//! Clients are built per call. A blocking client must not be created or
//! dropped on an async runtime thread; callers already run on a blocking
//! thread, so a per-call client stays off the runtime.

use anyhow::{bail, Result};
use std::time::Duration;

/// One JSON endpoint call.
pub struct JsonRequest<'a> {
    /// Label used in error messages (`"OpenAI"`, `"Ollama"`).
    pub service: &'a str,
    pub url: &'a str,
    pub bearer: Option<&'a str>,
    pub body: &'a serde_json::Value,
    pub timeout: Duration,
    pub max_retries: u32,
}

/// Delay before retry number `attempt` (1-based).
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1 << (attempt.saturating_sub(1)).min(5))
}

/// POST `req.body` and return the parsed JSON response.
pub fn post_json(req: &JsonRequest<'_>) -> Result<serde_json::Value> {
    let client = reqwest::blocking::Client::builder()
        .timeout(req.timeout)
        .build()?;

    let mut last_err = None;

    for attempt in 0..=req.max_retries {
        if attempt > 0 {
            let delay = backoff_delay(attempt);
            tracing::debug!(service = req.service, attempt, ?delay, "retrying request");
            std::thread::sleep(delay);
        }

        let mut builder = client
            .post(req.url)
            .header("Content-Type", "application/json")
            .json(req.body);
        if let Some(token) = req.bearer {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }

        match builder.send() {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return Ok(response.json()?);
                }

                let body_text = response.text().unwrap_or_default();
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(anyhow::anyhow!(
                        "{} API error {}: {}",
                        req.service,
                        status,
                        body_text
                    ));
                    continue;
                }

                bail!("{} API error {}: {}", req.service, status, body_text);
            }
            Err(e) => {
                last_err = Some(anyhow::anyhow!(
                    "{} connection error ({}): {}",
                    req.service,
                    req.url,
                    e
                ));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("{} request failed after retries", req.service)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        assert_eq!(backoff_delay(1), Duration::from_secs(1));
        assert_eq!(backoff_delay(2), Duration::from_secs(2));
        assert_eq!(backoff_delay(4), Duration::from_secs(8));
        assert_eq!(backoff_delay(6), Duration::from_secs(32));
        assert_eq!(backoff_delay(20), Duration::from_secs(32));
    }

    #[test]
    fn test_unreachable_host_is_error() {
        let body = serde_json::json!({});
        let err = post_json(&JsonRequest {
            service: "Test",
            url: "http://127.0.0.1:9/api",
            bearer: None,
            body: &body,
            timeout: Duration::from_secs(2),
            max_retries: 0,
        })
        .unwrap_err();
        assert!(err.to_string().contains("Test connection error"));
    }
}
