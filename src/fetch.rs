// Resilient text retrieval: bounded retries with linear backoff, and a
// timestamp query parameter so intermediary caches never answer for the origin.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::Client;
use tracing::{debug, warn};

use crate::error::LoaderError;

/// HTTP fetcher shared by the manifest load and the remote resolution tier.
pub struct Fetcher {
    client: Client,
    max_attempts: u32,
    backoff_base: Duration,
}

impl Fetcher {
    pub fn new(max_attempts: u32, backoff_base: Duration) -> Self {
        Self {
            client: Client::new(),
            max_attempts: max_attempts.max(1),
            backoff_base,
        }
    }

    /// Fetch `url` as text. A non-success status counts as a failed attempt,
    /// same as a transport error. Backs off linearly between attempts and
    /// returns [`LoaderError::NetworkExhausted`] once the ceiling is spent.
    pub async fn fetch_text(&self, url: &str) -> Result<String, LoaderError> {
        for attempt in 1..=self.max_attempts {
            match self.attempt(url).await {
                Ok(body) => {
                    debug!(
                        "fetched {} ({} bytes, attempt {}/{})",
                        url,
                        body.len(),
                        attempt,
                        self.max_attempts
                    );
                    return Ok(body);
                }
                Err(e) => {
                    warn!(
                        "fetch {} failed (attempt {}/{}): {}",
                        url, attempt, self.max_attempts, e
                    );
                }
            }

            // The wait scales with the attempt number and runs after the
            // final failure as well, before control returns to the caller.
            tokio::time::sleep(self.backoff_base * attempt).await;
        }

        Err(LoaderError::NetworkExhausted {
            url: url.to_string(),
            attempts: self.max_attempts,
        })
    }

    async fn attempt(&self, url: &str) -> anyhow::Result<String> {
        let busted = cache_busted(url);
        let response = self.client.get(&busted).send().await?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("HTTP {}", status.as_u16());
        }
        Ok(response.text().await?)
    }
}

/// Append a `nocache` timestamp parameter, preserving any existing query.
fn cache_busted(url: &str) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}nocache={}", url, separator, millis)
}
