use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tokio::time::sleep;
use url::Url;

use crate::{
    activity::ActivityLog, types::rate_limit_remaining, ActivityRecord, Delay, FetchError,
    FetchOptions, FetchOverrides, Page, ReqwestTransport, Result, Transport, TransportResponse,
};

/// Fetches GitHub API resources, following pagination and retrying
/// transient failures.
///
/// Clones share the transport, the options and the activity log.
#[derive(Clone)]
pub struct GitHubFetcher {
    transport: Arc<dyn Transport>,
    options: Arc<FetchOptions>,
    activity: ActivityLog,
}

impl fmt::Debug for GitHubFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubFetcher")
            .field("options", &self.options)
            .field("activity", &self.activity.len())
            .finish_non_exhaustive()
    }
}

impl GitHubFetcher {
    /// Creates a fetcher that talks HTTP through `reqwest`.
    pub fn new(overrides: FetchOverrides) -> Self {
        Self::with_transport(overrides, ReqwestTransport::new())
    }

    /// Creates a fetcher over a custom transport.
    pub fn with_transport(overrides: FetchOverrides, transport: impl Transport + 'static) -> Self {
        Self::from_options(FetchOptions::from(overrides), Arc::new(transport))
    }

    /// Creates a fetcher from already-resolved options.
    pub fn from_options(options: FetchOptions, transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            options: Arc::new(options),
            activity: ActivityLog::new(),
        }
    }

    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    /// Snapshot of one record per page fetched so far, oldest first.
    pub fn activity(&self) -> Vec<ActivityRecord> {
        self.activity.snapshot()
    }

    /// Removes and returns the records collected so far.
    ///
    /// Clones share one log, so this drains it for all of them.
    pub fn take_activity(&self) -> Vec<ActivityRecord> {
        self.activity.take()
    }

    /// Fetches a single page and returns its decoded body.
    ///
    /// Pagination links are ignored.
    pub async fn get(&self, url: &str) -> Result<Value> {
        Ok(self.fetch_page(url).await?.body)
    }

    /// Fetches a single page with its links and rate-limit counter.
    pub async fn get_page(&self, url: &str) -> Result<Page> {
        self.fetch_page(url).await
    }

    /// Fetches every page of a resource and concatenates the items.
    ///
    /// Pages are requested one after another by following `rel="next"`
    /// links. If any page fails, the items of earlier pages are dropped and
    /// that page's error is returned. A `next` link back to a page this call
    /// already fetched fails with [`FetchError::PagingLoop`].
    pub async fn get_all(&self, url: &str) -> Result<Vec<Value>> {
        let mut items = Vec::new();
        let mut seen = HashSet::new();
        let mut next = Some(url.to_owned());

        while let Some(url) = next {
            let url = self.with_page_size(&url)?;
            if !seen.insert(url.clone()) {
                #[cfg(feature = "tracing")]
                tracing::warn!(url = %url, "next link points at a page already fetched");

                return Err(FetchError::PagingLoop { url });
            }
            let page = self.fetch_page(&url).await?;
            next = page.links.next.clone();

            #[cfg(feature = "tracing")]
            {
                if let Some(next) = &next {
                    tracing::debug!(from = %url, next = %next, "following next page link");
                }
            }

            page.append_items_to(&mut items);
        }

        Ok(items)
    }

    async fn fetch_page(&self, url: &str) -> Result<Page> {
        let mut attempts = 0u32;
        let mut delays = Vec::new();

        loop {
            attempts += 1;
            let failure = match self.attempt(url).await {
                Ok(page) => {
                    self.record(url, attempts, delays);
                    return Ok(page);
                }
                Err(err) => err,
            };

            if !failure.is_retryable() {
                self.record(url, attempts, delays);
                return Err(failure);
            }
            let delay = match &failure {
                FetchError::RateLimited { .. } => Delay::Forbidden(self.options.forbidden_delay_ms),
                _ => Delay::Retry(self.options.retry_delay_ms),
            };

            if attempts >= self.options.max_attempts {
                #[cfg(feature = "tracing")]
                tracing::warn!(url, attempts, error = %failure, "giving up on page request");

                self.record(url, attempts, delays);
                return Err(FetchError::ExhaustedRetries {
                    url: url.to_owned(),
                    attempts,
                    last: Box::new(failure),
                });
            }

            #[cfg(feature = "tracing")]
            tracing::warn!(
                url,
                attempts,
                delay = ?delay,
                error = %failure,
                "page request failed, retrying"
            );

            delays.push(delay);
            sleep(delay.duration()).await;
        }
    }

    async fn attempt(&self, url: &str) -> Result<Page> {
        #[cfg(feature = "tracing")]
        tracing::debug!(url, "GET");

        let response = self
            .transport
            .get(url, &self.options.headers, self.options.timeout())
            .await
            .map_err(FetchError::Network)?;
        classify(url, response)
    }

    fn record(&self, url: &str, attempts: u32, delays: Vec<Delay>) {
        self.activity.push(ActivityRecord {
            url: url.to_owned(),
            attempts,
            delays,
        });
    }

    fn with_page_size(&self, url: &str) -> Result<String> {
        let Some(size) = self.options.per_page else {
            return Ok(url.to_owned());
        };

        let mut parsed =
            Url::parse(url).map_err(|err| FetchError::InvalidUrl(format!("{url}: {err}")))?;
        if parsed.query_pairs().any(|(key, _)| key == "per_page") {
            return Ok(url.to_owned());
        }
        parsed
            .query_pairs_mut()
            .append_pair("per_page", &size.to_string());
        Ok(parsed.into())
    }
}

fn classify(url: &str, response: TransportResponse) -> Result<Page> {
    let status = response.status;
    match status {
        200..=299 => Page::from_response(url, &response),
        403 | 429 => Err(FetchError::RateLimited {
            status,
            remaining: rate_limit_remaining(&response),
            body: response.body,
        }),
        500..=599 => Err(FetchError::Server {
            status,
            body: response.body,
        }),
        _ => Err(FetchError::Http {
            status,
            body: response.body,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::{classify, GitHubFetcher};
    use crate::{FetchError, FetchOverrides, TransportResponse};

    #[test]
    fn classify_sorts_statuses() {
        assert!(classify("u", TransportResponse::new(200, "{}")).is_ok());
        assert!(matches!(
            classify("u", TransportResponse::new(502, "down")),
            Err(FetchError::Server { status: 502, .. })
        ));
        assert!(matches!(
            classify(
                "u",
                TransportResponse::new(403, "slow down").with_header("x-ratelimit-remaining", "0")
            ),
            Err(FetchError::RateLimited {
                status: 403,
                remaining: Some(0),
                ..
            })
        ));
        assert!(matches!(
            classify("u", TransportResponse::new(429, "")),
            Err(FetchError::RateLimited { status: 429, .. })
        ));
        assert!(matches!(
            classify("u", TransportResponse::new(404, "missing")),
            Err(FetchError::Http { status: 404, .. })
        ));
    }

    #[test]
    fn page_size_is_added_once() {
        let fetcher = GitHubFetcher::new(FetchOverrides::new().per_page(50));

        assert_eq!(
            fetcher
                .with_page_size("https://api.github.com/orgs/o/repos")
                .expect("valid url"),
            "https://api.github.com/orgs/o/repos?per_page=50"
        );
        assert_eq!(
            fetcher
                .with_page_size("https://api.github.com/orgs/o/repos?page=2&per_page=10")
                .expect("valid url"),
            "https://api.github.com/orgs/o/repos?page=2&per_page=10"
        );
        assert!(matches!(
            fetcher.with_page_size("not a url"),
            Err(FetchError::InvalidUrl(_))
        ));
    }

    #[test]
    fn page_size_can_be_disabled() {
        let fetcher = GitHubFetcher::new(FetchOverrides::new().per_page(0));
        assert_eq!(
            fetcher.with_page_size("not a url").expect("untouched"),
            "not a url"
        );
    }

    #[test]
    fn debug_redacts_authorization_value() {
        let fetcher = GitHubFetcher::new(FetchOverrides::new().token("secret-token"));
        let debug = format!("{fetcher:?}");
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("secret-token"));
    }
}
