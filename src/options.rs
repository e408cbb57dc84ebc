use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Map, Value};

/// Resolved fetcher configuration.
///
/// Built once by [`FetchOptions::merge`] and never mutated afterwards.
#[derive(Clone, PartialEq)]
pub struct FetchOptions {
    /// Wait before retrying a network failure or 500-class response.
    pub retry_delay_ms: u64,
    /// Wait before retrying a 403 or 429 response.
    pub forbidden_delay_ms: u64,
    /// Attempt ceiling per page, shared by every retry kind.
    pub max_attempts: u32,
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: u64,
    /// Page size requested by `get_all`. `None` leaves URLs untouched.
    pub per_page: Option<u32>,
    /// Request headers sent with every attempt.
    pub headers: BTreeMap<String, String>,
    /// Unrecognized option keys, carried through untouched.
    pub extra: Map<String, Value>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("User-Agent".to_owned(), "ghcrawler-http".to_owned());
        headers.insert(
            "Accept".to_owned(),
            "application/vnd.github.v3+json".to_owned(),
        );
        Self {
            retry_delay_ms: 500,
            forbidden_delay_ms: 3 * 60 * 1000,
            max_attempts: 5,
            timeout_ms: 30_000,
            per_page: Some(100),
            headers,
            extra: Map::new(),
        }
    }
}

impl fmt::Debug for FetchOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers: BTreeMap<&str, &str> = self
            .headers
            .iter()
            .map(|(name, value)| {
                if name.eq_ignore_ascii_case("authorization") {
                    (name.as_str(), "<redacted>")
                } else {
                    (name.as_str(), value.as_str())
                }
            })
            .collect();
        f.debug_struct("FetchOptions")
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("forbidden_delay_ms", &self.forbidden_delay_ms)
            .field("max_attempts", &self.max_attempts)
            .field("timeout_ms", &self.timeout_ms)
            .field("per_page", &self.per_page)
            .field("headers", &headers)
            .field("extra", &self.extra)
            .finish()
    }
}

impl FetchOptions {
    /// Overlays `overrides` onto `defaults`, returning a new value.
    ///
    /// Header names compare case-insensitively and the caller's spelling
    /// wins. `max_attempts` is clamped to at least one and a `per_page` of
    /// zero disables the page-size parameter.
    pub fn merge(defaults: &FetchOptions, overrides: &FetchOverrides) -> FetchOptions {
        let mut headers = defaults.headers.clone();
        for (name, value) in &overrides.headers {
            headers.retain(|existing, _| !existing.eq_ignore_ascii_case(name));
            headers.insert(name.clone(), value.clone());
        }

        let mut extra = defaults.extra.clone();
        extra.extend(
            overrides
                .extra
                .iter()
                .map(|(key, value)| (key.clone(), value.clone())),
        );

        FetchOptions {
            retry_delay_ms: overrides.retry_delay.unwrap_or(defaults.retry_delay_ms),
            forbidden_delay_ms: overrides
                .forbidden_delay
                .unwrap_or(defaults.forbidden_delay_ms),
            max_attempts: overrides
                .max_attempts
                .unwrap_or(defaults.max_attempts)
                .max(1),
            timeout_ms: overrides.timeout.unwrap_or(defaults.timeout_ms),
            per_page: match overrides.per_page {
                Some(0) => None,
                Some(size) => Some(size),
                None => defaults.per_page,
            },
            headers,
            extra,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Looks up a header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

impl From<FetchOverrides> for FetchOptions {
    fn from(overrides: FetchOverrides) -> Self {
        FetchOptions::merge(&FetchOptions::default(), &overrides)
    }
}

/// Caller-supplied configuration, merged onto [`FetchOptions::default`].
///
/// Deserializes from the camelCase keys used by crawler configuration files:
///
/// ```
/// use ghcrawler_http::FetchOverrides;
///
/// let overrides = FetchOverrides::from_json(
///     r#"{ "retryDelay": 10, "headers": { "authorization": "token abc" } }"#,
/// )
/// .unwrap();
/// assert_eq!(overrides.retry_delay, Some(10));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchOverrides {
    pub retry_delay: Option<u64>,
    pub forbidden_delay: Option<u64>,
    pub max_attempts: Option<u32>,
    pub timeout: Option<u64>,
    pub per_page: Option<u32>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FetchOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn retry_delay(mut self, ms: u64) -> Self {
        self.retry_delay = Some(ms);
        self
    }

    pub fn forbidden_delay(mut self, ms: u64) -> Self {
        self.forbidden_delay = Some(ms);
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    pub fn timeout(mut self, ms: u64) -> Self {
        self.timeout = Some(ms);
        self
    }

    pub fn per_page(mut self, size: u32) -> Self {
        self.per_page = Some(size);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Sets the `authorization` header from a GitHub token.
    ///
    /// If the token has no `token ` or `Bearer ` scheme, `token ` is added.
    pub fn token(self, token: impl AsRef<str>) -> Self {
        let authorization = normalize_token_authorization(token.as_ref());
        self.header("authorization", authorization)
    }

    /// Parses overrides from a JSON object.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Reads overrides from environment variables.
    ///
    /// Reads (all optional):
    /// - `CRAWLER_GITHUB_TOKEN` — GitHub token used for `authorization`
    /// - `CRAWLER_RETRY_DELAY` — retry delay in milliseconds
    /// - `CRAWLER_FORBIDDEN_DELAY` — forbidden delay in milliseconds
    /// - `CRAWLER_MAX_ATTEMPTS` — attempt ceiling per page
    ///
    /// Returns an error if a numeric variable does not parse.
    pub fn from_env() -> Result<Self, String> {
        overrides_from_vars(|name| std::env::var(name).ok())
    }
}

fn overrides_from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<FetchOverrides, String> {
    fn number<T: std::str::FromStr>(
        lookup: &impl Fn(&str) -> Option<String>,
        name: &str,
    ) -> Result<Option<T>, String> {
        match lookup(name) {
            Some(raw) if !raw.trim().is_empty() => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| format!("{name} must be a non-negative integer, got '{raw}'")),
            _ => Ok(None),
        }
    }

    let mut overrides = FetchOverrides {
        retry_delay: number(&lookup, "CRAWLER_RETRY_DELAY")?,
        forbidden_delay: number(&lookup, "CRAWLER_FORBIDDEN_DELAY")?,
        max_attempts: number(&lookup, "CRAWLER_MAX_ATTEMPTS")?,
        ..FetchOverrides::default()
    };
    if let Some(token) = lookup("CRAWLER_GITHUB_TOKEN").filter(|token| !token.trim().is_empty()) {
        overrides = overrides.token(token);
    }
    Ok(overrides)
}

fn normalize_token_authorization(token: &str) -> String {
    let trimmed = token.trim();
    let has_scheme = ["token ", "bearer "].iter().any(|scheme| {
        trimmed
            .get(..scheme.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
    });
    if has_scheme {
        trimmed.to_owned()
    } else {
        format!("token {trimmed}")
    }
}
