use crate::transport::TransportError;

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The transport could not produce a response.
    #[error("network error: {0}")]
    Network(TransportError),
    /// 500-class response with raw response body.
    #[error("server error {status}: {body}")]
    Server { status: u16, body: String },
    /// 403 or 429 response, retried after the forbidden delay.
    #[error("rate limited ({status}): {body}")]
    RateLimited {
        status: u16,
        body: String,
        /// Value of `x-ratelimit-remaining`, if the response carried one.
        remaining: Option<u64>,
    },
    /// Any other non-success status. Never retried.
    #[error("http error {status}: {body}")]
    Http { status: u16, body: String },
    /// A success response whose body is not valid JSON.
    #[error("decode error: {0}")]
    Decode(String),
    /// The request URL could not be parsed.
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    /// A `next` link pointed at a page already fetched by the same call.
    #[error("pagination loop: {url} was already fetched")]
    PagingLoop { url: String },
    /// Every attempt for a page failed; `last` is the final failure.
    #[error("giving up on {url} after {attempts} attempts: {last}")]
    ExhaustedRetries {
        url: String,
        attempts: u32,
        #[source]
        last: Box<FetchError>,
    },
}

impl FetchError {
    /// Whether another attempt at the same page may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Server { .. } | Self::RateLimited { .. }
        )
    }

    /// Returns the error that ended the fetch, unwrapping `ExhaustedRetries`.
    pub fn last_error(&self) -> &FetchError {
        match self {
            Self::ExhaustedRetries { last, .. } => last.last_error(),
            other => other,
        }
    }

    /// Response body of the terminal failure, when there was a response.
    pub fn body(&self) -> Option<&str> {
        match self.last_error() {
            Self::Server { body, .. } | Self::RateLimited { body, .. } | Self::Http { body, .. } => {
                Some(body.as_str())
            }
            _ => None,
        }
    }

    /// HTTP status of the terminal failure, when there was a response.
    pub fn status(&self) -> Option<u16> {
        match self.last_error() {
            Self::Server { status, .. }
            | Self::RateLimited { status, .. }
            | Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}
