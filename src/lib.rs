//! `ghcrawler-http` is the HTTP fetch layer of a GitHub crawler.
//!
//! [`GitHubFetcher`] wraps a [`Transport`] with:
//! - [`GitHubFetcher::get`] for single resources
//! - [`GitHubFetcher::get_all`] for paginated collections, following
//!   `Link: <...>; rel="next"` headers
//! - per-page retries on network errors, 500-class responses and 403 rate
//!   limiting, each recorded as an [`ActivityRecord`]

mod activity;
mod client;
mod error;
mod link;
mod options;
mod transport;
mod types;

pub use client::GitHubFetcher;
pub use error::FetchError;
pub use link::Links;
pub use options::{FetchOptions, FetchOverrides};
pub use transport::{ReqwestTransport, Transport, TransportError, TransportResponse};
pub use types::{ActivityRecord, Delay, Page};

pub type Result<T> = std::result::Result<T, FetchError>;
