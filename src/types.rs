use std::time::Duration;

use reqwest::header::LINK;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{FetchError, Links, TransportResponse};

/// One successfully fetched page.
#[derive(Clone, Debug, PartialEq)]
pub struct Page {
    /// URL that produced this page.
    pub url: String,
    /// Decoded JSON body. An empty body decodes to `Value::Null`.
    pub body: Value,
    pub links: Links,
    /// Value of `x-ratelimit-remaining`, if present.
    pub rate_limit_remaining: Option<u64>,
}

impl Page {
    /// Wraps a 2xx transport response.
    pub fn from_response(url: impl Into<String>, response: &TransportResponse) -> Result<Self, FetchError> {
        let url = url.into();
        let body = if response.body.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&response.body).map_err(|err| {
                FetchError::Decode(format!("invalid JSON from {url}: {err}"))
            })?
        };

        Ok(Self {
            url,
            body,
            links: Links::parse(&link_header(response)),
            rate_limit_remaining: rate_limit_remaining(response),
        })
    }

    /// URL of the following page, if any.
    pub fn next_url(&self) -> Option<&str> {
        self.links.next.as_deref()
    }

    /// Moves the page's items into `items`.
    ///
    /// An array body contributes its elements, any other body contributes
    /// itself.
    pub fn append_items_to(self, items: &mut Vec<Value>) {
        match self.body {
            Value::Array(values) => items.extend(values),
            other => items.push(other),
        }
    }
}

// Relations may be split across several `Link` fields.
fn link_header(response: &TransportResponse) -> String {
    response
        .headers
        .get_all(LINK)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect::<Vec<_>>()
        .join(",")
}

pub(crate) fn rate_limit_remaining(response: &TransportResponse) -> Option<u64> {
    response
        .header("x-ratelimit-remaining")
        .and_then(|value| value.trim().parse().ok())
}

/// Backoff applied before a retry, in milliseconds.
///
/// Serializes as `{"retry": ms}` or `{"forbidden": ms}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Delay {
    /// After a network failure or 500-class response.
    Retry(u64),
    /// After a 403 or 429 response.
    Forbidden(u64),
}

impl Delay {
    pub fn millis(&self) -> u64 {
        match self {
            Self::Retry(ms) | Self::Forbidden(ms) => *ms,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.millis())
    }
}

/// Attempts and delays spent on one logical page request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub url: String,
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub delays: Vec<Delay>,
}

#[cfg(test)]
mod tests {
    use reqwest::header::{HeaderValue, LINK};
    use serde_json::json;

    use super::{ActivityRecord, Delay, Page};
    use crate::TransportResponse;

    #[test]
    fn page_reads_links_and_rate_limit() {
        let response = TransportResponse::new(200, r#"[{"page":1}]"#)
            .with_header("link", "<https://test.com/r?page=2>; rel=\"next\"")
            .with_header("x-ratelimit-remaining", "4000");

        let page = Page::from_response("https://test.com/r", &response).expect("page must decode");

        assert_eq!(page.body, json!([{ "page": 1 }]));
        assert_eq!(page.next_url(), Some("https://test.com/r?page=2"));
        assert_eq!(page.rate_limit_remaining, Some(4000));
    }

    #[test]
    fn page_reads_links_split_across_header_lines() {
        let mut response = TransportResponse::new(200, "[]");
        response.headers.append(
            LINK,
            HeaderValue::from_static("<https://test.com/r?page=1>; rel=\"prev\""),
        );
        response.headers.append(
            LINK,
            HeaderValue::from_static("<https://test.com/r?page=3>; rel=\"next\""),
        );

        let page = Page::from_response("https://test.com/r?page=2", &response)
            .expect("page must decode");

        assert_eq!(page.links.prev.as_deref(), Some("https://test.com/r?page=1"));
        assert_eq!(page.next_url(), Some("https://test.com/r?page=3"));
    }

    #[test]
    fn empty_body_is_null_and_invalid_json_fails() {
        let page = Page::from_response("u", &TransportResponse::new(204, "")).expect("empty ok");
        assert!(page.body.is_null());
        assert!(page.next_url().is_none());

        let err = Page::from_response("u", &TransportResponse::new(200, "<html>"))
            .expect_err("html must not decode");
        assert!(matches!(err, crate::FetchError::Decode(_)));
    }

    #[test]
    fn non_array_body_is_a_single_item() {
        let mut items = vec![json!(0)];
        let page = Page::from_response("u", &TransportResponse::new(200, r#"{"id":1}"#))
            .expect("page must decode");
        page.append_items_to(&mut items);
        assert_eq!(items, vec![json!(0), json!({ "id": 1 })]);
    }

    #[test]
    fn activity_serializes_tagged_delays_and_omits_empty_list() {
        let record = ActivityRecord {
            url: "u".to_owned(),
            attempts: 3,
            delays: vec![Delay::Retry(10), Delay::Forbidden(15)],
        };
        assert_eq!(
            serde_json::to_value(&record).expect("serialize"),
            json!({ "url": "u", "attempts": 3, "delays": [{ "retry": 10 }, { "forbidden": 15 }] })
        );

        let first_try = ActivityRecord {
            url: "u".to_owned(),
            attempts: 1,
            delays: Vec::new(),
        };
        let value = serde_json::to_value(&first_try).expect("serialize");
        assert!(value.get("delays").is_none());
    }
}
