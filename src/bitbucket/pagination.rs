//! Paginated collection of Bitbucket resources.
//!
//! Bitbucket exposes three page shapes and each endpoint uses exactly one of them, so the
//! caller names the strategy instead of it being guessed from the response.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::bitbucket::BitbucketClient;
use crate::error::{BitbucketError, Result};

/// Upper bound on pages fetched by one collection walk.
pub const DEFAULT_MAX_PAGES: usize = 1000;

/// How an endpoint splits its collection into pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pagination {
    /// Cloud 2.0: items in `values`, absolute URL of the next page in `next`.
    NextUrl,
    /// Server 1.0/2.0: items in `values`, `isLastPage` and `nextPageStart`; the next page is
    /// the same endpoint re-requested with `start=<nextPageStart>`.
    PageStart,
    /// Cloud 1.0: the body is the complete array.
    Flat,
}

/// Where the next page comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cursor {
    Url(String),
    Start(u64),
}

/// One decoded page.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub items: Vec<Value>,
    pub next: Option<Cursor>,
}

impl Pagination {
    /// Split a response body into its items and the cursor for the next page.
    ///
    /// An envelope without a `values` array is an empty page.
    pub fn parse_page(self, endpoint: &str, body: Value) -> Result<Page> {
        match self {
            Pagination::NextUrl => {
                let next = body
                    .get("next")
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
                    .map(|s| Cursor::Url(s.to_string()));
                Ok(Page {
                    items: take_values(body),
                    next,
                })
            }
            Pagination::PageStart => {
                let last = body
                    .get("isLastPage")
                    .and_then(Value::as_bool)
                    .unwrap_or(true);
                let next = if last {
                    None
                } else {
                    body.get("nextPageStart")
                        .and_then(Value::as_u64)
                        .map(Cursor::Start)
                };
                Ok(Page {
                    items: take_values(body),
                    next,
                })
            }
            Pagination::Flat => match body {
                Value::Array(items) => Ok(Page { items, next: None }),
                Value::Null => Ok(Page {
                    items: Vec::new(),
                    next: None,
                }),
                other => Err(BitbucketError::UnexpectedResponse {
                    endpoint: endpoint.to_string(),
                    message: format!("expected a JSON array, got {}", json_kind(&other)),
                }),
            },
        }
    }
}

fn take_values(mut body: Value) -> Vec<Value> {
    match body.get_mut("values").map(Value::take) {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl BitbucketClient {
    /// Walk every page of `endpoint` and return all items in page order.
    pub fn collect(&self, endpoint: &str, pagination: Pagination) -> Result<Vec<Value>> {
        self.collect_with_query(endpoint, &[], pagination)
    }

    /// Like [`collect`](Self::collect), sending `query` with the initial request.
    ///
    /// `NextUrl` links already carry the original query, so it is not re-sent for them.
    pub fn collect_with_query(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
        pagination: Pagination,
    ) -> Result<Vec<Value>> {
        let mut items = Vec::new();
        let mut cursor: Option<Cursor> = None;
        let mut pages = 0;

        loop {
            if pages == self.max_pages {
                return Err(BitbucketError::PageLimitExceeded {
                    endpoint: endpoint.to_string(),
                    limit: self.max_pages,
                });
            }

            let body = match &cursor {
                None => self.get(endpoint, query)?,
                Some(Cursor::Url(url)) => self.get(url, &[])?,
                Some(Cursor::Start(start)) => {
                    let start = start.to_string();
                    let mut paged: Vec<(&str, &str)> = query.to_vec();
                    paged.push(("start", start.as_str()));
                    self.get(endpoint, &paged)?
                }
            };
            pages += 1;

            let page = pagination.parse_page(endpoint, body)?;
            tracing::debug!(endpoint, page = pages, items = page.items.len(), "fetched page");
            items.extend(page.items);

            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(items)
    }

    /// Collect every item and deserialize it into `T`.
    pub fn collect_as<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        pagination: Pagination,
    ) -> Result<Vec<T>> {
        self.collect(endpoint, pagination)?
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(BitbucketError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_next_url_page() {
        let body = json!({
            "values": [{"slug": "a"}, {"slug": "b"}],
            "next": "https://api.bitbucket.org/2.0/repositories/acme?page=2"
        });
        let page = Pagination::NextUrl.parse_page("/x", body).unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(
            page.next,
            Some(Cursor::Url(
                "https://api.bitbucket.org/2.0/repositories/acme?page=2".into()
            ))
        );
    }

    #[test]
    fn test_next_url_last_page() {
        let body = json!({"values": [{"slug": "a"}]});
        let page = Pagination::NextUrl.parse_page("/x", body).unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.next, None);
    }

    #[test]
    fn test_missing_values_is_empty_page() {
        let body = json!({"pagelen": 10, "next": "https://host/next"});
        let page = Pagination::NextUrl.parse_page("/x", body).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.next, Some(Cursor::Url("https://host/next".into())));

        let page = Pagination::PageStart
            .parse_page("/x", json!({"isLastPage": true}))
            .unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.next, None);
    }

    #[test]
    fn test_page_start_page() {
        let body = json!({
            "values": [{"id": 1}],
            "isLastPage": false,
            "nextPageStart": 25
        });
        let page = Pagination::PageStart.parse_page("/x", body).unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.next, Some(Cursor::Start(25)));
    }

    #[test]
    fn test_page_start_last_page_ignores_start() {
        let body = json!({"values": [], "isLastPage": true, "nextPageStart": 25});
        let page = Pagination::PageStart.parse_page("/x", body).unwrap();
        assert_eq!(page.next, None);
    }

    #[test]
    fn test_flat_array() {
        let body = json!([{"slug": "g1"}, {"slug": "g2"}]);
        let page = Pagination::Flat.parse_page("/x", body).unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.next, None);
    }

    #[test]
    fn test_flat_rejects_object() {
        let err = Pagination::Flat
            .parse_page("/1.0/groups/acme", json!({"values": []}))
            .unwrap_err();
        match err {
            BitbucketError::UnexpectedResponse { endpoint, message } => {
                assert_eq!(endpoint, "/1.0/groups/acme");
                assert!(message.contains("an object"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
