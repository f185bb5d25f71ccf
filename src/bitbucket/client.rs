//! Bitbucket API client.

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::borrow::Cow;
use std::time::Duration;

use crate::bitbucket::pagination::DEFAULT_MAX_PAGES;
use crate::credentials::Credentials;
use crate::error::{BitbucketError, Result};

/// Default timeout applied to every outbound request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Blocking client for the Bitbucket Cloud and Server REST APIs.
///
/// Every request carries basic authentication. Endpoints may be given as paths relative
/// to the base URL (`/2.0/repositories/acme`) or as absolute URLs, which is how the
/// Cloud API hands out its `next` page links.
#[derive(Clone)]
pub struct BitbucketClient {
    pub(crate) credentials: Credentials,
    pub(crate) base_url: String,
    pub(crate) client: Client,
    pub(crate) max_pages: usize,
}

impl BitbucketClient {
    /// Create a client for the given base URL using the default timeout.
    pub fn new(base_url: impl Into<String>, credentials: Credentials) -> Result<Self> {
        Self::with_timeout(base_url, credentials, DEFAULT_TIMEOUT)
    }

    /// Create a client with a custom request timeout.
    pub fn with_timeout(
        base_url: impl Into<String>,
        credentials: Credentials,
        timeout: Duration,
    ) -> Result<Self> {
        let mut url = base_url.into();
        // Remove trailing slash if present
        while url.ends_with('/') {
            url.pop();
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(BitbucketError::InvalidConfig(format!(
                "Bitbucket URL must start with http:// or https://, got '{}'",
                url
            )));
        }
        url::Url::parse(&url)?;

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(Self::headers())
            .build()?;

        Ok(Self {
            credentials,
            base_url: url,
            client,
            max_pages: DEFAULT_MAX_PAGES,
        })
    }

    /// Limit the number of pages a single collection walk may fetch.
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the username the client authenticates as.
    pub fn username(&self) -> &str {
        self.credentials.username()
    }

    fn headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static("bitbucket-ops"));
        headers
    }

    /// Resolve an endpoint against the base URL.
    pub(crate) fn resolve(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else if endpoint.starts_with('/') {
            format!("{}{}", self.base_url, endpoint)
        } else {
            format!("{}/{}", self.base_url, endpoint)
        }
    }

    fn builder(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .basic_auth(self.credentials.username(), Some(self.credentials.secret()))
    }

    /// GET an endpoint, expecting 200.
    pub(crate) fn get(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<Value> {
        let url = self.resolve(endpoint);
        let request = self.builder(Method::GET, &url).query(query);
        self.send(request, Method::GET, &url, StatusCode::OK)
    }

    /// POST a JSON body, expecting `expected`.
    pub(crate) fn post_json<B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
        expected: StatusCode,
    ) -> Result<Value> {
        let url = self.resolve(endpoint);
        let request = self.builder(Method::POST, &url).json(body);
        self.send(request, Method::POST, &url, expected)
    }

    /// POST a form-encoded body, expecting `expected`.
    pub(crate) fn post_form<B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
        expected: StatusCode,
    ) -> Result<Value> {
        let url = self.resolve(endpoint);
        let request = self.builder(Method::POST, &url).form(body);
        self.send(request, Method::POST, &url, expected)
    }

    /// PUT a JSON body, expecting `expected`.
    pub(crate) fn put_json<B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
        expected: StatusCode,
    ) -> Result<Value> {
        let url = self.resolve(endpoint);
        let request = self.builder(Method::PUT, &url).json(body);
        self.send(request, Method::PUT, &url, expected)
    }

    /// GET an endpoint and return its status code and raw body.
    ///
    /// Any status other than 401 is returned to the caller rather than treated as an error.
    pub(crate) fn probe(&self, endpoint: &str) -> Result<(StatusCode, String)> {
        let url = self.resolve(endpoint);
        tracing::debug!(method = "GET", url = %url, "bitbucket request");
        let response = self.builder(Method::GET, &url).send()?;
        let status = response.status();
        let body = response.text()?;
        if status == StatusCode::UNAUTHORIZED {
            return Err(BitbucketError::AuthenticationFailed { body });
        }
        Ok((status, body))
    }

    fn send(
        &self,
        request: RequestBuilder,
        method: Method,
        url: &str,
        expected: StatusCode,
    ) -> Result<Value> {
        tracing::debug!(method = %method, url = %url, "bitbucket request");
        let response = request.send()?;
        let status = response.status();
        let body = response.text()?;

        if status == StatusCode::UNAUTHORIZED {
            return Err(BitbucketError::AuthenticationFailed { body });
        }
        if status != expected {
            tracing::debug!(status = status.as_u16(), url = %url, "unexpected status");
            return Err(BitbucketError::Api {
                status: status.as_u16(),
                body,
            });
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| BitbucketError::UnexpectedResponse {
            endpoint: url.to_string(),
            message: format!("Failed to parse response: {}", e),
        })
    }
}

/// Percent-encode a value for use as a single URL path segment.
pub(crate) fn segment(value: &str) -> Cow<'_, str> {
    urlencoding::encode(value)
}
