//! reqwest-backed upstream client.

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use reqwest::{header, redirect, Client};
use url::Url;

use super::{FetchError, Upstream, UpstreamResponse};

/// Browser identity sent upstream; some cover hosts refuse unknown agents.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                              (KHTML, like Gecko) Chrome/113.0.0.0 Safari/537.36";

const MAX_REDIRECTS: usize = 10;

/// Upstream client issuing real HTTP requests.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: Client,
    timeout: Duration,
}

impl HttpUpstream {
    /// Build a client with the given overall fetch deadline.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .no_proxy()
            .build()?;

        Ok(Self { client, timeout })
    }

    fn classify(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Transport(Box::new(err))
        }
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn fetch(&self, target: &Url) -> Result<UpstreamResponse, FetchError> {
        let response = self
            .client
            .get(target.as_str())
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        // hyper records the phrase only when it differs from the canonical one.
        let reason = response
            .extensions()
            .get::<hyper::ext::ReasonPhrase>()
            .map(|phrase| String::from_utf8_lossy(phrase.as_bytes()).into_owned())
            .or_else(|| status.canonical_reason().map(str::to_string))
            .unwrap_or_default();
        let content_type = response.headers().get(header::CONTENT_TYPE).cloned();

        let body = if status.is_success() {
            response.bytes().await.map_err(|e| self.classify(e))?
        } else {
            Bytes::new()
        };

        Ok(UpstreamResponse {
            status,
            reason,
            content_type,
            body,
        })
    }
}
