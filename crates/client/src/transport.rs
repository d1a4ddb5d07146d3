//! HTTP transport over reqwest.
//!
//! One `execute` is one round trip: no retries, no status interpretation.
//! The client keeps a cookie jar so the refresh cookie set at login is sent
//! back to the refresh endpoint automatically.

use async_trait::async_trait;
use http::{HeaderValue, header};
use problum_config::Config;
use problum_types::{ApiResponse, ClientError, OutboundRequest, Transport, traits::Result};

/// [`Transport`] backed by a cookie-holding `reqwest::Client`.
#[derive(Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    user_agent: HeaderValue,
}

impl HttpTransport {
    /// Wraps an existing client. It should have a cookie store enabled, or
    /// renewal will fail for lack of session proof.
    #[must_use]
    pub fn new(http: reqwest::Client, user_agent: HeaderValue) -> Self {
        Self { http, user_agent }
    }

    /// Builds a client with a cookie store and the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] for an invalid user agent and
    /// [`ClientError::Transport`] if the HTTP client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        let user_agent = HeaderValue::from_str(&config.user_agent)
            .map_err(|e| ClientError::Config(format!("invalid user_agent: {e}")))?;
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(config.timeout())
            .build()?;
        Ok(Self::new(http, user_agent))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: OutboundRequest) -> Result<ApiResponse> {
        let mut headers = request.headers;
        if !headers.contains_key(header::USER_AGENT) {
            headers.insert(header::USER_AGENT, self.user_agent.clone());
        }

        let mut builder = self
            .http
            .request(request.method, request.url.as_str())
            .headers(headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let resp = builder.send().await?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.bytes().await?;
        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}
