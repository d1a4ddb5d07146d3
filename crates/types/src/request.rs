//! Request descriptions and raw responses exchanged with the platform API.

use crate::{ClientError, Credential, error::Result};
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header};
use serde::{Serialize, de::DeserializeOwned};

/// A method/path/body description of an API call, independent of any credential.
///
/// The same spec is sent once, and at most once more after credential renewal,
/// so it is cheap to clone (`Bytes` body).
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: Method,
    /// Path relative to the configured base URL, e.g. `/courses/3`.
    pub path: String,
    /// Pre-encoded query string without the leading `?`.
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl RequestSpec {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Serialize `body` as the JSON request body.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Serialization`] if `body` cannot be serialized.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        let bytes = serde_json::to_vec(body)?;
        self.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        self.body = Some(Bytes::from(bytes));
        Ok(self)
    }

    /// Encode `params` as the query string.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Query`] if `params` is not a flat key/value shape.
    pub fn query<T: Serialize + ?Sized>(mut self, params: &T) -> Result<Self> {
        let encoded = serde_urlencoded::to_string(params)?;
        self.query = (!encoded.is_empty()).then_some(encoded);
        Ok(self)
    }

    /// Add a static header.
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Build the wire request against `base_url`, attaching `credential` as a
    /// bearer `Authorization` header when present.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Auth`] if the credential contains bytes that are
    /// not valid in a header value.
    pub fn to_outbound(
        &self,
        base_url: &str,
        credential: Option<&Credential>,
    ) -> Result<OutboundRequest> {
        let mut url = join_url(base_url, &self.path);
        if let Some(q) = &self.query {
            url.push('?');
            url.push_str(q);
        }

        let mut headers = self.headers.clone();
        if let Some(c) = credential {
            let value = HeaderValue::from_str(&c.bearer())
                .map_err(|_| ClientError::Auth("credential is not a valid header value".into()))?;
            headers.insert(header::AUTHORIZATION, value);
        } else {
            headers.remove(header::AUTHORIZATION);
        }

        Ok(OutboundRequest {
            method: self.method.clone(),
            url,
            headers,
            body: self.body.clone(),
        })
    }
}

fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if path.is_empty() {
        base.to_string()
    } else if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

/// A fully resolved request ready for a single network round trip.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl OutboundRequest {
    /// The bearer token carried by this request, if any.
    #[must_use]
    pub fn bearer_token(&self) -> Option<&str> {
        self.headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
    }
}

/// A response that completed an HTTP round trip, whatever its status.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Whether the server rejected the attached credential.
    #[must_use]
    pub fn is_credential_rejected(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED
    }

    /// Body as lossy UTF-8.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Deserialize the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Serialization`] if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Convert a non-success status into an error.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::CredentialRejected`] for 401 and
    /// [`ClientError::Http`] for every other non-2xx status.
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else if self.is_credential_rejected() {
            Err(ClientError::CredentialRejected)
        } else {
            Err(ClientError::Http {
                status: self.status.as_u16(),
                body: self.text(),
            })
        }
    }
}
