//! Transport capability used by the invoice clients.
//!
//! A transport knows the API base URL, the authentication header and the
//! request timeout; the clients only hand it a path and a JSON body. Network
//! failures are reported as [`TransportError`], distinct from a received
//! response with a non-success status.
//!
//! Both traits are implemented by the reqwest-backed adapters below and by
//! [`MockTransport`](crate::mock_transport::MockTransport). Sharing one
//! transport between threads is only as safe as the transport itself; the
//! reqwest clients are internally reference-counted and safe to share.

use std::error::Error as StdError;
use std::fmt;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use secrecy::ExposeSecret;
use serde_json::Value;
use url::Url;

use crate::client::{ClientConfig, Error, API_KEY_HEADER};

/// Status code and raw body of a received HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    status: u16,
    body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn text(&self) -> &str {
        &self.body
    }

    pub fn into_text(self) -> String {
        self.body
    }

    /// Decodes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns the decoder error if the body is not valid JSON.
    pub fn json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// Failure to obtain any response: connection refused, DNS, timeout, or any
/// other fault raised by the transport itself.
#[derive(Debug)]
pub struct TransportError {
    message: String,
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl TransportError {
    /// Wraps an underlying cause, keeping it reachable through `source()`.
    pub fn new(source: impl Into<Box<dyn StdError + Send + Sync + 'static>>) -> Self {
        let source = source.into();
        Self {
            message: source.to_string(),
            source: Some(source),
        }
    }

    pub fn msg(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.source
            .as_deref()
            .and_then(|e| e.downcast_ref::<reqwest::Error>())
            .map_or(false, reqwest::Error::is_timeout)
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for TransportError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError::new(err)
    }
}

/// Blocking transport: `post` occupies the calling thread until the exchange
/// completes.
pub trait Transport: Send + Sync {
    /// POSTs `body` as JSON to `path`, relative to the configured base URL.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] when no response could be obtained.
    fn post(&self, path: &str, body: &Value) -> Result<TransportResponse, TransportError>;
}

/// Non-blocking transport: `post` suspends until the exchange completes.
#[async_trait]
pub trait AsyncTransport: Send + Sync {
    /// POSTs `body` as JSON to `path`, relative to the configured base URL.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] when no response could be obtained.
    async fn post(&self, path: &str, body: &Value) -> Result<TransportResponse, TransportError>;
}

/// Joins `path` onto the segments of `base_url`, keeping any base path
/// (e.g. `/latest/api`).
pub(crate) fn endpoint_url(base_url: &Url, path: &str) -> Result<Url, TransportError> {
    let mut url = base_url.clone();
    url.path_segments_mut()
        .map_err(|_| TransportError::msg(format!("{base_url} cannot be used as a base URL")))?
        .pop_if_empty()
        .extend(path.split('/').filter(|segment| !segment.is_empty()));
    Ok(url)
}

fn default_headers(config: &ClientConfig) -> Result<HeaderMap, Error> {
    let mut value = HeaderValue::from_str(config.api_key().expose_secret())
        .map_err(|_| Error::InvalidConfig("API key is not a valid header value".to_string()))?;
    value.set_sensitive(true);

    let name = HeaderName::from_bytes(API_KEY_HEADER.as_bytes())
        .map_err(|e| Error::InvalidConfig(format!("Invalid header name: {e}")))?;
    let mut headers = HeaderMap::new();
    headers.insert(name, value);
    Ok(headers)
}

/// [`AsyncTransport`] over a shared [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: Url,
}

impl ReqwestTransport {
    /// Builds a client carrying the API key header and the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, Error> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .default_headers(default_headers(config)?)
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::InvalidConfig(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.base_url().clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

#[async_trait]
impl AsyncTransport for ReqwestTransport {
    async fn post(&self, path: &str, body: &Value) -> Result<TransportResponse, TransportError> {
        let url = endpoint_url(&self.base_url, path)?;
        let response = self.client.post(url).json(body).send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        Ok(TransportResponse::new(status, text))
    }
}

/// [`Transport`] over a [`reqwest::blocking::Client`].
///
/// Must not be created or dropped from within an async runtime.
#[derive(Debug, Clone)]
pub struct BlockingReqwestTransport {
    client: reqwest::blocking::Client,
    base_url: Url,
}

impl BlockingReqwestTransport {
    /// Builds a client carrying the API key header and the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, Error> {
        config.validate()?;
        let client = reqwest::blocking::Client::builder()
            .default_headers(default_headers(config)?)
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::InvalidConfig(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.base_url().clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

impl Transport for BlockingReqwestTransport {
    fn post(&self, path: &str, body: &Value) -> Result<TransportResponse, TransportError> {
        let url = endpoint_url(&self.base_url, path)?;
        let response = self.client.post(url).json(body).send()?;
        let status = response.status().as_u16();
        let text = response.text()?;
        Ok(TransportResponse::new(status, text))
    }
}
