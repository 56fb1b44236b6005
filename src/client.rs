use std::env;
use std::time::Duration;

use secrecy::{ExposeSecret, Secret};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::model::{CreateInvoiceResponse, FieldIssue, InvoiceData, ValidationError};
use crate::signer::{HmacSigner, Signer, SignerError};
use crate::transport::{
    AsyncTransport, BlockingReqwestTransport, ReqwestTransport, Transport, TransportError,
    TransportResponse,
};

/// Production API root.
pub const BASE_URL: &str = "https://api.aws.bitbanker.org/latest/api";

/// Invoice creation endpoint, relative to the base URL.
pub const INVOICES_PATH: &str = "/v1/invoices";

/// Header carrying the API key on every request.
pub const API_KEY_HEADER: &str = "X-API-KEY";

/// Per-request timeout applied by the default transports.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 5;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Missing {0} environment variable")]
    MissingEnvVar(String),
    #[error("Invalid client configuration: {0}")]
    InvalidConfig(String),
    #[error("Failed to parse url: {0}")]
    UrlParse(#[from] url::ParseError),
    /// No response was obtained; the transport failure is kept as the source.
    #[error("Bitbanker connection failed: {0}")]
    Connection(#[from] TransportError),
    /// A response arrived with a status other than 200; `body` is verbatim.
    #[error("Bitbanker request failed with status {status}: {body}")]
    Response { status: u16, body: String },
    /// Request or response data did not match its schema.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Failed to sign request: {0}")]
    Signing(#[from] SignerError),
    #[error("Failed to serialize request: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn is_connection(&self) -> bool {
        matches!(self, Error::Connection(_))
    }

    pub fn is_response(&self) -> bool {
        matches!(self, Error::Response { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    /// Raw body of a non-200 response.
    pub fn response_body(&self) -> Option<&str> {
        match self {
            Error::Response { body, .. } => Some(body),
            _ => None,
        }
    }
}

/// Settings shared by the default transports.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    api_key: Secret<String>,
    base_url: Url,
    timeout_seconds: u64,
}

impl ClientConfig {
    /// Creates a configuration for the production API with the default timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the built-in base URL cannot be parsed.
    pub fn new(api_key: impl Into<String>) -> Result<Self, Error> {
        Ok(Self {
            api_key: Secret::new(api_key.into()),
            base_url: Url::parse(BASE_URL)?,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        })
    }

    /// Creates a configuration from environment variables.
    ///
    /// Environment variables:
    /// - `BITBANKER_API_KEY`: API key (required)
    /// - `BITBANKER_API_BASE_URL`: API root (default: the production URL)
    /// - `BITBANKER_TIMEOUT_SECONDS`: per-request timeout (default: 5)
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is missing or any variable holds an
    /// invalid value.
    pub fn from_env() -> Result<Self, Error> {
        let api_key = env::var("BITBANKER_API_KEY")
            .map_err(|_| Error::MissingEnvVar("BITBANKER_API_KEY".to_string()))?;

        let timeout_seconds = match env::var("BITBANKER_TIMEOUT_SECONDS") {
            Ok(val) => val.parse::<u64>().map_err(|e| {
                Error::InvalidConfig(format!("Invalid BITBANKER_TIMEOUT_SECONDS: {}", e))
            })?,
            Err(_) => DEFAULT_TIMEOUT_SECONDS,
        };

        let config = Self {
            api_key: Secret::new(api_key),
            base_url: get_bitbanker_api_base_url()?,
            timeout_seconds,
        };
        config.validate()?;
        Ok(config)
    }

    /// Loads a `.env` file if one exists, then reads [`ClientConfig::from_env`].
    ///
    /// # Errors
    ///
    /// Same as [`ClientConfig::from_env`].
    pub fn from_dotenv() -> Result<Self, Error> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// Points the client at a different API root (a sandbox or a mock server).
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for an empty API key, a zero timeout or
    /// a base URL that cannot carry a path.
    pub fn validate(&self) -> Result<(), Error> {
        if self.api_key.expose_secret().is_empty() {
            return Err(Error::InvalidConfig("API key must not be empty".to_string()));
        }
        if self.timeout_seconds == 0 {
            return Err(Error::InvalidConfig(
                "timeout_seconds must be greater than 0".to_string(),
            ));
        }
        if self.base_url.cannot_be_a_base() {
            return Err(Error::InvalidConfig(format!(
                "{} cannot be used as a base URL",
                self.base_url
            )));
        }
        Ok(())
    }

    pub fn api_key(&self) -> &Secret<String> {
        &self.api_key
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

fn get_bitbanker_api_base_url() -> Result<Url, Error> {
    let url_str = env::var("BITBANKER_API_BASE_URL").unwrap_or_else(|_| BASE_URL.to_string());
    Url::parse(&url_str).map_err(Error::from)
}

/// Wire body of an invoice creation request: the invoice fields plus `sign`.
#[derive(Serialize)]
struct InvoicePayload<'a> {
    #[serde(flatten)]
    invoice: &'a InvoiceData,
    sign: String,
}

/// The parts of invoice creation that do not depend on how the transport
/// is awaited.
#[derive(Debug, Clone)]
struct InvoiceEndpoint {
    signer: HmacSigner,
}

impl InvoiceEndpoint {
    fn new(api_key: Secret<String>) -> Self {
        Self {
            signer: HmacSigner::from_secret(api_key),
        }
    }

    fn request_body(&self, invoice: &InvoiceData) -> Result<Value, Error> {
        let sign = self.signer.sign_invoice(invoice)?;
        tracing::debug!(
            "Signed invoice request for {} {}",
            invoice.amount(),
            invoice.currency()
        );
        let body = serde_json::to_value(InvoicePayload { invoice, sign })?;
        Ok(body)
    }

    fn parse_outcome(
        outcome: Result<TransportResponse, TransportError>,
    ) -> Result<CreateInvoiceResponse, Error> {
        let response = outcome.map_err(|e| {
            tracing::warn!("Invoice request to {} failed: {}", INVOICES_PATH, e);
            Error::Connection(e)
        })?;

        let status = response.status();
        tracing::debug!("Invoice request to {} returned {}", INVOICES_PATH, status);
        if status != 200 {
            tracing::warn!("Invoice creation rejected with status {}", status);
            return Err(Error::Response {
                status,
                body: response.into_text(),
            });
        }

        let value = response.json().map_err(|e| {
            ValidationError::single(
                CreateInvoiceResponse::MODEL,
                "__root__",
                FieldIssue::InvalidJson(e.to_string()),
            )
        })?;
        let invoice = CreateInvoiceResponse::try_from(value)?;
        tracing::info!("Invoice {} created", invoice.id());
        Ok(invoice)
    }
}

/// Blocking invoice client.
///
/// Each call makes exactly one request; failures are returned, never retried.
#[derive(Debug, Clone)]
pub struct BitbankerClient<T = BlockingReqwestTransport> {
    transport: T,
    endpoint: InvoiceEndpoint,
}

#[allow(clippy::missing_errors_doc)]
impl BitbankerClient {
    /// Creates a client for the production API.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is empty or not a valid header value.
    pub fn new(api_key: impl Into<String>) -> Result<Self, Error> {
        Self::with_config(ClientConfig::new(api_key)?)
    }

    pub fn with_config(config: ClientConfig) -> Result<Self, Error> {
        let transport = BlockingReqwestTransport::new(&config)?;
        Ok(Self {
            transport,
            endpoint: InvoiceEndpoint::new(config.api_key),
        })
    }

    /// Creates a client from `BITBANKER_*` environment variables.
    pub fn from_env() -> Result<Self, Error> {
        Self::with_config(ClientConfig::from_env()?)
    }
}

impl<T: Transport> BitbankerClient<T> {
    /// Creates a client over a caller-supplied transport.
    ///
    /// The transport is expected to add the API key header itself.
    pub fn with_transport(api_key: impl Into<String>, transport: T) -> Self {
        Self {
            transport,
            endpoint: InvoiceEndpoint::new(Secret::new(api_key.into())),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Creates an invoice.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The transport fails before a response arrives ([`Error::Connection`])
    /// - The API answers with a status other than 200 ([`Error::Response`])
    /// - The response body does not match [`CreateInvoiceResponse`]
    ///   ([`Error::Validation`])
    pub fn create_invoice(&self, invoice: &InvoiceData) -> Result<CreateInvoiceResponse, Error> {
        let body = self.endpoint.request_body(invoice)?;
        tracing::debug!("Sending POST {}", INVOICES_PATH);
        InvoiceEndpoint::parse_outcome(self.transport.post(INVOICES_PATH, &body))
    }
}

/// Non-blocking invoice client.
///
/// `create_invoice` only suspends while the transport is in flight. Each call
/// makes exactly one request; failures are returned, never retried.
#[derive(Debug, Clone)]
pub struct AsyncBitbankerClient<T = ReqwestTransport> {
    transport: T,
    endpoint: InvoiceEndpoint,
}

#[allow(clippy::missing_errors_doc)]
impl AsyncBitbankerClient {
    /// Creates a client for the production API.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is empty or not a valid header value.
    pub fn new(api_key: impl Into<String>) -> Result<Self, Error> {
        Self::with_config(ClientConfig::new(api_key)?)
    }

    pub fn with_config(config: ClientConfig) -> Result<Self, Error> {
        let transport = ReqwestTransport::new(&config)?;
        Ok(Self {
            transport,
            endpoint: InvoiceEndpoint::new(config.api_key),
        })
    }

    /// Creates a client from `BITBANKER_*` environment variables.
    pub fn from_env() -> Result<Self, Error> {
        Self::with_config(ClientConfig::from_env()?)
    }
}

impl<T: AsyncTransport> AsyncBitbankerClient<T> {
    /// Creates a client over a caller-supplied transport.
    ///
    /// The transport is expected to add the API key header itself.
    pub fn with_transport(api_key: impl Into<String>, transport: T) -> Self {
        Self {
            transport,
            endpoint: InvoiceEndpoint::new(Secret::new(api_key.into())),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Creates an invoice.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The transport fails before a response arrives ([`Error::Connection`])
    /// - The API answers with a status other than 200 ([`Error::Response`])
    /// - The response body does not match [`CreateInvoiceResponse`]
    ///   ([`Error::Validation`])
    pub async fn create_invoice(
        &self,
        invoice: &InvoiceData,
    ) -> Result<CreateInvoiceResponse, Error> {
        let body = self.endpoint.request_body(invoice)?;
        tracing::debug!("Sending POST {}", INVOICES_PATH);
        let outcome = self.transport.post(INVOICES_PATH, &body).await;
        InvoiceEndpoint::parse_outcome(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Currency;
    use crate::signer::generate_sign;
    use serde_json::json;

    fn invoice() -> InvoiceData {
        InvoiceData::new(
            vec![Currency::Eth, Currency::Btc],
            1000,
            "invoice number 1",
            "invoice header",
        )
        .unwrap()
    }

    #[test]
    fn test_client_config_defaults() {
        let config = ClientConfig::new("key").unwrap();
        assert_eq!(config.base_url().as_str(), BASE_URL);
        assert_eq!(config.timeout_seconds(), 5);
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_client_config_validation() {
        let config = ClientConfig::new("key").unwrap().with_timeout(0);
        assert!(config
            .validate()
            .unwrap_err()
            .to_string()
            .contains("timeout_seconds must be greater than 0"));

        let config = ClientConfig::new("").unwrap();
        assert!(config.validate().is_err());

        let config = ClientConfig::new("key")
            .unwrap()
            .with_base_url(Url::parse("mailto:ops@example.org").unwrap());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_client_config_debug_redacts_key() {
        let config = ClientConfig::new("very-secret").unwrap();
        assert!(!format!("{:?}", config).contains("very-secret"));
    }

    #[test]
    fn test_request_body_shape() {
        let endpoint = InvoiceEndpoint::new(Secret::new("key".to_string()));
        let body = endpoint.request_body(&invoice()).unwrap();

        let expected_sign =
            generate_sign("RUB1000invoice headerinvoice number 1", "key").unwrap();
        assert_eq!(
            body,
            json!({
                "payment_currencies": ["ETH", "BTC"],
                "currency": "RUB",
                "amount": 1000.0,
                "description": "invoice number 1",
                "header": "invoice header",
                "is_convert_payments": false,
                "sign": expected_sign,
            })
        );
    }

    #[test]
    fn test_request_body_includes_data() {
        let endpoint = InvoiceEndpoint::new(Secret::new("key".to_string()));
        let mut data = serde_json::Map::new();
        data.insert("id".to_string(), json!(1234));
        let body = endpoint
            .request_body(&invoice().with_data(data).with_convert_payments(true))
            .unwrap();
        assert_eq!(body["data"], json!({"id": 1234}));
        assert_eq!(body["is_convert_payments"], json!(true));
    }

    #[test]
    fn test_parse_outcome_maps_status() {
        let err = InvoiceEndpoint::parse_outcome(Ok(TransportResponse::new(
            500,
            "Internal Server Error",
        )))
        .unwrap_err();
        assert!(err.is_response());
        assert_eq!(err.response_body(), Some("Internal Server Error"));

        let err = InvoiceEndpoint::parse_outcome(Ok(TransportResponse::new(201, "{}")))
            .unwrap_err();
        assert!(err.is_response());
    }

    #[test]
    fn test_parse_outcome_invalid_json_is_validation_error() {
        let err = InvoiceEndpoint::parse_outcome(Ok(TransportResponse::new(200, "<html>")))
            .unwrap_err();
        match err {
            Error::Validation(e) => {
                assert!(matches!(e.issue_for("__root__"), Some(FieldIssue::InvalidJson(_))))
            }
            other => panic!("Expected Validation error, got: {:?}", other),
        }
    }

    #[test]
    fn test_parse_outcome_transport_error() {
        let err = InvoiceEndpoint::parse_outcome(Err(TransportError::msg("connection refused")))
            .unwrap_err();
        assert!(err.is_connection());
        assert_eq!(
            err.to_string(),
            "Bitbanker connection failed: connection refused"
        );
    }
}
