//! # Bitbanker SDK
//!
//! A Rust client library for the Bitbanker invoice API: builds signed invoice
//! creation requests and decodes the structured responses.
//!
//! ## Modules
//!
//! - [`amount`] - Fixed-precision, always-truncating decimal amounts
//! - [`model`] - Strictly validated request and response types
//! - [`signer`] - HMAC-SHA256 request signatures
//! - [`transport`] - Blocking and async HTTP transport capabilities
//! - [`client`] - Blocking and async invoice clients
//! - [`mock_transport`] - Scripted transport for testing
//! - [`mocks`] - `httpmock` helpers for the invoice endpoint
//!
//! ## Example
//!
//! ```rust,no_run
//! use bitbanker_sdk::{AsyncBitbankerClient, Currency, InvoiceData};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = AsyncBitbankerClient::new("api-key")?;
//! let invoice = InvoiceData::new(
//!     vec![Currency::Eth, Currency::Btc],
//!     1000,
//!     "invoice number 1",
//!     "invoice header",
//! )?;
//!
//! let created = client.create_invoice(&invoice).await?;
//! println!("Pay at {}", created.link());
//! # Ok(())
//! # }
//! ```
//!
//! Every call makes exactly one HTTP request. Failures surface as
//! [`Error::Connection`] (no response), [`Error::Response`] (non-200 status,
//! raw body kept) or [`Error::Validation`] (data that does not fit its
//! schema); nothing is retried.

pub mod amount;
pub mod client;
pub mod mock_transport;
pub mod mocks;
pub mod model;
pub mod signer;
pub mod transport;

pub use amount::{Amount, AmountConstraints, AmountError, ConstraintViolation, IntoAmount};
pub use client::{AsyncBitbankerClient, BitbankerClient, ClientConfig, Error, BASE_URL};
pub use mock_transport::MockTransport;
pub use model::{CreateInvoiceResponse, Currency, FieldError, FieldIssue, InvoiceData, ValidationError};
pub use signer::{generate_sign, HmacSigner, Signer, SignerError};
pub use transport::{AsyncTransport, Transport, TransportError, TransportResponse};
