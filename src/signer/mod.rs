//! # Signer Module
//!
//! Every invoice request carries a `sign` field: an HMAC-SHA256 over the
//! concatenation of `currency`, `amount`, `header` and `description` (in that
//! order, no separators), keyed with the caller's API key and rendered as
//! lowercase hex.
//!
//! The amount is rendered the way [`Amount`](crate::amount::Amount) displays
//! itself, with trailing zeros stripped, so an invoice for `1000` RUB titled
//! `"invoice header"` / `"invoice number 1"` is signed over
//! `RUB1000invoice headerinvoice number 1`.
//!
//! Signatures are only produced here, never verified.
//!
//! ## Usage
//!
//! ```rust
//! use bitbanker_sdk::signer::{generate_sign, HmacSigner, Signer};
//!
//! let sign = generate_sign("message", "key").unwrap();
//! assert_eq!(
//!     sign,
//!     "6e9ef29b75fffc5b7abae527d58fdadb2fe42e7219011976917343065f58ed4a"
//! );
//!
//! let signer = HmacSigner::new("key");
//! assert_eq!(signer.sign("message").unwrap(), sign);
//! ```

pub mod error;

pub use error::SignerError;

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, Secret};
use sha2::Sha256;

use crate::model::InvoiceData;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 of `message` keyed by `key`, as lowercase hex.
///
/// # Errors
///
/// Returns [`SignerError::InvalidKey`] if the key is rejected by the MAC.
pub fn generate_sign(message: &str, key: &str) -> Result<String, SignerError> {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes())?;
    mac.update(message.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// The canonical message signed for `invoice`.
pub fn invoice_message(invoice: &InvoiceData) -> String {
    format!(
        "{}{}{}{}",
        invoice.currency(),
        invoice.amount(),
        invoice.header(),
        invoice.description()
    )
}

/// Produces request signatures.
pub trait Signer: Send + Sync {
    /// Signs an arbitrary message.
    ///
    /// # Errors
    ///
    /// Returns a `SignerError` if the signing key is unusable.
    fn sign(&self, message: &str) -> Result<String, SignerError>;

    /// Signs the canonical message of `invoice`.
    ///
    /// # Errors
    ///
    /// Returns a `SignerError` if the signing key is unusable.
    fn sign_invoice(&self, invoice: &InvoiceData) -> Result<String, SignerError> {
        self.sign(&invoice_message(invoice))
    }
}

/// [`Signer`] keyed with an API key held as a [`Secret`].
#[derive(Debug, Clone)]
pub struct HmacSigner {
    key: Secret<String>,
}

impl HmacSigner {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: Secret::new(key.into()),
        }
    }

    pub fn from_secret(key: Secret<String>) -> Self {
        Self { key }
    }
}

impl Signer for HmacSigner {
    fn sign(&self, message: &str) -> Result<String, SignerError> {
        generate_sign(message, self.key.expose_secret())
    }
}
