use thiserror::Error;

/// Errors raised while producing a request signature.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignerError {
    /// The API key cannot be used as an HMAC key.
    ///
    /// HMAC accepts keys of any length, so this only surfaces if the
    /// underlying MAC implementation changes its key requirements.
    #[error("Invalid signing key: {0}")]
    InvalidKey(String),
}

impl From<hmac::digest::InvalidLength> for SignerError {
    fn from(err: hmac::digest::InvalidLength) -> Self {
        SignerError::InvalidKey(err.to_string())
    }
}
