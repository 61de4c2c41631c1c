//! Error types for federation trust processing

use thiserror::Error;

use crate::chain::policy::PolicyError;
use crate::ports::crypto::CryptoError;
use crate::ports::http::HttpError;
use crate::ports::store::StoreError;

/// Result type alias for federation operations
pub type Result<T> = std::result::Result<T, FederationError>;

/// Main error type for federation trust processing
#[derive(Error, Debug)]
pub enum FederationError {
    /// A required claim or input was absent
    #[error("missing required attribute: {0}")]
    MissingRequiredAttribute(String),

    /// A compact JWS could not be decoded
    #[error("malformed compact JWS: {0}")]
    MalformedJws(String),

    /// Base64url decoding errors
    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No verification key in the key jar matched a JWS header
    #[error("no verification key matching JWS header for '{0}'")]
    MissingKey(String),

    /// Signature verification failed
    #[error("signature verification failed")]
    SignatureVerification,

    /// A statement or trust mark has passed its expiration time
    #[error("expired")]
    Expired,

    /// Subject mismatch between a message and its expected entity
    #[error("subject mismatch: {0}")]
    WrongSubject(String),

    /// A critical extension claim is not understood
    #[error("unknown critical extension: {0}")]
    UnknownCriticalExtension(String),

    /// The issuer of an anchor statement is not a recognized trust anchor
    #[error("unknown trust anchor: {0}")]
    UnknownTrustAnchor(String),

    /// A chain violates path-length or naming constraints
    #[error("constraint violated: {0}")]
    ConstraintViolation(String),

    /// A statement fails structural validation
    #[error("invalid statement: {0}")]
    InvalidStatement(String),

    /// Metadata policy combination or application failed
    #[error("metadata policy error: {0}")]
    Policy(#[from] PolicyError),

    /// Errors from the JWS crypto service
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Transport errors
    #[error("transport error: {0}")]
    Http(#[from] HttpError),

    /// Trust-mark store errors
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A requested record does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// The requested JWS algorithm is not supported
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Key material cannot be used
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A trust-mark delegation does not match the mark it accompanies
    #[error("trust mark delegation error: {0}")]
    Delegation(String),

    /// URL parsing errors
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}
