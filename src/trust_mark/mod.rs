//! Trust-mark verification, selection and issuance

pub mod entity;
pub mod source;
pub mod verifier;

pub use entity::{TrustMarkEntity, TrustMarkIssuerIndex, TrustMarkSpec};
pub use source::TrustMarksSource;
pub use verifier::TrustMarkVerifyOptions;
