//! Ports (interfaces) for external collaborators
//!
//! The trust-processing core only knows about these interfaces: an HTTP
//! fetcher for discovery, a JWS signing/verification service, a key-value
//! store for trust-mark persistence and a clock. Concrete implementations
//! live under `crate::adapters`.

pub mod clock;
pub mod crypto;
pub mod http;
pub mod store;

pub use clock::Clock;
pub use crypto::{CryptoError, JwsCrypto};
pub use http::{HttpClient, HttpError, HttpRequest, HttpResponse};
pub use store::{KeyValueStore, StoreError};
