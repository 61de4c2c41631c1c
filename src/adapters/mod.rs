//! Adapters: concrete implementations of the ports
//!
//! The default JWS crypto service, system and fixed clocks, in-memory
//! HTTP/store backends for tests and embedding, and the file-backed
//! trust-mark store.

pub mod abfile;
pub mod clock;
pub mod crypto;
pub mod in_memory;

pub use abfile::AbFileStore;
pub use clock::{FixedClock, SystemClock};
pub use crypto::DefaultCrypto;
pub use in_memory::{InMemoryHttpClient, InMemoryStore};
