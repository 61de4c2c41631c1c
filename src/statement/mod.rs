//! Entity-statement factory

pub mod create;

pub use create::{
    EntityConfigurationOptions, StatementSigner, SubordinateOptions, TrustMarkOptions,
    DEFAULT_LIFETIME,
};
