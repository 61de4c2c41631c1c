//! Clock port
//!
//! Time reads go through this interface so evaluation times can be pinned
//! in tests.

/// Source of the current time as Unix seconds
pub trait Clock: Send + Sync {
    /// Current time in seconds since the Unix epoch
    fn now(&self) -> i64;
}
