//! TaskStore - persistent storage for flat JSON records
//!
//! Records are stored as JSON documents in a single SQLite database, grouped
//! by collection. Each record may expose indexed fields that can be used to
//! filter listings without deserializing every document.
//!
//! Listings always return records in insertion order, which callers rely on
//! for stable sibling ordering.

mod error;
mod record;
mod store;

pub use error::{StoreError, StoreResult};
pub use record::{Filter, FilterOp, IndexValue, Record};
pub use store::Store;

/// Current time as Unix milliseconds
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
