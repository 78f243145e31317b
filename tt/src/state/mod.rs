//! Task persistence behind the store adapter contract
//!
//! StateManager owns the Store and processes messages via channels,
//! providing thread-safe access to persistent state.

mod manager;
mod messages;
mod traits;

pub use manager::StateManager;
pub use messages::{StateCommand, StoreError, StoreResponse};
pub use traits::TaskStore;

#[cfg(test)]
pub use traits::mock;
