// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod compare;
pub mod compose;
pub mod config;
pub mod error;
pub mod evaluate;
pub mod extract;
pub mod feed;
pub mod monitor;
pub mod notify;
pub mod source;
pub mod state;
pub mod table;
pub mod telemetry;

// ---- Re-exports for stable public API ----
pub use crate::config::{AlertsConfig, Chamber};
pub use crate::error::{CheckError, StateError};
pub use crate::monitor::{Monitor, RunReport};
pub use crate::notify::{AlertDispatcher, Recipients};
pub use crate::state::{PersistedState, SourceKey, StateStore, StoredValue};
