//! # attendance-archive
//!
//! Operator-side wiring around the `archive-sync` engine: configuration
//! loading, logging setup, the pending-upload ledger and the operations
//! behind the `archive-ctl` binary.

pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod storage;

pub use config::{AppConfig, LogConfig};
pub use error::{AppError, AppResult};
pub use storage::{LedgerData, LedgerEntry, PendingLedger, PendingLedgerState};
