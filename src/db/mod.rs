//! Database access layer.
//!
//! This module provides:
//! - Connection pool lifecycle and client acquisition
//! - Connection handles (pooled or standalone)
//! - Statement execution with parameter binding
//! - Row-to-JSON normalization
//! - Transaction isolation and sequencing

pub mod executor;
pub mod handle;
pub mod params;
pub mod pool;
pub mod transaction;
pub mod types;

pub use handle::DbHandle;
pub use params::SqlParam;
pub use pool::{DbPool, PoolManager};
pub use transaction::IsolationLevel;
pub use types::JsonRow;
