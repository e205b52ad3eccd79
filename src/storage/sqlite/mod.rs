//! `SQLite` transaction store.
//!
//! - [`connection`]: lock acquisition with poison recovery, connection pragmas
//! - [`metrics`]: per-operation counters and latency histograms
//! - [`transaction_store`]: the [`SqliteTransactionStore`] backend

mod connection;
mod metrics;
mod transaction_store;

pub use connection::{acquire_lock, configure_connection};
pub use metrics::{record_operation_metrics, status_of};
pub use transaction_store::SqliteTransactionStore;
