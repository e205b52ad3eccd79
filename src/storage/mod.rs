//! Transaction storage.
//!
//! The engine reads historical resale transactions through the
//! [`TransactionStore`] trait. Two backends are provided:
//!
//! - [`MemoryTransactionStore`]: a `Vec` behind a `RwLock`, for tests and CSV-only runs
//! - [`SqliteTransactionStore`]: a `resale_transactions` table with town and month indexes

// Allow significant_drop_tightening - holding the connection guard for the
// whole query closure keeps the statement borrow simple.
#![allow(clippy::significant_drop_tightening)]
// Allow redundant_closure_call for the metrics-wrapped result closures.
#![allow(clippy::redundant_closure_call)]

pub mod memory;
pub mod sqlite;
pub mod traits;

pub use memory::MemoryTransactionStore;
pub use sqlite::SqliteTransactionStore;
pub use traits::TransactionStore;

use crate::Result;
use std::path::Path;
use std::sync::Arc;

/// Opens the configured store: `SQLite` when a database path is given,
/// otherwise an empty in-memory store.
///
/// # Errors
///
/// Returns an error if the `SQLite` database cannot be opened.
pub fn open_store(db_path: Option<&Path>) -> Result<Arc<dyn TransactionStore>> {
    match db_path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "Opening SQLite transaction store");
            Ok(Arc::new(SqliteTransactionStore::new(path)?))
        },
        None => Ok(Arc::new(MemoryTransactionStore::new())),
    }
}
