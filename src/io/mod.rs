//! Ingestion tooling.
//!
//! Loads the public HDB resale-price CSV exports into a [`TransactionStore`].
//! Query paths never write; this module is the only producer of records.
//!
//! ```rust,ignore
//! use launchgap::io::import_csv_file;
//! use launchgap::storage::SqliteTransactionStore;
//!
//! let store = SqliteTransactionStore::new("resale.db")?;
//! let report = import_csv_file("resale-flat-prices.csv".as_ref(), &store)?;
//! println!("imported {} of {}", report.imported, report.read);
//! ```
//!
//! [`TransactionStore`]: crate::storage::TransactionStore

pub mod csv;

pub use self::csv::{ImportReport, ResaleCsvSource, import_csv, import_csv_file, parse_storey_range};
