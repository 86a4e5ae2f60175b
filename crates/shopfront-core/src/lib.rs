//! shopfront-core - Offline-first synchronization for point-of-sale data
//!
//! Business collections (products, invoices, ...) are kept in a local libSQL
//! database and reconciled with a remote document store whenever the device
//! is online. This crate holds the record model, both stores, connectivity
//! detection, the field-level conflict resolver, advisory item locks and the
//! sync engine used by every shopfront interface.

pub mod config;
pub mod connectivity;
pub mod db;
pub mod error;
pub mod models;
pub mod remote;
pub mod services;
pub mod state;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{Lock, LockOutcome, Record, SyncRejection, SyncReport, SyncResult};
pub use sync::{ItemLockManager, SyncEngine, SyncEvent, SyncStatusChannel};
