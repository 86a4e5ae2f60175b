//! Data models for Shopfront

mod lock;
mod record;
mod sync_result;

pub use lock::{Lock, LockOutcome, LOCK_COLLECTION, LOCK_LEASE};
pub use record::Record;
pub use sync_result::{SyncRejection, SyncReport, SyncResult};
