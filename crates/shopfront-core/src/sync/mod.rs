//! Offline-first synchronization of local collections with the remote store.

mod engine;
mod lock;
mod resolver;
mod status;


pub use engine::SyncEngine;
pub use lock::ItemLockManager;
pub use resolver::{resolve, resolve_at};
pub use status::{StatusSubscription, SubscriptionId, SyncEvent, SyncStatusChannel};
