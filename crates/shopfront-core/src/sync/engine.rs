//! Offline-first reconciliation of local snapshots with the remote store.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::resolver;
use super::status::{StatusSubscription, SyncEvent, SyncStatusChannel};
use crate::config::SyncSettings;
use crate::connectivity::OnlineStatus;
use crate::db::LocalCollectionStore;
use crate::models::{Record, SyncRejection, SyncReport, SyncResult};
use crate::remote::RemoteCollectionStore;
use crate::state::SyncPhase;
use crate::Result;

/// Reconciles every configured collection between a local and a remote store.
///
/// At most one run is in flight; concurrent requests are rejected, not
/// queued. Collections are processed one after another in configuration
/// order, and a failure in one collection never aborts the others.
pub struct SyncEngine<L, R> {
    local: L,
    remote: R,
    collections: Vec<String>,
    online: OnlineStatus,
    status: SyncStatusChannel,
    is_syncing: AtomicBool,
    last_sync_time: RwLock<Option<DateTime<Utc>>>,
    auto_sync: Mutex<Option<JoinHandle<()>>>,
}

impl<L: LocalCollectionStore, R: RemoteCollectionStore> SyncEngine<L, R> {
    pub fn new(local: L, remote: R, online: OnlineStatus, settings: &SyncSettings) -> Self {
        Self {
            local,
            remote,
            collections: settings.collections.clone(),
            online,
            status: SyncStatusChannel::new(),
            is_syncing: AtomicBool::new(false),
            last_sync_time: RwLock::new(None),
            auto_sync: Mutex::new(None),
        }
    }

    pub const fn local(&self) -> &L {
        &self.local
    }

    pub const fn remote(&self) -> &R {
        &self.remote
    }

    pub fn collections(&self) -> &[String] {
        &self.collections
    }

    pub const fn online_status(&self) -> &OnlineStatus {
        &self.online
    }

    /// Channel carrying `Started`/`Progress`/`Completed` events
    pub fn status_channel(&self) -> SyncStatusChannel {
        self.status.clone()
    }

    /// Shorthand for `status_channel().subscribe()`
    pub fn subscribe(&self) -> StatusSubscription {
        self.status.subscribe()
    }

    pub fn phase(&self) -> SyncPhase {
        if self.is_syncing.load(Ordering::SeqCst) {
            SyncPhase::Syncing
        } else {
            SyncPhase::Idle
        }
    }

    /// Completion time of the last finished run
    pub fn last_sync_time(&self) -> Option<DateTime<Utc>> {
        *self
            .last_sync_time
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Reload the persisted last sync time from the local store.
    pub async fn restore_last_sync_time(&self) {
        match self.local.last_sync_time().await {
            Ok(stored) => self.set_last_sync_time(stored),
            Err(error) => tracing::warn!("Failed to load last sync time: {}", error),
        }
    }

    fn set_last_sync_time(&self, at: Option<DateTime<Utc>>) {
        *self
            .last_sync_time
            .write()
            .unwrap_or_else(PoisonError::into_inner) = at;
    }

    /// Run one reconciliation pass over every configured collection.
    ///
    /// Returns a rejected report without touching any store when offline or
    /// when another run is in progress.
    pub async fn perform_sync(&self) -> SyncReport {
        if !self.online.is_online() {
            tracing::info!("Skipping sync: offline");
            return SyncReport::rejected(SyncRejection::Offline);
        }
        if self
            .is_syncing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::info!("Skipping sync: another sync is in progress");
            return SyncReport::rejected(SyncRejection::AlreadySyncing);
        }
        let _syncing = SyncingGuard(&self.is_syncing);

        tracing::info!("Sync started for {} collections", self.collections.len());
        self.status.publish(&SyncEvent::Started);

        let mut results = BTreeMap::new();
        for collection in &self.collections {
            let result = match self.sync_collection(collection).await {
                Ok(result) => result,
                Err(error) => {
                    tracing::warn!("Sync of collection '{}' failed: {}", collection, error);
                    SyncResult::failed(error.to_string())
                }
            };
            self.status.publish(&SyncEvent::Progress {
                collection: collection.clone(),
                uploaded: result.uploaded,
                downloaded: result.downloaded,
                conflicts: result.conflicts,
            });
            results.insert(collection.clone(), result);
        }

        let finished_at = Utc::now();
        self.set_last_sync_time(Some(finished_at));
        if let Err(error) = self.local.set_last_sync_time(finished_at).await {
            tracing::warn!("Failed to persist last sync time: {}", error);
        }

        let report = SyncReport::completed(results, finished_at);
        let totals = report.totals();
        tracing::info!(
            "Sync completed (success: {}): {} uploaded, {} downloaded, {} conflicts, {} resolved",
            report.success,
            totals.uploaded,
            totals.downloaded,
            totals.conflicts,
            totals.resolved
        );
        self.status.publish(&SyncEvent::Completed {
            success: report.success,
            timestamp: report.timestamp,
            results: report.results.clone(),
        });
        report
    }

    /// Reconcile one collection and replace its local snapshot.
    ///
    /// A remote read failure yields a failed zero-count result; a failed
    /// upload skips that record only.
    async fn sync_collection(&self, name: &str) -> Result<SyncResult> {
        let mut result = SyncResult::default();

        let mut local_by_id = BTreeMap::new();
        for record in self.local.get(name).await? {
            if record.has_valid_id() {
                local_by_id.insert(record.id.clone(), record);
            } else {
                result.skipped += 1;
            }
        }
        if result.skipped > 0 {
            tracing::warn!(
                "Dropped {} local '{}' records without an id; they will not be synced",
                result.skipped,
                name
            );
        }

        let remote_records = match self.remote.list_all(name).await {
            Ok(records) => records,
            Err(error) => {
                tracing::warn!("Could not read remote '{}': {}", name, error);
                return Ok(SyncResult::failed(format!("remote read failed: {error}")));
            }
        };
        let mut remote_by_id = BTreeMap::new();
        for record in remote_records {
            if record.has_valid_id() {
                remote_by_id.insert(record.id.clone(), record);
            } else {
                tracing::debug!("Ignoring remote '{}' document without an id", name);
            }
        }

        let mut snapshot: Vec<Record> = Vec::with_capacity(local_by_id.len() + remote_by_id.len());
        for (id, local) in &local_by_id {
            match remote_by_id.get(id) {
                None => {
                    match self.remote.put_one(name, local).await {
                        Ok(()) => result.uploaded += 1,
                        Err(error) => {
                            tracing::warn!("Upload of '{}/{}' failed: {}", name, id, error);
                        }
                    }
                    snapshot.push(local.clone());
                }
                Some(remote) if remote.updated_at == local.updated_at => {
                    snapshot.push(local.clone());
                }
                Some(remote) => {
                    result.conflicts += 1;
                    let merged = resolver::resolve(local, remote);
                    match self.remote.put_one(name, &merged).await {
                        Ok(()) => result.resolved += 1,
                        Err(error) => {
                            tracing::warn!(
                                "Push of merged '{}/{}' failed: {}",
                                name,
                                id,
                                error
                            );
                        }
                    }
                    snapshot.push(merged);
                }
            }
        }

        for (id, remote) in remote_by_id {
            if !local_by_id.contains_key(&id) {
                result.downloaded += 1;
                snapshot.push(remote);
            }
        }

        snapshot.sort_by(|left, right| left.id.cmp(&right.id));
        self.local.put(name, &snapshot).await?;

        tracing::debug!(
            "Collection '{}': {} uploaded, {} downloaded, {} conflicts, {} resolved",
            name,
            result.uploaded,
            result.downloaded,
            result.conflicts,
            result.resolved
        );
        Ok(result)
    }
}

impl<L, R> SyncEngine<L, R>
where
    L: LocalCollectionStore + 'static,
    R: RemoteCollectionStore + 'static,
{
    /// Restore persisted state and begin syncing on every offline→online transition.
    ///
    /// Calling `start` again replaces the previous listener.
    pub async fn start(self: &Arc<Self>) {
        self.restore_last_sync_time().await;

        let mut changes = self.online.subscribe();
        let engine = Arc::clone(self);
        let task = tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(true) => engine.sync_after_reconnect().await,
                    Ok(false) => {}
                    Err(broadcast::error::RecvError::Lagged(_)) => {
                        if engine.online.is_online() {
                            engine.sync_after_reconnect().await;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        let previous = self
            .auto_sync
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Stop reacting to connectivity changes. A run already in progress is not interrupted.
    pub fn shutdown(&self) {
        let task = self
            .auto_sync
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
        }
    }

    async fn sync_after_reconnect(&self) {
        tracing::info!("Back online, starting automatic sync");
        let report = self.perform_sync().await;
        if let Some(reason) = report.rejected {
            tracing::debug!("Automatic sync not started: {}", reason);
        }
    }
}

/// Clears the in-flight flag when a run ends, however it ends.
struct SyncingGuard<'a>(&'a AtomicBool);

impl Drop for SyncingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
