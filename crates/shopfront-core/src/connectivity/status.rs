//! Shared online/offline flag with change notifications.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

const CHANGE_CAPACITY: usize = 16;

/// Cloneable handle to the process-wide online state.
///
/// Starts offline. Subscribers receive the new value on every transition.
#[derive(Clone)]
pub struct OnlineStatus {
    online: Arc<AtomicBool>,
    changes: broadcast::Sender<bool>,
}

impl OnlineStatus {
    pub fn new(online: bool) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            online: Arc::new(AtomicBool::new(online)),
            changes,
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Record the current state; returns `true` when it changed.
    pub fn set_online(&self, online: bool) -> bool {
        let previous = self.online.swap(online, Ordering::SeqCst);
        if previous == online {
            return false;
        }

        tracing::info!("Connectivity changed: {}", if online { "online" } else { "offline" });
        // Nobody listening is fine.
        let _ = self.changes.send(online);
        true
    }

    /// Listen for online/offline transitions
    pub fn subscribe(&self) -> broadcast::Receiver<bool> {
        self.changes.subscribe()
    }
}

impl Default for OnlineStatus {
    fn default() -> Self {
        Self::new(false)
    }
}

impl std::fmt::Debug for OnlineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnlineStatus")
            .field("online", &self.is_online())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_offline_and_reports_changes() {
        let status = OnlineStatus::default();
        assert!(!status.is_online());

        assert!(status.set_online(true));
        assert!(!status.set_online(true));
        assert!(status.is_online());
    }

    #[test]
    fn clones_share_state() {
        let status = OnlineStatus::default();
        let clone = status.clone();
        let mut changes = clone.subscribe();

        status.set_online(true);
        assert!(clone.is_online());
        assert!(changes.try_recv().unwrap());
    }
}
