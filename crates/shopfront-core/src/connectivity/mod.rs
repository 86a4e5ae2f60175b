//! Online/offline detection.
//!
//! `ConnectivityMonitor` races lightweight probes against several well-known
//! hosts and records the answer in a shared `OnlineStatus`. Probe failures
//! only ever push the answer toward "offline"; they are never fatal.

mod status;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::{JoinHandle, JoinSet};

use crate::config::SyncSettings;

pub use status::OnlineStatus;

/// A single failed probe
#[derive(Debug, Error)]
pub enum ConnectivityError {
    #[error("probe to {target} failed: {reason}")]
    Unreachable { target: String, reason: String },
    #[error("probe to {0} timed out")]
    TimedOut(String),
    #[error("failed to build probe client: {0}")]
    Client(String),
}

/// Checks whether one host is reachable.
pub trait ConnectivityProbe: Send + Sync + 'static {
    fn probe(&self, target: &str) -> impl Future<Output = Result<(), ConnectivityError>> + Send;
}

/// Probe issuing an HTTP `HEAD` request; any response counts as reachable.
#[derive(Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new() -> Result<Self, ConnectivityError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|error| ConnectivityError::Client(error.to_string()))?;
        Ok(Self { client })
    }
}

impl ConnectivityProbe for HttpProbe {
    async fn probe(&self, target: &str) -> Result<(), ConnectivityError> {
        self.client
            .head(target)
            .send()
            .await
            .map(|_| ())
            .map_err(|error| ConnectivityError::Unreachable {
                target: target.to_string(),
                reason: error.to_string(),
            })
    }
}

/// Periodic and on-demand connectivity checks feeding an `OnlineStatus`.
pub struct ConnectivityMonitor<P> {
    probe: Arc<P>,
    targets: Vec<String>,
    probe_timeout: Duration,
    overall_timeout: Duration,
    status: OnlineStatus,
}

impl<P: ConnectivityProbe> ConnectivityMonitor<P> {
    pub fn new(probe: P, settings: &SyncSettings, status: OnlineStatus) -> Self {
        Self {
            probe: Arc::new(probe),
            targets: settings.probe_targets.clone(),
            probe_timeout: settings.probe_timeout(),
            overall_timeout: settings.probe_overall_timeout(),
            status,
        }
    }

    /// Shared online state updated by this monitor
    pub const fn status(&self) -> &OnlineStatus {
        &self.status
    }

    /// Run one check and record the answer.
    ///
    /// Call this on navigation or other transition events in addition to the
    /// periodic loop. Listeners are notified only when the state flips.
    pub async fn check_connectivity(&self) -> bool {
        let online = self.probe_all().await;
        self.status.set_online(online);
        online
    }

    /// Race every probe target; `true` on the first success.
    ///
    /// Resolves `false` once all probes failed or the overall timeout
    /// elapsed. Outstanding probes are aborted as soon as the answer is known.
    pub async fn probe_all(&self) -> bool {
        if self.targets.is_empty() {
            return false;
        }

        let mut probes = JoinSet::new();
        for target in &self.targets {
            let probe = Arc::clone(&self.probe);
            let target = target.clone();
            let per_probe = self.probe_timeout;
            probes.spawn(async move {
                match tokio::time::timeout(per_probe, probe.probe(&target)).await {
                    Ok(Ok(())) => Ok(target),
                    Ok(Err(error)) => Err(error),
                    Err(_) => Err(ConnectivityError::TimedOut(target)),
                }
            });
        }

        let race = async {
            while let Some(joined) = probes.join_next().await {
                match joined {
                    Ok(Ok(target)) => {
                        tracing::debug!("Connectivity probe to {} succeeded", target);
                        return true;
                    }
                    Ok(Err(error)) => tracing::debug!("{}", error),
                    Err(error) => tracing::debug!("Connectivity probe task failed: {}", error),
                }
            }
            false
        };

        let online = tokio::time::timeout(self.overall_timeout, race)
            .await
            .unwrap_or_else(|_| {
                tracing::debug!(
                    "Connectivity check timed out after {:?}",
                    self.overall_timeout
                );
                false
            });
        probes.abort_all();
        online
    }

    /// Check immediately, then every `interval`, until the handle is stopped.
    pub fn spawn(self: Arc<Self>, interval: Duration) -> MonitorHandle {
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.check_connectivity().await;
            }
        });
        MonitorHandle { task }
    }
}

/// Running background connectivity loop
pub struct MonitorHandle {
    task: JoinHandle<()>,
}

impl MonitorHandle {
    pub fn stop(self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Behaviour keyed by the target name: `ok*` succeed, `slow*` succeed
    /// after a delay, `hang*` never answer, anything else fails.
    #[derive(Default)]
    struct ScriptedProbe {
        calls: AtomicUsize,
    }

    impl ConnectivityProbe for ScriptedProbe {
        async fn probe(&self, target: &str) -> Result<(), ConnectivityError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if target.starts_with("ok") {
                Ok(())
            } else if target.starts_with("slow") {
                tokio::time::sleep(Duration::from_millis(30)).await;
                Ok(())
            } else if target.starts_with("hang") {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            } else {
                Err(ConnectivityError::Unreachable {
                    target: target.to_string(),
                    reason: "connection refused".to_string(),
                })
            }
        }
    }

    fn monitor(
        targets: &[&str],
        per_probe_ms: u64,
        overall_ms: u64,
    ) -> ConnectivityMonitor<ScriptedProbe> {
        let settings = SyncSettings {
            probe_targets: targets.iter().map(ToString::to_string).collect(),
            probe_timeout_ms: per_probe_ms,
            probe_overall_timeout_ms: overall_ms,
            ..SyncSettings::default()
        };
        ConnectivityMonitor::new(ScriptedProbe::default(), &settings, OnlineStatus::default())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn first_success_wins_over_failures() {
        let monitor = monitor(&["down-a", "slow-b", "down-c"], 500, 1_000);
        assert!(monitor.check_connectivity().await);
        assert!(monitor.status().is_online());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn all_failures_mean_offline() {
        let monitor = monitor(&["down-a", "down-b"], 500, 1_000);
        assert!(!monitor.check_connectivity().await);
        assert!(!monitor.status().is_online());
        assert_eq!(monitor.probe.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn hanging_probes_hit_the_per_probe_timeout() {
        let monitor = monitor(&["hang-a", "hang-b"], 50, 1_000);
        let started = std::time::Instant::now();
        assert!(!monitor.probe_all().await);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn overall_timeout_bounds_the_check() {
        let monitor = monitor(&["hang-a"], 100, 100);
        let started = std::time::Instant::now();
        assert!(!monitor.probe_all().await);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn transitions_notify_listeners_once() {
        let monitor = monitor(&["ok-a"], 500, 1_000);
        let mut changes = monitor.status().subscribe();

        monitor.check_connectivity().await;
        monitor.check_connectivity().await;

        assert!(changes.recv().await.unwrap());
        assert!(changes.try_recv().is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn spawned_loop_updates_status() {
        let monitor = Arc::new(monitor(&["ok-a"], 500, 1_000));
        let mut changes = monitor.status().subscribe();

        let handle = Arc::clone(&monitor).spawn(Duration::from_secs(30));
        let flipped = tokio::time::timeout(Duration::from_secs(2), changes.recv())
            .await
            .unwrap()
            .unwrap();
        handle.stop();

        assert!(flipped);
        assert!(monitor.status().is_online());
    }
}
