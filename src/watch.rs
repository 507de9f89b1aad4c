// Presentation recovery: periodic anchor probing plus host-originated
// navigation and hotkey signals, all funneled into one watcher task.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What the watcher needs from the embedding host's presentation layer.
///
/// `rebuild` must be idempotent: invoking it again replaces the launcher
/// surface rather than duplicating it, and never touches the registry.
#[async_trait]
pub trait Presentation: Send + Sync {
    /// Is the launcher anchor still attached to the host UI?
    async fn anchor_present(&self) -> bool;
    /// Rebuild the launcher surface from the capability registry.
    async fn rebuild(&self) -> anyhow::Result<()>;
}

/// Signals the embedding host feeds into the watcher. The engine only
/// subscribes to these; it never originates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostSignal {
    /// Client-side navigation happened; the host UI may have been replaced.
    Navigation,
    /// The operator asked for a rebuild; honor it unconditionally.
    Hotkey,
}

/// Background task that keeps the launcher surface alive across host UI
/// resets. Cancelled on [`RecoveryWatcher::shutdown`] or drop.
pub struct RecoveryWatcher {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl RecoveryWatcher {
    /// Start watching. The anchor is probed every `probe_interval`, and
    /// `probe_settle` after each navigation signal. A missing anchor
    /// triggers a rebuild; a hotkey signal rebuilds without probing.
    pub fn spawn(
        presentation: Arc<dyn Presentation>,
        mut signals: mpsc::Receiver<HostSignal>,
        probe_interval: Duration,
        probe_settle: Duration,
    ) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            // First tick lands one full interval out.
            let mut ticker = interval_at(Instant::now() + probe_interval, probe_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        probe_and_recover(presentation.as_ref()).await;
                    }
                    signal = signals.recv() => match signal {
                        Some(HostSignal::Navigation) => {
                            debug!("navigation signal, probing after settle delay");
                            tokio::time::sleep(probe_settle).await;
                            probe_and_recover(presentation.as_ref()).await;
                        }
                        Some(HostSignal::Hotkey) => {
                            info!("hotkey rebuild requested");
                            if let Err(e) = presentation.rebuild().await {
                                warn!("rebuild failed: {}", e);
                            }
                        }
                        // Sender dropped; probing continues on the interval.
                        None => {
                            debug!("host signal channel closed");
                            probe_loop(&token, &presentation, &mut ticker).await;
                            break;
                        }
                    },
                }
            }
            debug!("recovery watcher stopped");
        });

        Self {
            cancel,
            handle: Some(handle),
        }
    }

    /// Stop the watcher task. Idempotent.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Stop the watcher task and wait for it to finish.
    pub async fn join(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for RecoveryWatcher {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Interval-only watching, for after the signal channel has closed.
async fn probe_loop(
    token: &CancellationToken,
    presentation: &Arc<dyn Presentation>,
    ticker: &mut tokio::time::Interval,
) {
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                probe_and_recover(presentation.as_ref()).await;
            }
        }
    }
}

async fn probe_and_recover(presentation: &dyn Presentation) {
    if presentation.anchor_present().await {
        return;
    }
    info!("launcher anchor missing, rebuilding presentation");
    if let Err(e) = presentation.rebuild().await {
        warn!("presentation rebuild failed: {}", e);
    }
}
