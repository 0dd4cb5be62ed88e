//! Connectivity Monitor.
//!
//! Feeds platform online/offline events through the engine's
//! [`ConnectivityState`], replays the pending queue when connectivity comes
//! back and exposes the current state for an offline indicator.

use crate::sync::{ReplayReport, SyncEngine};
use tablesync_engine::{Connectivity, ConnectivityState, Transition};
use tokio::sync::{mpsc, watch};

pub struct ConnectivityMonitor {
    engine: SyncEngine,
    state: ConnectivityState,
    flag: watch::Sender<Connectivity>,
}

impl ConnectivityMonitor {
    pub fn new(engine: SyncEngine, initial: Connectivity) -> Self {
        let (flag, _) = watch::channel(initial);
        Self {
            engine,
            state: ConnectivityState::new(initial),
            flag,
        }
    }

    pub fn current(&self) -> Connectivity {
        self.state.current()
    }

    /// Receiver for the presentation flag.
    pub fn watch(&self) -> watch::Receiver<Connectivity> {
        self.flag.subscribe()
    }

    /// Handle one platform event.
    ///
    /// Returns the replay report when the event brought connectivity back.
    pub async fn observe(&mut self, event: Connectivity) -> Option<ReplayReport> {
        let transition = self.state.observe(event);
        self.flag.send_replace(self.state.current());

        match transition {
            Transition::Resync => {
                tracing::info!("Back online, replaying queued reviews");
                match self.engine.replay_pending().await {
                    Ok(report) => Some(report),
                    Err(e) => {
                        tracing::error!("Replay failed: {}", e);
                        None
                    }
                }
            }
            Transition::WentOffline => {
                tracing::info!("Offline");
                None
            }
            Transition::Unchanged => None,
        }
    }

    /// Process events until the sender side closes.
    pub async fn run(mut self, mut events: mpsc::Receiver<Connectivity>) {
        while let Some(event) = events.recv().await {
            self.observe(event).await;
        }
        tracing::debug!("Connectivity event stream closed");
    }
}
