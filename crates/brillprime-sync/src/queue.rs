//! Durable offline action queue.
//!
//! Mutating user actions taken while offline are appended here, persisted
//! immediately, and replayed in insertion order once connectivity returns.
//! An action leaves the queue only after the server confirms it; a failed
//! replay leaves it in place for the next pass. There is no backoff and no
//! retry cap: an action is retried on every reconnect until it succeeds or
//! the queue is cleared.
//!
//! Concurrent flush passes are prevented by an in-memory `syncing` flag
//! only. The flag is not durable; after a crash mid-flush a restart simply
//! re-attempts the whole queue, which is safe because actions are removed
//! only on confirmed success.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use brillprime_net::ApiClient;
use brillprime_shared::{HttpMethod, LinkState, PendingAction};
use brillprime_store::{Store, StoreError};

/// Outcome summary of one flush pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlushReport {
    /// Actions attempted this pass.
    pub attempted: usize,
    /// Actions confirmed by the server and removed.
    pub confirmed: usize,
    /// Actions that failed and remain queued.
    pub retained: usize,
    /// True when the pass did not run (another flush in progress, or the
    /// device is offline).
    pub skipped: bool,
}

struct QueueState {
    actions: Vec<PendingAction>,
    syncing: bool,
}

/// FIFO queue of not-yet-confirmed mutations with write-through persistence.
pub struct OfflineQueue {
    store: Store,
    client: Arc<ApiClient>,
    state: Mutex<QueueState>,
}

impl OfflineQueue {
    /// Reload the durable queue into memory.
    pub fn load(store: Store, client: Arc<ApiClient>) -> Result<Self, StoreError> {
        let actions = store.load_pending_actions()?;
        if !actions.is_empty() {
            info!(pending = actions.len(), "restored offline action queue");
        }
        Ok(Self {
            store,
            client,
            state: Mutex::new(QueueState {
                actions,
                syncing: false,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a new action and persist the full queue before returning, so
    /// a crash right after cannot silently drop it.
    pub fn enqueue(
        &self,
        kind: &str,
        endpoint: &str,
        method: HttpMethod,
        payload: Value,
    ) -> Result<PendingAction, StoreError> {
        let action = PendingAction::new(kind, endpoint, method, payload);

        let mut state = self.lock();
        state.actions.push(action.clone());
        self.store.store_pending_actions(&state.actions)?;

        debug!(id = %action.id, kind, endpoint, "queued offline action");
        Ok(action)
    }

    /// Replay the queue in insertion order.
    ///
    /// Confirmed actions are removed; failed actions stay, in their
    /// original relative positions, and later actions are still attempted
    /// in the same pass. The shrunk queue is persisted once, after the
    /// whole pass.
    pub async fn flush(&self) -> Result<FlushReport, StoreError> {
        if !self.client.reachability().is_online() {
            debug!("skipping flush, device is offline");
            return Ok(FlushReport {
                skipped: true,
                ..Default::default()
            });
        }

        // Snapshot the batch under the lock; requests happen without it so
        // enqueues stay possible while the pass is in flight.
        let batch = {
            let mut state = self.lock();
            if state.syncing {
                debug!("flush already in progress, skipping");
                return Ok(FlushReport {
                    skipped: true,
                    ..Default::default()
                });
            }
            if state.actions.is_empty() {
                return Ok(FlushReport::default());
            }
            state.syncing = true;
            state.actions.clone()
        };

        let mut confirmed: HashSet<String> = HashSet::new();
        for action in &batch {
            match self.client.execute_action(action).await {
                Ok(_) => {
                    debug!(id = %action.id, kind = %action.kind, "offline action confirmed");
                    confirmed.insert(action.id.clone());
                }
                Err(e) => {
                    warn!(
                        id = %action.id,
                        kind = %action.kind,
                        error = %e,
                        "offline action failed, keeping for retry"
                    );
                }
            }
        }

        let report = FlushReport {
            attempted: batch.len(),
            confirmed: confirmed.len(),
            retained: batch.len() - confirmed.len(),
            skipped: false,
        };

        let persisted = {
            let mut state = self.lock();
            state.actions.retain(|action| !confirmed.contains(&action.id));
            let persisted = self.store.store_pending_actions(&state.actions);
            state.syncing = false;
            persisted
        };
        persisted?;

        info!(
            attempted = report.attempted,
            confirmed = report.confirmed,
            retained = report.retained,
            "flush pass complete"
        );
        Ok(report)
    }

    /// Empty the queue and its durable copy unconditionally (logout/reset).
    pub fn clear(&self) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.actions.clear();
        self.store.clear_pending_actions()?;
        info!("offline action queue cleared");
        Ok(())
    }

    /// Copy of the queued actions, in insertion order.
    pub fn snapshot(&self) -> Vec<PendingAction> {
        self.lock().actions.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().actions.is_empty()
    }
}

/// Watch reachability and flush on every offline-to-online transition.
///
/// The task ends when the reachability handle is dropped.
pub fn spawn_reconnect_flush(queue: Arc<OfflineQueue>) -> JoinHandle<()> {
    let mut rx = queue.client.reachability().subscribe();
    tokio::spawn(async move {
        let mut previous = *rx.borrow();
        loop {
            if rx.changed().await.is_err() {
                debug!("reachability channel closed, stopping reconnect flush");
                break;
            }
            let current = *rx.borrow();
            if previous == LinkState::Offline && current == LinkState::Online {
                info!("connectivity restored, flushing offline actions");
                if let Err(e) = queue.flush().await {
                    warn!(error = %e, "reconnect flush failed");
                }
            }
            previous = current;
        }
    })
}
