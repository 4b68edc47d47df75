//! Network reachability observation.
//!
//! The embedding platform layer feeds connectivity transitions into a
//! [`Reachability`] handle. Consumers either snapshot the current state
//! (the HTTP client, before each request) or subscribe to transitions
//! (the offline queue, to flush on reconnect).

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use brillprime_shared::LinkState;

/// Cheap clonable handle onto the observed link state.
#[derive(Clone)]
pub struct Reachability {
    tx: Arc<watch::Sender<LinkState>>,
}

impl Reachability {
    /// Create a handle reporting `initial` until the platform says otherwise.
    pub fn new(initial: LinkState) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    /// Current link state.
    pub fn state(&self) -> LinkState {
        *self.tx.borrow()
    }

    /// True when the link is currently observed online.
    pub fn is_online(&self) -> bool {
        self.state() == LinkState::Online
    }

    /// Record a transition reported by the platform layer.
    pub fn set_state(&self, state: LinkState) {
        let previous = self.tx.send_replace(state);
        if previous != state {
            info!(?previous, ?state, "link state changed");
        }
    }

    pub fn set_online(&self) {
        self.set_state(LinkState::Online);
    }

    pub fn set_offline(&self) {
        self.set_state(LinkState::Offline);
    }

    /// Subscribe to state transitions.
    pub fn subscribe(&self) -> watch::Receiver<LinkState> {
        self.tx.subscribe()
    }
}

impl Default for Reachability {
    /// Assume online until told otherwise; a wrong guess costs one failed
    /// request, while assuming offline would silently queue everything.
    fn default() -> Self {
        Self::new(LinkState::Online)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_follows_transitions() {
        let reachability = Reachability::default();
        assert!(reachability.is_online());

        reachability.set_offline();
        assert!(!reachability.is_online());
        assert_eq!(reachability.state(), LinkState::Offline);

        reachability.set_online();
        assert!(reachability.is_online());
    }

    #[test]
    fn clones_observe_the_same_state() {
        let reachability = Reachability::default();
        let clone = reachability.clone();

        reachability.set_offline();
        assert!(!clone.is_online());
    }

    #[tokio::test]
    async fn subscribers_see_transitions() {
        let reachability = Reachability::new(LinkState::Offline);
        let mut rx = reachability.subscribe();

        reachability.set_online();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), LinkState::Online);
    }
}
