//! Network reachability signal.

use parking_lot::Mutex;
use parley_core::ConnectivityState;
use tokio::sync::mpsc;

/// Publishes connectivity changes to every session.
///
/// Reports are tri-state: `Some(true)`, `Some(false)` or `None` for unknown.
/// Repeated reports of the same state are not forwarded. Every other change
/// reaches every subscriber in order, however fast the reports arrive.
pub struct ConnectivityMonitor {
    inner: Mutex<Inner>,
}

struct Inner {
    state: ConnectivityState,
    listeners: Vec<mpsc::UnboundedSender<ConnectivityState>>,
}

impl ConnectivityMonitor {
    pub fn new() -> Self {
        Self::with_state(ConnectivityState::Unknown)
    }

    pub fn with_state(state: ConnectivityState) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state,
                listeners: Vec::new(),
            }),
        }
    }

    /// Feed a raw reachability reading. Returns true if the state changed.
    pub fn report(&self, reachable: Option<bool>) -> bool {
        self.set(ConnectivityState::from_reachability(reachable))
    }

    pub fn set(&self, state: ConnectivityState) -> bool {
        let mut inner = self.inner.lock();
        if inner.state == state {
            return false;
        }
        inner.state = state;
        // Closed receivers belong to sessions that have ended
        inner.listeners.retain(|tx| tx.send(state).is_ok());
        tracing::debug!(%state, listeners = inner.listeners.len(), "Connectivity changed");
        true
    }

    pub fn current(&self) -> ConnectivityState {
        self.inner.lock().state
    }

    /// Receive every change from now on, together with the state at the time
    /// of subscribing.
    pub fn subscribe(&self) -> (ConnectivityState, mpsc::UnboundedReceiver<ConnectivityState>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();
        inner.listeners.push(tx);
        (inner.state, rx)
    }

    /// Number of live subscribers.
    pub fn listener_count(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.listeners.retain(|tx| !tx.is_closed());
        inner.listeners.len()
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_tristate() {
        let monitor = ConnectivityMonitor::new();
        assert_eq!(monitor.current(), ConnectivityState::Unknown);

        assert!(monitor.report(Some(true)));
        assert_eq!(monitor.current(), ConnectivityState::Online);

        assert!(monitor.report(Some(false)));
        assert_eq!(monitor.current(), ConnectivityState::Offline);

        assert!(monitor.report(None));
        assert_eq!(monitor.current(), ConnectivityState::Unknown);
    }

    #[test]
    fn test_duplicate_reports_not_forwarded() {
        let monitor = ConnectivityMonitor::new();
        let (initial, mut rx) = monitor.subscribe();
        assert_eq!(initial, ConnectivityState::Unknown);

        assert!(monitor.report(Some(true)));
        assert!(!monitor.report(Some(true)));

        assert_eq!(rx.try_recv().unwrap(), ConnectivityState::Online);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_rapid_changes_all_delivered() {
        let monitor = ConnectivityMonitor::with_state(ConnectivityState::Online);
        let (_, mut rx) = monitor.subscribe();

        monitor.report(Some(false));
        monitor.report(Some(true));
        monitor.report(Some(false));

        let mut seen = Vec::new();
        while let Ok(state) = rx.try_recv() {
            seen.push(state);
        }
        assert_eq!(
            seen,
            vec![
                ConnectivityState::Offline,
                ConnectivityState::Online,
                ConnectivityState::Offline
            ]
        );
    }

    #[test]
    fn test_dropped_subscribers_are_pruned() {
        let monitor = ConnectivityMonitor::new();
        let (_, rx1) = monitor.subscribe();
        let (_, _rx2) = monitor.subscribe();
        assert_eq!(monitor.listener_count(), 2);

        drop(rx1);
        monitor.report(Some(true));
        assert_eq!(monitor.listener_count(), 1);
    }
}
