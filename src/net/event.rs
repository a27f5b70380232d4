//! Connection lifecycle events and their listeners

use std::fmt;
use std::sync::{Arc, RwLock};

use crate::io::TerminalIoResult;

/// Kinds of lifecycle events raised against a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionEventKind {
    /// Idle past the warning timeout, raised once per idle episode
    Idle,
    /// Idle past warning plus disconnect timeout
    TimedOut,
    /// The user asked to log out
    LogoutRequest,
    /// The remote end sent a break
    Break,
}

impl fmt::Display for ConnectionEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionEventKind::Idle => "idle",
            ConnectionEventKind::TimedOut => "timed out",
            ConnectionEventKind::LogoutRequest => "logout request",
            ConnectionEventKind::Break => "break",
        };
        f.write_str(name)
    }
}

/// A lifecycle event for one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionEvent {
    pub connection_id: u64,
    pub kind: ConnectionEventKind,
}

impl ConnectionEvent {
    pub fn new(connection_id: u64, kind: ConnectionEventKind) -> Self {
        Self {
            connection_id,
            kind,
        }
    }
}

/// Receives lifecycle events for a connection
///
/// Every callback defaults to doing nothing. Idle and timeout events arrive
/// on the housekeeping thread while it holds the registry lock, so listeners
/// must not call back into the connection manager.
pub trait ConnectionListener: Send + Sync {
    fn connection_idle(&self, _event: &ConnectionEvent) -> TerminalIoResult<()> {
        Ok(())
    }

    fn connection_timed_out(&self, _event: &ConnectionEvent) -> TerminalIoResult<()> {
        Ok(())
    }

    fn connection_logout_request(&self, _event: &ConnectionEvent) -> TerminalIoResult<()> {
        Ok(())
    }

    fn connection_sent_break(&self, _event: &ConnectionEvent) -> TerminalIoResult<()> {
        Ok(())
    }
}

/// Listeners registered on one connection
#[derive(Default)]
pub struct ListenerSet {
    listeners: RwLock<Vec<Arc<dyn ConnectionListener>>>,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: Arc<dyn ConnectionListener>) {
        match self.listeners.write() {
            Ok(mut listeners) => listeners.push(listener),
            Err(poisoned) => poisoned.into_inner().push(listener),
        }
    }

    /// Remove a listener previously added; false if it was not registered
    pub fn remove(&self, listener: &Arc<dyn ConnectionListener>) -> bool {
        let target = Arc::as_ptr(listener) as *const ();
        let mut listeners = match self.listeners.write() {
            Ok(listeners) => listeners,
            Err(poisoned) => poisoned.into_inner(),
        };
        let before = listeners.len();
        listeners.retain(|l| Arc::as_ptr(l) as *const () != target);
        listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `event` to every listener
    ///
    /// All listeners are called even if one fails; the first failure is
    /// returned.
    pub fn dispatch(&self, event: &ConnectionEvent) -> TerminalIoResult<()> {
        let mut result = Ok(());
        for listener in self.snapshot() {
            let outcome = match event.kind {
                ConnectionEventKind::Idle => listener.connection_idle(event),
                ConnectionEventKind::TimedOut => listener.connection_timed_out(event),
                ConnectionEventKind::LogoutRequest => listener.connection_logout_request(event),
                ConnectionEventKind::Break => listener.connection_sent_break(event),
            };
            if let Err(e) = outcome {
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }

    // Listeners may add or remove listeners while being called
    fn snapshot(&self) -> Vec<Arc<dyn ConnectionListener>> {
        match self.listeners.read() {
            Ok(listeners) => listeners.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl fmt::Debug for ListenerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerSet")
            .field("listeners", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::TerminalIoError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<ConnectionEventKind>>,
        fail: bool,
    }

    impl Recorder {
        fn record(&self, event: &ConnectionEvent) -> TerminalIoResult<()> {
            self.seen.lock().unwrap().push(event.kind);
            if self.fail {
                Err(TerminalIoError::EndOfStream)
            } else {
                Ok(())
            }
        }
    }

    impl ConnectionListener for Recorder {
        fn connection_idle(&self, event: &ConnectionEvent) -> TerminalIoResult<()> {
            self.record(event)
        }

        fn connection_timed_out(&self, event: &ConnectionEvent) -> TerminalIoResult<()> {
            self.record(event)
        }
    }

    #[test]
    fn test_dispatch_by_kind() {
        let set = ListenerSet::new();
        let recorder = Arc::new(Recorder::default());
        set.add(recorder.clone());

        set.dispatch(&ConnectionEvent::new(1, ConnectionEventKind::Idle))
            .unwrap();
        // Not overridden, default no-op
        set.dispatch(&ConnectionEvent::new(1, ConnectionEventKind::Break))
            .unwrap();
        set.dispatch(&ConnectionEvent::new(1, ConnectionEventKind::TimedOut))
            .unwrap();

        assert_eq!(
            *recorder.seen.lock().unwrap(),
            vec![ConnectionEventKind::Idle, ConnectionEventKind::TimedOut]
        );
    }

    #[test]
    fn test_failure_does_not_stop_delivery() {
        let set = ListenerSet::new();
        let failing = Arc::new(Recorder {
            fail: true,
            ..Default::default()
        });
        let healthy = Arc::new(Recorder::default());
        set.add(failing.clone());
        set.add(healthy.clone());

        let result = set.dispatch(&ConnectionEvent::new(7, ConnectionEventKind::Idle));
        assert!(matches!(result, Err(TerminalIoError::EndOfStream)));
        assert_eq!(healthy.seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_remove() {
        let set = ListenerSet::new();
        let listener: Arc<dyn ConnectionListener> = Arc::new(Recorder::default());
        set.add(listener.clone());
        assert_eq!(set.len(), 1);
        assert!(set.remove(&listener));
        assert!(!set.remove(&listener));
        assert!(set.is_empty());
    }
}
