//! Connection registry and housekeeper
//!
//! The [`ConnectionManager`] admits new connections, keeps track of the open
//! ones, and runs a housekeeping thread that purges closed connections and
//! raises idle and timeout events.

use std::collections::VecDeque;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::connection::{Connection, ConnectionData};
use super::event::{ConnectionEventKind, ListenerSet};
use super::filter::ConnectionFilter;
use super::transport::Transport;
use crate::app::{Config, ConfigError};
use crate::codec::{Encoding, PushDecoder, DEFAULT_BUFFER_SIZE};
use crate::io::{SessionContext, TerminalIo, TerminalRegistry};
use crate::shell::ShellRegistry;

/// Tuning of a [`ConnectionManager`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerSettings {
    pub max_connections: usize,
    /// Idle time before the idle event
    pub warning_timeout: Duration,
    /// Further idle time after the warning before the timeout event
    pub disconnect_timeout: Duration,
    pub housekeeping_interval: Duration,
    /// Shell every new connection starts with
    pub login_shell: String,
    pub line_mode: bool,
    pub encoding: Encoding,
    pub decoder_buffer_size: usize,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            max_connections: 25,
            warning_timeout: Duration::from_secs(3600),
            disconnect_timeout: Duration::from_secs(60),
            housekeeping_interval: Duration::from_secs(1),
            login_shell: String::from("echo"),
            line_mode: false,
            encoding: Encoding::Utf8,
            decoder_buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

#[derive(Debug, Default)]
struct ClosedState {
    ids: VecDeque<u64>,
    stopping: bool,
}

/// Connections closed but not yet purged from the open list
#[derive(Debug, Default)]
pub(crate) struct ClosedQueue {
    state: Mutex<ClosedState>,
}

impl ClosedQueue {
    fn state(&self) -> MutexGuard<'_, ClosedState> {
        match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Queue a connection id; ignored if already queued or while stopping
    pub(crate) fn register(&self, id: u64) {
        let mut state = self.state();
        if state.stopping || state.ids.contains(&id) {
            return;
        }
        state.ids.push_back(id);
    }

    fn drain(&self) -> Vec<u64> {
        self.state().ids.drain(..).collect()
    }

    fn set_stopping(&self) {
        self.state().stopping = true;
    }

    fn is_stopping(&self) -> bool {
        self.state().stopping
    }

    fn len(&self) -> usize {
        self.state().ids.len()
    }
}

struct Inner {
    settings: ManagerSettings,
    filter: Option<Box<dyn ConnectionFilter>>,
    shells: Arc<ShellRegistry>,
    terminals: Arc<TerminalRegistry>,
    open: Mutex<Vec<Arc<Connection>>>,
    closed: Arc<ClosedQueue>,
    next_id: AtomicU64,
}

impl Inner {
    fn open(&self) -> MutexGuard<'_, Vec<Arc<Connection>>> {
        match self.open.lock() {
            Ok(open) => open,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn sweep(&self, now: Instant) {
        if !self.closed.is_stopping() {
            self.purge();
        }
        self.check_open_connections(now);
    }

    fn purge(&self) {
        let ids = self.closed.drain();
        if ids.is_empty() {
            return;
        }
        let mut open = self.open();
        open.retain(|connection| {
            if ids.contains(&connection.id()) {
                tracing::info!(
                    connection = connection.id(),
                    peer = %connection.data().peer_addr(),
                    "Removed closed connection"
                );
                false
            } else {
                true
            }
        });
        tracing::debug!(open = open.len(), "Purged closed connections");
    }

    /// Decide the due events under the open-list lock, then raise them
    /// without it so a listener stuck on one session cannot block admission
    fn check_open_connections(&self, now: Instant) {
        let disconnect_after = self.settings.warning_timeout + self.settings.disconnect_timeout;
        let mut due = Vec::new();
        for connection in self.open().iter() {
            if !connection.is_active() {
                self.closed.register(connection.id());
                continue;
            }
            let data = connection.data();
            let idle = data.idle_time(now);
            let kind = if idle > disconnect_after {
                tracing::debug!(connection = connection.id(), ?idle, "Connection timed out");
                ConnectionEventKind::TimedOut
            } else if idle > self.settings.warning_timeout && !data.is_warned() {
                tracing::debug!(connection = connection.id(), ?idle, "Connection idle");
                data.set_warned(true);
                ConnectionEventKind::Idle
            } else {
                continue;
            };
            due.push((Arc::clone(connection), kind));
        }

        for (connection, kind) in due {
            if let Err(e) = connection.process_connection_event(kind) {
                tracing::error!(
                    connection = connection.id(),
                    "Dispatching {} event failed: {}",
                    kind,
                    e
                );
            }
        }
    }
}

/// How long `stop` lets the current sweep finish before closing sessions
/// underneath it
const STOP_GRACE: Duration = Duration::from_secs(1);

const STOP_POLL: Duration = Duration::from_millis(10);

struct Housekeeper {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

impl Housekeeper {
    fn wait_finished(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.handle.is_finished() {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(STOP_POLL);
        }
        true
    }
}

/// Registry of open connections with admission control and housekeeping
pub struct ConnectionManager {
    inner: Arc<Inner>,
    housekeeper: Mutex<Option<Housekeeper>>,
    stopped: AtomicBool,
}

impl ConnectionManager {
    pub fn new(
        settings: ManagerSettings,
        filter: Option<Box<dyn ConnectionFilter>>,
        shells: Arc<ShellRegistry>,
        terminals: Arc<TerminalRegistry>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                settings,
                filter,
                shells,
                terminals,
                open: Mutex::new(Vec::new()),
                closed: Arc::new(ClosedQueue::default()),
                next_id: AtomicU64::new(1),
            }),
            housekeeper: Mutex::new(None),
            stopped: AtomicBool::new(false),
        }
    }

    /// Build a manager from a validated configuration
    ///
    /// Fails if the configured login shell is not registered.
    pub fn from_config(
        config: &Config,
        shells: Arc<ShellRegistry>,
        terminals: Arc<TerminalRegistry>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        if !shells.contains(&config.login_shell) {
            return Err(ConfigError::UnknownShell(config.login_shell.clone()));
        }
        Ok(Self::new(
            config.manager_settings(),
            config.connection_filter.build(),
            shells,
            terminals,
        ))
    }

    pub fn settings(&self) -> &ManagerSettings {
        &self.inner.settings
    }

    /// Start the housekeeping thread; does nothing if already running
    pub fn start(&self) -> std::io::Result<()> {
        let mut housekeeper = match self.housekeeper.lock() {
            Ok(housekeeper) => housekeeper,
            Err(poisoned) => poisoned.into_inner(),
        };
        if housekeeper.is_some() || self.stopped.load(Ordering::SeqCst) {
            return Ok(());
        }

        let (stop, stop_rx) = mpsc::channel();
        let inner = Arc::clone(&self.inner);
        let interval = inner.settings.housekeeping_interval;
        let handle = thread::Builder::new()
            .name("housekeeper".to_string())
            .spawn(move || {
                tracing::debug!(?interval, "Housekeeping started");
                loop {
                    inner.sweep(Instant::now());
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                tracing::debug!("Housekeeping stopped");
            })?;
        *housekeeper = Some(Housekeeper { stop, handle });
        Ok(())
    }

    /// Stop housekeeping and close every open connection
    ///
    /// The sweep in progress completes first. A sweep whose listener is stuck
    /// writing to a session that stopped reading gets its sessions closed
    /// underneath it. Calls after the first do nothing.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.closed.set_stopping();

        let housekeeper = match self.housekeeper.lock() {
            Ok(mut housekeeper) => housekeeper.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(housekeeper) = housekeeper {
            // A finished thread has dropped its receiver
            let _ = housekeeper.stop.send(());
            if !housekeeper.wait_finished(STOP_GRACE) {
                tracing::warn!("Housekeeping sweep stalled, closing connections under it");
                let open = self.inner.open().clone();
                for connection in &open {
                    connection.close();
                }
            }
            if housekeeper.handle.join().is_err() {
                tracing::error!("Housekeeping thread panicked");
            }
        }

        let connections: Vec<Arc<Connection>> = self.inner.open().drain(..).collect();
        for connection in &connections {
            connection.close();
        }
        tracing::info!(closed = connections.len(), "Connection manager stopped");
    }

    /// Admit a new connection, or close it right away
    ///
    /// The peer must pass the filter and the number of open connections must
    /// be below the maximum. Admitted connections start their login shell on
    /// their own thread.
    pub fn admit(&self, transport: Transport) -> bool {
        let peer = transport.peer_addr();
        if self.stopped.load(Ordering::SeqCst) {
            transport.close();
            return false;
        }
        if let Some(filter) = &self.inner.filter {
            if !filter.is_allowed(peer.ip()) {
                tracing::info!(%peer, "Connection rejected by filter");
                transport.close();
                return false;
            }
        }

        let settings = &self.inner.settings;
        let mut open = self.inner.open();
        // `stop` drains the list after raising the flag
        if self.stopped.load(Ordering::SeqCst) {
            transport.close();
            return false;
        }
        if open.len() >= settings.max_connections {
            tracing::info!(
                %peer,
                max = settings.max_connections,
                "Connection rejected, maximum reached"
            );
            transport.close();
            return false;
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let parts = transport.into_parts();
        let data = Arc::new(ConnectionData::new(
            parts.peer,
            settings.login_shell.as_str(),
            settings.line_mode,
        ));
        let listeners = Arc::new(ListenerSet::new());
        let io = TerminalIo::new(
            parts,
            PushDecoder::with_buffer_size(settings.encoding, settings.decoder_buffer_size),
            SessionContext {
                connection_id: id,
                data: Arc::clone(&data),
                listeners: Arc::clone(&listeners),
                terminals: Arc::clone(&self.inner.terminals),
            },
        );
        let connection = Arc::new(Connection::new(
            id,
            data,
            io,
            listeners,
            Arc::clone(&self.inner.closed),
        ));

        if let Err(e) = connection.start(Arc::clone(&self.inner.shells)) {
            tracing::error!(connection = id, %peer, "Starting connection thread failed: {}", e);
            connection.close();
            return false;
        }
        open.push(connection);
        tracing::info!(connection = id, %peer, open = open.len(), "Connection admitted");
        true
    }

    /// Queue a connection for removal at the next sweep
    pub fn register_closed(&self, connection: &Connection) {
        connection.close();
        self.inner.closed.register(connection.id());
    }

    /// Run one housekeeping sweep as if the clock read `now`
    pub fn sweep(&self, now: Instant) {
        self.inner.sweep(now);
    }

    pub fn open_count(&self) -> usize {
        self.inner.open().len()
    }

    /// Number of connections closed but not yet purged
    pub fn pending_close_count(&self) -> usize {
        self.inner.closed.len()
    }

    pub fn connection(&self, index: usize) -> Option<Arc<Connection>> {
        self.inner.open().get(index).cloned()
    }

    /// Open connections from the given host
    pub fn connections_by_address(&self, addr: IpAddr) -> Vec<Arc<Connection>> {
        self.inner
            .open()
            .iter()
            .filter(|connection| connection.data().host() == addr)
            .cloned()
            .collect()
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("settings", &self.inner.settings)
            .field("open", &self.open_count())
            .finish()
    }
}
