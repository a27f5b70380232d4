//! Sessions and their bookkeeping data

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::event::{ConnectionEvent, ConnectionEventKind, ConnectionListener, ListenerSet};
use super::manager::ClosedQueue;
use crate::io::{TerminalIo, TerminalIoError, TerminalIoResult};
use crate::shell::ShellRegistry;

/// Terminal type assumed until the wire layer negotiates one
pub const DEFAULT_TERMINAL_TYPE: &str = "default";

/// Size of the remote terminal in characters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalGeometry {
    pub width: u16,
    pub height: u16,
}

impl Default for TerminalGeometry {
    fn default() -> Self {
        Self {
            width: 80,
            height: 25,
        }
    }
}

#[derive(Debug)]
struct DataState {
    last_activity: Instant,
    warned: bool,
    terminal_type: String,
    geometry: TerminalGeometry,
    geometry_changed: bool,
}

/// Bookkeeping data of one connection
///
/// Shared between the session thread, the terminal layer, and the
/// housekeeper.
#[derive(Debug)]
pub struct ConnectionData {
    peer: SocketAddr,
    login_shell: String,
    line_mode: bool,
    state: Mutex<DataState>,
}

impl ConnectionData {
    pub fn new(peer: SocketAddr, login_shell: impl Into<String>, line_mode: bool) -> Self {
        Self {
            peer,
            login_shell: login_shell.into(),
            line_mode,
            state: Mutex::new(DataState {
                last_activity: Instant::now(),
                warned: false,
                terminal_type: DEFAULT_TERMINAL_TYPE.to_string(),
                geometry: TerminalGeometry::default(),
                geometry_changed: false,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, DataState> {
        match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn host(&self) -> IpAddr {
        self.peer.ip()
    }

    pub fn port(&self) -> u16 {
        self.peer.port()
    }

    /// Identifier of the shell the session starts with
    pub fn login_shell(&self) -> &str {
        &self.login_shell
    }

    /// Whether input is delivered line by line rather than per character
    pub fn is_line_mode(&self) -> bool {
        self.line_mode
    }

    /// Record activity now; ends any idle episode
    pub fn activity(&self) {
        let mut state = self.state();
        state.last_activity = Instant::now();
        state.warned = false;
    }

    pub fn last_activity(&self) -> Instant {
        self.state().last_activity
    }

    /// Time since the last activity, as seen at `now`
    pub fn idle_time(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.state().last_activity)
    }

    /// Whether the idle warning was raised for the current idle episode
    pub fn is_warned(&self) -> bool {
        self.state().warned
    }

    pub fn set_warned(&self, warned: bool) {
        self.state().warned = warned;
    }

    pub fn terminal_type(&self) -> String {
        self.state().terminal_type.clone()
    }

    /// Store the terminal type negotiated by the wire layer
    pub fn set_terminal_type(&self, terminal_type: impl Into<String>) {
        self.state().terminal_type = terminal_type.into();
    }

    pub fn geometry(&self) -> TerminalGeometry {
        self.state().geometry
    }

    /// Store a new window size and flag it as changed
    pub fn set_geometry(&self, width: u16, height: u16) {
        let mut state = self.state();
        state.geometry = TerminalGeometry { width, height };
        state.geometry_changed = true;
    }

    /// Whether the geometry changed since the last call
    pub fn take_geometry_changed(&self) -> bool {
        std::mem::take(&mut self.state().geometry_changed)
    }
}

/// One admitted session
pub struct Connection {
    id: u64,
    data: Arc<ConnectionData>,
    io: TerminalIo,
    listeners: Arc<ListenerSet>,
    active: AtomicBool,
    closed: Arc<ClosedQueue>,
}

impl Connection {
    pub(crate) fn new(
        id: u64,
        data: Arc<ConnectionData>,
        io: TerminalIo,
        listeners: Arc<ListenerSet>,
        closed: Arc<ClosedQueue>,
    ) -> Self {
        Self {
            id,
            data,
            io,
            listeners,
            active: AtomicBool::new(true),
            closed,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn data(&self) -> &Arc<ConnectionData> {
        &self.data
    }

    /// The terminal layer for all session input and output
    pub fn io(&self) -> &TerminalIo {
        &self.io
    }

    pub fn add_listener(&self, listener: Arc<dyn ConnectionListener>) {
        self.listeners.add(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn ConnectionListener>) -> bool {
        self.listeners.remove(listener)
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Raise a lifecycle event on this connection's listeners
    pub fn process_connection_event(&self, kind: ConnectionEventKind) -> TerminalIoResult<()> {
        self.listeners
            .dispatch(&ConnectionEvent::new(self.id, kind))
    }

    /// Close the transport and queue the connection for removal
    ///
    /// Only the first call has any effect.
    pub fn close(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.io.close() {
            tracing::debug!(connection = self.id, "Closing transport failed: {}", e);
        }
        self.closed.register(self.id);
        tracing::debug!(connection = self.id, peer = %self.data.peer_addr(), "Connection closed");
    }

    /// Run the login shell on a dedicated thread
    pub(crate) fn start(self: &Arc<Self>, shells: Arc<ShellRegistry>) -> io::Result<JoinHandle<()>> {
        let connection = Arc::clone(self);
        thread::Builder::new()
            .name(format!("connection-{}", self.id))
            .spawn(move || {
                connection.run(&shells);
                connection.close();
            })
    }

    fn run(self: &Arc<Self>, shells: &ShellRegistry) {
        if let Err(e) = self.io.set_default_terminal() {
            tracing::debug!(connection = self.id, "Binding terminal failed: {}", e);
            return;
        }
        let name = self.data.login_shell();
        let Some(mut shell) = shells.create(name) else {
            tracing::error!(connection = self.id, shell = name, "Login shell not registered");
            return;
        };
        match shell.run(self) {
            Ok(()) => tracing::debug!(connection = self.id, "Shell finished"),
            Err(TerminalIoError::EndOfStream) => {
                tracing::debug!(connection = self.id, "Connection lost")
            }
            Err(e) => tracing::warn!(connection = self.id, "Shell failed: {}", e),
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("peer", &self.data.peer_addr())
            .field("active", &self.is_active())
            .finish()
    }
}
