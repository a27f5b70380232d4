//! Connections and their registry
//!
//! - `transport`: byte streams underneath a session (TCP or in memory)
//! - `filter`: admission filters
//! - `event`: lifecycle events and listeners
//! - `connection`: a session and its bookkeeping data
//! - `manager`: admission control and housekeeping

pub mod connection;
pub mod event;
pub mod filter;
pub mod manager;
pub mod transport;

pub use connection::{Connection, ConnectionData, TerminalGeometry, DEFAULT_TERMINAL_TYPE};
pub use event::{ConnectionEvent, ConnectionEventKind, ConnectionListener, ListenerSet};
pub use filter::{AddressFilter, ConnectionFilter};
pub use manager::{ConnectionManager, ManagerSettings};
pub use transport::{ByteSink, ByteSource, Closer, Transport};
