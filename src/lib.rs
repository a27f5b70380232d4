//! Embeddable telnet terminal server core
//!
//! Accepts byte-stream connections, binds each to a terminal capability
//! descriptor, and gives session handlers semantic input events while
//! translating their output commands into terminal byte sequences.
//!
//! - `codec`: incremental decoding of bytes into characters
//! - `io`: the per-session terminal translation layer and terminal descriptors
//! - `net`: transports, connections, and the connection manager
//! - `shell`: session handlers and their registry
//! - `app`: configuration and logging setup

pub mod app;
pub mod codec;
pub mod io;
pub mod net;
pub mod shell;

pub use app::{Config, ConfigError};
pub use io::{InputEvent, TerminalIo, TerminalIoError, TerminalIoResult};
pub use net::{Connection, ConnectionManager, Transport};
pub use shell::{Shell, ShellRegistry};
