//! Demo shell echoing every input event back

use std::sync::{Arc, Weak};

use super::Shell;
use crate::io::{Color, InputEvent, TerminalIoResult};
use crate::net::{Connection, ConnectionEvent, ConnectionListener};

/// Prints the connection details, then echoes input until `q`
#[derive(Debug, Default)]
pub struct EchoShell;

impl EchoShell {
    pub const ID: &'static str = "echo";

    pub fn create() -> Box<dyn Shell> {
        Box::new(EchoShell)
    }

    fn banner(connection: &Connection) -> TerminalIoResult<()> {
        let io = connection.io();
        let data = connection.data();
        io.set_autoflush(false);
        io.write_line(&format!("              host = {}", data.host()))?;
        io.write_line(&format!("              port = {}", data.port()))?;
        io.write_line(&format!("     terminal type = {}", data.terminal_type()))?;
        io.write_line(&format!("    bound terminal = {}", io.terminal().name()))?;
        let geometry = data.geometry();
        io.write_line(&format!("          geometry = {}x{}", geometry.width, geometry.height))?;
        io.write_line(&format!("       login shell = {}", data.login_shell()))?;
        io.write_line(&format!("         line mode = {}", data.is_line_mode()))?;
        io.write_line("  UTF-8 symbol: ♥")?;
        io.set_bold(true)?;
        io.write_line(" This is BOLD")?;
        io.set_underlined(true)?;
        io.write_line(" This is UNDERLINED and BOLD")?;
        io.set_background_color(Color::BrightMagenta)?;
        io.set_foreground_color(Color::Green)?;
        io.write_line(" This is GREEN, on HOT PINK")?;
        io.reset_attributes()?;
        io.flush()?;
        io.set_autoflush(true);
        Ok(())
    }
}

fn printable(c: char) -> char {
    if c.is_control() {
        '.'
    } else {
        c
    }
}

impl Shell for EchoShell {
    fn run(&mut self, connection: &Arc<Connection>) -> TerminalIoResult<()> {
        connection.add_listener(Arc::new(EchoListener {
            connection: Arc::downgrade(connection),
        }));
        Self::banner(connection)?;

        let io = connection.io();
        loop {
            match io.read()? {
                InputEvent::Char(c) => {
                    io.write_line(&format!("{} (0x{:x})", printable(c), u32::from(c)))?;
                    if c == 'q' {
                        return Ok(());
                    }
                }
                InputEvent::Key(key) => io.write_line(&format!("{:?}", key))?,
                InputEvent::Handled => {}
            }
        }
    }
}

struct EchoListener {
    connection: Weak<Connection>,
}

impl EchoListener {
    fn notify(&self, message: &str) -> TerminalIoResult<()> {
        match self.connection.upgrade() {
            Some(connection) => {
                connection.io().write_line(message)?;
                connection.io().flush()
            }
            None => Ok(()),
        }
    }

    /// Say goodbye, closing even if the message cannot be delivered
    fn notify_and_close(&self, message: &str) -> TerminalIoResult<()> {
        let result = self.notify(message);
        if let Some(connection) = self.connection.upgrade() {
            connection.close();
        }
        result
    }
}

impl ConnectionListener for EchoListener {
    fn connection_idle(&self, _event: &ConnectionEvent) -> TerminalIoResult<()> {
        self.notify("CONNECTION_IDLE")
    }

    fn connection_timed_out(&self, _event: &ConnectionEvent) -> TerminalIoResult<()> {
        self.notify_and_close("CONNECTION_TIMEDOUT")
    }

    fn connection_logout_request(&self, _event: &ConnectionEvent) -> TerminalIoResult<()> {
        self.notify_and_close("CONNECTION_LOGOUTREQUEST")
    }

    fn connection_sent_break(&self, _event: &ConnectionEvent) -> TerminalIoResult<()> {
        self.notify("CONNECTION_BREAK")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_printable() {
        assert_eq!(printable('a'), 'a');
        assert_eq!(printable('\r'), '.');
        assert_eq!(printable('\u{1}'), '.');
        assert_eq!(printable('♥'), '♥');
    }
}
