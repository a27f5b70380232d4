//! Terminal I/O translation layer
//!
//! [`TerminalIo`] sits between a session handler and the byte transport.
//! Reading turns decoded characters into [`InputEvent`]s using the bound
//! terminal's control table and escape translator. Writing runs text through
//! the terminal's markup formatting and turns cursor, erase, and graphics
//! commands into the terminal's byte sequences.
//!
//! One lock serializes readers and another serializes writers, so a blocked
//! read never holds up output and two writers never interleave their bytes.
//! Closing takes neither lock.

mod color;
pub mod terminal;

use std::sync::{Arc, Mutex, MutexGuard, RwLock};

pub use color::{Color, GraphicsRendition, Style};
pub use terminal::{
    Classification, CursorPosition, Direction, EraseRegion, EscapeOutcome, Key, SpecialFunction,
    Terminal, TerminalRegistry,
};

use crate::codec::{DecoderError, Encoding, PushDecoder};
use crate::net::connection::ConnectionData;
use crate::net::event::{ConnectionEvent, ConnectionEventKind, ListenerSet};
use crate::net::transport::{ByteSink, ByteSource, Closer, TransportParts};

const BELL: u8 = 0x07;

/// Error type for terminal I/O
#[derive(Debug, thiserror::Error)]
pub enum TerminalIoError {
    #[error("End of stream")]
    EndOfStream,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decoder error: {0}")]
    Decoder(#[from] DecoderError),
}

/// Result type for terminal I/O
pub type TerminalIoResult<T> = Result<T, TerminalIoError>;

/// One semantic input event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Char(char),
    Key(Key),
    /// Input was consumed without anything for the caller, such as a logout
    /// request or an escape sequence the terminal does not know
    Handled,
}

struct InputState {
    source: Box<dyn ByteSource>,
    decoder: PushDecoder,
}

struct OutputState {
    sink: Box<dyn ByteSink>,
    encoding: Encoding,
    autoflush: bool,
    force_bold: bool,
    line_wrapping: bool,
    signalling: bool,
}

impl OutputState {
    fn emit(&mut self, bytes: &[u8]) -> TerminalIoResult<()> {
        if !bytes.is_empty() {
            self.sink.write_bytes(bytes)?;
        }
        if self.autoflush {
            self.sink.flush()?;
        }
        Ok(())
    }
}

/// What a session's terminal layer is attached to
pub(crate) struct SessionContext {
    pub connection_id: u64,
    pub data: Arc<ConnectionData>,
    pub listeners: Arc<ListenerSet>,
    pub terminals: Arc<TerminalRegistry>,
}

/// Character-level input and output for one session
pub struct TerminalIo {
    input: Mutex<InputState>,
    output: Mutex<OutputState>,
    closer: Box<dyn Closer>,
    terminal: RwLock<Arc<dyn Terminal>>,
    context: SessionContext,
}

impl TerminalIo {
    pub(crate) fn new(
        transport: TransportParts,
        decoder: PushDecoder,
        context: SessionContext,
    ) -> Self {
        let TransportParts {
            source,
            sink,
            closer,
            ..
        } = transport;
        let terminal = context.terminals.get(&context.data.terminal_type());
        let encoding = decoder.encoding();
        Self {
            input: Mutex::new(InputState { source, decoder }),
            output: Mutex::new(OutputState {
                sink,
                encoding,
                autoflush: true,
                force_bold: false,
                line_wrapping: true,
                signalling: true,
            }),
            closer,
            terminal: RwLock::new(terminal),
            context,
        }
    }

    /// Read the next input event, blocking until one is available
    ///
    /// Fails with [`TerminalIoError::EndOfStream`] once the transport is
    /// closed.
    pub fn read(&self) -> TerminalIoResult<InputEvent> {
        let mut input = self
            .input
            .lock()
            .map_err(|_| TerminalIoError::EndOfStream)?;
        let c = self.read_char(&mut input)?;
        let terminal = self.terminal();

        match terminal.translate_control_character(c) {
            Classification::Char(c) => Ok(InputEvent::Char(c)),
            Classification::Key(key) => Ok(InputEvent::Key(key)),
            Classification::LogoutRequest => {
                drop(input);
                let event = ConnectionEvent::new(
                    self.context.connection_id,
                    ConnectionEventKind::LogoutRequest,
                );
                if let Err(e) = self.context.listeners.dispatch(&event) {
                    tracing::error!(
                        connection = self.context.connection_id,
                        "Logout request handler failed: {}",
                        e
                    );
                }
                Ok(InputEvent::Handled)
            }
            Classification::Escape => {
                let length = terminal.atomic_sequence_length();
                let mut sequence = Vec::with_capacity(length);
                for _ in 0..length {
                    sequence.push(self.read_raw(&mut input)?);
                }
                match terminal.translate_escape_sequence(&sequence) {
                    EscapeOutcome::Key(key) => Ok(InputEvent::Key(key)),
                    EscapeOutcome::Unrecognized => {
                        tracing::trace!(
                            connection = self.context.connection_id,
                            "Unrecognized escape sequence {:?}",
                            sequence
                        );
                        Ok(InputEvent::Handled)
                    }
                }
            }
        }
    }

    fn read_raw(&self, input: &mut InputState) -> TerminalIoResult<u8> {
        match input.source.read_byte()? {
            Some(byte) => {
                self.context.data.activity();
                Ok(byte)
            }
            None => Err(TerminalIoError::EndOfStream),
        }
    }

    fn read_char(&self, input: &mut InputState) -> TerminalIoResult<char> {
        loop {
            if input.decoder.has_output() {
                return Ok(input.decoder.read()?);
            }
            let byte = self.read_raw(input)?;
            input.decoder.write(byte);
        }
    }

    fn output(&self) -> MutexGuard<'_, OutputState> {
        match self.output.lock() {
            Ok(output) => output,
            Err(poisoned) => {
                tracing::error!(
                    connection = self.context.connection_id,
                    "Output lock poisoned, continuing"
                );
                poisoned.into_inner()
            }
        }
    }

    fn write_sequence(&self, bytes: &[u8]) -> TerminalIoResult<()> {
        self.output().emit(bytes)
    }

    /// Write text, rendering its markup for the bound terminal
    pub fn write_str(&self, text: &str) -> TerminalIoResult<()> {
        let terminal = self.terminal();
        let mut output = self.output();
        let formatted = if output.force_bold {
            terminal.format_bold(text)
        } else {
            terminal.format(text)
        };
        let bytes = output.encoding.encode(&formatted);
        output.emit(&bytes)
    }

    /// Write text followed by CR LF
    pub fn write_line(&self, text: &str) -> TerminalIoResult<()> {
        let terminal = self.terminal();
        let mut output = self.output();
        let mut formatted = if output.force_bold {
            terminal.format_bold(text)
        } else {
            terminal.format(text)
        };
        formatted.push_str("\r\n");
        let bytes = output.encoding.encode(&formatted);
        output.emit(&bytes)
    }

    pub fn write_char(&self, c: char) -> TerminalIoResult<()> {
        let mut output = self.output();
        let mut buf = [0u8; 4];
        let bytes = output.encoding.encode(c.encode_utf8(&mut buf));
        output.emit(&bytes)
    }

    /// Write one byte as is
    pub fn write_byte(&self, byte: u8) -> TerminalIoResult<()> {
        self.write_sequence(&[byte])
    }

    /// Write bytes as they are
    pub fn write_bytes(&self, bytes: &[u8]) -> TerminalIoResult<()> {
        self.write_sequence(bytes)
    }

    pub fn erase(&self, region: EraseRegion) -> TerminalIoResult<()> {
        self.write_sequence(&self.terminal().erase_sequence(region))
    }

    pub fn erase_to_end_of_line(&self) -> TerminalIoResult<()> {
        self.erase(EraseRegion::ToEndOfLine)
    }

    pub fn erase_to_begin_of_line(&self) -> TerminalIoResult<()> {
        self.erase(EraseRegion::ToBeginOfLine)
    }

    pub fn erase_line(&self) -> TerminalIoResult<()> {
        self.erase(EraseRegion::Line)
    }

    pub fn erase_to_end_of_screen(&self) -> TerminalIoResult<()> {
        self.erase(EraseRegion::ToEndOfScreen)
    }

    pub fn erase_to_begin_of_screen(&self) -> TerminalIoResult<()> {
        self.erase(EraseRegion::ToBeginOfScreen)
    }

    pub fn erase_screen(&self) -> TerminalIoResult<()> {
        self.erase(EraseRegion::Screen)
    }

    pub fn move_cursor(&self, direction: Direction, times: u16) -> TerminalIoResult<()> {
        self.write_sequence(&self.terminal().cursor_move_sequence(direction, times))
    }

    pub fn move_left(&self, times: u16) -> TerminalIoResult<()> {
        self.move_cursor(Direction::Left, times)
    }

    pub fn move_right(&self, times: u16) -> TerminalIoResult<()> {
        self.move_cursor(Direction::Right, times)
    }

    pub fn move_up(&self, times: u16) -> TerminalIoResult<()> {
        self.move_cursor(Direction::Up, times)
    }

    pub fn move_down(&self, times: u16) -> TerminalIoResult<()> {
        self.move_cursor(Direction::Down, times)
    }

    /// Place the cursor, 1-based
    pub fn set_cursor(&self, row: u16, col: u16) -> TerminalIoResult<()> {
        self.write_sequence(
            &self
                .terminal()
                .cursor_position_sequence(CursorPosition::At { row, col }),
        )
    }

    pub fn home_cursor(&self) -> TerminalIoResult<()> {
        self.write_sequence(
            &self
                .terminal()
                .cursor_position_sequence(CursorPosition::Home),
        )
    }

    pub fn store_cursor(&self) -> TerminalIoResult<()> {
        self.write_sequence(&self.terminal().special_sequence(SpecialFunction::StoreCursor))
    }

    pub fn restore_cursor(&self) -> TerminalIoResult<()> {
        self.write_sequence(&self.terminal().special_sequence(SpecialFunction::RestoreCursor))
    }

    /// Ring the bell, unless acoustic signalling is off
    pub fn bell(&self) -> TerminalIoResult<()> {
        let mut output = self.output();
        if output.signalling {
            output.emit(&[BELL])
        } else {
            Ok(())
        }
    }

    /// Define the scroll region, 1-based inclusive
    ///
    /// Returns false without writing anything if the terminal cannot scroll.
    pub fn define_scroll_region(&self, top: u16, bottom: u16) -> TerminalIoResult<bool> {
        let terminal = self.terminal();
        if !terminal.supports_scrolling() {
            return Ok(false);
        }
        self.write_sequence(&terminal.scroll_margins_sequence(top, bottom))?;
        Ok(true)
    }

    fn rendition(&self, rendition: GraphicsRendition) -> TerminalIoResult<()> {
        let terminal = self.terminal();
        if !terminal.supports_sgr() {
            return Ok(());
        }
        self.write_sequence(&terminal.graphics_rendition_sequence(rendition))
    }

    pub fn set_foreground_color(&self, color: Color) -> TerminalIoResult<()> {
        self.rendition(GraphicsRendition::Foreground(color))
    }

    pub fn set_background_color(&self, color: Color) -> TerminalIoResult<()> {
        self.rendition(GraphicsRendition::Background(color))
    }

    pub fn set_bold(&self, on: bool) -> TerminalIoResult<()> {
        self.rendition(GraphicsRendition::Style {
            style: Style::Bold,
            on,
        })
    }

    pub fn set_italic(&self, on: bool) -> TerminalIoResult<()> {
        self.rendition(GraphicsRendition::Style {
            style: Style::Italic,
            on,
        })
    }

    pub fn set_underlined(&self, on: bool) -> TerminalIoResult<()> {
        self.rendition(GraphicsRendition::Style {
            style: Style::Underlined,
            on,
        })
    }

    pub fn set_blink(&self, on: bool) -> TerminalIoResult<()> {
        self.rendition(GraphicsRendition::Style {
            style: Style::Blink,
            on,
        })
    }

    pub fn reset_attributes(&self) -> TerminalIoResult<()> {
        self.rendition(GraphicsRendition::Reset)
    }

    /// Send the device reset sequence
    pub fn reset_terminal(&self) -> TerminalIoResult<()> {
        self.write_sequence(&self.terminal().special_sequence(SpecialFunction::DeviceReset))
    }

    /// Switch line wrapping, writing only if the mode actually changes
    pub fn set_line_wrapping(&self, on: bool) -> TerminalIoResult<()> {
        let terminal = self.terminal();
        let mut output = self.output();
        if output.line_wrapping == on {
            return Ok(());
        }
        let function = if on {
            SpecialFunction::LineWrap
        } else {
            SpecialFunction::NoLineWrap
        };
        output.emit(&terminal.special_sequence(function))?;
        output.line_wrapping = on;
        Ok(())
    }

    pub fn is_line_wrapping(&self) -> bool {
        self.output().line_wrapping
    }

    pub fn set_autoflush(&self, autoflush: bool) {
        self.output().autoflush = autoflush;
    }

    pub fn is_autoflush(&self) -> bool {
        self.output().autoflush
    }

    /// Render all formatted text bold
    pub fn set_force_bold(&self, force_bold: bool) {
        self.output().force_bold = force_bold;
    }

    pub fn is_force_bold(&self) -> bool {
        self.output().force_bold
    }

    pub fn set_signalling(&self, signalling: bool) {
        self.output().signalling = signalling;
    }

    pub fn is_signalling(&self) -> bool {
        self.output().signalling
    }

    pub fn flush(&self) -> TerminalIoResult<()> {
        self.output().sink.flush()?;
        Ok(())
    }

    /// Close the transport, waking up a blocked reader or writer
    pub fn close(&self) -> TerminalIoResult<()> {
        self.closer.close()?;
        Ok(())
    }

    /// The currently bound terminal
    pub fn terminal(&self) -> Arc<dyn Terminal> {
        match self.terminal.read() {
            Ok(terminal) => Arc::clone(&terminal),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Bind the terminal registered under `name` and initialise it
    ///
    /// Unknown names bind the registry's default terminal.
    pub fn set_terminal(&self, name: &str) -> TerminalIoResult<()> {
        let terminal = self.context.terminals.get(name);
        self.context.data.set_terminal_type(name);
        let mut output = self.output();
        match self.terminal.write() {
            Ok(mut bound) => *bound = Arc::clone(&terminal),
            Err(poisoned) => *poisoned.into_inner() = Arc::clone(&terminal),
        }
        tracing::debug!(
            connection = self.context.connection_id,
            requested = name,
            terminal = terminal.name(),
            "Terminal bound"
        );
        output.emit(&terminal.init_sequence())?;
        output.sink.flush()?;
        Ok(())
    }

    /// Bind the terminal type stored in the connection data
    pub fn set_default_terminal(&self) -> TerminalIoResult<()> {
        let name = self.context.data.terminal_type();
        self.set_terminal(&name)
    }

    pub fn rows(&self) -> u16 {
        self.context.data.geometry().height
    }

    pub fn columns(&self) -> u16 {
        self.context.data.geometry().width
    }

    /// Whether the window size changed since the last call
    pub fn is_geometry_changed(&self) -> bool {
        self.context.data.take_geometry_changed()
    }
}

impl std::fmt::Debug for TerminalIo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalIo")
            .field("connection", &self.context.connection_id)
            .field("terminal", &self.terminal().name())
            .finish()
    }
}
