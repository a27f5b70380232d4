//! Terminal capability descriptors
//!
//! A [`Terminal`] knows which control characters and escape sequences a
//! terminal type sends, and which byte sequences make it move the cursor,
//! erase, or change graphics rendition. Descriptors are immutable once built
//! and are looked up by name in a [`TerminalRegistry`].

mod basic;
pub mod colorizer;
mod registry;

use std::fmt;

pub use basic::{BasicTerminal, TerminalProfile};
pub use colorizer::Colorizer;
pub use registry::{TerminalRegistry, DEFAULT_TERMINAL};

use crate::io::GraphicsRendition;

/// Keys recognised on input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    Delete,
    Backspace,
    Tab,
    Enter,
}

/// How a single decoded input character is classified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Ordinary character
    Char(char),
    /// A named control key
    Key(Key),
    /// The user asked to log out
    LogoutRequest,
    /// An escape sequence has begun, more bytes are needed
    Escape,
}

/// Result of translating the bytes following an escape marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscapeOutcome {
    Key(Key),
    Unrecognized,
}

/// Cursor movement directions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Right,
    Left,
}

/// Erase operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EraseRegion {
    ToEndOfLine,
    ToBeginOfLine,
    Line,
    ToEndOfScreen,
    ToBeginOfScreen,
    Screen,
}

/// Absolute cursor placement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorPosition {
    Home,
    /// 1-based row and column
    At { row: u16, col: u16 },
}

/// Terminal functions without parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialFunction {
    StoreCursor,
    RestoreCursor,
    DeviceReset,
    LineWrap,
    NoLineWrap,
}

/// Capability descriptor for one terminal type
pub trait Terminal: Send + Sync + fmt::Debug {
    /// Name the descriptor was registered under
    fn name(&self) -> &str;

    /// Classify one decoded input character
    fn translate_control_character(&self, c: char) -> Classification;

    /// Translate the bytes read after an escape marker
    fn translate_escape_sequence(&self, sequence: &[u8]) -> EscapeOutcome;

    /// Number of raw bytes that always follow the escape marker
    fn atomic_sequence_length(&self) -> usize;

    fn erase_sequence(&self, region: EraseRegion) -> Vec<u8>;

    fn cursor_move_sequence(&self, direction: Direction, times: u16) -> Vec<u8>;

    fn cursor_position_sequence(&self, position: CursorPosition) -> Vec<u8>;

    fn special_sequence(&self, function: SpecialFunction) -> Vec<u8>;

    fn graphics_rendition_sequence(&self, rendition: GraphicsRendition) -> Vec<u8>;

    /// Sequence defining the scroll region, 1-based inclusive margins
    fn scroll_margins_sequence(&self, top: u16, bottom: u16) -> Vec<u8>;

    /// Sent whenever the descriptor gets bound to a session
    fn init_sequence(&self) -> Vec<u8>;

    /// Whether graphics rendition (color, style) is understood
    fn supports_sgr(&self) -> bool;

    /// Whether scroll regions can be defined
    fn supports_scrolling(&self) -> bool;

    /// Render markup in `text` for this terminal
    fn format(&self, text: &str) -> String;

    /// Like [`format`](Terminal::format) but with bold forced on
    fn format_bold(&self, text: &str) -> String;
}
