//! ANSI/VT100 style terminal descriptor
//!
//! All built-in terminal types share the same escape vocabulary and differ
//! only in what they support, which a [`TerminalProfile`] captures.

use super::{
    Classification, Colorizer, CursorPosition, Direction, EraseRegion, EscapeOutcome, Key,
    SpecialFunction, Terminal,
};
use crate::io::GraphicsRendition;

const ESC: u8 = 0x1b;
const CSI: &[u8] = b"\x1b[";

/// Capabilities of a terminal type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalProfile {
    pub name: String,
    /// Graphics rendition (colors and styles)
    pub sgr: bool,
    /// Scroll region definition (DECSTBM)
    pub scrolling: bool,
}

impl TerminalProfile {
    pub fn new(name: impl Into<String>, sgr: bool, scrolling: bool) -> Self {
        Self {
            name: name.into(),
            sgr,
            scrolling,
        }
    }
}

/// Terminal descriptor speaking ANSI X3.64 sequences
#[derive(Debug, Clone)]
pub struct BasicTerminal {
    profile: TerminalProfile,
    colorizer: Colorizer,
}

impl BasicTerminal {
    pub fn new(profile: TerminalProfile) -> Self {
        Self {
            profile,
            colorizer: Colorizer::new(),
        }
    }

    pub fn profile(&self) -> &TerminalProfile {
        &self.profile
    }
}

/// CSI followed by the parameters and the final byte
fn csi(params: &str, final_byte: u8) -> Vec<u8> {
    let mut seq = Vec::with_capacity(CSI.len() + params.len() + 1);
    seq.extend_from_slice(CSI);
    seq.extend_from_slice(params.as_bytes());
    seq.push(final_byte);
    seq
}

impl Terminal for BasicTerminal {
    fn name(&self) -> &str {
        &self.profile.name
    }

    fn translate_control_character(&self, c: char) -> Classification {
        match c {
            '\x7f' => Classification::Key(Key::Delete),
            '\x08' => Classification::Key(Key::Backspace),
            '\t' => Classification::Key(Key::Tab),
            '\n' => Classification::Key(Key::Enter),
            // EOT, Ctrl-D
            '\x04' => Classification::LogoutRequest,
            '\x1b' => Classification::Escape,
            _ => Classification::Char(c),
        }
    }

    fn translate_escape_sequence(&self, sequence: &[u8]) -> EscapeOutcome {
        // CSI in normal cursor mode, SS3 in application cursor mode
        let &[b'[' | b'O', code, ..] = sequence else {
            return EscapeOutcome::Unrecognized;
        };
        let key = match code {
            b'A' => Key::Up,
            b'B' => Key::Down,
            b'C' => Key::Right,
            b'D' => Key::Left,
            b'H' => Key::Home,
            b'F' => Key::End,
            _ => return EscapeOutcome::Unrecognized,
        };
        EscapeOutcome::Key(key)
    }

    fn atomic_sequence_length(&self) -> usize {
        2
    }

    fn erase_sequence(&self, region: EraseRegion) -> Vec<u8> {
        match region {
            EraseRegion::ToEndOfLine => csi("", b'K'),
            EraseRegion::ToBeginOfLine => csi("1", b'K'),
            EraseRegion::Line => csi("2", b'K'),
            EraseRegion::ToEndOfScreen => csi("", b'J'),
            EraseRegion::ToBeginOfScreen => csi("1", b'J'),
            EraseRegion::Screen => csi("2", b'J'),
        }
    }

    fn cursor_move_sequence(&self, direction: Direction, times: u16) -> Vec<u8> {
        if times == 0 {
            return Vec::new();
        }
        let final_byte = match direction {
            Direction::Up => b'A',
            Direction::Down => b'B',
            Direction::Right => b'C',
            Direction::Left => b'D',
        };
        if times == 1 {
            csi("", final_byte)
        } else {
            csi(&times.to_string(), final_byte)
        }
    }

    fn cursor_position_sequence(&self, position: CursorPosition) -> Vec<u8> {
        match position {
            CursorPosition::Home => csi("", b'H'),
            CursorPosition::At { row, col } => csi(&format!("{};{}", row, col), b'H'),
        }
    }

    fn special_sequence(&self, function: SpecialFunction) -> Vec<u8> {
        match function {
            SpecialFunction::StoreCursor => vec![ESC, b'7'],
            SpecialFunction::RestoreCursor => vec![ESC, b'8'],
            SpecialFunction::DeviceReset => vec![ESC, b'c'],
            SpecialFunction::LineWrap => csi("?7", b'h'),
            SpecialFunction::NoLineWrap => csi("?7", b'l'),
        }
    }

    fn graphics_rendition_sequence(&self, rendition: GraphicsRendition) -> Vec<u8> {
        csi(&rendition.parameter().to_string(), b'm')
    }

    fn scroll_margins_sequence(&self, top: u16, bottom: u16) -> Vec<u8> {
        csi(&format!("{};{}", top, bottom), b'r')
    }

    fn init_sequence(&self) -> Vec<u8> {
        if self.profile.sgr {
            self.graphics_rendition_sequence(GraphicsRendition::Reset)
        } else {
            Vec::new()
        }
    }

    fn supports_sgr(&self) -> bool {
        self.profile.sgr
    }

    fn supports_scrolling(&self) -> bool {
        self.profile.scrolling
    }

    fn format(&self, text: &str) -> String {
        self.colorizer.colorize(text, self.profile.sgr, false)
    }

    fn format_bold(&self, text: &str) -> String {
        self.colorizer.colorize(text, self.profile.sgr, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{Color, Style};

    fn xterm() -> BasicTerminal {
        BasicTerminal::new(TerminalProfile::new("xterm", true, true))
    }

    #[test]
    fn test_control_characters() {
        let term = xterm();
        assert_eq!(
            term.translate_control_character('\x7f'),
            Classification::Key(Key::Delete)
        );
        assert_eq!(
            term.translate_control_character('\x08'),
            Classification::Key(Key::Backspace)
        );
        assert_eq!(
            term.translate_control_character('\n'),
            Classification::Key(Key::Enter)
        );
        assert_eq!(
            term.translate_control_character('\x04'),
            Classification::LogoutRequest
        );
        assert_eq!(term.translate_control_character('\x1b'), Classification::Escape);
        assert_eq!(term.translate_control_character('x'), Classification::Char('x'));
        assert_eq!(term.translate_control_character('♥'), Classification::Char('♥'));
    }

    #[test]
    fn test_escape_sequences() {
        let term = xterm();
        assert_eq!(term.translate_escape_sequence(b"[A"), EscapeOutcome::Key(Key::Up));
        assert_eq!(term.translate_escape_sequence(b"[D"), EscapeOutcome::Key(Key::Left));
        assert_eq!(term.translate_escape_sequence(b"OB"), EscapeOutcome::Key(Key::Down));
        assert_eq!(term.translate_escape_sequence(b"[F"), EscapeOutcome::Key(Key::End));
        assert_eq!(term.translate_escape_sequence(b"[Z"), EscapeOutcome::Unrecognized);
        assert_eq!(term.translate_escape_sequence(b"xA"), EscapeOutcome::Unrecognized);
        assert_eq!(term.translate_escape_sequence(b"["), EscapeOutcome::Unrecognized);
    }

    #[test]
    fn test_cursor_sequences() {
        let term = xterm();
        assert_eq!(term.cursor_move_sequence(Direction::Up, 1), b"\x1b[A");
        assert_eq!(term.cursor_move_sequence(Direction::Left, 12), b"\x1b[12D");
        assert!(term.cursor_move_sequence(Direction::Down, 0).is_empty());
        assert_eq!(term.cursor_position_sequence(CursorPosition::Home), b"\x1b[H");
        assert_eq!(
            term.cursor_position_sequence(CursorPosition::At { row: 5, col: 10 }),
            b"\x1b[5;10H"
        );
    }

    #[test]
    fn test_erase_sequences() {
        let term = xterm();
        assert_eq!(term.erase_sequence(EraseRegion::ToEndOfLine), b"\x1b[K");
        assert_eq!(term.erase_sequence(EraseRegion::Line), b"\x1b[2K");
        assert_eq!(term.erase_sequence(EraseRegion::ToBeginOfScreen), b"\x1b[1J");
        assert_eq!(term.erase_sequence(EraseRegion::Screen), b"\x1b[2J");
    }

    #[test]
    fn test_graphics_rendition() {
        let term = xterm();
        assert_eq!(
            term.graphics_rendition_sequence(GraphicsRendition::Foreground(Color::Green)),
            b"\x1b[32m"
        );
        assert_eq!(
            term.graphics_rendition_sequence(GraphicsRendition::Style {
                style: Style::Bold,
                on: true
            }),
            b"\x1b[1m"
        );
        assert_eq!(term.scroll_margins_sequence(2, 20), b"\x1b[2;20r");
    }

    #[test]
    fn test_init_depends_on_sgr() {
        assert_eq!(xterm().init_sequence(), b"\x1b[0m");
        let vt100 = BasicTerminal::new(TerminalProfile::new("vt100", false, true));
        assert!(vt100.init_sequence().is_empty());
    }

    #[test]
    fn test_format_strips_markup_without_sgr() {
        let vt100 = BasicTerminal::new(TerminalProfile::new("vt100", false, true));
        let text = crate::io::terminal::colorizer::bold("hi");
        assert_eq!(vt100.format(&text), "hi");
        assert_eq!(xterm().format(&text), "\x1b[1mhi\x1b[22m\x1b[0m");
    }
}
