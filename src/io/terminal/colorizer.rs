//! In-band color and style markup
//!
//! Text written through a session may carry markup: the [`MARKER`] character
//! followed by one attribute letter. Terminals that understand graphics
//! rendition get the matching SGR sequence, all others get the markup
//! stripped.
//!
//! | letter | attribute | letter | attribute |
//! |---|---|---|---|
//! | `S R G Y B M C W` | black..white foreground | `s r g y b m c w` | black..white background |
//! | `f` | bold | `d` | normal intensity |
//! | `i` | italic | `j` | italic off |
//! | `u` | underlined | `v` | underline off |
//! | `e` | blink | `n` | steady |
//! | `h` | concealed | `a` | reset all |

use unicode_width::UnicodeWidthStr;

use crate::io::Color;

/// Introduces one markup attribute
pub const MARKER: char = '\u{1}';

const BOLD: u8 = 1;
const RESET: u8 = 0;

/// SGR parameter for a markup letter
fn attribute(key: char) -> Option<u8> {
    let code = match key {
        'S' => 30,
        'R' => 31,
        'G' => 32,
        'Y' => 33,
        'B' => 34,
        'M' => 35,
        'C' => 36,
        'W' => 37,
        's' => 40,
        'r' => 41,
        'g' => 42,
        'y' => 43,
        'b' => 44,
        'm' => 45,
        'c' => 46,
        'w' => 47,
        'f' => BOLD,
        'd' => 22,
        'i' => 3,
        'j' => 23,
        'u' => 4,
        'v' => 24,
        'e' => 5,
        'n' => 25,
        'h' => 8,
        'a' => RESET,
        _ => return None,
    };
    Some(code)
}

/// Translates markup into SGR escape sequences
#[derive(Debug, Clone)]
pub struct Colorizer {
    auto_reset: bool,
}

impl Default for Colorizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Colorizer {
    /// Create a colorizer that resets attributes after colored text
    pub fn new() -> Self {
        Self { auto_reset: true }
    }

    /// Whether a reset is appended after text that contained markup, unless
    /// the markup already ended with one
    pub fn is_auto_reset(&self) -> bool {
        self.auto_reset
    }

    pub fn set_auto_reset(&mut self, auto_reset: bool) {
        self.auto_reset = auto_reset;
    }

    /// Translate markup in `text`
    ///
    /// With `support` off the markup is removed and no escape sequences are
    /// produced. `force_bold` adds bold to every emitted attribute.
    pub fn colorize(&self, text: &str, support: bool, force_bold: bool) -> String {
        let mut out = String::with_capacity(text.len() + 20);
        let mut chars = text.chars();
        let mut saw_markup = false;
        // Attributes are already plain after an explicit reset
        let mut reset_last = false;

        while let Some(c) = chars.next() {
            if c != MARKER {
                out.push(c);
                continue;
            }
            saw_markup = true;
            let Some(key) = chars.next() else {
                break;
            };
            if !support {
                continue;
            }
            if let Some(code) = attribute(key) {
                push_sequence(&mut out, code, force_bold);
                reset_last = code == RESET && !force_bold;
            }
        }

        if support && saw_markup && self.auto_reset && !reset_last {
            push_sequence(&mut out, RESET, false);
        }
        out
    }
}

fn push_sequence(out: &mut String, code: u8, force_bold: bool) {
    out.push_str("\x1b[");
    out.push_str(&code.to_string());
    if force_bold && code != BOLD {
        out.push(';');
        out.push_str(&BOLD.to_string());
    }
    out.push('m');
}

/// Remove all markup from `text`
pub fn strip_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == MARKER {
            chars.next();
        } else {
            out.push(c);
        }
    }
    out
}

/// Display width of `text` once the markup is gone
pub fn visible_width(text: &str) -> usize {
    strip_markup(text).width()
}

/// Markup letter for a color, plus whether it needs bold for the bright variant
fn color_key(color: Color) -> (char, bool) {
    match color {
        Color::Black => ('S', false),
        Color::Red => ('R', false),
        Color::Green => ('G', false),
        Color::Yellow => ('Y', false),
        Color::Blue => ('B', false),
        Color::Magenta => ('M', false),
        Color::Cyan => ('C', false),
        Color::White => ('W', false),
        Color::BrightBlack => ('S', true),
        Color::BrightRed => ('R', true),
        Color::BrightGreen => ('G', true),
        Color::BrightYellow => ('Y', true),
        Color::BrightBlue => ('B', true),
        Color::BrightMagenta => ('M', true),
        Color::BrightCyan => ('C', true),
        Color::BrightWhite => ('W', true),
    }
}

fn wrap(text: &str, on: &[char], off: char) -> String {
    let mut out = String::with_capacity(text.len() + on.len() * 2 + 2);
    for key in on {
        out.push(MARKER);
        out.push(*key);
    }
    out.push_str(text);
    out.push(MARKER);
    out.push(off);
    out
}

/// Mark `text` with a foreground color
///
/// Bright colors are rendered as the base color in bold.
pub fn foreground(text: &str, color: Color) -> String {
    match color_key(color) {
        (key, false) => wrap(text, &[key], 'a'),
        (key, true) => wrap(text, &[key, 'f'], 'a'),
    }
}

/// Mark `text` with a background color
pub fn background(text: &str, color: Color) -> String {
    let (key, _) = color_key(color);
    wrap(text, &[key.to_ascii_lowercase()], 'a')
}

pub fn bold(text: &str) -> String {
    wrap(text, &['f'], 'd')
}

pub fn italic(text: &str) -> String {
    wrap(text, &['i'], 'j')
}

pub fn underlined(text: &str) -> String {
    wrap(text, &['u'], 'v')
}

pub fn blinking(text: &str) -> String {
    wrap(text, &['e'], 'n')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_untouched() {
        let colorizer = Colorizer::new();
        assert_eq!(colorizer.colorize("hello", true, false), "hello");
        assert_eq!(colorizer.colorize("hello", false, false), "hello");
    }

    #[test]
    fn test_foreground_markup() {
        let colorizer = Colorizer::new();
        let text = foreground("RED", Color::Red);
        assert_eq!(
            colorizer.colorize(&text, true, false),
            "\x1b[31mRED\x1b[0m"
        );
    }

    #[test]
    fn test_auto_reset_after_other_attributes() {
        let colorizer = Colorizer::new();
        let text = format!("{}R", foreground("a", Color::Red));
        assert_eq!(
            colorizer.colorize(&text, true, false),
            "\x1b[31ma\x1b[0m\x1b[31m\x1b[0m"
        );
        // A forced-bold reset re-enables bold, so the plain one still follows
        let text = foreground("a", Color::Red);
        assert_eq!(
            colorizer.colorize(&text, true, true),
            "\x1b[31;1ma\x1b[0;1m\x1b[0m"
        );
    }

    #[test]
    fn test_markup_stripped_without_support() {
        let colorizer = Colorizer::new();
        let text = bold(&background("X", Color::Blue));
        assert_eq!(colorizer.colorize(&text, false, false), "X");
    }

    #[test]
    fn test_force_bold() {
        let mut colorizer = Colorizer::new();
        colorizer.set_auto_reset(false);
        let text = format!("{}Gx{}f", MARKER, MARKER);
        assert_eq!(colorizer.colorize(&text, true, true), "\x1b[32;1mx\x1b[1m");
    }

    #[test]
    fn test_bright_color_uses_bold() {
        let mut colorizer = Colorizer::new();
        colorizer.set_auto_reset(false);
        let text = foreground("ok", Color::BrightGreen);
        assert_eq!(
            colorizer.colorize(&text, true, false),
            "\x1b[32m\x1b[1mok\x1b[0m"
        );
    }

    #[test]
    fn test_unknown_and_dangling_markers() {
        let colorizer = Colorizer::new();
        let text = format!("a{}Zb{}", MARKER, MARKER);
        assert_eq!(colorizer.colorize(&text, true, false), "ab\x1b[0m");
    }

    #[test]
    fn test_visible_width() {
        let text = format!("{}{}", bold("BANNER"), underlined("漢字"));
        assert_eq!(visible_width(&text), 10);
        assert_eq!(strip_markup(&text), "BANNER漢字");
    }
}
