//! Colors and text styles for graphics rendition

/// The 16 ANSI colors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
    BrightBlack,
    BrightRed,
    BrightGreen,
    BrightYellow,
    BrightBlue,
    BrightMagenta,
    BrightCyan,
    BrightWhite,
}

impl Color {
    /// SGR parameter selecting this color as foreground
    pub fn as_foreground(self) -> u8 {
        match self {
            Color::Black => 30,
            Color::Red => 31,
            Color::Green => 32,
            Color::Yellow => 33,
            Color::Blue => 34,
            Color::Magenta => 35,
            Color::Cyan => 36,
            Color::White => 37,
            Color::BrightBlack => 90,
            Color::BrightRed => 91,
            Color::BrightGreen => 92,
            Color::BrightYellow => 93,
            Color::BrightBlue => 94,
            Color::BrightMagenta => 95,
            Color::BrightCyan => 96,
            Color::BrightWhite => 97,
        }
    }

    /// SGR parameter selecting this color as background
    pub fn as_background(self) -> u8 {
        self.as_foreground() + 10
    }
}

/// Text styles that can be switched on and off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Style {
    Bold,
    Italic,
    Underlined,
    Blink,
}

impl Style {
    /// SGR parameter switching the style on or off
    pub fn sgr(self, on: bool) -> u8 {
        match (self, on) {
            (Style::Bold, true) => 1,
            (Style::Bold, false) => 22,
            (Style::Italic, true) => 3,
            (Style::Italic, false) => 23,
            (Style::Underlined, true) => 4,
            (Style::Underlined, false) => 24,
            (Style::Blink, true) => 5,
            (Style::Blink, false) => 25,
        }
    }
}

/// A graphics rendition change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphicsRendition {
    Foreground(Color),
    Background(Color),
    Style { style: Style, on: bool },
    /// Reset all attributes
    Reset,
}

impl GraphicsRendition {
    /// The SGR parameter for this change
    pub fn parameter(self) -> u8 {
        match self {
            GraphicsRendition::Foreground(color) => color.as_foreground(),
            GraphicsRendition::Background(color) => color.as_background(),
            GraphicsRendition::Style { style, on } => style.sgr(on),
            GraphicsRendition::Reset => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_codes() {
        assert_eq!(Color::Black.as_foreground(), 30);
        assert_eq!(Color::White.as_background(), 47);
        assert_eq!(Color::BrightMagenta.as_background(), 105);
        assert_eq!(Color::BrightWhite.as_foreground(), 97);
    }

    #[test]
    fn test_rendition_parameters() {
        assert_eq!(GraphicsRendition::Reset.parameter(), 0);
        assert_eq!(
            GraphicsRendition::Style {
                style: Style::Underlined,
                on: false
            }
            .parameter(),
            24
        );
        assert_eq!(GraphicsRendition::Background(Color::Green).parameter(), 42);
    }
}
