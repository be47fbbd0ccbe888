use std::fmt::Display;

/// ANSI SGR codes used to decorate terminal output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Palette {
    Grey = 30,
    Red = 31,
    Green = 32,
    Yellow = 33,
    Blue = 34,
    Magenta = 35,
    Cyan = 36,
    White = 37,
    Bold = 1,
}

impl Palette {
    /// Wrap `obj` in this escape code and a trailing reset.
    pub fn format(self, obj: impl Display) -> String {
        format!("\x1b[{}m{}\x1b[0m", self as u8, obj)
    }
}
