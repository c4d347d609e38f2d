//! Colour parsing for script options.

use std::fmt;

/// Opaque RGB colour; transparency is carried separately as `alpha` on artists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const GRID: Color = Color::rgb(0xb0, 0xb0, 0xb0);

    /// The `i`-th entry of the default property cycle, wrapping around.
    pub fn cycle(index: usize) -> Color {
        TAB10[index % TAB10.len()].1
    }

    /// Parse `#rrggbb`, `#rgb`, `C0`..`C9`, `tab:*`, single-letter shorthands and CSS names.
    pub fn parse(value: &str) -> Option<Color> {
        let value = value.trim();
        if let Some(hex) = value.strip_prefix('#') {
            return parse_hex(hex);
        }

        let lower = value.to_ascii_lowercase();
        if let Some(digit) = lower.strip_prefix('c') {
            if let Ok(index) = digit.parse::<usize>() {
                return (index < TAB10.len()).then(|| Color::cycle(index));
            }
        }

        TAB10
            .iter()
            .chain(SHORTHANDS)
            .chain(CSS_NAMES)
            .find(|(name, _)| *name == lower)
            .map(|(_, color)| *color)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

fn parse_hex(hex: &str) -> Option<Color> {
    let expand = |c: u8| c * 17;
    match hex.len() {
        6 => {
            let value = u32::from_str_radix(hex, 16).ok()?;
            Some(Color::rgb(
                ((value >> 16) & 0xff) as u8,
                ((value >> 8) & 0xff) as u8,
                (value & 0xff) as u8,
            ))
        }
        3 => {
            let value = u16::from_str_radix(hex, 16).ok()?;
            Some(Color::rgb(
                expand(((value >> 8) & 0xf) as u8),
                expand(((value >> 4) & 0xf) as u8),
                expand((value & 0xf) as u8),
            ))
        }
        _ => None,
    }
}

const TAB10: &[(&str, Color)] = &[
    ("tab:blue", Color::rgb(0x1f, 0x77, 0xb4)),
    ("tab:orange", Color::rgb(0xff, 0x7f, 0x0e)),
    ("tab:green", Color::rgb(0x2c, 0xa0, 0x2c)),
    ("tab:red", Color::rgb(0xd6, 0x27, 0x28)),
    ("tab:purple", Color::rgb(0x94, 0x67, 0xbd)),
    ("tab:brown", Color::rgb(0x8c, 0x56, 0x4b)),
    ("tab:pink", Color::rgb(0xe3, 0x77, 0xc2)),
    ("tab:gray", Color::rgb(0x7f, 0x7f, 0x7f)),
    ("tab:olive", Color::rgb(0xbc, 0xbd, 0x22)),
    ("tab:cyan", Color::rgb(0x17, 0xbe, 0xcf)),
];

const SHORTHANDS: &[(&str, Color)] = &[
    ("b", Color::rgb(0, 0, 255)),
    ("g", Color::rgb(0, 128, 0)),
    ("r", Color::rgb(255, 0, 0)),
    ("c", Color::rgb(0, 191, 191)),
    ("m", Color::rgb(191, 0, 191)),
    ("y", Color::rgb(191, 191, 0)),
    ("k", Color::BLACK),
    ("w", Color::WHITE),
];

const CSS_NAMES: &[(&str, Color)] = &[
    ("black", Color::BLACK),
    ("white", Color::WHITE),
    ("red", Color::rgb(255, 0, 0)),
    ("green", Color::rgb(0, 128, 0)),
    ("blue", Color::rgb(0, 0, 255)),
    ("orange", Color::rgb(255, 165, 0)),
    ("purple", Color::rgb(128, 0, 128)),
    ("brown", Color::rgb(165, 42, 42)),
    ("pink", Color::rgb(255, 192, 203)),
    ("gray", Color::rgb(128, 128, 128)),
    ("grey", Color::rgb(128, 128, 128)),
    ("lightgray", Color::rgb(211, 211, 211)),
    ("darkgray", Color::rgb(169, 169, 169)),
    ("olive", Color::rgb(128, 128, 0)),
    ("cyan", Color::rgb(0, 255, 255)),
    ("magenta", Color::rgb(255, 0, 255)),
    ("yellow", Color::rgb(255, 255, 0)),
    ("navy", Color::rgb(0, 0, 128)),
    ("teal", Color::rgb(0, 128, 128)),
    ("maroon", Color::rgb(128, 0, 0)),
    ("gold", Color::rgb(255, 215, 0)),
    ("lightblue", Color::rgb(173, 216, 230)),
    ("darkblue", Color::rgb(0, 0, 139)),
    ("darkgreen", Color::rgb(0, 100, 0)),
    ("darkred", Color::rgb(139, 0, 0)),
    ("steelblue", Color::rgb(70, 130, 180)),
    ("crimson", Color::rgb(220, 20, 60)),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_forms() {
        assert_eq!(Color::parse("#1f77b4"), Some(Color::rgb(0x1f, 0x77, 0xb4)));
        assert_eq!(Color::parse("#fff"), Some(Color::WHITE));
        assert_eq!(Color::parse("#12345"), None);
    }

    #[test]
    fn parses_cycle_and_names() {
        assert_eq!(Color::parse("C1"), Some(Color::cycle(1)));
        assert_eq!(Color::parse("tab:red"), Some(Color::rgb(0xd6, 0x27, 0x28)));
        assert_eq!(Color::parse("k"), Some(Color::BLACK));
        assert_eq!(Color::parse("SteelBlue"), Some(Color::rgb(70, 130, 180)));
        assert_eq!(Color::parse("C12"), None);
        assert_eq!(Color::parse("not-a-colour"), None);
    }

    #[test]
    fn displays_as_svg_hex() {
        assert_eq!(Color::rgb(255, 0, 16).to_string(), "#ff0010");
    }
}
