//! Note and highlight colors.
//!
//! Accepts `#RRGGBB` hex strings and a small set of CSS-like names.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

/// An sRGB color with 8-bit components.
///
/// Serialized as a lowercase `#rrggbb` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const YELLOW: Rgb = Rgb::new(255, 255, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Components scaled to 0.0..=1.0, the form PDF drawing operators take.
    pub fn to_unit(self) -> (f64, f64, f64) {
        (
            f64::from(self.r) / 255.0,
            f64::from(self.g) / 255.0,
            f64::from(self.b) / 255.0,
        )
    }

    /// Parses a color, treating blank strings and `none`/`transparent` as
    /// "no color".
    pub fn parse_optional(s: &str) -> Result<Option<Rgb>, ColorParseError> {
        let t = s.trim();
        if t.is_empty() || t.eq_ignore_ascii_case("none") || t.eq_ignore_ascii_case("transparent")
        {
            return Ok(None);
        }
        t.parse().map(Some)
    }
}

impl Default for Rgb {
    fn default() -> Self {
        Self::YELLOW
    }
}

/// Named colors understood by the parser.
static NAMED_COLORS: LazyLock<HashMap<&'static str, Rgb>> = LazyLock::new(|| {
    HashMap::from([
        ("yellow", Rgb::new(255, 255, 0)),
        ("red", Rgb::new(255, 0, 0)),
        ("green", Rgb::new(0, 255, 0)),
        ("blue", Rgb::new(0, 0, 255)),
        ("cyan", Rgb::new(0, 255, 255)),
        ("magenta", Rgb::new(255, 0, 255)),
        ("orange", Rgb::new(255, 128, 0)),
        ("pink", Rgb::new(255, 191, 204)),
        ("purple", Rgb::new(128, 0, 128)),
        ("gray", Rgb::new(128, 128, 128)),
        ("grey", Rgb::new(128, 128, 128)),
        ("black", Rgb::new(0, 0, 0)),
        ("white", Rgb::new(255, 255, 255)),
    ])
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorParseError(pub String);

impl fmt::Display for ColorParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognized color: {:?}", self.0)
    }
}

impl std::error::Error for ColorParseError {}

impl FromStr for Rgb {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim().to_ascii_lowercase();
        if let Some(named) = NAMED_COLORS.get(t.as_str()) {
            return Ok(*named);
        }
        let hex = t
            .strip_prefix('#')
            .filter(|h| h.len() == 6 && h.is_ascii())
            .ok_or_else(|| ColorParseError(s.to_string()))?;
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| ColorParseError(s.to_string()))
        };
        Ok(Rgb::new(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl From<Rgb> for String {
    fn from(c: Rgb) -> Self {
        c.to_string()
    }
}

impl TryFrom<String> for Rgb {
    type Error = ColorParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}
