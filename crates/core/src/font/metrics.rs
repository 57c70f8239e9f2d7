//! Glyph width tables for the fonts notes are set in.
//!
//! Widths are in 1/1000 em, as in AFM files and PDF width arrays.

/// Width source used by the note sizer.
pub trait FontMetrics: Send + Sync {
    /// Width of one character in 1/1000 em.
    fn char_width(&self, ch: char) -> f64;

    /// Font name, for logs.
    fn name(&self) -> &str;

    /// Horizontal scale factor (default 0.001).
    fn hscale(&self) -> f64 {
        0.001
    }

    /// Rendered width of `text` at `font_size` points.
    fn text_width(&self, text: &str, font_size: f64) -> f64 {
        let units: f64 = text.chars().map(|ch| self.char_width(ch)).sum();
        units * self.hscale() * font_size
    }
}

/// Helvetica widths for printable ASCII, starting at U+0020.
const HELVETICA_ASCII: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // '0'..'?'
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 'P'..'_'
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // '`'..'o'
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 'p'..'~'
];

/// Standard 14 Helvetica.
#[derive(Debug, Clone, Copy, Default)]
pub struct Helvetica;

impl Helvetica {
    const DEFAULT_WIDTH: f64 = 556.0;

    fn latin1_width(ch: char) -> Option<f64> {
        let w = match ch {
            '\u{a0}' => 278,
            '‘' | '’' | '‚' => 222,
            '“' | '”' | '„' => 333,
            '–' => 556,
            '—' => 1000,
            '…' => 1000,
            '•' => 350,
            '·' => 278,
            'À'..='Å' => 667,
            'Ç' => 722,
            'È'..='Ë' => 667,
            'Ì'..='Ï' => 278,
            'Ñ' => 722,
            'Ò'..='Ö' | 'Ø' => 778,
            'Ù'..='Ü' => 722,
            'ß' => 611,
            'à'..='å' => 556,
            'æ' => 889,
            'ç' => 500,
            'è'..='ë' => 556,
            'ì'..='ï' => 278,
            'ñ'..='ö' | 'ø' => 556,
            'ù'..='ü' => 556,
            _ => return None,
        };
        Some(f64::from(w))
    }
}

impl FontMetrics for Helvetica {
    fn char_width(&self, ch: char) -> f64 {
        let code = ch as u32;
        if (0x20..0x7f).contains(&code) {
            return f64::from(HELVETICA_ASCII[(code - 0x20) as usize]);
        }
        if ch.is_control() {
            return 0.0;
        }
        Self::latin1_width(ch).unwrap_or(Self::DEFAULT_WIDTH)
    }

    fn name(&self) -> &str {
        "Helvetica"
    }
}

/// Every glyph has the same advance, like Courier.
#[derive(Debug, Clone, Copy)]
pub struct FixedPitch {
    pub width: f64,
}

impl FixedPitch {
    pub const fn courier() -> Self {
        Self { width: 600.0 }
    }
}

impl Default for FixedPitch {
    fn default() -> Self {
        Self::courier()
    }
}

impl FontMetrics for FixedPitch {
    fn char_width(&self, ch: char) -> f64 {
        if ch.is_control() { 0.0 } else { self.width }
    }

    fn name(&self) -> &str {
        "FixedPitch"
    }
}

/// Picks built-in metrics by font name. Unknown names fall back to
/// Helvetica, which is also what a PDF viewer substitutes for them.
pub fn metrics_for_font(name: &str) -> Box<dyn FontMetrics> {
    let lower = name.trim().to_ascii_lowercase();
    if lower.starts_with("cour") || lower == "mono" || lower == "fixed" {
        Box::new(FixedPitch::courier())
    } else {
        Box::new(Helvetica)
    }
}
