//! Note Box Sizer: wraps explanation text and picks the box size.
//!
//! The sizer owns only the wrap/shrink decision; glyph widths come from a
//! [`FontMetrics`] implementation.

use super::params::LayoutParams;
use crate::font::FontMetrics;
use crate::utils::EPSILON;

/// Allowed box widths, both inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WidthBounds {
    pub min: f64,
    pub max: f64,
}

impl WidthBounds {
    pub fn new(min: f64, max: f64) -> Self {
        Self {
            min,
            max: max.max(min),
        }
    }
}

/// Result of sizing one note.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteSize {
    pub width: f64,
    pub height: f64,
    pub lines: Vec<String>,
    /// False when even the widest box is taller than the budget.
    pub fits_budget: bool,
}

/// Greedy word wrapper and box sizer.
pub struct NoteSizer<'a> {
    metrics: &'a dyn FontMetrics,
    params: &'a LayoutParams,
}

impl<'a> NoteSizer<'a> {
    pub fn new(metrics: &'a dyn FontMetrics, params: &'a LayoutParams) -> Self {
        Self { metrics, params }
    }

    fn measure(&self, text: &str, font_size: f64) -> f64 {
        self.metrics.text_width(text, font_size) * self.params.wrap_tightness
    }

    /// Height of a box holding `lines` lines.
    pub fn box_height(&self, lines: usize, font_size: f64) -> f64 {
        lines as f64 * self.params.line_height_factor * font_size + 2.0 * self.params.note_padding
    }

    /// Wraps `text` so every line fits `inner_width`.
    ///
    /// Explicit newlines start a new line; blank paragraphs keep an empty
    /// line. Words wider than the line are broken between characters.
    pub fn wrap(&self, text: &str, inner_width: f64, font_size: f64) -> Vec<String> {
        let fits = |s: &str| self.measure(s, font_size) <= inner_width + EPSILON;
        let mut lines = Vec::new();

        for para in text.split('\n') {
            let mut current = String::new();
            for word in para.split_whitespace() {
                if current.is_empty() {
                    if fits(word) {
                        current.push_str(word);
                        continue;
                    }
                } else {
                    let trial = format!("{current} {word}");
                    if fits(&trial) {
                        current = trial;
                        continue;
                    }
                    lines.push(std::mem::take(&mut current));
                    if fits(word) {
                        current.push_str(word);
                        continue;
                    }
                }

                // word wider than a whole line
                for ch in word.chars() {
                    current.push(ch);
                    if !fits(&current) && current.chars().count() > 1 {
                        current.pop();
                        lines.push(std::mem::take(&mut current));
                        current.push(ch);
                    }
                }
            }
            lines.push(current);
        }
        lines
    }

    /// Sizes a note box.
    ///
    /// Wraps at `bounds.max` first. `budget` caps the height; without one the
    /// height at the widest box is the budget. The width then shrinks by
    /// `width_step` while the height stays within budget, and the narrowest
    /// such width wins.
    pub fn size(
        &self,
        explanation: &str,
        font_size: f64,
        bounds: WidthBounds,
        budget: Option<f64>,
    ) -> NoteSize {
        let pad = 2.0 * self.params.note_padding;
        let layout = |width: f64| {
            let lines = self.wrap(explanation, (width - pad).max(0.0), font_size);
            let height = self.box_height(lines.len(), font_size);
            (lines, height)
        };

        let (lines, height) = layout(bounds.max);
        let budget = budget.unwrap_or(height);
        if height > budget + EPSILON {
            return NoteSize {
                width: bounds.max,
                height,
                lines,
                fits_budget: false,
            };
        }

        let mut best = NoteSize {
            width: bounds.max,
            height,
            lines,
            fits_budget: true,
        };
        let step = self.params.width_step;
        let mut width = bounds.max - step;
        loop {
            let width_now = if width < bounds.min - EPSILON {
                // land exactly on the minimum once
                if best.width <= bounds.min + EPSILON {
                    break;
                }
                bounds.min
            } else {
                width
            };
            let (lines, height) = layout(width_now);
            if height > budget + EPSILON {
                break;
            }
            best = NoteSize {
                width: width_now,
                height,
                lines,
                fits_budget: true,
            };
            width -= step;
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::{FixedPitch, Helvetica};

    fn fixed() -> FixedPitch {
        // 6pt per character at size 10
        FixedPitch::courier()
    }

    #[test]
    fn wraps_greedily() {
        let params = LayoutParams::default();
        let metrics = fixed();
        let sizer = NoteSizer::new(&metrics, &params);
        // 5 chars per line at inner width 30
        let lines = sizer.wrap("aa bb cc dd", 30.0, 10.0);
        assert_eq!(lines, vec!["aa bb", "cc dd"]);
    }

    #[test]
    fn keeps_explicit_breaks_and_blank_paragraphs() {
        let params = LayoutParams::default();
        let metrics = fixed();
        let sizer = NoteSizer::new(&metrics, &params);
        let lines = sizer.wrap("one\n\ntwo", 100.0, 10.0);
        assert_eq!(lines, vec!["one", "", "two"]);
    }

    #[test]
    fn breaks_overlong_words() {
        let params = LayoutParams::default();
        let metrics = fixed();
        let sizer = NoteSizer::new(&metrics, &params);
        let lines = sizer.wrap("abcdefghijkl", 30.0, 10.0);
        assert_eq!(lines, vec!["abcde", "fghij", "kl"]);
    }

    #[test]
    fn short_text_shrinks_to_min_width() {
        let params = LayoutParams::default();
        let sizer = NoteSizer::new(&Helvetica, &params);
        let size = sizer.size("Short.", 10.0, WidthBounds::new(56.0, 160.0), None);
        assert_eq!(size.width, 56.0);
        assert_eq!(size.lines, vec!["Short."]);
        assert!(size.fits_budget);
        assert!((size.height - (11.8 + 8.0)).abs() < 1e-9);
    }

    #[test]
    fn tight_budget_reports_overflow() {
        let params = LayoutParams::default();
        let metrics = fixed();
        let sizer = NoteSizer::new(&metrics, &params);
        let text = "word ".repeat(40);
        let size = sizer.size(&text, 10.0, WidthBounds::new(56.0, 160.0), Some(20.0));
        assert!(!size.fits_budget);
        assert_eq!(size.width, 160.0);
        assert!(size.height > 20.0);
    }

    #[test]
    fn shrink_keeps_line_count() {
        let params = LayoutParams::default();
        let metrics = fixed();
        let sizer = NoteSizer::new(&metrics, &params);
        // 40 chars: one line at 160 (inner 152 = 25 chars) is impossible, two lines fit
        let text = "aaaa bbbb cccc dddd eeee ffff gggg hhhh";
        let wide = sizer.size(text, 10.0, WidthBounds::new(56.0, 160.0), None);
        assert_eq!(wide.lines.len(), 2);
        assert!(wide.width < 160.0);
        assert!(wide.width >= 56.0);
    }
}
