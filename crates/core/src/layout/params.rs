//! Placement parameters.
//!
//! Contains the LayoutParams struct consumed by every stage of the engine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{LayoutError, Result};
use crate::model::Rgb;
use crate::utils::Rect;

/// Which margin a note prefers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SidePreference {
    Left,
    Right,
    /// The margin closer to the anchor; ties go right.
    #[default]
    #[serde(alias = "outer", alias = "auto")]
    Nearest,
}

impl SidePreference {
    /// Left and Right are forced: no retry on the opposite margin.
    pub fn is_forced(self) -> bool {
        !matches!(self, SidePreference::Nearest)
    }
}

impl FromStr for SidePreference {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(SidePreference::Left),
            "right" => Ok(SidePreference::Right),
            "nearest" | "outer" | "auto" => Ok(SidePreference::Nearest),
            other => Err(LayoutError::InvalidParams(format!(
                "unknown side preference {other:?}"
            ))),
        }
    }
}

impl fmt::Display for SidePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SidePreference::Left => "left",
            SidePreference::Right => "right",
            SidePreference::Nearest => "nearest",
        })
    }
}

/// Range over which duplicate annotations are detected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DedupeScope {
    #[default]
    Page,
    Document,
}

impl FromStr for DedupeScope {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "page" => Ok(DedupeScope::Page),
            "document" | "doc" => Ok(DedupeScope::Document),
            other => Err(LayoutError::InvalidParams(format!(
                "unknown dedupe scope {other:?}"
            ))),
        }
    }
}

/// Empty page band used when no margin, gutter or footer slot is free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackZone {
    Top,
    Bottom,
    Both,
}

/// Parameters for note placement.
///
/// All lengths are in PDF points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutParams {
    /// Maximum note box width.
    pub note_width: f64,
    /// Minimum note box width; the sizer never shrinks below it.
    pub min_note_width: f64,
    pub font_size: f64,
    /// Font name handed to `metrics_for_font`.
    pub font_name: String,
    /// Inner padding between the box edge and its text.
    pub note_padding: f64,
    /// Line height relative to the font size.
    pub line_height_factor: f64,
    /// Multiplier applied to measured widths while wrapping. Values below 1.0
    /// pack more text per line than the metrics strictly allow.
    pub wrap_tightness: f64,
    /// Sizer shrink step.
    pub width_step: f64,

    /// Vertical step of the planner's scan.
    pub scan_step: f64,
    /// Maximum number of vertical scan steps per side.
    pub max_scan: usize,
    /// Maximum distance between the note center and the anchor center.
    pub max_vertical_offset: f64,
    /// When set, the note center must stay within the anchor's text block
    /// widened by this much vertically.
    pub within_block_pad: Option<f64>,
    /// Distance kept from the page edges.
    pub page_margin: f64,
    /// Clearance between a note and body text horizontally.
    pub gap_pad: f64,
    /// Padding around body text obstacles.
    pub text_pad: f64,
    /// Clearance between two notes.
    pub note_spacing: f64,

    pub side_preference: SidePreference,
    /// Minimum gutter width, and how close an anchor must be to it.
    pub center_gutter_tolerance: f64,
    pub allow_center_gutter: bool,

    pub dedupe_scope: DedupeScope,
    /// Anchor overlap (over the smaller anchor's area) at which two
    /// annotations are duplicates.
    pub dedupe_overlap_threshold: f64,
    /// Lowercase both sides in the locator's normalized fallback.
    pub fold_case: bool,

    /// Height of the bottom exclusion band, and the reach of column footer
    /// slots below the anchor.
    pub column_footer_max_offset: f64,
    /// Try a column footer slot under the anchor's block once every side
    /// fails. It is the only note allowed into the bottom band.
    pub allow_column_footer: bool,
    pub footer_top_gap: f64,
    pub footer_side_pad: f64,
    pub footer_scan_step: f64,
    /// Last resort: the tallest empty band above or below all body text.
    pub page_band_fallback: Option<FallbackZone>,

    /// Extra rectangles no note may enter, applied on every page.
    pub exclusion_bands: Vec<Rect>,
    /// Compute leader polylines.
    pub draw_leader: bool,
    /// Highlight color for annotations without a valid one.
    pub default_color: Rgb,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self {
            note_width: 160.0,
            min_note_width: 56.0,
            font_size: 10.0,
            font_name: "helv".to_string(),
            note_padding: 4.0,
            line_height_factor: 1.18,
            wrap_tightness: 1.0,
            width_step: 4.0,
            scan_step: 8.0,
            max_scan: 30,
            max_vertical_offset: 72.0,
            within_block_pad: Some(12.0),
            page_margin: 6.0,
            gap_pad: 3.0,
            text_pad: 2.0,
            note_spacing: 2.0,
            side_preference: SidePreference::Nearest,
            center_gutter_tolerance: 24.0,
            allow_center_gutter: false,
            dedupe_scope: DedupeScope::Page,
            dedupe_overlap_threshold: 0.8,
            fold_case: false,
            column_footer_max_offset: 144.0,
            allow_column_footer: true,
            footer_top_gap: 6.0,
            footer_side_pad: 3.0,
            footer_scan_step: 6.0,
            page_band_fallback: None,
            exclusion_bands: Vec::new(),
            draw_leader: true,
            default_color: Rgb::YELLOW,
        }
    }
}

impl LayoutParams {
    /// Height of one wrapped line.
    pub fn line_height(&self) -> f64 {
        self.font_size * self.line_height_factor
    }

    /// Checks the parameters for values no layout can work with.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("note_width", self.note_width),
            ("min_note_width", self.min_note_width),
            ("font_size", self.font_size),
            ("line_height_factor", self.line_height_factor),
            ("wrap_tightness", self.wrap_tightness),
            ("width_step", self.width_step),
            ("scan_step", self.scan_step),
            ("footer_scan_step", self.footer_scan_step),
        ];
        for (name, v) in positive {
            if !v.is_finite() || v <= 0.0 {
                return Err(LayoutError::InvalidParams(format!(
                    "{name} must be a positive number, got {v}"
                )));
            }
        }

        let non_negative = [
            ("note_padding", self.note_padding),
            ("max_vertical_offset", self.max_vertical_offset),
            ("page_margin", self.page_margin),
            ("gap_pad", self.gap_pad),
            ("text_pad", self.text_pad),
            ("note_spacing", self.note_spacing),
            ("center_gutter_tolerance", self.center_gutter_tolerance),
            ("column_footer_max_offset", self.column_footer_max_offset),
            ("footer_top_gap", self.footer_top_gap),
            ("footer_side_pad", self.footer_side_pad),
            ("within_block_pad", self.within_block_pad.unwrap_or(0.0)),
        ];
        for (name, v) in non_negative {
            if !v.is_finite() || v < 0.0 {
                return Err(LayoutError::InvalidParams(format!(
                    "{name} must be a non-negative number, got {v}"
                )));
            }
        }

        if self.min_note_width > self.note_width {
            return Err(LayoutError::InvalidParams(format!(
                "min_note_width ({}) exceeds note_width ({})",
                self.min_note_width, self.note_width
            )));
        }
        if 2.0 * self.note_padding >= self.min_note_width {
            return Err(LayoutError::InvalidParams(format!(
                "note_padding ({}) leaves no room for text at min_note_width ({})",
                self.note_padding, self.min_note_width
            )));
        }
        if !(self.dedupe_overlap_threshold > 0.0 && self.dedupe_overlap_threshold <= 1.0) {
            return Err(LayoutError::InvalidParams(format!(
                "dedupe_overlap_threshold must be in (0, 1], got {}",
                self.dedupe_overlap_threshold
            )));
        }
        if let Some(band) = self
            .exclusion_bands
            .iter()
            .find(|b| {
                !(b.0 <= b.2 && b.1 <= b.3) || ![b.0, b.1, b.2, b.3].iter().all(|v| v.is_finite())
            })
        {
            return Err(LayoutError::InvalidParams(format!(
                "exclusion band {band:?} is not a valid rectangle"
            )));
        }
        Ok(())
    }
}
