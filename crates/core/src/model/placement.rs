//! Derived placement state: anchors, notes, diagnostics, per-page results.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::annotation::RawAnnotation;
use super::color::Rgb;
use crate::utils::{HasBBox, Point, Rect};

/// How the locator matched a quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Exact,
    Normalized,
}

/// Byte range `[start, end)` of a quote occurrence in `Page::text`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextSpan {
    pub start: usize,
    pub end: usize,
    pub kind: MatchKind,
}

impl TextSpan {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// True if `[start, end)` intersects this span.
    pub fn intersects(&self, start: usize, end: usize) -> bool {
        start < self.end && self.start < end
    }
}

/// Hit rectangles of one quote; most quotes span one or two lines.
pub type HitRects = SmallVec<[Rect; 2]>;

/// Where a quote sits on its page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorMatch {
    pub page_index: usize,
    /// One rectangle per run of matched fragments on the same line.
    pub hit_rects: HitRects,
    /// Union of `hit_rects`.
    pub anchor_rect: Rect,
    /// Text block (paragraph) containing the anchor.
    pub block_rect: Rect,
    /// 0 for the left (or only) column, 1 for the right column.
    pub column_id: usize,
    pub span: TextSpan,
}

/// Where a note box sits relative to the body text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
    /// Between the columns of a two-column page.
    Gutter,
    /// Under the anchor's text block, inside its column.
    Footer,
    /// Empty band above or below all body text.
    PageBand,
}

impl Side {
    pub const ALL: [Side; 5] = [
        Side::Left,
        Side::Right,
        Side::Gutter,
        Side::Footer,
        Side::PageBand,
    ];

    pub fn opposite(self) -> Option<Side> {
        match self {
            Side::Left => Some(Side::Right),
            Side::Right => Some(Side::Left),
            Side::Gutter | Side::Footer | Side::PageBand => None,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Side::Left => 0,
            Side::Right => 1,
            Side::Gutter => 2,
            Side::Footer => 3,
            Side::PageBand => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlacementStatus {
    Placed,
    Unplaceable,
}

/// The finalized geometry and content of one annotation's note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    /// Stable identifier, unique within a document.
    pub uid: String,
    pub page_index: usize,
    /// Position of the annotation in the input list.
    pub annotation_index: usize,
    pub quote: String,
    pub explanation: String,
    pub color: Rgb,
    pub font_size: f64,
    pub anchor_rect: Rect,
    pub hit_rects: HitRects,
    pub block_rect: Rect,
    /// `None` when no collision-free slot exists.
    pub note_rect: Option<Rect>,
    pub side: Side,
    /// Clockwise rotation of the note box in degrees.
    pub rotation: f64,
    pub wrapped_lines: Vec<String>,
    pub leader_points: Vec<Point>,
    pub status: PlacementStatus,
    /// True when `note_rect` came from a user override.
    #[serde(default)]
    pub overridden: bool,
    /// The annotation exactly as supplied.
    #[serde(skip)]
    pub input: RawAnnotation,
}

impl Placement {
    pub fn is_placed(&self) -> bool {
        self.status == PlacementStatus::Placed
    }
}

/// A placed note box, as stored in the planner's arena.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteBox {
    pub rect: Rect,
    pub side: Side,
}

impl HasBBox for NoteBox {
    fn x0(&self) -> f64 {
        self.rect.0
    }
    fn y0(&self) -> f64 {
        self.rect.1
    }
    fn x1(&self) -> f64 {
        self.rect.2
    }
    fn y1(&self) -> f64 {
        self.rect.3
    }
}

/// Recoverable per-annotation conditions reported alongside results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiagnosticKind {
    QuoteNotFound,
    /// Dropped in favour of the annotation at input index `kept`.
    Duplicate { kept: usize },
    Unplaceable,
    MalformedAnnotation { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub annotation_index: usize,
    /// Page the annotation resolved to, when known.
    pub page_index: Option<usize>,
    #[serde(flatten)]
    pub kind: DiagnosticKind,
    /// The annotation exactly as supplied.
    pub input: RawAnnotation,
}

/// User edits re-applied on every layout, keyed by placement uid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutOverrides {
    pub fixed_note_rects: BTreeMap<String, Rect>,
    pub rotations: BTreeMap<String, f64>,
}

impl LayoutOverrides {
    pub fn is_empty(&self) -> bool {
        self.fixed_note_rects.is_empty() && self.rotations.is_empty()
    }

    pub fn fixed_rect(&self, uid: &str) -> Option<Rect> {
        self.fixed_note_rects.get(uid).copied()
    }

    pub fn rotation(&self, uid: &str) -> f64 {
        self.rotations.get(uid).copied().unwrap_or(0.0)
    }
}

/// Column structure detected on a page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnLayout {
    Single,
    TwoColumn {
        /// Center of the gutter.
        gutter_x: f64,
        /// Horizontal extent of the empty gutter.
        gutter: (f64, f64),
    },
}

impl ColumnLayout {
    pub fn is_two_column(&self) -> bool {
        matches!(self, ColumnLayout::TwoColumn { .. })
    }
}

/// Layout result for one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    pub page_index: usize,
    pub column_layout: ColumnLayout,
    /// Placed and unplaceable notes in input order.
    pub placements: Vec<Placement>,
    pub diagnostics: Vec<Diagnostic>,
}

impl PageLayout {
    pub fn placed(&self) -> impl Iterator<Item = &Placement> {
        self.placements.iter().filter(|p| p.is_placed())
    }
}

/// Layout result for a whole document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentLayout {
    /// Pages in page order.
    pub pages: Vec<PageLayout>,
    /// Every diagnostic of the run in input order, including those not tied
    /// to a page (malformed input, quotes found nowhere).
    pub diagnostics: Vec<Diagnostic>,
}

impl DocumentLayout {
    pub fn placements(&self) -> impl Iterator<Item = &Placement> {
        self.pages.iter().flat_map(|p| p.placements.iter())
    }

    pub fn placed_count(&self) -> usize {
        self.placements().filter(|p| p.is_placed()).count()
    }

    pub fn unplaceable_count(&self) -> usize {
        self.placements().filter(|p| !p.is_placed()).count()
    }

    pub fn count_kind(&self, pred: impl Fn(&DiagnosticKind) -> bool) -> usize {
        self.diagnostics.iter().filter(|d| pred(&d.kind)).count()
    }
}
