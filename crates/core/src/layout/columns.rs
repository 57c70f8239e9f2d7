//! Column & Side Classifier.
//!
//! Detects a vertical gutter from a height-weighted histogram of fragment
//! extents and decides which sides a note may try.

use smallvec::SmallVec;

use super::params::{LayoutParams, SidePreference};
use crate::model::{AnchorMatch, ColumnLayout, Page, Side};
use crate::utils::{EPSILON, Rect, rect_center, rect_height, rects_overlap};

/// Share of the text height a gutter bin may be covered by.
const GUTTER_MAX_COVERAGE: f64 = 0.10;
/// Share of the text height each column must span.
const COLUMN_MIN_SPAN: f64 = 0.50;
/// Pages with fewer fragments are always single-column.
const MIN_FRAGMENTS: usize = 4;
const MAX_BINS: usize = 20_000;

/// Classifies the page's column structure.
pub fn classify(page: &Page, tolerance: f64) -> ColumnLayout {
    let rects: Vec<Rect> = page
        .fragments
        .iter()
        .filter(|f| !f.text.trim().is_empty())
        .map(|f| f.rect)
        .filter(|r| r.2 > r.0)
        .collect();
    if rects.len() < MIN_FRAGMENTS {
        return ColumnLayout::Single;
    }

    let (min_x, max_x, min_y, max_y) = rects.iter().fold(
        (f64::MAX, f64::MIN, f64::MAX, f64::MIN),
        |(x0, x1, y0, y1), r| (x0.min(r.0), x1.max(r.2), y0.min(r.1), y1.max(r.3)),
    );
    let text_height = max_y - min_y;
    let nbins = (max_x - min_x).ceil() as usize;
    if text_height <= EPSILON || nbins < 4 || nbins > MAX_BINS {
        return ColumnLayout::Single;
    }

    let mut coverage = vec![0.0f64; nbins];
    for r in &rects {
        let b0 = ((r.0 - min_x).floor() as usize).min(nbins - 1);
        let b1 = ((r.2 - min_x).ceil() as usize).clamp(b0 + 1, nbins);
        for bin in &mut coverage[b0..b1] {
            *bin += rect_height(*r);
        }
    }

    let limit = GUTTER_MAX_COVERAGE * text_height;
    let (mid_lo, mid_hi) = (nbins / 4, 3 * nbins / 4);
    let mut best: Option<(usize, usize)> = None;
    let mut run_start: Option<usize> = None;
    for i in 0..=nbins {
        let empty = i < nbins && coverage[i] <= limit;
        match (empty, run_start) {
            (true, None) => run_start = Some(i),
            (false, Some(start)) => {
                let center = (start + i) / 2;
                let wider = best.is_none_or(|(s, e)| i - start > e - s);
                if (mid_lo..mid_hi).contains(&center) && wider {
                    best = Some((start, i));
                }
                run_start = None;
            }
            _ => {}
        }
    }

    let Some((start, end)) = best else {
        return ColumnLayout::Single;
    };
    let gutter = (min_x + start as f64, min_x + end as f64);
    if gutter.1 - gutter.0 < tolerance {
        return ColumnLayout::Single;
    }

    let span_of = |pick: &dyn Fn(&Rect) -> bool| {
        rects
            .iter()
            .filter(|r| pick(r))
            .fold(None, |acc: Option<(f64, f64)>, r| {
                Some(acc.map_or((r.1, r.3), |(y0, y1)| (y0.min(r.1), y1.max(r.3))))
            })
            .map_or(0.0, |(y0, y1)| y1 - y0)
    };
    let left_span = span_of(&|r: &Rect| r.2 <= gutter.0 + 1.0);
    let right_span = span_of(&|r: &Rect| r.0 >= gutter.1 - 1.0);
    if left_span < COLUMN_MIN_SPAN * text_height || right_span < COLUMN_MIN_SPAN * text_height {
        return ColumnLayout::Single;
    }

    ColumnLayout::TwoColumn {
        gutter_x: (gutter.0 + gutter.1) / 2.0,
        gutter,
    }
}

/// Column of `rect`: 0 for the left (or only) column, 1 for the right one.
pub fn column_of(layout: &ColumnLayout, rect: Rect) -> usize {
    match layout {
        ColumnLayout::TwoColumn { gutter_x, .. } if rect_center(rect).0 >= *gutter_x => 1,
        _ => 0,
    }
}

/// Sides to try for one note, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidePlan {
    pub sides: SmallVec<[Side; 3]>,
    /// True when the configuration pinned the margin.
    pub forced: bool,
}

/// True when the anchor's inner edge lies within `tolerance` of the gutter.
fn near_gutter(anchor: &AnchorMatch, layout: &ColumnLayout, tolerance: f64) -> bool {
    match layout {
        ColumnLayout::Single => false,
        ColumnLayout::TwoColumn { gutter, .. } => {
            let r = anchor.anchor_rect;
            if anchor.column_id == 0 {
                (gutter.0 - r.2).abs() <= tolerance
            } else {
                (r.0 - gutter.1).abs() <= tolerance
            }
        }
    }
}

/// Orders the sides a note may use.
pub fn choose_side(
    anchor: &AnchorMatch,
    page: &Page,
    layout: &ColumnLayout,
    params: &LayoutParams,
) -> SidePlan {
    let primary = match params.side_preference {
        SidePreference::Left => Side::Left,
        SidePreference::Right => Side::Right,
        SidePreference::Nearest => {
            let cx = rect_center(anchor.anchor_rect).0;
            if cx < page.width - cx {
                Side::Left
            } else {
                Side::Right
            }
        }
    };
    let forced = params.side_preference.is_forced();

    let mut sides = SmallVec::new();
    if params.allow_center_gutter && near_gutter(anchor, layout, params.center_gutter_tolerance) {
        sides.push(Side::Gutter);
    }
    sides.push(primary);
    if !forced && let Some(opposite) = primary.opposite() {
        sides.push(opposite);
    }
    SidePlan { sides, forced }
}

/// Regions of a page that notes stay out of.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExclusionBands {
    /// Caller bands (headers, footers, figures), binding for every side.
    pub fixed: Vec<Rect>,
    /// Bottom `column_footer_max_offset` points of the page. Only the
    /// column footer slot may enter it.
    pub footer: Option<Rect>,
}

impl ExclusionBands {
    /// Whether a note on `side` covering `rect` enters a band.
    pub fn blocks(&self, rect: Rect, side: Side) -> bool {
        let in_footer = side != Side::Footer
            && self.footer.is_some_and(|band| rects_overlap(rect, band));
        in_footer || self.fixed.iter().any(|&band| rects_overlap(rect, band))
    }
}

impl From<Vec<Rect>> for ExclusionBands {
    fn from(fixed: Vec<Rect>) -> Self {
        Self {
            fixed,
            footer: None,
        }
    }
}

/// Exclusion bands of one page: the caller's plus the footer band.
pub fn exclusion_bands(page: &Page, params: &LayoutParams) -> ExclusionBands {
    let footer = (params.column_footer_max_offset > 0.0).then(|| {
        let top = (page.height - params.column_footer_max_offset).max(0.0);
        (0.0, top, page.width, page.height)
    });
    ExclusionBands {
        fixed: params.exclusion_bands.clone(),
        footer,
    }
}
