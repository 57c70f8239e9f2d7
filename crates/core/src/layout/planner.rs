//! Placement Planner: bounded search for a collision-free note slot.
//!
//! Placed rectangles live in a per-page [`PlacementArena`]: body text is
//! bulk-loaded into a static R-tree once, and every placed note is inserted
//! into a dynamic R-tree for its side. Candidates are tested with rectangle
//! overlap queries only, so the outcome does not depend on any hidden scan
//! order beyond the order notes are planned in.

use ordered_float::OrderedFloat;

use super::columns::{ExclusionBands, SidePlan};
use super::params::{FallbackZone, LayoutParams};
use super::sizer::{NoteSize, NoteSizer, WidthBounds};
use crate::font::FontMetrics;
use crate::model::{AnchorMatch, ColumnLayout, NoteBox, Page, Side};
use crate::utils::{EPSILON, Plane, Rect, inflate, rect_center, rect_height};

/// Re-sizing passes per candidate before it is given up.
const MAX_SIZE_PASSES: usize = 4;
/// Inset of a note inside a fallback band.
const BAND_PAD: f64 = 3.0;
/// Distance between body text and a page fallback band.
const PAGE_BAND_GAP: f64 = 8.0;

/// Occupied regions of one page.
pub struct PlacementArena {
    /// Body text padded by `text_pad`.
    text: Plane<Rect>,
    /// Placed notes, one plane per side.
    notes: [Plane<NoteBox>; 5],
}

impl PlacementArena {
    pub fn new(page: &Page, params: &LayoutParams) -> Self {
        let mut text = Plane::new();
        text.extend(
            page.fragments
                .iter()
                .filter(|f| !f.text.trim().is_empty())
                .map(|f| inflate(f.rect, params.text_pad)),
        );
        Self {
            text,
            notes: std::array::from_fn(|_| Plane::new()),
        }
    }

    /// Padded text rectangles strictly overlapping `rect`, in page order.
    pub fn text_in(&self, rect: Rect) -> Vec<Rect> {
        self.text.find(rect).into_iter().copied().collect()
    }

    pub fn overlaps_text(&self, rect: Rect) -> bool {
        self.text.any_overlap(rect)
    }

    /// True if `rect` overlaps a placed note on any side.
    pub fn overlaps_note(&self, rect: Rect) -> bool {
        self.notes.iter().any(|plane| plane.any_overlap(rect))
    }

    pub fn notes_on(&self, side: Side) -> impl Iterator<Item = &NoteBox> {
        self.notes[side.index()].iter()
    }

    pub fn insert(&mut self, side: Side, rect: Rect) {
        self.notes[side.index()].add(NoteBox { rect, side });
    }

    pub fn note_count(&self) -> usize {
        self.notes.iter().map(Plane::len).sum()
    }

    /// Vertical extent of all body text.
    fn text_extent(&self) -> Option<(f64, f64)> {
        self.text
            .iter()
            .fold(None, |acc: Option<(f64, f64)>, r| {
                Some(acc.map_or((r.1, r.3), |(y0, y1)| (y0.min(r.1), y1.max(r.3))))
            })
    }
}

/// A note slot found by the planner.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedNote {
    pub rect: Rect,
    pub side: Side,
    pub lines: Vec<String>,
    /// Displacement of the note center from the anchor center.
    pub offset: f64,
}

/// No collision-free slot exists within the search bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unplaceable;

/// Vertical offsets tried around the anchor center: `0, +s, -s, +2s, -2s...`
/// Below comes before above; the search stops past `max_offset`.
pub fn scan_offsets(step: f64, max_scan: usize, max_offset: f64) -> impl Iterator<Item = f64> {
    std::iter::once(0.0)
        .chain((1..=max_scan).flat_map(move |i| {
            let d = i as f64 * step;
            [d, -d]
        }))
        .take_while(move |d| d.abs() <= max_offset + EPSILON)
}

/// Free horizontal intervals inside `[lo, hi]` once `obstacles` (widened by
/// `pad`) are removed.
pub fn free_gaps(obstacles: &[Rect], lo: f64, hi: f64, pad: f64) -> Vec<(f64, f64)> {
    let mut spans: Vec<(f64, f64)> = obstacles.iter().map(|r| (r.0 - pad, r.2 + pad)).collect();
    spans.sort_by_key(|&(x0, x1)| (OrderedFloat(x0), OrderedFloat(x1)));

    let mut gaps = Vec::new();
    let mut cursor = lo;
    for (x0, x1) in spans {
        if x0 > cursor {
            gaps.push((cursor, x0.min(hi)));
        }
        cursor = cursor.max(x1);
        if cursor >= hi {
            break;
        }
    }
    if cursor < hi {
        gaps.push((cursor, hi));
    }
    gaps.retain(|&(a, b)| b - a > EPSILON);
    gaps
}

/// Finds note slots for the anchors of one page.
pub struct Planner<'a> {
    page: &'a Page,
    params: &'a LayoutParams,
    sizer: NoteSizer<'a>,
    columns: ColumnLayout,
    bands: ExclusionBands,
}

impl<'a> Planner<'a> {
    pub fn new(
        page: &'a Page,
        params: &'a LayoutParams,
        metrics: &'a dyn FontMetrics,
        columns: ColumnLayout,
        bands: ExclusionBands,
    ) -> Self {
        Self {
            page,
            params,
            sizer: NoteSizer::new(metrics, params),
            columns,
            bands,
        }
    }

    pub fn sizer(&self) -> &NoteSizer<'a> {
        &self.sizer
    }

    /// Tries every side of `sides`, then the column footer, then the page
    /// fallback band.
    pub fn plan(
        &self,
        anchor: &AnchorMatch,
        sides: &SidePlan,
        explanation: &str,
        arena: &PlacementArena,
    ) -> Result<PlannedNote, Unplaceable> {
        for &side in &sides.sides {
            if let Ok(planned) = self.plan_side(anchor, side, explanation, arena) {
                return Ok(planned);
            }
            tracing::trace!(?side, "side exhausted");
        }
        if self.params.allow_column_footer
            && let Some(planned) = self.plan_footer(anchor, explanation, arena)
        {
            return Ok(planned);
        }
        if let Some(zone) = self.params.page_band_fallback
            && let Some(planned) = self.plan_page_band(anchor, zone, explanation, arena)
        {
            return Ok(planned);
        }
        Err(Unplaceable)
    }

    /// Scans vertical offsets on one margin (or the gutter).
    pub fn plan_side(
        &self,
        anchor: &AnchorMatch,
        side: Side,
        explanation: &str,
        arena: &PlacementArena,
    ) -> Result<PlannedNote, Unplaceable> {
        if matches!(side, Side::Footer | Side::PageBand) {
            return Err(Unplaceable);
        }
        let p = self.params;
        let base = self.sizer.size(
            explanation,
            p.font_size,
            WidthBounds::new(p.min_note_width, p.note_width),
            None,
        );
        let cy0 = rect_center(anchor.anchor_rect).1;

        scan_offsets(p.scan_step, p.max_scan, p.max_vertical_offset)
            .find_map(|dy| {
                let cy = cy0 + dy;
                if !self.within_block(anchor, cy) {
                    return None;
                }
                self.candidate(anchor, side, cy, explanation, &base, arena)
                    .map(|(rect, lines)| PlannedNote {
                        rect,
                        side,
                        lines,
                        offset: dy,
                    })
            })
            .ok_or(Unplaceable)
    }

    fn within_block(&self, anchor: &AnchorMatch, cy: f64) -> bool {
        match self.params.within_block_pad {
            Some(pad) => {
                let block = anchor.block_rect;
                cy >= block.1 - pad - EPSILON && cy <= block.3 + pad + EPSILON
            }
            None => true,
        }
    }

    /// One candidate at vertical center `cy`, re-sized until its height is
    /// stable.
    fn candidate(
        &self,
        anchor: &AnchorMatch,
        side: Side,
        cy: f64,
        explanation: &str,
        base: &NoteSize,
        arena: &PlacementArena,
    ) -> Option<(Rect, Vec<String>)> {
        let p = self.params;
        let mut height = base.height;

        for _ in 0..MAX_SIZE_PASSES {
            let (gx0, gx1) = self.slot(anchor, side, cy - height / 2.0, cy + height / 2.0, arena)?;
            let bounds = WidthBounds::new(p.min_note_width, (gx1 - gx0).min(p.note_width));
            let size = self.sizer.size(explanation, p.font_size, bounds, Some(height));
            if !size.fits_budget {
                height = size.height;
                continue;
            }

            let w = size.width;
            let (x0, x1) = match side {
                Side::Left => (gx0, gx0 + w),
                Side::Right => (gx1 - w, gx1),
                _ => {
                    let mid = match self.columns {
                        ColumnLayout::TwoColumn { gutter_x, .. } => gutter_x,
                        ColumnLayout::Single => (gx0 + gx1) / 2.0,
                    };
                    let x0 = (mid - w / 2.0).max(gx0).min(gx1 - w);
                    (x0, x0 + w)
                }
            };
            let rect = (x0, cy - size.height / 2.0, x1, cy + size.height / 2.0);
            return self.accept(rect, side, arena).then_some((rect, size.lines));
        }
        None
    }

    /// Horizontal interval available on `side` for a note spanning
    /// `[y0, y1]`.
    fn slot(
        &self,
        anchor: &AnchorMatch,
        side: Side,
        y0: f64,
        y1: f64,
        arena: &PlacementArena,
    ) -> Option<(f64, f64)> {
        let p = self.params;
        let (lo, hi) = (p.page_margin, self.page.width - p.page_margin);
        let obstacles = arena.text_in((lo, y0, hi, y1));
        let gaps = free_gaps(&obstacles, lo, hi, p.gap_pad);
        let r = anchor.anchor_rect;

        let (g0, g1) = match side {
            Side::Left => {
                let &(g0, g1) = gaps.first()?;
                (g0, g1.min(r.0 - p.gap_pad))
            }
            Side::Right => {
                let &(g0, g1) = gaps.last()?;
                (g0.max(r.2 + p.gap_pad), g1)
            }
            Side::Gutter => {
                let ColumnLayout::TwoColumn { gutter_x, .. } = self.columns else {
                    return None;
                };
                *gaps
                    .iter()
                    .find(|&&(g0, g1)| g0 <= gutter_x && gutter_x <= g1)?
            }
            Side::Footer | Side::PageBand => return None,
        };
        (g1 - g0 >= p.min_note_width).then_some((g0, g1))
    }

    /// Final acceptance test shared by every strategy.
    fn accept(&self, rect: Rect, side: Side, arena: &PlacementArena) -> bool {
        let p = self.params;
        let m = p.page_margin;
        let inside = rect.0 >= m - EPSILON
            && rect.1 >= m - EPSILON
            && rect.2 <= self.page.width - m + EPSILON
            && rect.3 <= self.page.height - m + EPSILON;
        inside
            && !self.bands.blocks(rect, side)
            && !arena.overlaps_text(rect)
            && !arena.overlaps_note(inflate(rect, p.note_spacing))
    }

    /// Slides a `width` x `height` box through `band` from `start_cy`,
    /// alternating below and above in `step` increments.
    #[allow(clippy::too_many_arguments)]
    fn place_in_band(
        &self,
        band: Rect,
        side: Side,
        start_cy: f64,
        width: f64,
        height: f64,
        step: f64,
        max_offset_from: Option<(f64, f64)>,
        arena: &PlacementArena,
    ) -> Option<Rect> {
        if width > band.2 - band.0 + EPSILON || height > rect_height(band) + EPSILON {
            return None;
        }
        let steps = (rect_height(band) / step).ceil() as usize + 1;
        let centers = std::iter::once(start_cy).chain((1..=steps).flat_map(|k| {
            let d = k as f64 * step;
            [start_cy + d, start_cy - d]
        }));

        for cy in centers {
            if cy < band.1 || cy > band.3 {
                continue;
            }
            let y0 = (cy - height / 2.0).max(band.1);
            let y1 = (y0 + height).min(band.3);
            let rect = (band.0, y1 - height, band.0 + width, y1);
            if let Some((cy0, reach)) = max_offset_from
                && (rect_center(rect).1 - cy0).abs() > reach + EPSILON
            {
                continue;
            }
            if self.accept(rect, side, arena) {
                return Some(rect);
            }
        }
        None
    }

    /// Column footer slot under the anchor's text block.
    fn plan_footer(
        &self,
        anchor: &AnchorMatch,
        explanation: &str,
        arena: &PlacementArena,
    ) -> Option<PlannedNote> {
        let p = self.params;
        let block = anchor.block_rect;
        let band_x0 = block.0 + p.footer_side_pad;
        let band_x1 = block.2 - p.footer_side_pad;
        let avail = band_x1 - band_x0 - 2.0 * BAND_PAD;
        if avail < p.min_note_width {
            return None;
        }
        let size = self.sizer.size(
            explanation,
            p.font_size,
            WidthBounds::new(p.min_note_width, avail.min(p.note_width)),
            None,
        );
        let band = (
            band_x0 + BAND_PAD,
            block.3 + p.footer_top_gap,
            band_x1 - BAND_PAD,
            self.page.height - p.page_margin,
        );
        let cy0 = rect_center(anchor.anchor_rect).1;
        let rect = self.place_in_band(
            band,
            Side::Footer,
            band.1 + size.height / 2.0,
            size.width,
            size.height,
            p.footer_scan_step,
            Some((cy0, p.column_footer_max_offset)),
            arena,
        )?;
        Some(PlannedNote {
            rect,
            side: Side::Footer,
            lines: size.lines,
            offset: rect_center(rect).1 - cy0,
        })
    }

    /// Tallest empty band above or below all body text.
    fn plan_page_band(
        &self,
        anchor: &AnchorMatch,
        zone: FallbackZone,
        explanation: &str,
        arena: &PlacementArena,
    ) -> Option<PlannedNote> {
        let p = self.params;
        let (text_top, text_bottom) = arena.text_extent()?;
        let (w, h) = (self.page.width, self.page.height);
        let g = PAGE_BAND_GAP;

        let mut bands = Vec::with_capacity(2);
        if matches!(zone, FallbackZone::Top | FallbackZone::Both) {
            bands.push((g, g, w - g, text_top - g));
        }
        if matches!(zone, FallbackZone::Bottom | FallbackZone::Both) {
            bands.push((g, text_bottom + g, w - g, h - g));
        }
        let min_height = self.sizer.box_height(1, p.font_size) + 2.0;
        let band = bands
            .into_iter()
            .filter(|b| rect_height(*b) >= min_height)
            .max_by_key(|b| OrderedFloat(rect_height(*b)))?;

        let avail = band.2 - band.0 - 2.0 * BAND_PAD;
        if avail < p.min_note_width {
            return None;
        }
        let size = self.sizer.size(
            explanation,
            p.font_size,
            WidthBounds::new(p.min_note_width, avail.min(p.note_width)),
            None,
        );
        let inner = inflate(band, -BAND_PAD);
        let rect = self.place_in_band(
            inner,
            Side::PageBand,
            rect_center(inner).1,
            size.width,
            size.height,
            p.footer_scan_step,
            None,
            arena,
        )?;
        Some(PlannedNote {
            rect,
            side: Side::PageBand,
            lines: size.lines,
            offset: rect_center(rect).1 - rect_center(anchor.anchor_rect).1,
        })
    }
}
