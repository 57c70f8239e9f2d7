//! Anchor Resolver: the text block an anchor belongs to.

use ordered_float::OrderedFloat;
use rustc_hash::{FxHashMap, FxHashSet};

use super::geometry::MappedSpan;
use crate::model::{AnchorMatch, Page};
use crate::utils::{Rect, bound_rects, rect_height, union_rect};

/// Per-page line boxes, used to grow blocks when the extractor reports no
/// block ids.
#[derive(Debug, Clone, Default)]
pub struct LineIndex {
    /// (line id, union of the line's fragments), sorted by top edge.
    lines: Vec<(u32, Rect)>,
    median_height: f64,
}

impl LineIndex {
    pub fn new(page: &Page) -> Self {
        let mut boxes: FxHashMap<u32, Rect> = FxHashMap::default();
        for frag in page.fragments.iter().filter(|f| !f.text.trim().is_empty()) {
            boxes
                .entry(frag.line)
                .and_modify(|r| *r = union_rect(*r, frag.rect))
                .or_insert(frag.rect);
        }
        let mut lines: Vec<(u32, Rect)> = boxes.into_iter().collect();
        lines.sort_by_key(|&(id, r)| (OrderedFloat(r.1), OrderedFloat(r.0), id));

        let mut heights: Vec<OrderedFloat<f64>> =
            lines.iter().map(|&(_, r)| OrderedFloat(rect_height(r))).collect();
        heights.sort_unstable();
        let median_height = heights.get(heights.len() / 2).map_or(0.0, |h| h.0);

        Self {
            lines,
            median_height,
        }
    }

    pub fn median_height(&self) -> f64 {
        self.median_height
    }

    fn grow(&self, seed: Rect, seed_lines: &FxHashSet<u32>) -> Rect {
        let max_gap = self.median_height.max(rect_height(seed));
        let overlaps_x = |a: Rect, b: Rect| a.0 < b.2 && b.0 < a.2;
        let mut block = seed;

        // downward
        for &(id, r) in &self.lines {
            if seed_lines.contains(&id) || r.1 < block.3 || !overlaps_x(r, block) {
                continue;
            }
            if r.1 - block.3 > max_gap {
                break;
            }
            block = union_rect(block, r);
        }
        // upward
        for &(id, r) in self.lines.iter().rev() {
            if seed_lines.contains(&id) || r.3 > block.1 || !overlaps_x(r, block) {
                continue;
            }
            if block.1 - r.3 > max_gap {
                break;
            }
            block = union_rect(block, r);
        }
        block
    }
}

/// Rectangle of the text block containing the matched fragments.
pub fn resolve_block(
    fragments: &[usize],
    anchor_rect: Rect,
    page: &Page,
    lines: &LineIndex,
) -> Rect {
    let matched = || fragments.iter().filter_map(|&i| page.fragments.get(i));

    let block_ids: Option<FxHashSet<u32>> = matched().map(|f| f.block).collect();
    if let Some(ids) = block_ids.filter(|ids| !ids.is_empty()) {
        let rects: Vec<Rect> = page
            .fragments
            .iter()
            .filter(|f| f.block.is_some_and(|b| ids.contains(&b)))
            .map(|f| f.rect)
            .collect();
        if let Some(block) = bound_rects(&rects) {
            return union_rect(block, anchor_rect);
        }
    }

    let seed_lines: FxHashSet<u32> = matched().map(|f| f.line).collect();
    let seed = lines
        .lines
        .iter()
        .filter(|(id, _)| seed_lines.contains(id))
        .map(|&(_, r)| r)
        .fold(anchor_rect, union_rect);
    lines.grow(seed, &seed_lines)
}

/// Builds the anchor for a mapped span; the column is assigned later.
pub fn resolve(mapped: MappedSpan, page: &Page, lines: &LineIndex) -> AnchorMatch {
    let block_rect = resolve_block(&mapped.fragments, mapped.anchor_rect, page, lines);
    AnchorMatch {
        page_index: page.index,
        hit_rects: mapped.hit_rects,
        anchor_rect: mapped.anchor_rect,
        block_rect,
        column_id: 0,
        span: mapped.span,
    }
}
