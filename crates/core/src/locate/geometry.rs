//! Geometry Mapper: turns a text span into hit rectangles.

use itertools::Itertools;
use smallvec::SmallVec;

use crate::error::{LayoutError, Result};
use crate::model::{AnchorMatch, HitRects, Page, TextSpan};
use crate::utils::{Rect, bound_rects, union_rect};

/// Byte range of every fragment inside `Page::text`.
///
/// Fragments are found in order at or after a running cursor, so any
/// separator between them is accepted. A fragment whose text cannot be found
/// gets no range and is never matched.
#[derive(Debug, Clone, Default)]
pub struct FragmentOffsets {
    /// (fragment index, start, end), ascending.
    ranges: Vec<(usize, usize, usize)>,
}

impl FragmentOffsets {
    pub fn new(page: &Page) -> Self {
        let mut ranges = Vec::with_capacity(page.fragments.len());
        let mut cursor = 0usize;
        for (idx, frag) in page.fragments.iter().enumerate() {
            if frag.text.is_empty() {
                continue;
            }
            let Some(rest) = page.text.get(cursor..) else {
                break;
            };
            if let Some(pos) = rest.find(frag.text.as_str()) {
                let start = cursor + pos;
                let end = start + frag.text.len();
                ranges.push((idx, start, end));
                cursor = end;
            } else {
                tracing::trace!(fragment = idx, "fragment text not found in page text");
            }
        }
        Self { ranges }
    }

    /// Indices of fragments whose range intersects `span`, ascending.
    pub fn covering(&self, span: &TextSpan) -> SmallVec<[usize; 8]> {
        // ranges are sorted by start and non-overlapping
        let first = self.ranges.partition_point(|&(_, _, end)| end <= span.start);
        self.ranges[first..]
            .iter()
            .take_while(|&&(_, start, _)| start < span.end)
            .filter(|&&(_, start, end)| span.intersects(start, end))
            .map(|&(idx, _, _)| idx)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

/// Matched fragments and their per-line hit rectangles.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedSpan {
    pub span: TextSpan,
    pub fragments: SmallVec<[usize; 8]>,
    pub hit_rects: HitRects,
    pub anchor_rect: Rect,
}

/// Maps `span` onto fragment geometry with precomputed offsets.
pub fn map_with(offsets: &FragmentOffsets, span: &TextSpan, page: &Page) -> Result<MappedSpan> {
    let fragments = offsets.covering(span);

    let hit_rects: HitRects = {
        let runs = fragments.iter().chunk_by(|&&idx| page.fragments[idx].line);
        let rects: HitRects = runs
            .into_iter()
            .filter_map(|(_, run)| run.map(|&idx| page.fragments[idx].rect).reduce(union_rect))
            .collect();
        rects
    };

    let anchor_rect = bound_rects(&hit_rects).ok_or_else(|| LayoutError::QuoteNotFound {
        quote: page
            .text
            .get(span.start..span.end)
            .unwrap_or_default()
            .to_string(),
    })?;

    Ok(MappedSpan {
        span: *span,
        fragments,
        hit_rects,
        anchor_rect,
    })
}

/// Maps `span` onto the page's fragments.
///
/// The block rectangle is the anchor itself and the column is 0 until the
/// anchor resolver and classifier refine them.
pub fn map(span: &TextSpan, page: &Page) -> Result<AnchorMatch> {
    let mapped = map_with(&FragmentOffsets::new(page), span, page)?;
    Ok(AnchorMatch {
        page_index: page.index,
        hit_rects: mapped.hit_rects,
        anchor_rect: mapped.anchor_rect,
        block_rect: mapped.anchor_rect,
        column_id: 0,
        span: mapped.span,
    })
}
