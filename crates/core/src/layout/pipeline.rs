//! Per-annotation state machine.
//!
//! Every annotation moves through
//! `Pending -> Located -> Mapped -> Classified -> Planned`, or stops early in
//! `Malformed`, `QuoteNotFound` or `Duplicate`. Each transition is a pure
//! function of the state and the page context, so stages can be driven and
//! tested one at a time.

use rustc_hash::{FxHashMap, FxHashSet};
use sha2::{Digest, Sha256};

use super::columns::{SidePlan, choose_side, classify, column_of, exclusion_bands};
use super::dedupe::{DedupeEntry, dedupe};
use super::leader::leader;
use super::params::LayoutParams;
use super::planner::{PlacementArena, PlannedNote, Planner};
use crate::font::FontMetrics;
use crate::locate::{FragmentOffsets, LineIndex, locate_with, map_with, normalize_quote, resolve};
use crate::model::{
    AnchorMatch, Annotation, AnnotationInput, ColumnLayout, Diagnostic, DiagnosticKind,
    LayoutOverrides, Page, PageLayout, Placement, PlacementStatus, RawAnnotation, Side, TextSpan,
};
use crate::utils::{Rect, rect_center, rects_overlap, round2};

/// Hex digits kept from the uid digest.
const UID_LEN: usize = 12;

/// Stable identifier of a note: a digest of the page, the normalized quote
/// and the anchor center rounded to 0.01pt.
pub fn make_uid(page_index: usize, quote: &str, anchor_rect: Rect) -> String {
    let (cx, cy) = rect_center(anchor_rect);
    let base = format!(
        "{page_index}|{}|{}|{}",
        normalize_quote(quote, true),
        round2(cx),
        round2(cy)
    );
    let digest = Sha256::digest(base.as_bytes());
    let mut uid = hex::encode(digest);
    uid.truncate(UID_LEN);
    uid
}

/// Hands out uids, suffixing repeats in the order they are requested.
#[derive(Debug, Default)]
pub struct UidAllocator {
    taken: FxHashSet<String>,
}

impl UidAllocator {
    pub fn assign(&mut self, base: &str) -> String {
        if self.taken.insert(base.to_string()) {
            return base.to_string();
        }
        let uid = (2..)
            .map(|n| format!("{base}-{n}"))
            .find(|candidate| !self.taken.contains(candidate))
            .unwrap_or_else(|| base.to_string());
        self.taken.insert(uid.clone());
        uid
    }
}

/// Everything derived once per page and shared by its notes.
pub struct PageContext<'a> {
    pub page: &'a Page,
    pub params: &'a LayoutParams,
    pub overrides: &'a LayoutOverrides,
    pub columns: ColumnLayout,
    offsets: FragmentOffsets,
    lines: LineIndex,
    planner: Planner<'a>,
}

impl<'a> PageContext<'a> {
    pub fn new(
        page: &'a Page,
        params: &'a LayoutParams,
        metrics: &'a dyn FontMetrics,
        overrides: &'a LayoutOverrides,
    ) -> Self {
        let columns = classify(page, params.center_gutter_tolerance);
        tracing::debug!(page = page.index, ?columns, "classified page");
        Self {
            page,
            params,
            overrides,
            columns,
            offsets: FragmentOffsets::new(page),
            lines: LineIndex::new(page),
            planner: Planner::new(page, params, metrics, columns, exclusion_bands(page, params)),
        }
    }
}

/// Where one annotation is in the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum NoteState {
    Pending {
        index: usize,
        annotation: Annotation,
    },
    Located {
        index: usize,
        annotation: Annotation,
        page_index: usize,
        span: TextSpan,
    },
    Mapped {
        index: usize,
        annotation: Annotation,
        anchor: AnchorMatch,
        uid: String,
    },
    Classified {
        index: usize,
        annotation: Annotation,
        anchor: AnchorMatch,
        uid: String,
        sides: SidePlan,
    },
    /// Terminal: placed or unplaceable.
    Planned(Box<Placement>),
    Malformed {
        index: usize,
        raw: RawAnnotation,
        reason: String,
    },
    QuoteNotFound {
        index: usize,
        raw: RawAnnotation,
        page_index: Option<usize>,
    },
    Duplicate {
        index: usize,
        raw: RawAnnotation,
        page_index: usize,
        kept: usize,
    },
}

impl NoteState {
    pub fn new(index: usize, input: AnnotationInput) -> Self {
        match input {
            AnnotationInput::Valid(annotation) => NoteState::Pending { index, annotation },
            AnnotationInput::Malformed { raw, reason } => {
                NoteState::Malformed { index, raw, reason }
            }
        }
    }

    /// Position of the annotation in the input list.
    pub fn index(&self) -> usize {
        match self {
            NoteState::Pending { index, .. }
            | NoteState::Located { index, .. }
            | NoteState::Mapped { index, .. }
            | NoteState::Classified { index, .. }
            | NoteState::Malformed { index, .. }
            | NoteState::QuoteNotFound { index, .. }
            | NoteState::Duplicate { index, .. } => *index,
            NoteState::Planned(p) => p.annotation_index,
        }
    }

    /// Page the annotation resolved to, once known.
    pub fn page_index(&self) -> Option<usize> {
        match self {
            NoteState::Located { page_index, .. } | NoteState::Duplicate { page_index, .. } => {
                Some(*page_index)
            }
            NoteState::Mapped { anchor, .. } | NoteState::Classified { anchor, .. } => {
                Some(anchor.page_index)
            }
            NoteState::Planned(p) => Some(p.page_index),
            NoteState::QuoteNotFound { page_index, .. } => *page_index,
            NoteState::Pending { .. } | NoteState::Malformed { .. } => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            NoteState::Planned(_)
                | NoteState::Malformed { .. }
                | NoteState::QuoteNotFound { .. }
                | NoteState::Duplicate { .. }
        )
    }

    /// Pending -> Located on the first page containing the quote.
    pub fn locate<'p>(self, pages: impl IntoIterator<Item = &'p Page>, fold_case: bool) -> Self {
        let NoteState::Pending { index, annotation } = self else {
            return self;
        };
        let mut searched = None;
        for page in pages {
            searched = match searched {
                None => Some(Some(page.index)),
                Some(_) => Some(None),
            };
            if let Ok(span) = locate_with(&annotation.quote, &page.text, fold_case) {
                return NoteState::Located {
                    index,
                    annotation,
                    page_index: page.index,
                    span,
                };
            }
        }
        tracing::debug!(index, quote = %annotation.quote, "quote not found");
        NoteState::QuoteNotFound {
            index,
            raw: annotation.raw,
            page_index: searched.flatten(),
        }
    }

    /// Located -> Mapped: hit rectangles, block, column and base uid.
    pub fn map(self, ctx: &PageContext<'_>) -> Self {
        let NoteState::Located {
            index,
            annotation,
            page_index,
            span,
        } = self
        else {
            return self;
        };
        debug_assert_eq!(page_index, ctx.page.index);
        match map_with(&ctx.offsets, &span, ctx.page) {
            Ok(mapped) => {
                let mut anchor = resolve(mapped, ctx.page, &ctx.lines);
                anchor.column_id = column_of(&ctx.columns, anchor.anchor_rect);
                let uid = make_uid(page_index, &annotation.quote, anchor.anchor_rect);
                NoteState::Mapped {
                    index,
                    annotation,
                    anchor,
                    uid,
                }
            }
            Err(_) => {
                tracing::debug!(index, "quote has no fragment geometry");
                NoteState::QuoteNotFound {
                    index,
                    raw: annotation.raw,
                    page_index: Some(page_index),
                }
            }
        }
    }

    /// Drops a located or mapped annotation in favour of `kept`.
    pub fn into_duplicate(self, kept: usize) -> Self {
        let Some(page_index) = self.page_index() else {
            return self;
        };
        match self {
            NoteState::Located {
                index, annotation, ..
            }
            | NoteState::Mapped {
                index, annotation, ..
            } => NoteState::Duplicate {
                index,
                raw: annotation.raw,
                page_index,
                kept,
            },
            other => other,
        }
    }

    /// Mapped -> Classified with the sides to try.
    pub fn classify(self, ctx: &PageContext<'_>) -> Self {
        let NoteState::Mapped {
            index,
            annotation,
            anchor,
            uid,
        } = self
        else {
            return self;
        };
        let sides = choose_side(&anchor, ctx.page, &ctx.columns, ctx.params);
        NoteState::Classified {
            index,
            annotation,
            anchor,
            uid,
            sides,
        }
    }

    /// Classified -> Planned at a user-fixed rectangle, if it collides with
    /// no placed note. Returns the state unchanged otherwise.
    pub fn place_fixed(self, ctx: &PageContext<'_>, arena: &mut PlacementArena) -> Self {
        let NoteState::Classified {
            index,
            annotation,
            anchor,
            uid,
            sides,
        } = self
        else {
            return self;
        };
        let Some(rect) = ctx.overrides.fixed_rect(&uid) else {
            return NoteState::Classified {
                index,
                annotation,
                anchor,
                uid,
                sides,
            };
        };
        if arena.overlaps_note(rect) {
            tracing::debug!(%uid, "fixed note rectangle collides, planning normally");
            return NoteState::Classified {
                index,
                annotation,
                anchor,
                uid,
                sides,
            };
        }

        let side = side_of_rect(rect, &anchor, &ctx.columns, ctx.params);
        arena.insert(side, rect);
        let p = ctx.params;
        let lines = ctx.planner.sizer().wrap(
            &annotation.explanation,
            (rect.2 - rect.0 - 2.0 * p.note_padding).max(0.0),
            p.font_size,
        );
        let note = PlannedNote {
            rect,
            side,
            lines,
            offset: rect_center(rect).1 - rect_center(anchor.anchor_rect).1,
        };
        NoteState::Planned(Box::new(build_placement(
            index,
            annotation,
            anchor,
            uid,
            ctx,
            Ok(note),
            sides.sides.first().copied().unwrap_or(Side::Right),
            true,
        )))
    }

    /// Classified -> Planned through the planner's search.
    pub fn plan(self, ctx: &PageContext<'_>, arena: &mut PlacementArena) -> Self {
        let NoteState::Classified {
            index,
            annotation,
            anchor,
            uid,
            sides,
        } = self
        else {
            return self;
        };
        let result = ctx
            .planner
            .plan(&anchor, &sides, &annotation.explanation, arena);
        match &result {
            Ok(note) => {
                arena.insert(note.side, note.rect);
                tracing::trace!(%uid, side = ?note.side, offset = note.offset, "placed note");
            }
            Err(_) => tracing::debug!(%uid, index, "no free slot for note"),
        }
        let fallback_side = sides.sides.first().copied().unwrap_or(Side::Right);
        NoteState::Planned(Box::new(build_placement(
            index,
            annotation,
            anchor,
            uid,
            ctx,
            result,
            fallback_side,
            false,
        )))
    }

    pub fn placement(&self) -> Option<&Placement> {
        match self {
            NoteState::Planned(p) => Some(p),
            _ => None,
        }
    }

    /// The diagnostic this state reports, if any.
    pub fn diagnostic(&self) -> Option<Diagnostic> {
        let (kind, raw) = match self {
            NoteState::Malformed { raw, reason, .. } => (
                DiagnosticKind::MalformedAnnotation {
                    reason: reason.clone(),
                },
                raw.clone(),
            ),
            NoteState::QuoteNotFound { raw, .. } => (DiagnosticKind::QuoteNotFound, raw.clone()),
            NoteState::Duplicate { raw, kept, .. } => {
                (DiagnosticKind::Duplicate { kept: *kept }, raw.clone())
            }
            NoteState::Planned(p) if !p.is_placed() => {
                (DiagnosticKind::Unplaceable, p.input.clone())
            }
            _ => return None,
        };
        Some(Diagnostic {
            annotation_index: self.index(),
            page_index: self.page_index(),
            kind,
            input: raw,
        })
    }
}

/// Side a user-placed rectangle sits on relative to its anchor.
fn side_of_rect(
    rect: Rect,
    anchor: &AnchorMatch,
    columns: &ColumnLayout,
    params: &LayoutParams,
) -> Side {
    let cx = rect_center(rect).0;
    if let ColumnLayout::TwoColumn { gutter_x, .. } = columns
        && (cx - gutter_x).abs() <= params.center_gutter_tolerance
    {
        return Side::Gutter;
    }
    if rect.2 <= anchor.anchor_rect.0 {
        Side::Left
    } else if rect.0 >= anchor.anchor_rect.2 {
        Side::Right
    } else if rect.1 >= anchor.block_rect.3 {
        Side::Footer
    } else if cx < rect_center(anchor.anchor_rect).0 {
        Side::Left
    } else {
        Side::Right
    }
}

#[allow(clippy::too_many_arguments)]
fn build_placement(
    index: usize,
    annotation: Annotation,
    anchor: AnchorMatch,
    uid: String,
    ctx: &PageContext<'_>,
    planned: Result<PlannedNote, super::planner::Unplaceable>,
    fallback_side: Side,
    overridden: bool,
) -> Placement {
    let p = ctx.params;
    let rotation = ctx.overrides.rotation(&uid);
    let (note_rect, side, wrapped_lines, status) = match planned {
        Ok(note) => (Some(note.rect), note.side, note.lines, PlacementStatus::Placed),
        Err(_) => (None, fallback_side, Vec::new(), PlacementStatus::Unplaceable),
    };
    let leader_points = note_rect
        .map(|r| leader(anchor.anchor_rect, r, rotation, p.draw_leader))
        .unwrap_or_default();

    Placement {
        uid,
        page_index: anchor.page_index,
        annotation_index: index,
        quote: annotation.quote,
        explanation: annotation.explanation,
        color: annotation.color.unwrap_or(p.default_color),
        font_size: p.font_size,
        anchor_rect: anchor.anchor_rect,
        hit_rects: anchor.hit_rects,
        block_rect: anchor.block_rect,
        note_rect,
        side,
        rotation,
        wrapped_lines,
        leader_points,
        status,
        overridden,
        input: annotation.raw,
    }
}

/// Marks duplicates among mapped states, first occurrence wins.
pub fn apply_dedupe(states: &mut [NoteState], params: &LayoutParams) {
    let entries: Vec<DedupeEntry> = states
        .iter()
        .filter_map(|state| match state {
            NoteState::Mapped {
                index,
                annotation,
                anchor,
                ..
            } => Some(DedupeEntry::new(
                *index,
                Some(anchor.page_index),
                &annotation.quote,
                &anchor.hit_rects,
                params.fold_case,
            )),
            _ => None,
        })
        .collect();
    let outcome = dedupe(entries, params.dedupe_scope, params.dedupe_overlap_threshold);
    if outcome.dropped.is_empty() {
        return;
    }

    let position: FxHashMap<usize, usize> = states
        .iter()
        .enumerate()
        .map(|(pos, s)| (s.index(), pos))
        .collect();
    for (dropped, kept) in outcome.dropped {
        if let Some(&pos) = position.get(&dropped) {
            let state = std::mem::replace(
                &mut states[pos],
                NoteState::Malformed {
                    index: dropped,
                    raw: RawAnnotation::default(),
                    reason: String::new(),
                },
            );
            states[pos] = state.into_duplicate(kept);
        }
    }
}

/// Drives mapped (or located) states of one page to completion, in input
/// order: uids are made unique, user-fixed notes are registered first, then
/// every other note is planned.
pub fn run_page(ctx: &PageContext<'_>, states: Vec<NoteState>) -> Vec<NoteState> {
    let mut uids = UidAllocator::default();
    let mut states: Vec<NoteState> = states
        .into_iter()
        .map(|state| state.map(ctx))
        .map(|state| match state {
            NoteState::Mapped {
                index,
                annotation,
                anchor,
                uid,
            } => NoteState::Mapped {
                index,
                annotation,
                anchor,
                uid: uids.assign(&uid),
            },
            other => other,
        })
        .map(|state| state.classify(ctx))
        .collect();

    let mut arena = PlacementArena::new(ctx.page, ctx.params);
    if !ctx.overrides.fixed_note_rects.is_empty() {
        states = states
            .into_iter()
            .map(|state| state.place_fixed(ctx, &mut arena))
            .collect();
    }
    states
        .into_iter()
        .map(|state| state.plan(ctx, &mut arena))
        .collect()
}

/// Collects one page's placements and diagnostics.
pub fn page_layout(ctx: &PageContext<'_>, states: &[NoteState]) -> PageLayout {
    let mut placements: Vec<Placement> = states
        .iter()
        .filter_map(|s| s.placement().cloned())
        .collect();
    placements.sort_by_key(|p| p.annotation_index);
    let mut diagnostics: Vec<Diagnostic> =
        states.iter().filter_map(NoteState::diagnostic).collect();
    diagnostics.sort_by_key(|d| d.annotation_index);
    debug_assert!(!has_overlaps(&placements), "overlapping notes on page {}", ctx.page.index);
    PageLayout {
        page_index: ctx.page.index,
        column_layout: ctx.columns,
        placements,
        diagnostics,
    }
}

/// True if any two placed notes overlap.
pub fn has_overlaps(placements: &[Placement]) -> bool {
    let rects: Vec<Rect> = placements.iter().filter_map(|p| p.note_rect).collect();
    rects
        .iter()
        .enumerate()
        .any(|(i, a)| rects[i + 1..].iter().any(|b| rects_overlap(*a, *b)))
}
