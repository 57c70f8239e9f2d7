//! Deduplicator: drops repeated annotations, first occurrence wins.

use rustc_hash::FxHashMap;

use super::params::DedupeScope;
use crate::locate::normalize_quote;
use crate::model::{Annotation, AnnotationInput, HitRects};
use crate::utils::{Rect, intersection_area, rect_area};

/// One located annotation as seen by the deduplicator.
#[derive(Debug, Clone, PartialEq)]
pub struct DedupeEntry {
    /// Input position, reported back in diagnostics.
    pub annotation_index: usize,
    pub page_index: Option<usize>,
    /// Normalized quote.
    pub key: String,
    /// Where the quote's text appears; empty when unmapped.
    pub hit_rects: HitRects,
}

impl DedupeEntry {
    pub fn new(
        annotation_index: usize,
        page_index: Option<usize>,
        quote: &str,
        hit_rects: &[Rect],
        fold_case: bool,
    ) -> Self {
        Self {
            annotation_index,
            page_index,
            key: normalize_quote(quote, fold_case),
            hit_rects: HitRects::from_slice(hit_rects),
        }
    }
}

/// Entries to keep and `(dropped, kept)` index pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DedupeOutcome {
    pub kept: Vec<DedupeEntry>,
    /// (annotation index dropped, annotation index it duplicates)
    pub dropped: Vec<(usize, usize)>,
}

/// Summed pairwise intersection of two hit rect sets over the smaller total
/// hit area. Hit rects of one quote are disjoint, so the sum never counts a
/// point twice.
pub fn anchor_overlap(a: &[Rect], b: &[Rect]) -> f64 {
    let area = |rects: &[Rect]| rects.iter().map(|&r| rect_area(r)).sum::<f64>();
    let smaller = area(a).min(area(b));
    if smaller <= 0.0 {
        return 0.0;
    }
    let shared: f64 = a
        .iter()
        .flat_map(|&ra| b.iter().map(move |&rb| intersection_area(ra, rb)))
        .sum();
    shared / smaller
}

fn is_duplicate(a: &DedupeEntry, b: &DedupeEntry, overlap_threshold: f64) -> bool {
    a.key == b.key || anchor_overlap(&a.hit_rects, &b.hit_rects) >= overlap_threshold
}

/// Greedy deduplication in input order.
pub fn dedupe(
    entries: Vec<DedupeEntry>,
    scope: DedupeScope,
    overlap_threshold: f64,
) -> DedupeOutcome {
    let mut outcome = DedupeOutcome::default();
    // kept entry positions per comparison group
    let mut groups: FxHashMap<Option<usize>, Vec<usize>> = FxHashMap::default();

    for entry in entries {
        let group = match scope {
            DedupeScope::Page => entry.page_index,
            DedupeScope::Document => None,
        };
        let kept_in_group = groups.entry(group).or_default();
        let duplicate_of = kept_in_group
            .iter()
            .map(|&pos| &outcome.kept[pos])
            .find(|kept| is_duplicate(kept, &entry, overlap_threshold))
            .map(|kept| kept.annotation_index);

        match duplicate_of {
            Some(kept) => {
                tracing::debug!(
                    dropped = entry.annotation_index,
                    kept,
                    "duplicate annotation"
                );
                outcome.dropped.push((entry.annotation_index, kept));
            }
            None => {
                kept_in_group.push(outcome.kept.len());
                outcome.kept.push(entry);
            }
        }
    }
    outcome
}

/// Quote-only deduplication of raw annotations, for callers without page
/// information. Returns the surviving inputs with their original indices and
/// the `(dropped, kept)` pairs.
pub fn dedupe_annotations(
    annotations: &[AnnotationInput],
    fold_case: bool,
) -> (Vec<(usize, &Annotation)>, Vec<(usize, usize)>) {
    let entries: Vec<DedupeEntry> = annotations
        .iter()
        .enumerate()
        .filter_map(|(i, input)| input.as_valid().map(|a| (i, a)))
        .map(|(i, a)| DedupeEntry::new(i, None, &a.quote, &[], fold_case))
        .collect();
    let outcome = dedupe(entries, DedupeScope::Document, 1.0);
    let kept = outcome
        .kept
        .iter()
        .filter_map(|e| {
            annotations[e.annotation_index]
                .as_valid()
                .map(|a| (e.annotation_index, a))
        })
        .collect();
    (kept, outcome.dropped)
}
