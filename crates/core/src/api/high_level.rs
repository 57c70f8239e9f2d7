//! High-level layout API.
//!
//! Provides the page and document drivers:
//! - `layout_page()` - Lay out the notes of a single page
//! - `layout_document()` - Locate, deduplicate and lay out notes across pages

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::error::{LayoutError, Result};
use crate::font::{FontMetrics, metrics_for_font};
use crate::layout::LayoutParams;
use crate::layout::pipeline::{
    NoteState, PageContext, UidAllocator, apply_dedupe, page_layout, run_page,
};
use crate::model::{
    AnnotationInput, Diagnostic, DocumentLayout, LayoutOverrides, Page, PageLayout,
};


pub(crate) fn default_thread_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Cooperative cancellation flag shared with a running layout.
///
/// Checked between pages; a cancelled run returns `LayoutError::Cancelled`.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(LayoutError::Cancelled);
        }
        Ok(())
    }
}

/// Options for document layout.
#[derive(Debug, Clone, Default)]
pub struct LayoutOptions {
    pub params: LayoutParams,

    /// User edits keyed by placement uid.
    pub overrides: LayoutOverrides,

    /// Zero-indexed page numbers to search and lay out. None means all pages.
    pub page_numbers: Option<Vec<usize>>,

    /// Worker threads. None uses the available parallelism; 1 runs pages one
    /// after another.
    pub threads: Option<usize>,

    pub cancel: Option<CancelToken>,
}

impl LayoutOptions {
    fn check_cancelled(&self) -> Result<()> {
        match &self.cancel {
            Some(token) => token.check(),
            None => Ok(()),
        }
    }
}

/// Lays out the notes of one page.
///
/// Annotations are located on `page` only. Diagnostics cover every input,
/// including malformed ones.
///
/// # Example
/// ```ignore
/// use marginalia_core::api::layout_page;
///
/// let inputs = AnnotationInput::resolve_all(raws);
/// let params = LayoutParams::default();
/// let layout = layout_page(&page, &inputs, &params, &LayoutOverrides::default())?;
/// ```
pub fn layout_page(
    page: &Page,
    annotations: &[AnnotationInput],
    params: &LayoutParams,
    overrides: &LayoutOverrides,
) -> Result<PageLayout> {
    let metrics = metrics_for_font(&params.font_name);
    layout_page_with_metrics(page, annotations, params, metrics.as_ref(), overrides)
}

/// `layout_page` with caller-supplied font metrics.
pub fn layout_page_with_metrics(
    page: &Page,
    annotations: &[AnnotationInput],
    params: &LayoutParams,
    metrics: &dyn FontMetrics,
    overrides: &LayoutOverrides,
) -> Result<PageLayout> {
    params.validate()?;
    let ctx = PageContext::new(page, params, metrics, overrides);

    let mut states: Vec<NoteState> = annotations
        .iter()
        .cloned()
        .enumerate()
        .map(|(i, input)| NoteState::new(i, input))
        .map(|state| state.locate(std::iter::once(page), params.fold_case))
        .map(|state| state.map(&ctx))
        .collect();
    apply_dedupe(&mut states, params);

    let states = run_page(&ctx, states);
    let layout = page_layout(&ctx, &states);
    tracing::debug!(
        page = page.index,
        placed = layout.placed().count(),
        diagnostics = layout.diagnostics.len(),
        "laid out page"
    );
    Ok(layout)
}

/// Lays out the notes of a document.
///
/// Each annotation is anchored on the first page (in page order) containing
/// its quote. Pages are then laid out in parallel and collected in page
/// order.
///
/// # Example
/// ```ignore
/// use marginalia_core::api::{layout_document, LayoutOptions};
///
/// let layout = layout_document(&pages, &inputs, None)?;
/// for placement in layout.placements() {
///     println!("{} {:?}", placement.uid, placement.note_rect);
/// }
/// ```
pub fn layout_document(
    pages: &[Page],
    annotations: &[AnnotationInput],
    options: Option<LayoutOptions>,
) -> Result<DocumentLayout> {
    let options = options.unwrap_or_default();
    let metrics = metrics_for_font(&options.params.font_name);
    layout_document_with_metrics(pages, annotations, &options, metrics.as_ref())
}

/// `layout_document` with caller-supplied font metrics.
pub fn layout_document_with_metrics(
    pages: &[Page],
    annotations: &[AnnotationInput],
    options: &LayoutOptions,
    metrics: &dyn FontMetrics,
) -> Result<DocumentLayout> {
    let params = &options.params;
    params.validate()?;
    options.check_cancelled()?;

    let selected: Vec<&Page> = pages
        .iter()
        .filter(|page| {
            options
                .page_numbers
                .as_ref()
                .is_none_or(|nums| nums.contains(&page.index))
        })
        .collect();

    let thread_count = options.threads.unwrap_or_else(default_thread_count).max(1);
    let pool = ThreadPoolBuilder::new()
        .num_threads(thread_count)
        .build()
        .map_err(|e| LayoutError::ThreadPool(e.to_string()))?;

    let contexts: Vec<PageContext<'_>> = pool.install(|| {
        selected
            .par_iter()
            .map(|page| PageContext::new(page, params, metrics, &options.overrides))
            .collect()
    });
    let position: FxHashMap<usize, usize> = contexts
        .iter()
        .enumerate()
        .map(|(pos, ctx)| (ctx.page.index, pos))
        .collect();

    // Locate and map every annotation; collect keeps input order.
    let mut states: Vec<NoteState> = pool.install(|| {
        annotations
            .par_iter()
            .cloned()
            .enumerate()
            .map(|(i, input)| {
                let state =
                    NoteState::new(i, input).locate(selected.iter().copied(), params.fold_case);
                match state.page_index().and_then(|idx| position.get(&idx)) {
                    Some(&pos) => state.map(&contexts[pos]),
                    None => state,
                }
            })
            .collect()
    });
    apply_dedupe(&mut states, params);
    options.check_cancelled()?;

    let mut buckets: Vec<Vec<NoteState>> = (0..contexts.len()).map(|_| Vec::new()).collect();
    let mut unpaged = Vec::new();
    for state in states {
        match state.page_index().and_then(|idx| position.get(&idx)) {
            Some(&pos) if !state.is_terminal() => buckets[pos].push(state),
            _ => unpaged.push(state),
        }
    }

    let mut results: Vec<(usize, Result<Vec<NoteState>>)> = pool.install(|| {
        buckets
            .into_par_iter()
            .enumerate()
            .map(|(pos, bucket)| {
                #[cfg(test)]
                thread_log::record_thread();
                let result = options
                    .check_cancelled()
                    .map(|()| run_page(&contexts[pos], bucket));
                (pos, result)
            })
            .collect()
    });
    results.sort_by_key(|(pos, _)| *pos);

    let mut page_layouts = Vec::with_capacity(contexts.len());
    let mut diagnostics: Vec<Diagnostic> =
        unpaged.iter().filter_map(NoteState::diagnostic).collect();
    for (pos, result) in results {
        let states = result?;
        let mut layout = page_layout(&contexts[pos], &states);
        layout.diagnostics.extend(
            unpaged
                .iter()
                .filter(|s| s.page_index() == Some(layout.page_index))
                .filter_map(NoteState::diagnostic),
        );
        layout.diagnostics.sort_by_key(|d| d.annotation_index);
        diagnostics.extend(states.iter().filter_map(NoteState::diagnostic));
        page_layouts.push(layout);
    }
    diagnostics.sort_by_key(|d| d.annotation_index);

    // Per-page uids hash the page index; a cross-page collision still gets a
    // suffix in page order.
    let mut uids = UidAllocator::default();
    for placement in page_layouts.iter_mut().flat_map(|p| p.placements.iter_mut()) {
        placement.uid = uids.assign(&placement.uid);
    }

    let layout = DocumentLayout {
        pages: page_layouts,
        diagnostics,
    };
    tracing::debug!(
        pages = layout.pages.len(),
        placed = layout.placed_count(),
        unplaceable = layout.unplaceable_count(),
        "laid out document"
    );
    Ok(layout)
}
