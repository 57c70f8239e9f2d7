//! Builder pattern for note layout.
//!
//! Provides a fluent API for configuring and running a layout.
//!
//! # Example
//! ```ignore
//! use marginalia_core::api::LayoutBuilder;
//!
//! let layout = LayoutBuilder::new()
//!     .side(SidePreference::Right)
//!     .note_width(140.0)
//!     .parallel(4)
//!     .layout_raw(&pages, raws)?;
//! ```

use std::ops::Range;

use crate::error::Result;
use crate::font::FontMetrics;
use crate::layout::{DedupeScope, LayoutParams, SidePreference};
use crate::model::{
    AnnotationInput, DocumentLayout, LayoutOverrides, Page, PageLayout, RawAnnotation,
};

use super::high_level::{
    CancelToken, LayoutOptions, layout_document, layout_document_with_metrics, layout_page,
    layout_page_with_metrics,
};

/// A builder for configuring note layout.
///
/// Wraps `LayoutOptions` and the layout functions.
#[derive(Default)]
pub struct LayoutBuilder {
    params: LayoutParams,
    overrides: LayoutOverrides,
    pages: Option<Range<usize>>,
    page_numbers: Option<Vec<usize>>,
    threads: Option<usize>,
    cancel: Option<CancelToken>,
    metrics: Option<Box<dyn FontMetrics>>,
}

impl LayoutBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces all placement parameters.
    ///
    /// # Example
    /// ```ignore
    /// let params = LayoutParams {
    ///     scan_step: 4.0,
    ///     ..Default::default()
    /// };
    /// let builder = LayoutBuilder::new().params(params);
    /// ```
    pub fn params(mut self, params: LayoutParams) -> Self {
        self.params = params;
        self
    }

    pub fn side(mut self, side: SidePreference) -> Self {
        self.params.side_preference = side;
        self
    }

    pub fn dedupe_scope(mut self, scope: DedupeScope) -> Self {
        self.params.dedupe_scope = scope;
        self
    }

    /// Sets the maximum note width.
    pub fn note_width(mut self, width: f64) -> Self {
        self.params.note_width = width;
        self
    }

    pub fn font_size(mut self, size: f64) -> Self {
        self.params.font_size = size;
        self
    }

    /// Sets user edits re-applied on this layout.
    pub fn overrides(mut self, overrides: LayoutOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Sets a range of pages to lay out (zero-indexed).
    ///
    /// Note: This replaces any previously set page_numbers.
    pub fn pages(mut self, range: Range<usize>) -> Self {
        self.pages = Some(range);
        self.page_numbers = None;
        self
    }

    /// Sets specific page numbers to lay out (zero-indexed).
    ///
    /// Note: This replaces any previously set pages range.
    pub fn page_numbers(mut self, numbers: Vec<usize>) -> Self {
        self.page_numbers = Some(numbers);
        self.pages = None;
        self
    }

    /// Sets the worker thread count. Use 1 or less for sequential processing.
    ///
    /// # Example
    /// ```ignore
    /// let builder = LayoutBuilder::new().parallel(4);
    /// ```
    pub fn parallel(mut self, thread_count: usize) -> Self {
        self.threads = Some(thread_count.max(1));
        self
    }

    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Measures note text with `metrics` instead of the font named by the
    /// parameters.
    pub fn metrics(mut self, metrics: Box<dyn FontMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Builds the `LayoutOptions` from this builder's configuration.
    fn build_options(&self) -> LayoutOptions {
        let page_numbers = match &self.pages {
            Some(range) => Some(range.clone().collect()),
            None => self.page_numbers.clone(),
        };

        LayoutOptions {
            params: self.params.clone(),
            overrides: self.overrides.clone(),
            page_numbers,
            threads: self.threads,
            cancel: self.cancel.clone(),
        }
    }

    /// Lays out resolved annotations across `pages`.
    pub fn layout_document(
        self,
        pages: &[Page],
        annotations: &[AnnotationInput],
    ) -> Result<DocumentLayout> {
        let options = self.build_options();
        match &self.metrics {
            Some(metrics) => {
                layout_document_with_metrics(pages, annotations, &options, metrics.as_ref())
            }
            None => layout_document(pages, annotations, Some(options)),
        }
    }

    /// Resolves raw annotation records, then lays them out across `pages`.
    ///
    /// # Example
    /// ```ignore
    /// let raws: Vec<RawAnnotation> = serde_json::from_str(&json)?;
    /// let layout = LayoutBuilder::new().layout_raw(&pages, raws)?;
    /// println!("{} notes placed", layout.placed_count());
    /// ```
    pub fn layout_raw(
        self,
        pages: &[Page],
        raws: impl IntoIterator<Item = RawAnnotation>,
    ) -> Result<DocumentLayout> {
        let inputs = AnnotationInput::resolve_all(raws);
        self.layout_document(pages, &inputs)
    }

    /// Lays out a single page. Page selection and threading do not apply.
    pub fn layout_page(self, page: &Page, annotations: &[AnnotationInput]) -> Result<PageLayout> {
        match &self.metrics {
            Some(metrics) => layout_page_with_metrics(
                page,
                annotations,
                &self.params,
                metrics.as_ref(),
                &self.overrides,
            ),
            None => layout_page(page, annotations, &self.params, &self.overrides),
        }
    }
}

impl std::fmt::Debug for LayoutBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayoutBuilder")
            .field("params", &self.params)
            .field("overrides", &self.overrides)
            .field("pages", &self.pages)
            .field("page_numbers", &self.page_numbers)
            .field("threads", &self.threads)
            .field("metrics", &self.metrics.as_ref().map(|m| m.name()))
            .finish()
    }
}
