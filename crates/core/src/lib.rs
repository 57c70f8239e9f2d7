//! marginalia - quote anchoring and margin note placement.
//!
//! Given pages of extracted text with fragment geometry and a list of
//! annotations, finds each quote on its page and plans a note box in the
//! margin that covers no body text and no other note.

pub mod api;
pub mod error;
pub mod font;
pub mod layout;
pub mod locate;
pub mod model;
pub mod utils;

pub use api::{
    CancelToken, LayoutBuilder, LayoutOptions, layout_document, layout_document_with_metrics,
    layout_page, layout_page_with_metrics,
};
pub use error::{LayoutError, Result};
pub use layout::{DedupeScope, FallbackZone, LayoutParams, SidePreference};
pub use model::{
    Annotation, AnnotationInput, Diagnostic, DiagnosticKind, DocumentLayout, LayoutOverrides,
    Page, PageLayout, Placement, RawAnnotation, Rgb, Side, TextFragment,
};
