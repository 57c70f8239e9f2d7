//! Data model shared by every stage of the engine.
//!
//! - `page` - pages and text fragments supplied by text extraction
//! - `annotation` - raw and validated annotation inputs
//! - `placement` - anchors, placements, diagnostics and layout results
//! - `color` - note colors

pub mod annotation;
pub mod color;
pub mod page;
pub mod placement;

pub use annotation::{Annotation, AnnotationInput, QuoteField, RawAnnotation};
pub use color::{ColorParseError, Rgb};
pub use page::{Page, TextFragment};
pub use placement::{
    AnchorMatch, ColumnLayout, Diagnostic, DiagnosticKind, DocumentLayout, HitRects,
    LayoutOverrides, MatchKind, NoteBox, PageLayout, Placement, PlacementStatus, Side, TextSpan,
};
