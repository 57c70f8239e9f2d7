//! High-level API module for note layout.
//!
//! # Example
//!
//! ```ignore
//! use marginalia_core::api::{layout_document, LayoutOptions};
//!
//! let inputs = AnnotationInput::resolve_all(raws);
//! let layout = layout_document(&pages, &inputs, None)?;
//! ```

pub mod builder;
pub mod high_level;

pub use builder::LayoutBuilder;
pub use high_level::{
    CancelToken, LayoutOptions, layout_document, layout_document_with_metrics, layout_page,
    layout_page_with_metrics,
};
