//! Quote location.
//!
//! - `text`: finds a quote in a page's extracted text
//! - `geometry`: maps a text span to hit rectangles
//! - `anchor`: resolves the text block around an anchor

pub mod anchor;
pub mod geometry;
pub mod text;

pub use anchor::{LineIndex, resolve, resolve_block};
pub use geometry::{FragmentOffsets, MappedSpan, map, map_with};
pub use text::{locate, locate_with, normalize_quote};
