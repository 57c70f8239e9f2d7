//! Font metrics for measuring note text.
//!
//! Glyph shaping and embedded fonts belong to the renderer; the engine only
//! needs advance widths to wrap text.

pub mod metrics;

pub use metrics::{FixedPitch, FontMetrics, Helvetica, metrics_for_font};
