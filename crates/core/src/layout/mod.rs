//! Note layout.
//!
//! This module contains:
//! - Placement parameters (LayoutParams)
//! - Column detection and side choice
//! - Note sizing, slot planning and leader geometry
//! - Deduplication and the per-annotation pipeline

pub mod columns;
pub mod dedupe;
pub mod leader;
pub mod params;
pub mod pipeline;
pub mod planner;
pub mod sizer;

pub use params::*;

pub use columns::{ExclusionBands, SidePlan, choose_side, classify, column_of, exclusion_bands};
pub use dedupe::{DedupeEntry, DedupeOutcome, anchor_overlap, dedupe, dedupe_annotations};
pub use leader::leader;
pub use pipeline::{NoteState, PageContext, UidAllocator, make_uid};
pub use planner::{PlacementArena, PlannedNote, Planner, Unplaceable};
pub use sizer::{NoteSize, NoteSizer, WidthBounds};
