//! Range map model
//!
//! A range map records, for one source file, every declaration scope and every
//! renamable code reference at its character offset in the original text.
//!
//! - `RangeMapBuilder`: assembles a map from the extractor's event stream
//! - `RangeMap`: the immutable per-file result, an arena of scopes
//! - `RangeMapSet`: path-keyed collection read from and written to JSON streams

mod builder;
mod entries;
mod json_types;
mod map;

// Re-export public types
pub use builder::{BuilderEvent, Overlap, RangeMapBuilder};
pub use entries::{MetaEntry, NodeId, RangeEntry, StructuralEntry, StructuralKind, Target};
pub use map::{RangeMap, RangeMapSet, content_hash};
