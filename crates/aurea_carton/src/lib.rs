//! Carton - The toolbox for the Aurea template compiler.
//!
//! This crate provides the foundational utilities shared by every stage of
//! the pipeline: source spans, the line index used to convert between byte
//! offsets and editor positions, URI normalization, and the wire-level LSP
//! data types the facade speaks at the external boundary.
//!
//! # Modules
//!
//! - **span**: half-open byte spans over source text
//! - **line_index**: offset ↔ (line, UTF-16 character) conversion
//! - **uri**: canonical document URI handling
//! - **lsp**: minimal LSP wire types (positions, ranges, diagnostics)

pub mod line_index;
pub mod lsp;
pub mod span;
pub mod uri;

pub use line_index::LineIndex;
pub use span::{SourceSpan, TextSpan};
pub use uri::normalize_uri;

// Re-export compact_str::CompactString for short identifier-like strings
pub use compact_str::CompactString;

// Re-export smallvec for stack-optimized collections
pub use smallvec::{smallvec, SmallVec};

// Re-export bitflags for flag types
pub use bitflags::bitflags;

// Re-export rustc-hash for fast hash maps/sets
pub use rustc_hash::{FxHashMap, FxHashSet};

// Re-export phf for compile-time perfect hash tables
pub use phf::{phf_map, phf_set, Map as PhfMap, Set as PhfSet};
