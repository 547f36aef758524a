//! Croquis - Semantic analysis for Aurea templates.
//!
//! Three passes over one compilation:
//!
//! 1. **lower** — markup tree + binding expressions → IR (DOM, instruction
//!    rows, expression table). Fail-soft: bad input becomes sentinel nodes
//!    plus diagnostics, never a panic.
//! 2. **resolve** — link every resource-bearing instruction to the catalog,
//!    classifying unknown targets with a resolution confidence.
//! 3. **bind** — build the scope-frame graph and map every expression
//!    occurrence to the frame it evaluates in.

pub mod bind;
pub mod lower;
pub mod resolve;
pub mod scope;

pub use bind::{bind_template, BindOutput};
pub use lower::{lower_template, CommandRef, LowerOutput, UsageIssue};
pub use resolve::{resolve_template, LinkedModule, LocalImports, ResolutionEntry, TargetResolution};
pub use scope::{FrameKind, FrameOrigin, OverlaySource, ScopeFrame, ScopeSymbol, ScopeTemplate};
