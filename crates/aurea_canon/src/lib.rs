//! Canon - The overlay planner and emitter.
//!
//! The overlay is a synthesized TypeScript module whose type-checking by an
//! external checker yields the template's type diagnostics. For every scope
//! frame the planner computes an *overlay type* (an intersection over the
//! view-model type), and for every expression occurrence the emitter writes
//! a single-expression lambda `(o: FrameType) => (…)` whose body is the
//! authored expression text with scope references rewritten through `o`.
//!
//! Alongside the text the emitter produces an injective mapping (expression
//! spans and member segments) that powers provenance, diagnostics
//! projection, and rename.

pub mod emit;
pub mod mapping;
pub mod plan;

pub use emit::{emit_overlay, OverlayEmit};
pub use mapping::{
    pick_segment, project_segment_span, SegmentMap, TemplateMappingEntry,
};
pub use plan::{plan_overlay, FramePlan, OverlayPlan, TypeDecl, VmInfo};
