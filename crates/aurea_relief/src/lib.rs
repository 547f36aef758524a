//! Relief - The IR and data model surface for Aurea templates.
//!
//! Every pipeline stage communicates through the immutable artifacts defined
//! here: compilation-scoped identifiers, the lowered template IR, the binding
//! expression AST, and the diagnostic model shared by all producers.

pub mod diag;
pub mod expr;
pub mod ids;
pub mod ir;

pub use diag::{
    Confidence, DiagCode, DiagData, DiagSource, Diagnostic, RelatedLocation, ResourceKind,
    Severity, Surface,
};
pub use expr::{
    BindingPattern, BinaryOp, Expr, ForOfHeader, LiteralValue, ObjectLiteralEntry,
    ObjectPatternProp, PatternElement, UnaryOp,
};
pub use ids::{ExprId, FrameId, IdAllocator, NodeId};
pub use ir::{
    BindingMode, BindingSource, BranchKind, BranchLink, ExprTable, ExprTableEntry, ExpressionKind,
    Instruction, InstructionRow, Interpolation, IrModule, LetBinding, Namespace, RawAttr,
    TemplateIr, TemplateNode,
};
