//! Armature - The structural parser framework for Aurea templates.
//!
//! Three parsers live here:
//!
//! - a byte-level HTML tokenizer driving a tree parser that produces an
//!   owned markup tree with full span information and error recovery,
//! - a recursive-descent parser for the Aurelia binding-expression dialect
//!   (value converters, binding behaviors, for-of headers with
//!   destructuring),
//! - an interpolation scanner that splits `a ${b} c` text into literal
//!   parts and expression slices.
//!
//! All parsers are fail-soft: they report structured errors and keep going
//! rather than abort, so the lowering stage can preserve bad input as
//! sentinel nodes.

pub mod expression;
pub mod interp;
pub mod parser;
pub mod tokenizer;

pub use expression::{parse_expression, parse_for_of, ExprError};
pub use interp::{split_interpolation, InterpSlice, InterpolationSlices};
pub use parser::{
    parse_markup, MarkupDocument, MarkupElement, MarkupError, MarkupErrorCode, MarkupNode,
};
pub use tokenizer::{Callbacks, QuoteType, TokenizeError, Tokenizer};
