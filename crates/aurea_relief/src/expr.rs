//! Binding expression AST.
//!
//! The Aurelia binding dialect is close to a JavaScript expression subset
//! with two extensions: value converters (`items | take:5`) and binding
//! behaviors (`expr & debounce:200`). Iterator headers (`repeat.for`) add a
//! for-of declaration with destructuring.
//!
//! Every node carries its authored span relative to the expression source it
//! was parsed from; the lowering shifts spans into document coordinates.

use aurea_carton::TextSpan;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// A literal value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LiteralValue {
    String(CompactString),
    Number(f64),
    Boolean(bool),
    Null,
    Undefined,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Neg,
    Pos,
    TypeOf,
    Void,
}

impl UnaryOp {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Not => "!",
            Self::Neg => "-",
            Self::Pos => "+",
            Self::TypeOf => "typeof",
            Self::Void => "void",
        }
    }
}

/// Binary and logical operators, lowest precedence first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Coalesce,
    Or,
    And,
    Equal,
    NotEqual,
    StrictEqual,
    StrictNotEqual,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    In,
    InstanceOf,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinaryOp {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Coalesce => "??",
            Self::Or => "||",
            Self::And => "&&",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::StrictEqual => "===",
            Self::StrictNotEqual => "!==",
            Self::Less => "<",
            Self::Greater => ">",
            Self::LessEqual => "<=",
            Self::GreaterEqual => ">=",
            Self::In => "in",
            Self::InstanceOf => "instanceof",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
        }
    }
}

/// One parsed binding expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Expr {
    /// `$this` (`ancestor == 0`) or a bare `$parent` chain (`ancestor >= 1`).
    AccessThis { ancestor: u32, span: TextSpan },
    /// A scope identifier, optionally reached through `$parent` hops.
    AccessScope {
        name: CompactString,
        name_span: TextSpan,
        ancestor: u32,
        span: TextSpan,
    },
    /// `object.name`
    AccessMember {
        object: Box<Expr>,
        name: CompactString,
        name_span: TextSpan,
        span: TextSpan,
    },
    /// `object[key]`
    AccessKeyed {
        object: Box<Expr>,
        key: Box<Expr>,
        span: TextSpan,
    },
    /// `callee(args...)`
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        span: TextSpan,
    },
    Literal {
        value: LiteralValue,
        span: TextSpan,
    },
    ArrayLiteral {
        elements: Vec<Expr>,
        span: TextSpan,
    },
    ObjectLiteral {
        entries: Vec<ObjectLiteralEntry>,
        span: TextSpan,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        span: TextSpan,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        span: TextSpan,
    },
    Conditional {
        condition: Box<Expr>,
        yes: Box<Expr>,
        no: Box<Expr>,
        span: TextSpan,
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
        span: TextSpan,
    },
    /// `expr | name:arg1:arg2`
    ValueConverter {
        expr: Box<Expr>,
        name: CompactString,
        name_span: TextSpan,
        args: Vec<Expr>,
        span: TextSpan,
    },
    /// `expr & name:arg1:arg2`
    BindingBehavior {
        expr: Box<Expr>,
        name: CompactString,
        name_span: TextSpan,
        args: Vec<Expr>,
        span: TextSpan,
    },
    /// Unparseable input, preserved verbatim (fail-soft).
    Bad {
        raw: CompactString,
        message: String,
        span: TextSpan,
    },
}

impl Expr {
    /// The authored span of this node.
    pub fn span(&self) -> TextSpan {
        match self {
            Self::AccessThis { span, .. }
            | Self::AccessScope { span, .. }
            | Self::AccessMember { span, .. }
            | Self::AccessKeyed { span, .. }
            | Self::Call { span, .. }
            | Self::Literal { span, .. }
            | Self::ArrayLiteral { span, .. }
            | Self::ObjectLiteral { span, .. }
            | Self::Unary { span, .. }
            | Self::Binary { span, .. }
            | Self::Conditional { span, .. }
            | Self::Assign { span, .. }
            | Self::ValueConverter { span, .. }
            | Self::BindingBehavior { span, .. }
            | Self::Bad { span, .. } => *span,
        }
    }

    /// Whether this expression failed to parse.
    pub fn is_bad(&self) -> bool {
        matches!(self, Self::Bad { .. })
    }

    /// Shift every span in the tree by `delta` bytes. Used by lowering to
    /// move parser-relative spans into document coordinates.
    pub fn shift_spans(&mut self, delta: u32) {
        match self {
            Self::AccessThis { span, .. } | Self::Literal { span, .. } | Self::Bad { span, .. } => {
                *span = span.shifted(delta);
            }
            Self::AccessScope {
                name_span, span, ..
            } => {
                *name_span = name_span.shifted(delta);
                *span = span.shifted(delta);
            }
            Self::AccessMember {
                object,
                name_span,
                span,
                ..
            } => {
                object.shift_spans(delta);
                *name_span = name_span.shifted(delta);
                *span = span.shifted(delta);
            }
            Self::AccessKeyed { object, key, span } => {
                object.shift_spans(delta);
                key.shift_spans(delta);
                *span = span.shifted(delta);
            }
            Self::Call { callee, args, span } => {
                callee.shift_spans(delta);
                for arg in args {
                    arg.shift_spans(delta);
                }
                *span = span.shifted(delta);
            }
            Self::ArrayLiteral { elements, span } => {
                for element in elements {
                    element.shift_spans(delta);
                }
                *span = span.shifted(delta);
            }
            Self::ObjectLiteral { entries, span } => {
                for entry in entries {
                    entry.key_span = entry.key_span.shifted(delta);
                    entry.value.shift_spans(delta);
                }
                *span = span.shifted(delta);
            }
            Self::Unary { operand, span, .. } => {
                operand.shift_spans(delta);
                *span = span.shifted(delta);
            }
            Self::Binary { lhs, rhs, span, .. } => {
                lhs.shift_spans(delta);
                rhs.shift_spans(delta);
                *span = span.shifted(delta);
            }
            Self::Conditional {
                condition,
                yes,
                no,
                span,
            } => {
                condition.shift_spans(delta);
                yes.shift_spans(delta);
                no.shift_spans(delta);
                *span = span.shifted(delta);
            }
            Self::Assign {
                target,
                value,
                span,
            } => {
                target.shift_spans(delta);
                value.shift_spans(delta);
                *span = span.shifted(delta);
            }
            Self::ValueConverter {
                expr,
                name_span,
                args,
                span,
                ..
            }
            | Self::BindingBehavior {
                expr,
                name_span,
                args,
                span,
                ..
            } => {
                expr.shift_spans(delta);
                *name_span = name_span.shifted(delta);
                for arg in args {
                    arg.shift_spans(delta);
                }
                *span = span.shifted(delta);
            }
        }
    }

    /// Strip converter/behavior wrappers, returning the underlying value
    /// expression.
    pub fn unwrap_decorators(&self) -> &Expr {
        match self {
            Self::ValueConverter { expr, .. } | Self::BindingBehavior { expr, .. } => {
                expr.unwrap_decorators()
            }
            other => other,
        }
    }

    /// Collect `(name, name_span)` for every converter application, outermost
    /// first.
    pub fn converter_names(&self) -> Vec<(CompactString, TextSpan)> {
        let mut out = Vec::new();
        let mut cur = self;
        loop {
            match cur {
                Self::ValueConverter {
                    expr,
                    name,
                    name_span,
                    ..
                } => {
                    out.push((name.clone(), *name_span));
                    cur = expr;
                }
                Self::BindingBehavior { expr, .. } => cur = expr,
                _ => break,
            }
        }
        out
    }

    /// Collect `(name, name_span)` for every behavior application, outermost
    /// first.
    pub fn behavior_names(&self) -> Vec<(CompactString, TextSpan)> {
        let mut out = Vec::new();
        let mut cur = self;
        loop {
            match cur {
                Self::BindingBehavior {
                    expr,
                    name,
                    name_span,
                    ..
                } => {
                    out.push((name.clone(), *name_span));
                    cur = expr;
                }
                Self::ValueConverter { expr, .. } => cur = expr,
                _ => break,
            }
        }
        out
    }
}

/// One `key: value` entry of an object literal. Shorthand entries
/// (`{ name }`) carry the implied scope access as their value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectLiteralEntry {
    pub key: CompactString,
    pub key_span: TextSpan,
    pub value: Expr,
    pub shorthand: bool,
}

/// One element of an array pattern or object-pattern value position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternElement {
    pub pattern: BindingPattern,
    /// `= default` initializer, if authored.
    pub default: Option<Expr>,
}

/// A property of an object destructuring pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectPatternProp {
    pub key: CompactString,
    pub key_span: TextSpan,
    /// `key: pattern` rebinding; `None` for shorthand `{ key }`.
    pub value: Option<BindingPattern>,
    pub default: Option<Expr>,
}

/// The declaration side of a for-of header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum BindingPattern {
    Identifier {
        name: CompactString,
        span: TextSpan,
    },
    Array {
        elements: Vec<Option<PatternElement>>,
        rest: Option<Box<BindingPattern>>,
        span: TextSpan,
    },
    Object {
        props: Vec<ObjectPatternProp>,
        rest: Option<Box<BindingPattern>>,
        span: TextSpan,
    },
}

impl BindingPattern {
    pub fn span(&self) -> TextSpan {
        match self {
            Self::Identifier { span, .. } | Self::Array { span, .. } | Self::Object { span, .. } => {
                *span
            }
        }
    }

    /// All identifiers bound by this pattern, in source order.
    pub fn bound_names(&self) -> Vec<(CompactString, TextSpan)> {
        let mut out = Vec::new();
        self.collect_bound_names(&mut out);
        out
    }

    /// Shift every span in the pattern by `delta` bytes.
    pub fn shift_spans(&mut self, delta: u32) {
        match self {
            Self::Identifier { span, .. } => *span = span.shifted(delta),
            Self::Array {
                elements,
                rest,
                span,
            } => {
                for element in elements.iter_mut().flatten() {
                    element.pattern.shift_spans(delta);
                    if let Some(default) = &mut element.default {
                        default.shift_spans(delta);
                    }
                }
                if let Some(rest) = rest {
                    rest.shift_spans(delta);
                }
                *span = span.shifted(delta);
            }
            Self::Object { props, rest, span } => {
                for prop in props {
                    prop.key_span = prop.key_span.shifted(delta);
                    if let Some(value) = &mut prop.value {
                        value.shift_spans(delta);
                    }
                    if let Some(default) = &mut prop.default {
                        default.shift_spans(delta);
                    }
                }
                if let Some(rest) = rest {
                    rest.shift_spans(delta);
                }
                *span = span.shifted(delta);
            }
        }
    }

    fn collect_bound_names(&self, out: &mut Vec<(CompactString, TextSpan)>) {
        match self {
            Self::Identifier { name, span } => out.push((name.clone(), *span)),
            Self::Array { elements, rest, .. } => {
                for element in elements.iter().flatten() {
                    element.pattern.collect_bound_names(out);
                }
                if let Some(rest) = rest {
                    rest.collect_bound_names(out);
                }
            }
            Self::Object { props, rest, .. } => {
                for prop in props {
                    match &prop.value {
                        Some(pattern) => pattern.collect_bound_names(out),
                        None => out.push((prop.key.clone(), prop.key_span)),
                    }
                }
                if let Some(rest) = rest {
                    rest.collect_bound_names(out);
                }
            }
        }
    }
}

/// A parsed `repeat.for` header: `declaration of iterable`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForOfHeader {
    pub declaration: BindingPattern,
    pub iterable: Expr,
    pub span: TextSpan,
}

impl ForOfHeader {
    /// Shift every span in the header by `delta` bytes.
    pub fn shift_spans(&mut self, delta: u32) {
        self.declaration.shift_spans(delta);
        self.iterable.shift_spans(delta);
        self.span = self.span.shifted(delta);
    }
}
