//! Lowered template IR.
//!
//! The IR is the first artifact of a compilation: a DOM tree annotated with
//! node ids, one instruction row per instruction-bearing node, and a table
//! of every registered expression occurrence. It is immutable once lowering
//! completes; later stages attach their results in side structures keyed by
//! the ids defined in [`crate::ids`].

use aurea_carton::TextSpan;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::expr::{Expr, ForOfHeader};
use crate::ids::{ExprId, NodeId};

/// A whole-file compilation unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrModule {
    pub templates: Vec<TemplateIr>,
    pub expr_table: ExprTable,
    /// Normalized template document URI.
    pub file: CompactString,
}

/// One template definition: its DOM plus instruction rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateIr {
    pub dom: TemplateNode,
    pub rows: Vec<InstructionRow>,
    pub name: Option<CompactString>,
}

/// Element namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Namespace {
    #[default]
    Html = 0,
    Svg = 1,
    MathMl = 2,
}

/// A raw authored attribute, before pattern interpretation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAttr {
    pub name: CompactString,
    pub name_span: TextSpan,
    /// `None` for valueless attributes (`<input disabled>`).
    pub value: Option<CompactString>,
    pub value_span: Option<TextSpan>,
    /// Whole-attribute span, name through closing quote.
    pub span: TextSpan,
}

impl RawAttr {
    /// The span diagnostics should target: the value when present, else the
    /// name.
    pub fn target_span(&self) -> TextSpan {
        self.value_span.unwrap_or(self.name_span)
    }
}

/// A lazily-parsed text interpolation: `parts[0] ${exprs[0]} parts[1] ...`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interpolation {
    pub parts: Vec<CompactString>,
    pub exprs: Vec<ExprId>,
}

/// The template DOM.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TemplateNode {
    Template {
        id: NodeId,
        attrs: Vec<RawAttr>,
        children: Vec<TemplateNode>,
        loc: TextSpan,
    },
    Element {
        id: NodeId,
        tag: CompactString,
        ns: Namespace,
        attrs: Vec<RawAttr>,
        children: Vec<TemplateNode>,
        loc: TextSpan,
        /// Span of the tag name inside the open tag.
        tag_span: TextSpan,
    },
    Text {
        id: NodeId,
        text: CompactString,
        interpolation: Option<Interpolation>,
        loc: TextSpan,
    },
    Comment {
        id: NodeId,
        text: CompactString,
        loc: TextSpan,
    },
}

impl TemplateNode {
    pub fn id(&self) -> NodeId {
        match self {
            Self::Template { id, .. }
            | Self::Element { id, .. }
            | Self::Text { id, .. }
            | Self::Comment { id, .. } => *id,
        }
    }

    pub fn loc(&self) -> TextSpan {
        match self {
            Self::Template { loc, .. }
            | Self::Element { loc, .. }
            | Self::Text { loc, .. }
            | Self::Comment { loc, .. } => *loc,
        }
    }

    pub fn children(&self) -> &[TemplateNode] {
        match self {
            Self::Template { children, .. } | Self::Element { children, .. } => children,
            _ => &[],
        }
    }
}

/// Binding mode for property bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BindingMode {
    #[default]
    Default,
    OneTime,
    ToView,
    FromView,
    TwoWay,
}

/// The expression payload of an instruction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum BindingSource {
    /// A single authored expression.
    Expr {
        id: ExprId,
        code: CompactString,
        loc: TextSpan,
    },
    /// An interpolated string with one expression per `${…}` slice.
    Interp {
        exprs: Vec<ExprId>,
        parts: Vec<CompactString>,
        loc: TextSpan,
    },
}

impl BindingSource {
    /// Every expression id referenced by this source, in authored order.
    pub fn expr_ids(&self) -> Vec<ExprId> {
        match self {
            Self::Expr { id, .. } => vec![*id],
            Self::Interp { exprs, .. } => exprs.clone(),
        }
    }

    pub fn loc(&self) -> TextSpan {
        match self {
            Self::Expr { loc, .. } | Self::Interp { loc, .. } => *loc,
        }
    }
}

/// Branch linkage for `promise` and `switch` sub-controllers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BranchKind {
    Case,
    Default,
    Then,
    Catch,
    Pending,
}

/// Links a nested controller to its parent controller's branch slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchLink {
    pub kind: BranchKind,
    /// Branch expression (case predicate), when authored.
    pub expr: Option<ExprId>,
    /// User alias for the branch local (`then.from-view="data"`).
    pub local: Option<CompactString>,
    /// Span of the branch attribute, for diagnostics.
    pub span: TextSpan,
}

/// One `<let>` binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LetBinding {
    pub to: CompactString,
    pub to_span: TextSpan,
    pub from: BindingSource,
}

/// Instructions attached to a single target node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstructionRow {
    pub target: NodeId,
    pub instructions: Vec<Instruction>,
}

/// The instruction set produced by lowering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Instruction {
    PropertyBinding {
        to: CompactString,
        to_span: TextSpan,
        from: BindingSource,
        mode: BindingMode,
    },
    AttributeBinding {
        to: CompactString,
        to_span: TextSpan,
        from: BindingSource,
    },
    StylePropertyBinding {
        to: CompactString,
        to_span: TextSpan,
        from: BindingSource,
    },
    ListenerBinding {
        to: CompactString,
        to_span: TextSpan,
        from: BindingSource,
        modifiers: Vec<CompactString>,
        /// `true` for capture-phase registration.
        capture: bool,
    },
    RefBinding {
        to: CompactString,
        to_span: TextSpan,
        from: BindingSource,
    },
    TextBinding {
        from: BindingSource,
    },
    IteratorBinding {
        for_of: ExprId,
        header_span: TextSpan,
    },
    SetProperty {
        to: CompactString,
        to_span: TextSpan,
        value: CompactString,
    },
    SetAttribute {
        to: CompactString,
        to_span: TextSpan,
        value: CompactString,
    },
    SetClassAttribute {
        value: CompactString,
        span: TextSpan,
    },
    SetStyleAttribute {
        value: CompactString,
        span: TextSpan,
    },
    HydrateElement {
        /// Authored tag name.
        res: CompactString,
        res_span: TextSpan,
        props: Vec<Instruction>,
    },
    HydrateAttribute {
        /// Authored attribute target name.
        res: CompactString,
        res_span: TextSpan,
        props: Vec<Instruction>,
    },
    HydrateTemplateController {
        /// Canonical controller name (`repeat`, `if`, ...).
        res: CompactString,
        res_span: TextSpan,
        props: Vec<Instruction>,
        /// The controller's projected template content.
        def: TemplateIr,
        branch: Option<BranchLink>,
    },
    HydrateLetElement {
        instructions: Vec<LetBinding>,
        to_binding_context: bool,
    },
}

impl Instruction {
    /// Expression ids referenced directly by this instruction (not by nested
    /// hydrate payloads).
    pub fn own_expr_ids(&self) -> Vec<ExprId> {
        match self {
            Self::PropertyBinding { from, .. }
            | Self::AttributeBinding { from, .. }
            | Self::StylePropertyBinding { from, .. }
            | Self::ListenerBinding { from, .. }
            | Self::RefBinding { from, .. }
            | Self::TextBinding { from } => from.expr_ids(),
            Self::IteratorBinding { for_of, .. } => vec![*for_of],
            Self::HydrateLetElement { instructions, .. } => instructions
                .iter()
                .flat_map(|let_binding| let_binding.from.expr_ids())
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// How an expression occurrence is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExpressionKind {
    /// Plain value position (property binding, interpolation slice, ...).
    Property,
    /// A `repeat.for` header.
    Iterator,
    /// A listener body (may reference `$event`).
    Listener,
}

/// One registered expression occurrence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExprTableEntry {
    pub id: ExprId,
    pub ast: Expr,
    /// The parsed for-of header for `Iterator` entries.
    pub for_of: Option<ForOfHeader>,
    pub kind: ExpressionKind,
    /// Authored span in document coordinates.
    pub span: TextSpan,
    /// Authored source text, verbatim.
    pub code: CompactString,
    /// Interpolation group: slices of one interpolation share a value.
    pub interp_group: Option<u32>,
}

/// Dense table of expression occurrences, indexed by [`ExprId`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExprTable {
    entries: Vec<ExprTableEntry>,
}

impl ExprTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push an entry. Entries must arrive in id order; the table is dense.
    pub fn push(&mut self, entry: ExprTableEntry) {
        debug_assert_eq!(entry.id.index(), self.entries.len());
        self.entries.push(entry);
    }

    pub fn get(&self, id: ExprId) -> Option<&ExprTableEntry> {
        self.entries.get(id.index())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExprTableEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::LiteralValue;

    #[test]
    fn binding_source_expr_ids() {
        let single = BindingSource::Expr {
            id: ExprId::new(3),
            code: "title".into(),
            loc: TextSpan::new(0, 5),
        };
        assert_eq!(single.expr_ids(), vec![ExprId::new(3)]);

        let interp = BindingSource::Interp {
            exprs: vec![ExprId::new(1), ExprId::new(2)],
            parts: vec!["a".into(), "b".into(), "c".into()],
            loc: TextSpan::new(0, 20),
        };
        assert_eq!(interp.expr_ids(), vec![ExprId::new(1), ExprId::new(2)]);
    }

    #[test]
    fn expr_table_is_dense() {
        let mut table = ExprTable::new();
        table.push(ExprTableEntry {
            id: ExprId::new(0),
            ast: Expr::Literal {
                value: LiteralValue::Null,
                span: TextSpan::new(0, 4),
            },
            for_of: None,
            kind: ExpressionKind::Property,
            span: TextSpan::new(0, 4),
            code: "null".into(),
            interp_group: None,
        });
        assert_eq!(table.len(), 1);
        assert!(table.get(ExprId::new(0)).is_some());
        assert!(table.get(ExprId::new(1)).is_none());
    }
}
