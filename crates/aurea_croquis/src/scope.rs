//! Scope frames.
//!
//! Frames live in an arena (`Vec<ScopeFrame>`) and reference their parents by
//! [`FrameId`]; the forest invariant rules out cycles by construction. A
//! frame is created for the template root and for every overlay controller
//! (`repeat`, `with`, `promise`, and the promise `then`/`catch` branches).
//! Reused-scope controllers (`if`, `switch`, `portal`, `pending`, ...) never
//! allocate one.

use aurea_carton::TextSpan;
use aurea_relief::{BranchKind, ExprId, FrameId};
use compact_str::CompactString;
use rustc_hash::FxHashMap;
use serde::Serialize;

/// Root or overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FrameKind {
    Root,
    Overlay,
}

/// What a frame's overlay type is built from (beyond its locals).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum OverlaySource {
    /// `with.bind="expr"` — the frame overlays the expression's type.
    With { from_expr: ExprId },
    /// A promise branch — the frame projects the promise value.
    Promise {
        from_expr: ExprId,
        branch: BranchKind,
    },
}

/// Provenance of a frame back into the IR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FrameOrigin {
    Repeat { for_of: ExprId },
    With { value: ExprId },
    Promise { value: ExprId },
    PromiseBranch { value: ExprId, branch: BranchKind },
}

/// A symbol introduced by a frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ScopeSymbol {
    /// A local bound by the repeat declaration (`item`, destructured names).
    RepeatLocal { name: CompactString, span: TextSpan },
    /// A fixed repeat contextual (`$index`, `$first`, ...).
    RepeatContextual { name: CompactString },
    /// A `<let>` binding published on this frame.
    Let { name: CompactString, span: TextSpan },
    /// The alias of a promise branch (`data` / `error` or user-named).
    PromiseAlias {
        name: CompactString,
        span: TextSpan,
        branch: BranchKind,
    },
}

impl ScopeSymbol {
    pub fn name(&self) -> &str {
        match self {
            Self::RepeatLocal { name, .. }
            | Self::RepeatContextual { name }
            | Self::Let { name, .. }
            | Self::PromiseAlias { name, .. } => name,
        }
    }

    /// The authored span, when the symbol has one.
    pub fn span(&self) -> Option<TextSpan> {
        match self {
            Self::RepeatLocal { span, .. }
            | Self::Let { span, .. }
            | Self::PromiseAlias { span, .. } => Some(*span),
            Self::RepeatContextual { .. } => None,
        }
    }
}

/// One scope frame.
#[derive(Debug, Clone, Serialize)]
pub struct ScopeFrame {
    pub id: FrameId,
    pub parent: Option<FrameId>,
    pub kind: FrameKind,
    pub overlay: Option<OverlaySource>,
    /// Symbols in introduction order. Names are unique within a frame.
    pub symbols: Vec<ScopeSymbol>,
    pub origin: Option<FrameOrigin>,
    /// `<let>` value expressions attached to this frame, in authored order.
    pub let_value_exprs: Vec<(CompactString, ExprId)>,
}

impl ScopeFrame {
    pub fn symbol(&self, name: &str) -> Option<&ScopeSymbol> {
        self.symbols.iter().find(|s| s.name() == name)
    }
}

/// The scope graph of one template.
#[derive(Debug, Clone, Serialize)]
pub struct ScopeTemplate {
    pub frames: Vec<ScopeFrame>,
    pub root: FrameId,
    #[serde(skip)]
    expr_to_frame: FxHashMap<ExprId, FrameId>,
}

impl ScopeTemplate {
    pub fn new(root: FrameId, frames: Vec<ScopeFrame>) -> Self {
        Self {
            frames,
            root,
            expr_to_frame: FxHashMap::default(),
        }
    }

    pub fn frame(&self, id: FrameId) -> &ScopeFrame {
        &self.frames[id.index()]
    }

    /// The frame an expression occurrence evaluates in.
    pub fn frame_of(&self, expr: ExprId) -> Option<FrameId> {
        self.expr_to_frame.get(&expr).copied()
    }

    pub(crate) fn map_expr(&mut self, expr: ExprId, frame: FrameId) {
        self.expr_to_frame.insert(expr, frame);
    }

    /// Number of mapped expressions.
    pub fn mapped_expr_count(&self) -> usize {
        self.expr_to_frame.len()
    }

    /// Walk from `frame` to the root, innermost first.
    pub fn ancestors(&self, frame: FrameId) -> Vec<FrameId> {
        let mut out = vec![frame];
        let mut cursor = self.frame(frame).parent;
        while let Some(id) = cursor {
            out.push(id);
            cursor = self.frame(id).parent;
        }
        out
    }

    /// Resolve `name` against a frame chain; returns the owning frame.
    pub fn resolve_symbol(&self, from: FrameId, name: &str) -> Option<(FrameId, &ScopeSymbol)> {
        for id in self.ancestors(from) {
            if let Some(symbol) = self.frame(id).symbol(name) {
                return Some((id, symbol));
            }
        }
        None
    }

    /// Depth of a frame (root = 0).
    pub fn depth(&self, frame: FrameId) -> usize {
        self.ancestors(frame).len() - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(id: u32, parent: Option<u32>, kind: FrameKind) -> ScopeFrame {
        ScopeFrame {
            id: FrameId::new(id),
            parent: parent.map(FrameId::new),
            kind,
            overlay: None,
            symbols: Vec::new(),
            origin: None,
            let_value_exprs: Vec::new(),
        }
    }

    #[test]
    fn ancestor_walk_and_depth() {
        let mut graph = ScopeTemplate::new(
            FrameId::new(0),
            vec![
                frame(0, None, FrameKind::Root),
                frame(1, Some(0), FrameKind::Overlay),
                frame(2, Some(1), FrameKind::Overlay),
            ],
        );
        graph.map_expr(ExprId::new(0), FrameId::new(2));
        assert_eq!(graph.depth(FrameId::new(2)), 2);
        assert_eq!(
            graph.ancestors(FrameId::new(2)),
            [FrameId::new(2), FrameId::new(1), FrameId::new(0)]
        );
        assert_eq!(graph.frame_of(ExprId::new(0)), Some(FrameId::new(2)));
    }

    #[test]
    fn symbol_resolution_prefers_innermost() {
        let mut inner = frame(1, Some(0), FrameKind::Overlay);
        inner.symbols.push(ScopeSymbol::RepeatLocal {
            name: "item".into(),
            span: TextSpan::new(0, 4),
        });
        let mut outer = frame(0, None, FrameKind::Root);
        outer.symbols.push(ScopeSymbol::Let {
            name: "item".into(),
            span: TextSpan::new(10, 14),
        });
        let graph = ScopeTemplate::new(FrameId::new(0), vec![outer, inner]);
        let (owner, symbol) = graph.resolve_symbol(FrameId::new(1), "item").unwrap();
        assert_eq!(owner, FrameId::new(1));
        assert!(matches!(symbol, ScopeSymbol::RepeatLocal { .. }));
    }
}
