//! Binding: map every expression occurrence to its evaluating frame.
//!
//! A deterministic traversal of the lowered instructions. Frame rules:
//!
//! - the template root gets one frame;
//! - an overlay controller (`repeat`, `with`, `promise`) allocates a frame
//!   parented to the current one;
//! - promise `then`/`catch` branches each allocate their own frame parented
//!   to the promise frame, `pending` reuses the promise frame;
//! - reused-scope controllers (`if`, `else`, `switch`, `case`,
//!   `default-case`, `portal`) never allocate;
//! - controller *header* expressions (iterator, value, case predicate)
//!   evaluate in the outer frame even though the body evaluates inside.

use aurea_carton::SourceSpan;
use aurea_relief::{
    BranchKind, DiagCode, DiagSource, Diagnostic, ExprId, FrameId, IdAllocator, Instruction,
    InstructionRow, IrModule, TemplateIr,
};
use aurea_musea::{InjectedVars, ResourceView, ScopeBehavior};
use compact_str::CompactString;

use crate::scope::{FrameKind, FrameOrigin, OverlaySource, ScopeFrame, ScopeSymbol, ScopeTemplate};

/// The result of the bind phase.
#[derive(Debug)]
pub struct BindOutput {
    pub scope: ScopeTemplate,
    pub diagnostics: Vec<Diagnostic>,
}

/// Build the scope graph for a lowered module.
pub fn bind_template(
    module: &IrModule,
    view: &ResourceView,
    ids: &mut IdAllocator,
    uri: &str,
) -> BindOutput {
    tracing::debug!(uri, "binding template");
    let root = ids.next_frame_id();
    let mut binder = Binder {
        module,
        view,
        ids,
        uri,
        frames: vec![ScopeFrame {
            id: root,
            parent: None,
            kind: FrameKind::Root,
            overlay: None,
            symbols: Vec::new(),
            origin: None,
            let_value_exprs: Vec::new(),
        }],
        expr_map: Vec::new(),
        diagnostics: Vec::new(),
    };

    let ctx = WalkCtx {
        frame: root,
        promise_value: None,
        lets_allowed: true,
    };
    for template in &module.templates {
        binder.walk_rows(&template.rows, ctx);
    }

    let mut scope = ScopeTemplate::new(root, binder.frames);
    for (expr, frame) in binder.expr_map {
        scope.map_expr(expr, frame);
    }
    tracing::debug!(
        frames = scope.frames.len(),
        exprs = scope.mapped_expr_count(),
        "binding complete"
    );
    BindOutput {
        scope,
        diagnostics: binder.diagnostics,
    }
}

#[derive(Debug, Clone, Copy)]
struct WalkCtx {
    frame: FrameId,
    /// The nearest enclosing promise controller's value expression.
    promise_value: Option<ExprId>,
    /// `false` inside a reused-scope controller body: lets there must not
    /// publish into the outer frame.
    lets_allowed: bool,
}

struct Binder<'a> {
    module: &'a IrModule,
    view: &'a ResourceView,
    ids: &'a mut IdAllocator,
    uri: &'a str,
    frames: Vec<ScopeFrame>,
    expr_map: Vec<(ExprId, FrameId)>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Binder<'a> {
    fn frame_mut(&mut self, id: FrameId) -> &mut ScopeFrame {
        &mut self.frames[id.index()]
    }

    fn map(&mut self, expr: ExprId, frame: FrameId) {
        self.expr_map.push((expr, frame));
    }

    fn walk_rows(&mut self, rows: &[InstructionRow], ctx: WalkCtx) {
        for row in rows {
            for instruction in &row.instructions {
                self.walk_instruction(instruction, ctx);
            }
        }
    }

    fn walk_instruction(&mut self, instruction: &Instruction, ctx: WalkCtx) {
        match instruction {
            Instruction::HydrateTemplateController {
                res, props, def, branch, ..
            } => {
                self.walk_controller(res, props, def, branch.as_ref(), ctx);
            }
            Instruction::HydrateElement { props, .. }
            | Instruction::HydrateAttribute { props, .. } => {
                for prop in props {
                    self.walk_instruction(prop, ctx);
                }
            }
            Instruction::HydrateLetElement { instructions, .. } => {
                for binding in instructions {
                    for expr in binding.from.expr_ids() {
                        self.map(expr, ctx.frame);
                    }
                    // Only single-expression lets carry a typed value; an
                    // interpolated let is a string no matter its slices.
                    if let aurea_relief::BindingSource::Expr { id, .. } = &binding.from {
                        let expr = *id;
                        self.frame_mut(ctx.frame)
                            .let_value_exprs
                            .push((binding.to.clone(), expr));
                    }
                    if ctx.lets_allowed {
                        self.introduce_symbol(
                            ctx.frame,
                            ScopeSymbol::Let {
                                name: binding.to.clone(),
                                span: binding.to_span,
                            },
                        );
                    }
                }
            }
            other => {
                for expr in other.own_expr_ids() {
                    self.map(expr, ctx.frame);
                }
            }
        }
    }

    fn walk_controller(
        &mut self,
        res: &str,
        props: &[Instruction],
        def: &TemplateIr,
        branch: Option<&aurea_relief::BranchLink>,
        ctx: WalkCtx,
    ) {
        // Header expressions evaluate in the outer frame.
        for prop in props {
            for expr in prop.own_expr_ids() {
                self.map(expr, ctx.frame);
            }
        }
        if let Some(expr) = branch.and_then(|b| b.expr) {
            self.map(expr, ctx.frame);
        }

        let Some(config) = self.view.controller(res).cloned() else {
            // Unknown controllers were flagged by resolve; their body
            // evaluates in the surrounding frame.
            self.walk_rows(&def.rows, ctx);
            return;
        };

        let value_expr = props.iter().find_map(|p| match p {
            Instruction::PropertyBinding { from, .. } => from.expr_ids().first().copied(),
            _ => None,
        });

        let inner_ctx = match config.scope {
            ScopeBehavior::Reuse => WalkCtx {
                lets_allowed: false,
                ..ctx
            },
            ScopeBehavior::Overlay => {
                let frame = self.allocate_frame(res, props, branch, value_expr, ctx);
                WalkCtx {
                    frame,
                    promise_value: if res == "promise" {
                        value_expr
                    } else {
                        ctx.promise_value
                    },
                    lets_allowed: true,
                }
            }
        };
        self.walk_rows(&def.rows, inner_ctx);
    }

    fn allocate_frame(
        &mut self,
        res: &str,
        props: &[Instruction],
        branch: Option<&aurea_relief::BranchLink>,
        value_expr: Option<ExprId>,
        ctx: WalkCtx,
    ) -> FrameId {
        let id = self.ids.next_frame_id();
        self.frames.push(ScopeFrame {
            id,
            parent: Some(ctx.frame),
            kind: FrameKind::Overlay,
            overlay: None,
            symbols: Vec::new(),
            origin: None,
            let_value_exprs: Vec::new(),
        });

        match res {
            "repeat" => self.populate_repeat_frame(id, props),
            "with" => {
                if let Some(value) = value_expr {
                    let frame = self.frame_mut(id);
                    frame.overlay = Some(OverlaySource::With { from_expr: value });
                    frame.origin = Some(FrameOrigin::With { value });
                }
            }
            "promise" => {
                if let Some(value) = value_expr {
                    self.frame_mut(id).origin = Some(FrameOrigin::Promise { value });
                }
            }
            "then" | "catch" => {
                let kind = if res == "then" {
                    BranchKind::Then
                } else {
                    BranchKind::Catch
                };
                if let Some(value) = ctx.promise_value {
                    let frame = self.frame_mut(id);
                    frame.overlay = Some(OverlaySource::Promise {
                        from_expr: value,
                        branch: kind,
                    });
                    frame.origin = Some(FrameOrigin::PromiseBranch {
                        value,
                        branch: kind,
                    });
                }
                let (alias, span) = branch
                    .and_then(|b| b.local.as_ref().map(|l| (l.clone(), b.span)))
                    .unwrap_or_else(|| {
                        let default = match &self.view.controller(res).map(|c| c.injected.clone()) {
                            Some(InjectedVars::UserAlias { default }) => *default,
                            _ => "data",
                        };
                        (
                            CompactString::from(default),
                            branch.map(|b| b.span).unwrap_or_default(),
                        )
                    });
                self.introduce_symbol(
                    id,
                    ScopeSymbol::PromiseAlias {
                        name: alias,
                        span,
                        branch: kind,
                    },
                );
            }
            _ => {}
        }
        id
    }

    fn populate_repeat_frame(&mut self, frame: FrameId, props: &[Instruction]) {
        let for_of = props.iter().find_map(|p| match p {
            Instruction::IteratorBinding { for_of, .. } => Some(*for_of),
            _ => None,
        });
        let Some(for_of) = for_of else {
            return;
        };
        self.frame_mut(frame).origin = Some(FrameOrigin::Repeat { for_of });

        let locals = self
            .module
            .expr_table
            .get(for_of)
            .and_then(|entry| entry.for_of.as_ref())
            .map(|header| header.declaration.bound_names())
            .unwrap_or_default();
        for (name, span) in locals {
            self.introduce_symbol(frame, ScopeSymbol::RepeatLocal { name, span });
        }
        for contextual in aurea_musea::REPEAT_CONTEXTUALS {
            self.introduce_symbol(
                frame,
                ScopeSymbol::RepeatContextual {
                    name: CompactString::from(*contextual),
                },
            );
        }
    }

    /// Add a symbol, reporting AU1202 on a name collision in the same frame.
    fn introduce_symbol(&mut self, frame: FrameId, symbol: ScopeSymbol) {
        let uri = self.uri.to_string();
        let existing = self.frames[frame.index()].symbol(symbol.name()).is_some();
        if existing {
            let span = symbol.span().unwrap_or_default();
            self.diagnostics.push(
                Diagnostic::error(
                    DiagCode::DuplicateLocal,
                    format!("duplicate local '{}' in the same scope", symbol.name()),
                    Some(SourceSpan::in_file(span, uri)),
                    DiagSource::Bind,
                )
                .with_recovery(),
            );
            return;
        }
        self.frame_mut(frame).symbols.push(symbol);
    }
}
