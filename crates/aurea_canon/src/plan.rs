//! Overlay planning.
//!
//! For each scope frame the planner computes the frame's *overlay type*: an
//! intersection of its parent's type with one field per frame-local symbol.
//! Repeat locals are typed by projecting the iterator lambda's return type
//! through `__AU_TTC_ElemOf` and the authored destructuring pattern; `with`
//! frames intersect the base expression's type; promise branches project
//! `Awaited<…>` (or `any` for `catch`) under the branch alias.
//!
//! Frames with `<let>` bindings get a chain of base aliases so a let value
//! lambda can reference earlier lets without the frame type referencing
//! itself.

use aurea_croquis::{OverlaySource, ScopeSymbol, ScopeTemplate};
use aurea_relief::{BindingPattern, BranchKind, ExprId, FrameId, IrModule};
use compact_str::CompactString;
use serde::Serialize;

/// View-model reflection facts needed by the planner.
#[derive(Debug, Clone)]
pub struct VmInfo {
    /// A type expression usable in the overlay, e.g.
    /// `InstanceType<typeof import("./app")["App"]>`.
    pub type_expr: String,
    /// User-facing name substituted into diagnostics.
    pub display_name: String,
    /// Prefix reserved for synthesized names, e.g. `__AU_TTC_`.
    pub synthetic_prefix: String,
}

impl VmInfo {
    pub fn new(type_expr: impl Into<String>) -> Self {
        let type_expr = type_expr.into();
        Self {
            display_name: type_expr.clone(),
            type_expr,
            synthetic_prefix: "__AU_TTC_".to_string(),
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }
}

/// One emitted type alias.
#[derive(Debug, Clone, Serialize)]
pub struct TypeDecl {
    pub name: String,
    pub expr: String,
}

/// The plan for one frame.
#[derive(Debug, Clone, Serialize)]
pub struct FramePlan {
    pub frame: FrameId,
    /// The frame's final type alias name (`__AU_TTC_F1`).
    pub type_name: String,
    /// Aliases to declare for this frame, in order; the last one is
    /// `type_name`.
    pub decls: Vec<TypeDecl>,
    /// Let-value lambdas take the pre-let base alias current at their
    /// position.
    pub let_param_types: Vec<(ExprId, String)>,
}

/// The whole-template overlay plan.
#[derive(Debug, Clone, Serialize)]
pub struct OverlayPlan {
    pub vm_alias: String,
    pub vm_type_expr: String,
    pub elem_of_alias: String,
    pub pipe_helper: String,
    pub frames: Vec<FramePlan>,
}

impl OverlayPlan {
    pub fn frame_plan(&self, frame: FrameId) -> Option<&FramePlan> {
        self.frames.iter().find(|f| f.frame == frame)
    }

    /// The param type alias for an expression's lambda: the let base alias
    /// when the expression is a let value, else the frame's type alias.
    pub fn lambda_param_type(&self, frame: FrameId, expr: ExprId) -> Option<&str> {
        let plan = self.frame_plan(frame)?;
        if let Some((_, alias)) = plan.let_param_types.iter().find(|(id, _)| *id == expr) {
            return Some(alias.as_str());
        }
        Some(plan.type_name.as_str())
    }
}

/// Build the overlay plan from the scope graph.
pub fn plan_overlay(module: &IrModule, scope: &ScopeTemplate, vm: &VmInfo) -> OverlayPlan {
    let prefix = vm.synthetic_prefix.as_str();
    let vm_alias = format!("{prefix}VM");
    let elem_of_alias = format!("{prefix}ElemOf");
    let pipe_helper = format!("{prefix}pipe");

    let mut frames = Vec::with_capacity(scope.frames.len());
    for frame in &scope.frames {
        let type_name = format!("{prefix}F{}", frame.id.as_u32());
        let parent_name = frame
            .parent
            .map(|p| format!("{prefix}F{}", p.as_u32()))
            .unwrap_or_else(|| vm_alias.clone());

        let mut decls: Vec<TypeDecl> = Vec::new();
        let mut let_param_types = Vec::new();

        // Base type before lets.
        let base_expr = if frame.parent.is_none() {
            format!("{parent_name} & {{ $parent: any }}")
        } else {
            let mut parts = vec![parent_name.clone()];
            match frame.overlay {
                Some(OverlaySource::With { from_expr }) => {
                    parts.push(format!("ReturnType<typeof {prefix}E{}>", from_expr.as_u32()));
                }
                Some(OverlaySource::Promise { .. }) | None => {}
            }
            let mut fields: Vec<String> = Vec::new();
            for symbol in &frame.symbols {
                match symbol {
                    ScopeSymbol::RepeatLocal { .. } | ScopeSymbol::Let { .. } => {}
                    ScopeSymbol::RepeatContextual { name } => {
                        fields.push(format!("{}: {}", name, contextual_type(name)));
                    }
                    ScopeSymbol::PromiseAlias { name, branch, .. } => {
                        let ty = promise_alias_type(prefix, frame.overlay, *branch);
                        fields.push(format!("{name}: {ty}"));
                    }
                }
            }
            // Repeat locals come from the destructuring projection.
            if let Some(aurea_croquis::FrameOrigin::Repeat { for_of }) = frame.origin {
                let item_alias = format!("{prefix}F{}_ITEM", frame.id.as_u32());
                decls.push(TypeDecl {
                    name: item_alias.clone(),
                    expr: format!(
                        "{elem_of_alias}<ReturnType<typeof {prefix}E{}>>",
                        for_of.as_u32()
                    ),
                });
                if let Some(header) = module
                    .expr_table
                    .get(for_of)
                    .and_then(|entry| entry.for_of.as_ref())
                {
                    let mut locals = Vec::new();
                    pattern_field_types(&header.declaration, &item_alias, &mut locals);
                    for (name, ty) in locals {
                        fields.push(format!("{name}: {ty}"));
                    }
                }
            }
            fields.push(format!("$parent: {parent_name}"));
            parts.push(format!("{{ {} }}", fields.join("; ")));
            parts.join(" & ")
        };

        // Lets extend the base one at a time so let values can see earlier
        // lets without a circular alias.
        let lets: Vec<_> = frame
            .symbols
            .iter()
            .filter_map(|s| match s {
                ScopeSymbol::Let { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect();
        if lets.is_empty() {
            decls.push(TypeDecl {
                name: type_name.clone(),
                expr: base_expr,
            });
        } else {
            let base_alias = format!("{type_name}_L0");
            decls.push(TypeDecl {
                name: base_alias.clone(),
                expr: base_expr,
            });
            let mut current = base_alias;
            for (i, name) in lets.iter().enumerate() {
                let value_expr = frame
                    .let_value_exprs
                    .iter()
                    .find(|(n, _)| n == name)
                    .map(|(_, id)| *id);
                if let Some(expr_id) = value_expr {
                    let_param_types.push((expr_id, current.clone()));
                }
                let field_type = match value_expr {
                    Some(expr_id) => {
                        format!("ReturnType<typeof {prefix}E{}>", expr_id.as_u32())
                    }
                    // Interpolated lets are strings.
                    None => "string".to_string(),
                };
                let next = if i + 1 == lets.len() {
                    type_name.clone()
                } else {
                    format!("{type_name}_L{}", i + 1)
                };
                decls.push(TypeDecl {
                    name: next.clone(),
                    expr: format!("{current} & {{ {name}: {field_type} }}"),
                });
                current = next;
            }
        }

        frames.push(FramePlan {
            frame: frame.id,
            type_name,
            decls,
            let_param_types,
        });
    }

    OverlayPlan {
        vm_alias,
        vm_type_expr: vm.type_expr.clone(),
        elem_of_alias,
        pipe_helper,
        frames,
    }
}

fn contextual_type(name: &str) -> &'static str {
    match name {
        "$index" | "$length" => "number",
        _ => "boolean",
    }
}

fn promise_alias_type(
    prefix: &str,
    overlay: Option<OverlaySource>,
    branch: BranchKind,
) -> String {
    match (overlay, branch) {
        (Some(OverlaySource::Promise { from_expr, .. }), BranchKind::Then) => {
            format!("Awaited<ReturnType<typeof {prefix}E{}>>", from_expr.as_u32())
        }
        _ => "any".to_string(),
    }
}

/// Field types a destructuring pattern binds over an element type alias.
fn pattern_field_types(
    pattern: &BindingPattern,
    elem: &str,
    out: &mut Vec<(CompactString, String)>,
) {
    match pattern {
        BindingPattern::Identifier { name, .. } => {
            out.push((name.clone(), elem.to_string()));
        }
        BindingPattern::Array {
            elements, rest, ..
        } => {
            for (index, element) in elements.iter().enumerate() {
                let Some(element) = element else {
                    continue;
                };
                let heads = "any, ".repeat(index);
                let extracted = format!(
                    "({elem} extends readonly [{heads}infer __P, ...any[]] ? __P : any)"
                );
                pattern_field_types(&element.pattern, &extracted, out);
            }
            if let Some(rest) = rest {
                let heads = "any, ".repeat(elements.len());
                let extracted =
                    format!("({elem} extends readonly [{heads}...infer __R] ? __R : any[])");
                pattern_field_types(rest, &extracted, out);
            }
        }
        BindingPattern::Object { props, rest, .. } => {
            for prop in props {
                let extracted = format!(
                    "({elem} extends {{ {key}: infer __P }} ? __P : any)",
                    key = prop.key
                );
                match &prop.value {
                    Some(value) => pattern_field_types(value, &extracted, out),
                    None => out.push((prop.key.clone(), extracted)),
                }
            }
            if let Some(rest) = rest {
                pattern_field_types(rest, "any", out);
            }
        }
    }
}
