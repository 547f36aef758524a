//! Resolution: link IR instructions to catalog entries.
//!
//! Every resource-bearing instruction is classified as resolved or unknown.
//! Unknown targets carry a *confidence* that drives the diagnostics engine's
//! severity demotion:
//!
//! - `high` — the author unambiguously used dialect syntax (a binding
//!   command, an interpolation, a converter pipe);
//! - `medium` — a dashed tag with no binding syntax on the element itself,
//!   plausibly a foreign web component;
//! - `low` — a dashed tag whose entire subtree shows zero dialect syntax.
//!
//! Expressions owned by instructions with unknown targets are collected into
//! `unresolved_exprs`; the facade uses this set for cascade suppression of
//! type-check diagnostics.

use aurea_carton::{SourceSpan, TextSpan};
use aurea_relief::{
    BindingSource, BranchKind, Confidence, DiagCode, DiagSource, Diagnostic, ExprId, Instruction,
    InstructionRow, IrModule, NodeId, ResourceKind, Severity, TemplateNode,
};
use aurea_musea::{
    is_known_event, is_known_html_attr, kebab_case, AttributeRes, BehaviorRes, ConverterRes,
    ElementRes, ResourceView,
};
use compact_str::CompactString;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::lower::LowerOutput;

/// Template-level `<import>` resources supplied by the host.
#[derive(Debug, Default)]
pub struct LocalImports {
    pub elements: Vec<ElementRes>,
    pub attributes: Vec<AttributeRes>,
    pub converters: Vec<ConverterRes>,
    pub behaviors: Vec<BehaviorRes>,
}

impl LocalImports {
    fn element(&self, name: &str) -> Option<&ElementRes> {
        self.elements
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name))
    }

    fn attribute(&self, name: &str) -> Option<&AttributeRes> {
        self.attributes
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
    }

    fn converter(&self, name: &str) -> bool {
        self.converters
            .iter()
            .any(|c| c.name.eq_ignore_ascii_case(name))
    }

    fn behavior(&self, name: &str) -> bool {
        self.behaviors
            .iter()
            .any(|b| b.name.eq_ignore_ascii_case(name))
    }
}

/// The outcome of resolving one instruction target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetResolution {
    Resolved {
        kind: ResourceKind,
        name: CompactString,
        bindable: Option<CompactString>,
    },
    Unknown {
        kind: ResourceKind,
        name: CompactString,
        confidence: Confidence,
    },
}

/// One resolution record, keyed by the owning node.
#[derive(Debug, Clone)]
pub struct ResolutionEntry {
    pub node: NodeId,
    pub span: TextSpan,
    pub resolution: TargetResolution,
}

/// The linked-semantics artifact.
#[derive(Debug, Default)]
pub struct LinkedModule {
    pub resolutions: Vec<ResolutionEntry>,
    /// Expressions owned by instructions whose target is unknown.
    pub unresolved_exprs: FxHashSet<ExprId>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Resolve a lowered module against the catalog view plus local imports.
pub fn resolve_template(
    lowered: &LowerOutput,
    view: &ResourceView,
    imports: &LocalImports,
    uri: &str,
) -> LinkedModule {
    tracing::debug!(uri, "resolving template");
    let mut resolver = Resolver {
        view,
        imports,
        uri,
        linked: LinkedModule::default(),
        node_syntax: FxHashMap::default(),
        node_exprs: FxHashMap::default(),
        unknown_nodes: FxHashSet::default(),
        import_nodes: FxHashMap::default(),
    };
    resolver.run(&lowered.module);

    // Lowering-detected command references and usage issues.
    for command_ref in &lowered.command_refs {
        if view.command(&command_ref.name).is_none() {
            let diag = Diagnostic::error(
                DiagCode::UnknownCommand,
                format!("unknown binding command '{}'", command_ref.name),
                Some(SourceSpan::in_file(command_ref.span, uri)),
                DiagSource::Link,
            )
            .with_confidence(Confidence::High)
            .with_resource(ResourceKind::Command, command_ref.name.clone());
            resolver.linked.diagnostics.push(diag);
        }
    }
    for issue in &lowered.usage_issues {
        let mut diag = Diagnostic::error(
            issue.code.clone(),
            issue.message.clone(),
            Some(SourceSpan::in_file(issue.span, uri)),
            DiagSource::Link,
        );
        if issue.code.is_confidence_gated() {
            diag = diag.with_confidence(Confidence::High);
        }
        resolver.linked.diagnostics.push(diag);
    }

    resolver.linked
}

/// Per-node facts gathered before diagnosis.
struct Resolver<'a> {
    view: &'a ResourceView,
    imports: &'a LocalImports,
    uri: &'a str,
    linked: LinkedModule,
    /// Nodes that carry dialect syntax directly.
    node_syntax: FxHashMap<NodeId, bool>,
    /// Expressions owned per node, for cascade marking.
    node_exprs: FxHashMap<NodeId, Vec<ExprId>>,
    /// Element nodes whose tag did not resolve.
    unknown_nodes: FxHashSet<NodeId>,
    /// Elements resolved through `<import>` overlays; their bindings arrive
    /// as plain property rows because lowering could not see the import.
    import_nodes: FxHashMap<NodeId, ElementRes>,
}

impl<'a> Resolver<'a> {
    fn at(&self, span: TextSpan) -> SourceSpan {
        SourceSpan::in_file(span, self.uri)
    }

    fn run(&mut self, module: &IrModule) {
        for template in &module.templates {
            self.collect_rows(&template.rows);
        }
        for template in &module.templates {
            self.visit_dom(&template.dom);
        }
        for template in &module.templates {
            self.resolve_rows(&template.rows, None);
        }
        self.resolve_expressions(module);
    }

    // ---- pass 1: which nodes carry dialect syntax, which exprs they own ----

    fn collect_rows(&mut self, rows: &[InstructionRow]) {
        for row in rows {
            for instruction in &row.instructions {
                self.collect_instruction(row.target, instruction);
            }
        }
    }

    fn collect_instruction(&mut self, target: NodeId, instruction: &Instruction) {
        let exprs = instruction.own_expr_ids();
        if !exprs.is_empty()
            || !matches!(
                instruction,
                Instruction::SetAttribute { .. }
                    | Instruction::SetProperty { .. }
                    | Instruction::SetClassAttribute { .. }
                    | Instruction::SetStyleAttribute { .. }
            )
        {
            self.node_syntax.insert(target, true);
        }
        self.node_exprs.entry(target).or_default().extend(exprs);
        match instruction {
            Instruction::HydrateTemplateController { props, def, branch, .. } => {
                for prop in props {
                    self.collect_instruction(target, prop);
                }
                if let Some(expr) = branch.as_ref().and_then(|b| b.expr) {
                    self.node_exprs.entry(target).or_default().push(expr);
                }
                self.collect_rows(&def.rows);
            }
            Instruction::HydrateElement { props, .. }
            | Instruction::HydrateAttribute { props, .. } => {
                for prop in props {
                    self.collect_instruction(target, prop);
                }
            }
            _ => {}
        }
    }

    // ---- pass 2: element resolution over the DOM ----

    fn visit_dom(&mut self, node: &TemplateNode) {
        if let TemplateNode::Element {
            id,
            tag,
            tag_span,
            ..
        } = node
        {
            self.resolve_element(*id, tag, *tag_span, node);
        }
        for child in node.children() {
            self.visit_dom(child);
        }
    }

    fn resolve_element(&mut self, id: NodeId, tag: &str, tag_span: TextSpan, node: &TemplateNode) {
        if tag == "let" || tag == "import" || tag == "require" {
            return;
        }
        if let Some(element) = self.imports.element(tag).or_else(|| self.view.element(tag)) {
            let element = element.clone();
            self.linked.resolutions.push(ResolutionEntry {
                node: id,
                span: tag_span,
                resolution: TargetResolution::Resolved {
                    kind: ResourceKind::Element,
                    name: element.name.clone(),
                    bindable: None,
                },
            });
            if self.view.element(tag).is_none() {
                self.import_nodes.insert(id, element);
            }
            return;
        }
        // Only dashed tags are custom-element-shaped; anything else is
        // plain markup and none of the catalog's business.
        if !tag.contains('-') {
            return;
        }
        let confidence = self.element_confidence(id, node);
        self.unknown_nodes.insert(id);
        self.linked.resolutions.push(ResolutionEntry {
            node: id,
            span: tag_span,
            resolution: TargetResolution::Unknown {
                kind: ResourceKind::Element,
                name: CompactString::from(tag),
                confidence,
            },
        });
        let severity = match confidence {
            Confidence::High => Severity::Error,
            _ => Severity::Warning,
        };
        let diag = Diagnostic::with_severity(
            DiagCode::UnknownElement,
            severity,
            format!("unknown element '{tag}'"),
            Some(self.at(tag_span)),
            DiagSource::Link,
        )
        .with_confidence(confidence)
        .with_resource(ResourceKind::Element, tag);
        self.linked.diagnostics.push(diag);
    }

    fn element_confidence(&self, id: NodeId, node: &TemplateNode) -> Confidence {
        if self.node_syntax.get(&id).copied().unwrap_or(false) {
            return Confidence::High;
        }
        if self.subtree_has_syntax(node) {
            return Confidence::Medium;
        }
        Confidence::Low
    }

    fn subtree_has_syntax(&self, node: &TemplateNode) -> bool {
        if self.node_syntax.get(&node.id()).copied().unwrap_or(false) {
            return true;
        }
        node.children().iter().any(|c| self.subtree_has_syntax(c))
    }

    // ---- pass 3: instruction resolution ----

    fn resolve_rows(&mut self, rows: &[InstructionRow], enclosing_controller: Option<&str>) {
        for row in rows {
            for instruction in &row.instructions {
                self.resolve_instruction(row.target, instruction, enclosing_controller);
            }
        }
    }

    fn resolve_instruction(
        &mut self,
        target: NodeId,
        instruction: &Instruction,
        enclosing_controller: Option<&str>,
    ) {
        match instruction {
            Instruction::PropertyBinding { to, from, .. } => {
                self.resolve_property_target(target, to, from);
            }
            Instruction::ListenerBinding { to, to_span, .. } => {
                if !self.unknown_nodes.contains(&target) && !is_known_event(to) {
                    let diag = Diagnostic::warning(
                        DiagCode::UnknownEvent,
                        format!("unknown event '{to}'"),
                        Some(self.at(*to_span)),
                        DiagSource::Link,
                    )
                    .with_confidence(Confidence::Medium)
                    .with_resource(ResourceKind::Event, to.clone());
                    self.linked.diagnostics.push(diag);
                }
            }
            Instruction::AttributeBinding { to, from, .. } => {
                // Only plain-attribute interpolations are checkable; command
                // driven attribute bindings name classes or raw attributes.
                if matches!(from, BindingSource::Interp { .. })
                    && !self.unknown_nodes.contains(&target)
                    && !is_known_html_attr(to)
                    && self.view.attribute(to).is_none()
                    && self.imports.attribute(to).is_none()
                {
                    let diag = Diagnostic::error(
                        DiagCode::UnknownAttribute,
                        format!("unknown attribute '{to}'"),
                        Some(self.at(from.loc())),
                        DiagSource::Link,
                    )
                    .with_confidence(Confidence::High)
                    .with_resource(ResourceKind::Attribute, to.clone());
                    self.linked.diagnostics.push(diag);
                    self.mark_unresolved(from);
                }
            }
            Instruction::HydrateElement { res, props, .. } => {
                let element = self
                    .imports
                    .element(res)
                    .or_else(|| self.view.element(res))
                    .cloned();
                for prop in props {
                    if let Instruction::PropertyBinding { to, from, .. } = prop {
                        match element.as_ref().and_then(|e| e.bindable_for_attr(to)) {
                            Some(bindable) => {
                                self.linked.resolutions.push(ResolutionEntry {
                                    node: target,
                                    span: from.loc(),
                                    resolution: TargetResolution::Resolved {
                                        kind: ResourceKind::Bindable,
                                        name: res.clone(),
                                        bindable: Some(bindable.property.clone()),
                                    },
                                });
                            }
                            None => self.unknown_bindable(target, res, to, from),
                        }
                    } else {
                        self.resolve_instruction(target, prop, enclosing_controller);
                    }
                }
            }
            Instruction::HydrateAttribute { props, .. } => {
                for prop in props {
                    if !matches!(prop, Instruction::PropertyBinding { .. }) {
                        self.resolve_instruction(target, prop, enclosing_controller);
                    }
                }
            }
            Instruction::HydrateTemplateController {
                res, res_span, props, def, branch, ..
            } => {
                if let Some(branch) = branch {
                    self.check_branch_placement(res, *res_span, branch.kind, enclosing_controller);
                }
                for prop in props {
                    if let Instruction::PropertyBinding { .. } = prop {
                        // Controller value props bind the controller itself.
                    } else {
                        self.resolve_instruction(target, prop, enclosing_controller);
                    }
                }
                self.resolve_rows(&def.rows, Some(res.as_str()));
            }
            _ => {}
        }
    }

    /// Property bindings on plain elements target DOM properties; unknown
    /// names are reported as unknown bindables (the author used a binding
    /// command, so confidence is high). Bindings under an unknown element
    /// are skipped; the element diagnostic is the root cause.
    fn resolve_property_target(&mut self, target: NodeId, to: &str, from: &BindingSource) {
        if self.unknown_nodes.contains(&target) {
            self.mark_unresolved(from);
            return;
        }
        if let Some(element) = self.import_nodes.get(&target).cloned() {
            match element.bindable_for_attr(to) {
                Some(bindable) => {
                    self.linked.resolutions.push(ResolutionEntry {
                        node: target,
                        span: from.loc(),
                        resolution: TargetResolution::Resolved {
                            kind: ResourceKind::Bindable,
                            name: element.name.clone(),
                            bindable: Some(bindable.property.clone()),
                        },
                    });
                }
                None => self.unknown_bindable(target, &element.name, to, from),
            }
            return;
        }
        if is_known_html_attr(to) || is_known_html_attr(kebab_case(to).as_str()) {
            return;
        }
        self.unknown_bindable(target, "", to, from);
    }

    fn unknown_bindable(&mut self, target: NodeId, res: &str, to: &str, from: &BindingSource) {
        let message = if res.is_empty() {
            format!("unknown bindable '{to}'")
        } else {
            format!("unknown bindable '{to}' on '{res}'")
        };
        let diag = Diagnostic::error(
            DiagCode::UnknownBindable,
            message,
            Some(self.at(from.loc())),
            DiagSource::Link,
        )
        .with_confidence(Confidence::High)
        .with_resource(ResourceKind::Bindable, to);
        self.linked.diagnostics.push(diag);
        self.linked.resolutions.push(ResolutionEntry {
            node: target,
            span: from.loc(),
            resolution: TargetResolution::Unknown {
                kind: ResourceKind::Bindable,
                name: CompactString::from(to),
                confidence: Confidence::High,
            },
        });
        self.mark_unresolved(from);
    }

    fn mark_unresolved(&mut self, from: &BindingSource) {
        for id in from.expr_ids() {
            self.linked.unresolved_exprs.insert(id);
        }
    }

    fn check_branch_placement(
        &mut self,
        res: &str,
        res_span: TextSpan,
        kind: BranchKind,
        enclosing: Option<&str>,
    ) {
        let required = match kind {
            BranchKind::Then | BranchKind::Catch | BranchKind::Pending => Some("promise"),
            BranchKind::Case => Some("switch"),
            // `else` and `default-case` placement is sibling-sensitive;
            // default-case nests in switch, else follows if.
            BranchKind::Default => None,
        };
        if let Some(required) = required {
            if enclosing != Some(required) {
                self.linked.diagnostics.push(Diagnostic::error(
                    DiagCode::InvalidCommandUsage,
                    format!("'{res}' is only valid inside a '{required}' controller"),
                    Some(self.at(res_span)),
                    DiagSource::Link,
                ));
            }
        }
    }

    // ---- pass 4: converters and behaviors referenced by expressions ----

    fn resolve_expressions(&mut self, module: &IrModule) {
        for entry in module.expr_table.iter() {
            for (name, span) in entry.ast.converter_names() {
                if self.view.converter(&name).is_none() && !self.imports.converter(&name) {
                    let diag = Diagnostic::error(
                        DiagCode::UnknownConverter,
                        format!("unknown value converter '{name}'"),
                        Some(self.at(span)),
                        DiagSource::Link,
                    )
                    .with_confidence(Confidence::High)
                    .with_resource(ResourceKind::ValueConverter, name.clone());
                    self.linked.diagnostics.push(diag);
                }
            }
            for (name, span) in entry.ast.behavior_names() {
                if self.view.behavior(&name).is_none() && !self.imports.behavior(&name) {
                    let diag = Diagnostic::error(
                        DiagCode::UnknownBehavior,
                        format!("unknown binding behavior '{name}'"),
                        Some(self.at(span)),
                        DiagSource::Link,
                    )
                    .with_confidence(Confidence::High)
                    .with_resource(ResourceKind::BindingBehavior, name.clone());
                    self.linked.diagnostics.push(diag);
                }
            }
        }
    }
}
