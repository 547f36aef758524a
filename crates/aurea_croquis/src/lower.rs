//! Lowering: markup tree + binding expressions → IR.
//!
//! The walk interprets every attribute through the catalog's pattern set,
//! registers every authored expression in the expression table (one entry per
//! `${…}` slice, with slice spans and an interpolation group id), and nests
//! template-controller content into hydrate instructions. Lowering never
//! fails: unparseable expressions become `Bad` sentinels plus an AU1203
//! diagnostic with `recovery` set.

use aurea_carton::{SourceSpan, TextSpan};
use aurea_relief::{
    BindingMode, BindingSource, BranchKind, BranchLink, DiagCode, DiagSource, Diagnostic, Expr,
    ExprId, ExprTable, ExprTableEntry, ExpressionKind, IdAllocator, Instruction, InstructionRow,
    Interpolation, IrModule, LetBinding, RawAttr, TemplateIr, TemplateNode,
};
use aurea_armature::{parse_expression, parse_for_of, parse_markup, split_interpolation};
use aurea_armature::{MarkupElement, MarkupNode};
use aurea_musea::{
    camel_case, match_attr, AttrMatch, CommandKind, ControllerTrigger, PatternKind, ResourceView,
};
use compact_str::CompactString;

/// An authored binding-command occurrence, checked by resolve.
#[derive(Debug, Clone)]
pub struct CommandRef {
    pub name: CompactString,
    pub span: TextSpan,
}

/// A command-usage problem detected during lowering, reported by resolve.
#[derive(Debug, Clone)]
pub struct UsageIssue {
    pub code: DiagCode,
    pub message: String,
    pub span: TextSpan,
}

/// The result of lowering one template document.
#[derive(Debug)]
pub struct LowerOutput {
    pub module: IrModule,
    pub diagnostics: Vec<Diagnostic>,
    pub command_refs: Vec<CommandRef>,
    pub usage_issues: Vec<UsageIssue>,
}

/// Lower a template source into IR.
pub fn lower_template(
    source: &str,
    uri: &str,
    view: &ResourceView,
    ids: &mut IdAllocator,
) -> LowerOutput {
    tracing::debug!(uri, len = source.len(), "lowering template");
    let doc = parse_markup(source);

    let mut lowerer = Lowerer {
        source,
        uri,
        view,
        ids,
        expr_table: ExprTable::new(),
        diagnostics: Vec::new(),
        command_refs: Vec::new(),
        usage_issues: Vec::new(),
        next_interp_group: 0,
    };

    for error in &doc.errors {
        lowerer.diagnostics.push(
            Diagnostic::error(
                DiagCode::MarkupParseError,
                error.code.message(),
                Some(lowerer.at(error.span)),
                DiagSource::Lower,
            )
            .with_recovery(),
        );
    }

    let mut rows = Vec::new();
    let dom = lowerer.lower_roots(&doc.roots, &mut rows, source.len() as u32);

    let template = TemplateIr {
        dom,
        rows,
        name: None,
    };
    let module = IrModule {
        templates: vec![template],
        expr_table: lowerer.expr_table,
        file: CompactString::from(uri),
    };
    tracing::debug!(
        exprs = module.expr_table.len(),
        diags = lowerer.diagnostics.len(),
        "lowering complete"
    );
    LowerOutput {
        module,
        diagnostics: lowerer.diagnostics,
        command_refs: lowerer.command_refs,
        usage_issues: lowerer.usage_issues,
    }
}

/// A controller occurrence collected from an element's attributes.
struct ControllerSpec {
    res: CompactString,
    res_span: TextSpan,
    props: Vec<Instruction>,
    branch: Option<BranchLink>,
}

struct Lowerer<'a> {
    source: &'a str,
    uri: &'a str,
    view: &'a ResourceView,
    ids: &'a mut IdAllocator,
    expr_table: ExprTable,
    diagnostics: Vec<Diagnostic>,
    command_refs: Vec<CommandRef>,
    usage_issues: Vec<UsageIssue>,
    next_interp_group: u32,
}

impl<'a> Lowerer<'a> {
    fn at(&self, span: TextSpan) -> SourceSpan {
        SourceSpan::in_file(span, self.uri)
    }

    /// Root handling: a single `<template>` root is the template DOM
    /// (its controller attributes wrap the whole content); any other shape
    /// is wrapped in a synthetic template node.
    fn lower_roots(
        &mut self,
        roots: &[MarkupNode],
        rows: &mut Vec<InstructionRow>,
        source_len: u32,
    ) -> TemplateNode {
        match roots {
            [MarkupNode::Element(el)] if el.tag == "template" => self.lower_element(el, rows),
            _ => {
                let id = self.ids.next_node_id();
                let mut children = Vec::new();
                for root in roots {
                    children.push(self.lower_node(root, rows));
                }
                TemplateNode::Template {
                    id,
                    attrs: Vec::new(),
                    children,
                    loc: TextSpan::new(0, source_len),
                }
            }
        }
    }

    fn lower_node(&mut self, node: &MarkupNode, rows: &mut Vec<InstructionRow>) -> TemplateNode {
        match node {
            MarkupNode::Text { text, span } => self.lower_text(text, *span, rows),
            MarkupNode::Comment { text, span } => TemplateNode::Comment {
                id: self.ids.next_node_id(),
                text: text.clone(),
                loc: *span,
            },
            MarkupNode::Element(el) => match el.tag.as_str() {
                "let" => self.lower_let(el, rows),
                "import" | "require" => self.lower_import(el),
                _ => self.lower_element(el, rows),
            },
        }
    }

    fn lower_text(
        &mut self,
        text: &str,
        span: TextSpan,
        rows: &mut Vec<InstructionRow>,
    ) -> TemplateNode {
        let id = self.ids.next_node_id();
        let interpolation = split_interpolation(text).map(|slices| {
            let group = self.next_group();
            let mut parts = Vec::with_capacity(slices.parts.len());
            for part in &slices.parts {
                parts.push(CompactString::from(part.slice(text)));
            }
            let mut exprs = Vec::with_capacity(slices.exprs.len());
            for slice in &slices.exprs {
                let doc_span = slice.expr_span.shifted(span.start);
                exprs.push(self.register_expr(doc_span, ExpressionKind::Property, Some(group)));
            }
            (parts, exprs)
        });

        let interpolation = interpolation.map(|(parts, exprs)| {
            rows.push(InstructionRow {
                target: id,
                instructions: vec![Instruction::TextBinding {
                    from: BindingSource::Interp {
                        exprs: exprs.clone(),
                        parts: parts.clone(),
                        loc: span,
                    },
                }],
            });
            Interpolation { parts, exprs }
        });

        TemplateNode::Text {
            id,
            text: CompactString::from(text),
            interpolation,
            loc: span,
        }
    }

    fn lower_import(&mut self, el: &MarkupElement) -> TemplateNode {
        // Imports contribute resources via the resolve-phase overlay; the
        // element itself produces no instructions.
        TemplateNode::Element {
            id: self.ids.next_node_id(),
            tag: el.tag.clone(),
            ns: el.ns,
            attrs: el.attrs.clone(),
            children: Vec::new(),
            loc: el.span,
            tag_span: el.tag_span,
        }
    }

    fn lower_let(&mut self, el: &MarkupElement, rows: &mut Vec<InstructionRow>) -> TemplateNode {
        let id = self.ids.next_node_id();
        let mut bindings = Vec::new();
        let mut to_binding_context = false;

        for attr in &el.attrs {
            if attr.name == "to-binding-context" {
                to_binding_context = true;
                continue;
            }
            let (target, target_span, has_command) = match match_attr(&attr.name) {
                Some(AttrMatch {
                    kind: PatternKind::TargetCommand,
                    target,
                    target_range,
                    ..
                }) => (CompactString::from(target), target_range, true),
                _ => (attr.name.clone(), TextSpan::new(0, attr.name.len() as u32), false),
            };
            let to_span = target_span.shifted(attr.name_span.start);
            let from = match (&attr.value, attr.value_span) {
                (Some(value), Some(value_span)) if has_command => {
                    let expr =
                        self.register_expr(value_span, ExpressionKind::Property, None);
                    BindingSource::Expr {
                        id: expr,
                        code: value.clone(),
                        loc: value_span,
                    }
                }
                (Some(value), Some(value_span)) => {
                    match self.register_interp(value, value_span) {
                        Some(source) => source,
                        // A plain value is a string constant; model it as a
                        // one-part interpolation with no expressions.
                        None => BindingSource::Interp {
                            exprs: Vec::new(),
                            parts: vec![value.clone()],
                            loc: value_span,
                        },
                    }
                }
                _ => BindingSource::Interp {
                    exprs: Vec::new(),
                    parts: vec![CompactString::default()],
                    loc: attr.name_span,
                },
            };
            bindings.push(LetBinding {
                to: camel_case(&target),
                to_span,
                from,
            });
        }

        rows.push(InstructionRow {
            target: id,
            instructions: vec![Instruction::HydrateLetElement {
                instructions: bindings,
                to_binding_context,
            }],
        });

        TemplateNode::Element {
            id,
            tag: el.tag.clone(),
            ns: el.ns,
            attrs: el.attrs.clone(),
            children: Vec::new(),
            loc: el.span,
            tag_span: el.tag_span,
        }
    }

    fn lower_element(
        &mut self,
        el: &MarkupElement,
        rows: &mut Vec<InstructionRow>,
    ) -> TemplateNode {
        let id = self.ids.next_node_id();
        let mut controllers: Vec<ControllerSpec> = Vec::new();
        let mut own: Vec<Instruction> = Vec::new();
        let is_custom = self.view.element(&el.tag).is_some();

        for attr in &el.attrs {
            self.lower_attr(el, attr, is_custom, &mut controllers, &mut own);
        }

        // Children lower into the innermost content.
        let mut inner_rows: Vec<InstructionRow> = Vec::new();
        if !own.is_empty() || is_custom {
            let instructions = if is_custom {
                vec![Instruction::HydrateElement {
                    res: el.tag.clone(),
                    res_span: el.tag_span,
                    props: own,
                }]
            } else {
                own
            };
            if !instructions.is_empty() {
                inner_rows.push(InstructionRow {
                    target: id,
                    instructions,
                });
            }
        }

        let mut children = Vec::new();
        for child in &el.children {
            children.push(self.lower_node(child, &mut inner_rows));
        }

        // Wrap controller content innermost-out; document attr order is
        // outermost-first.
        if controllers.is_empty() {
            rows.append(&mut inner_rows);
        } else {
            let mut def_rows = inner_rows;
            for spec in controllers.into_iter().rev() {
                let instruction = Instruction::HydrateTemplateController {
                    res: spec.res,
                    res_span: spec.res_span,
                    props: spec.props,
                    def: TemplateIr {
                        dom: TemplateNode::Template {
                            id: self.ids.next_node_id(),
                            attrs: Vec::new(),
                            children: Vec::new(),
                            loc: el.span,
                        },
                        rows: def_rows,
                        name: None,
                    },
                    branch: spec.branch,
                };
                def_rows = vec![InstructionRow {
                    target: id,
                    instructions: vec![instruction],
                }];
            }
            rows.append(&mut def_rows);
        }

        if el.tag == "template" {
            TemplateNode::Template {
                id,
                attrs: el.attrs.clone(),
                children,
                loc: el.span,
            }
        } else {
            TemplateNode::Element {
                id,
                tag: el.tag.clone(),
                ns: el.ns,
                attrs: el.attrs.clone(),
                children,
                loc: el.span,
                tag_span: el.tag_span,
            }
        }
    }

    fn lower_attr(
        &mut self,
        el: &MarkupElement,
        attr: &RawAttr,
        is_custom: bool,
        controllers: &mut Vec<ControllerSpec>,
        own: &mut Vec<Instruction>,
    ) {
        let Some(matched) = match_attr(&attr.name) else {
            self.lower_plain_attr(el, attr, is_custom, controllers, own);
            return;
        };

        let target_span = matched.target_range.shifted(attr.name_span.start);
        match matched.kind {
            PatternKind::FixedBranch => {
                controllers.push(self.branch_alias_controller(&matched, attr, target_span));
            }
            PatternKind::Ref => {
                let from = self.value_expr_source(attr);
                own.push(Instruction::RefBinding {
                    to: CompactString::from(matched.target),
                    to_span: target_span,
                    from,
                });
            }
            PatternKind::EventModifier | PatternKind::FixedCommand | PatternKind::TargetCommand => {
                if matched.kind == PatternKind::TargetCommand {
                    if let (Some(command), Some(range)) = (matched.command, matched.command_range) {
                        self.command_refs.push(CommandRef {
                            name: CompactString::from(command),
                            span: range.shifted(attr.name_span.start),
                        });
                    }
                }
                if self.view.controller(matched.target).is_some() {
                    if let Some(spec) = self.controller_attr(&matched, attr, target_span) {
                        controllers.push(spec);
                    }
                    return;
                }
                self.command_attr(&matched, attr, target_span, own);
            }
        }
    }

    /// Bare `then="alias"` / `catch="alias"`.
    fn branch_alias_controller(
        &mut self,
        matched: &AttrMatch<'_>,
        attr: &RawAttr,
        target_span: TextSpan,
    ) -> ControllerSpec {
        let kind = if matched.target == "then" {
            BranchKind::Then
        } else {
            BranchKind::Catch
        };
        let (local, span) = self.branch_alias(attr);
        ControllerSpec {
            res: CompactString::from(matched.target),
            res_span: target_span,
            props: Vec::new(),
            branch: Some(BranchLink {
                kind,
                expr: None,
                local,
                span,
            }),
        }
    }

    /// The alias text of a promise-branch attribute, whitespace-trimmed.
    fn branch_alias(&self, attr: &RawAttr) -> (Option<CompactString>, TextSpan) {
        match (&attr.value, attr.value_span) {
            (Some(_), Some(value_span)) => {
                let trimmed = value_span.trim_whitespace(self.source);
                let text = trimmed.slice(self.source);
                if text.is_empty() {
                    (None, attr.name_span)
                } else {
                    (Some(CompactString::from(text)), trimmed)
                }
            }
            _ => (None, attr.name_span),
        }
    }

    /// An attribute whose target is a registered template controller.
    fn controller_attr(
        &mut self,
        matched: &AttrMatch<'_>,
        attr: &RawAttr,
        target_span: TextSpan,
    ) -> Option<ControllerSpec> {
        let config = self.view.controller(matched.target)?.clone();
        let command_kind = matched
            .command
            .and_then(|c| self.view.command(c))
            .map(|c| c.kind);

        let mut props = Vec::new();
        let mut branch = None;

        match config.trigger {
            ControllerTrigger::Iterator => {
                if command_kind == Some(CommandKind::Iterator) {
                    if let Some(for_of) = self.register_for_of(attr) {
                        let header_span = attr.target_span();
                        props.push(Instruction::IteratorBinding {
                            for_of,
                            header_span,
                        });
                    }
                } else {
                    self.usage_issues.push(UsageIssue {
                        code: DiagCode::RepeatMissingIterator,
                        message: format!(
                            "'{}' requires the .for command with a 'local of items' header",
                            config.name
                        ),
                        span: attr.name_span,
                    });
                }
            }
            ControllerTrigger::Value => {
                if command_kind == Some(CommandKind::Iterator) {
                    self.usage_issues.push(UsageIssue {
                        code: DiagCode::InvalidCommandUsage,
                        message: format!("'{}' does not take an iterator header", config.name),
                        span: attr.name_span,
                    });
                } else if attr.value.is_some() {
                    let from = self.value_expr_source(attr);
                    props.push(Instruction::PropertyBinding {
                        to: CompactString::from("value"),
                        to_span: target_span,
                        from,
                        mode: BindingMode::ToView,
                    });
                }
            }
            ControllerTrigger::Branch => {
                let branch_kind = config
                    .branch_of
                    .as_ref()
                    .map(|b| b.kind)
                    .unwrap_or(BranchKind::Default);
                match branch_kind {
                    BranchKind::Then | BranchKind::Catch => {
                        let (local, span) = self.branch_alias(attr);
                        branch = Some(BranchLink {
                            kind: branch_kind,
                            expr: None,
                            local,
                            span,
                        });
                    }
                    BranchKind::Case => {
                        let expr = attr
                            .value_span
                            .map(|span| self.register_expr(span, ExpressionKind::Property, None));
                        branch = Some(BranchLink {
                            kind: branch_kind,
                            expr,
                            local: None,
                            span: attr.target_span(),
                        });
                    }
                    BranchKind::Default | BranchKind::Pending => {
                        branch = Some(BranchLink {
                            kind: branch_kind,
                            expr: None,
                            local: None,
                            span: attr.name_span,
                        });
                    }
                }
            }
            ControllerTrigger::Marker => {
                branch = config.branch_of.as_ref().map(|b| BranchLink {
                    kind: b.kind,
                    expr: None,
                    local: None,
                    span: attr.name_span,
                });
            }
        }

        Some(ControllerSpec {
            res: CompactString::from(config.name),
            res_span: target_span,
            props,
            branch,
        })
    }

    /// A non-controller pattern attribute: property, listener, style, ...
    fn command_attr(
        &mut self,
        matched: &AttrMatch<'_>,
        attr: &RawAttr,
        target_span: TextSpan,
        own: &mut Vec<Instruction>,
    ) {
        let command = matched.command.and_then(|c| self.view.command(c)).copied();
        let target = CompactString::from(matched.target);

        match command.map(|c| c.kind) {
            Some(CommandKind::Listener) => {
                let from = self.listener_expr_source(attr);
                own.push(Instruction::ListenerBinding {
                    to: target,
                    to_span: target_span,
                    from,
                    modifiers: matched
                        .modifiers
                        .iter()
                        .map(|m| CompactString::from(*m))
                        .collect(),
                    capture: command.is_some_and(|c| c.capture),
                });
            }
            Some(CommandKind::Iterator) => {
                // `.for` unambiguously names a controller; an unknown target
                // here is an unknown controller, not an unknown bindable.
                self.usage_issues.push(UsageIssue {
                    code: DiagCode::UnknownController,
                    message: format!("'{}' is not a template controller", matched.target),
                    span: target_span,
                });
            }
            Some(CommandKind::Ref) => {
                let from = self.value_expr_source(attr);
                own.push(Instruction::RefBinding {
                    to: target,
                    to_span: target_span,
                    from,
                });
            }
            Some(CommandKind::Attribute) | Some(CommandKind::Translation) => {
                let from = self.value_expr_source(attr);
                own.push(Instruction::AttributeBinding {
                    to: target,
                    to_span: target_span,
                    from,
                });
            }
            Some(CommandKind::Style) => {
                let from = self.value_expr_source(attr);
                own.push(Instruction::StylePropertyBinding {
                    to: target,
                    to_span: target_span,
                    from,
                });
            }
            Some(CommandKind::Property) => {
                let from = self.value_expr_source(attr);
                if self.view.attribute(matched.target).is_some() {
                    // Custom attribute: the binding targets its primary
                    // bindable through a hydrate wrapper.
                    own.push(Instruction::HydrateAttribute {
                        res: target.clone(),
                        res_span: target_span,
                        props: vec![Instruction::PropertyBinding {
                            to: CompactString::from("value"),
                            to_span: target_span,
                            from,
                            mode: command.map(|c| c.mode).unwrap_or(BindingMode::Default),
                        }],
                    });
                } else {
                    own.push(Instruction::PropertyBinding {
                        to: camel_case(&target),
                        to_span: target_span,
                        from,
                        mode: command.map(|c| c.mode).unwrap_or(BindingMode::Default),
                    });
                }
            }
            None => {
                // Unknown command: lower as a property binding so the
                // expression still participates; resolve reports the command.
                let from = self.value_expr_source(attr);
                own.push(Instruction::PropertyBinding {
                    to: camel_case(&target),
                    to_span: target_span,
                    from,
                    mode: BindingMode::Default,
                });
            }
        }
    }

    /// A plain attribute: bare controller name, interpolation, or static.
    fn lower_plain_attr(
        &mut self,
        _el: &MarkupElement,
        attr: &RawAttr,
        is_custom: bool,
        controllers: &mut Vec<ControllerSpec>,
        own: &mut Vec<Instruction>,
    ) {
        // Bare controller attribute (`if="cond"`, `else`, `pending`).
        if self.view.controller(&attr.name).is_some() {
            let matched = AttrMatch {
                kind: PatternKind::TargetCommand,
                target: attr.name.as_str(),
                target_range: TextSpan::new(0, attr.name.len() as u32),
                command: None,
                command_range: None,
                modifiers: Vec::new(),
            };
            if let Some(spec) = self.controller_attr(&matched, attr, attr.name_span) {
                controllers.push(spec);
            }
            return;
        }

        // Interpolated value → attribute interpolation binding.
        if let (Some(value), Some(value_span)) = (&attr.value, attr.value_span) {
            if let Some(source) = self.register_interp(value, value_span) {
                own.push(Instruction::AttributeBinding {
                    to: attr.name.clone(),
                    to_span: attr.name_span,
                    from: source,
                });
                return;
            }
        }

        // Static attribute: on custom elements it may set a bindable.
        if is_custom {
            let value = attr.value.clone().unwrap_or_default();
            own.push(Instruction::SetAttribute {
                to: attr.name.clone(),
                to_span: attr.name_span,
                value,
            });
        }
        // Plain static attributes on plain elements stay in markup.
    }

    // ---- expression registration ----

    fn next_group(&mut self) -> u32 {
        let group = self.next_interp_group;
        self.next_interp_group += 1;
        group
    }

    /// Parse and register one expression occurrence at `span` (document
    /// coordinates). Parse failures become `Bad` sentinels plus AU1203.
    fn register_expr(
        &mut self,
        span: TextSpan,
        kind: ExpressionKind,
        interp_group: Option<u32>,
    ) -> ExprId {
        let code = span.slice(self.source);
        let id = self.ids.next_expr_id();
        let ast = match parse_expression(code) {
            Ok(mut expr) => {
                expr.shift_spans(span.start);
                expr
            }
            Err(error) => {
                let error_span = error.span.shifted(span.start);
                self.diagnostics.push(
                    Diagnostic::error(
                        DiagCode::ExprParseError,
                        format!("invalid expression: {}", error.message),
                        Some(self.at(error_span)),
                        DiagSource::Lower,
                    )
                    .with_recovery(),
                );
                Expr::Bad {
                    raw: CompactString::from(code),
                    message: error.message,
                    span,
                }
            }
        };
        self.expr_table.push(ExprTableEntry {
            id,
            ast,
            for_of: None,
            kind,
            span,
            code: CompactString::from(code),
            interp_group,
        });
        id
    }

    /// Parse and register a `repeat.for` header.
    fn register_for_of(&mut self, attr: &RawAttr) -> Option<ExprId> {
        let span = attr.value_span?;
        let code = span.slice(self.source);
        match parse_for_of(code) {
            Ok(mut header) => {
                header.shift_spans(span.start);
                let id = self.ids.next_expr_id();
                let ast = header.iterable.clone();
                self.expr_table.push(ExprTableEntry {
                    id,
                    ast,
                    for_of: Some(header),
                    kind: ExpressionKind::Iterator,
                    span,
                    code: CompactString::from(code),
                    interp_group: None,
                });
                Some(id)
            }
            Err(error) => {
                let error_span = error.span.shifted(span.start);
                self.diagnostics.push(
                    Diagnostic::error(
                        DiagCode::InvalidBindingPattern,
                        format!("invalid repeat header: {}", error.message),
                        Some(self.at(error_span)),
                        DiagSource::Lower,
                    )
                    .with_recovery(),
                );
                None
            }
        }
    }

    /// Register an attribute value's interpolation, if it has one.
    fn register_interp(&mut self, value: &str, value_span: TextSpan) -> Option<BindingSource> {
        let slices = split_interpolation(value)?;
        let group = self.next_group();
        let mut parts = Vec::with_capacity(slices.parts.len());
        for part in &slices.parts {
            parts.push(CompactString::from(part.slice(value)));
        }
        let mut exprs = Vec::with_capacity(slices.exprs.len());
        for slice in &slices.exprs {
            let doc_span = slice.expr_span.shifted(value_span.start);
            exprs.push(self.register_expr(doc_span, ExpressionKind::Property, Some(group)));
        }
        Some(BindingSource::Interp {
            exprs,
            parts,
            loc: value_span,
        })
    }

    /// A single-expression binding source from an attribute value.
    fn value_expr_source(&mut self, attr: &RawAttr) -> BindingSource {
        self.expr_source(attr, ExpressionKind::Property)
    }

    fn listener_expr_source(&mut self, attr: &RawAttr) -> BindingSource {
        self.expr_source(attr, ExpressionKind::Listener)
    }

    fn expr_source(&mut self, attr: &RawAttr, kind: ExpressionKind) -> BindingSource {
        let (code, span) = match (&attr.value, attr.value_span) {
            (Some(value), Some(span)) => (value.clone(), span),
            // A command with no value: bind the empty expression; the parse
            // error surfaces as AU1203 after the attribute name.
            _ => (
                CompactString::default(),
                TextSpan::empty(attr.name_span.end),
            ),
        };
        let id = self.register_expr(span, kind, None);
        BindingSource::Expr {
            id,
            code,
            loc: span,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aurea_musea::default_catalog;

    fn lower(source: &str) -> LowerOutput {
        let view = default_catalog().materialize_root();
        let mut ids = IdAllocator::new();
        lower_template(source, "file:///app/test.html", &view, &mut ids)
    }

    /// Flatten rows, descending into hydrate defs and props.
    fn all_instructions(rows: &[InstructionRow]) -> Vec<&Instruction> {
        fn walk<'i>(instruction: &'i Instruction, out: &mut Vec<&'i Instruction>) {
            out.push(instruction);
            match instruction {
                Instruction::HydrateTemplateController { props, def, .. } => {
                    for prop in props {
                        walk(prop, out);
                    }
                    for row in &def.rows {
                        for nested in &row.instructions {
                            walk(nested, out);
                        }
                    }
                }
                Instruction::HydrateElement { props, .. }
                | Instruction::HydrateAttribute { props, .. } => {
                    for prop in props {
                        walk(prop, out);
                    }
                }
                _ => {}
            }
        }
        let mut out = Vec::new();
        for row in rows {
            for instruction in &row.instructions {
                walk(instruction, &mut out);
            }
        }
        out
    }

    #[test]
    fn text_interpolation_registers_slice_spans() {
        let src = "<template>${title}</template>";
        let out = lower(src);
        assert!(out.diagnostics.is_empty());
        assert_eq!(out.module.expr_table.len(), 1);
        let entry = out.module.expr_table.iter().next().unwrap();
        assert_eq!(entry.span.slice(src), "title");
        assert_eq!(entry.code, "title");
        assert!(entry.interp_group.is_some());
        let rows = &out.module.templates[0].rows;
        assert!(matches!(
            all_instructions(rows)[0],
            Instruction::TextBinding { .. }
        ));
    }

    #[test]
    fn property_binding_from_command() {
        let src = r#"<template><input value.bind="name"></template>"#;
        let out = lower(src);
        let rows = &out.module.templates[0].rows;
        let Instruction::PropertyBinding { to, mode, from, .. } = all_instructions(rows)[0] else {
            panic!("expected property binding");
        };
        assert_eq!(*to, "value");
        assert_eq!(*mode, BindingMode::Default);
        let BindingSource::Expr { code, .. } = from else {
            panic!("expected expression source");
        };
        assert_eq!(code, "name");
    }

    #[test]
    fn repeat_packs_iterator_into_controller_props() {
        let src = r#"<template><div repeat.for="item of items">${item}</div></template>"#;
        let out = lower(src);
        assert!(out.diagnostics.is_empty());
        let rows = &out.module.templates[0].rows;
        assert_eq!(rows.len(), 1);
        let Instruction::HydrateTemplateController {
            res, props, def, ..
        } = &rows[0].instructions[0]
        else {
            panic!("expected controller");
        };
        assert_eq!(*res, "repeat");
        assert!(matches!(props[0], Instruction::IteratorBinding { .. }));
        // The body text binding lives in the controller def, not at top rows.
        let inner = all_instructions(&def.rows);
        assert!(inner
            .iter()
            .any(|i| matches!(i, Instruction::TextBinding { .. })));
    }

    #[test]
    fn nested_controllers_wrap_in_attr_order() {
        let src = r#"<template><li repeat.for="x of xs" if.bind="x">${x}</li></template>"#;
        let out = lower(src);
        let rows = &out.module.templates[0].rows;
        let Instruction::HydrateTemplateController { res, def, .. } = &rows[0].instructions[0]
        else {
            panic!("expected outer controller");
        };
        assert_eq!(*res, "repeat");
        let Instruction::HydrateTemplateController { res: inner_res, .. } =
            &def.rows[0].instructions[0]
        else {
            panic!("expected inner controller");
        };
        assert_eq!(*inner_res, "if");
    }

    #[test]
    fn bad_expression_is_preserved_with_au1203() {
        let src = r#"<template>${title..}</template>"#;
        let out = lower(src);
        assert_eq!(out.module.expr_table.len(), 1);
        let entry = out.module.expr_table.iter().next().unwrap();
        assert!(entry.ast.is_bad());
        let diag = &out.diagnostics[0];
        assert_eq!(diag.code, DiagCode::ExprParseError);
        assert_eq!(diag.data.aur_code.as_deref(), Some("AU1203"));
        assert!(diag.data.recovery);
    }

    #[test]
    fn bad_repeat_header_reports_au1201() {
        let src = r#"<template><div repeat.for="of items"></div></template>"#;
        let out = lower(src);
        assert!(out
            .diagnostics
            .iter()
            .any(|d| d.code == DiagCode::InvalidBindingPattern));
    }

    #[test]
    fn let_element_produces_let_bindings() {
        let src = r#"<template><let full-name.bind="first + last" greeting="hi ${name}"></let></template>"#;
        let out = lower(src);
        let rows = &out.module.templates[0].rows;
        let Instruction::HydrateLetElement {
            instructions,
            to_binding_context,
        } = all_instructions(rows)[0]
        else {
            panic!("expected let element");
        };
        assert!(!to_binding_context);
        assert_eq!(instructions.len(), 2);
        assert_eq!(instructions[0].to, "fullName");
        assert!(matches!(instructions[0].from, BindingSource::Expr { .. }));
        assert!(matches!(
            instructions[1].from,
            BindingSource::Interp { .. }
        ));
    }

    #[test]
    fn promise_branches_carry_branch_links() {
        let src = r#"<template promise.bind="p"><span then.from-view="data">${data}</span><span catch.from-view="err">${err}</span></template>"#;
        let out = lower(src);
        let rows = &out.module.templates[0].rows;
        // then/catch controllers live in rows for the span elements.
        let branches: Vec<_> = all_instructions(rows)
            .into_iter()
            .filter_map(|i| match i {
                Instruction::HydrateTemplateController { branch, .. } => branch.as_ref(),
                _ => None,
            })
            .collect();
        assert_eq!(branches.len(), 2);
        assert_eq!(branches[0].kind, BranchKind::Then);
        assert_eq!(branches[0].local.as_deref(), Some("data"));
        assert_eq!(branches[1].kind, BranchKind::Catch);
        assert_eq!(branches[1].local.as_deref(), Some("err"));
    }

    #[test]
    fn listener_binding_with_modifiers() {
        let src = r#"<template><button click.trigger:stop="save()">go</button></template>"#;
        let out = lower(src);
        let rows = &out.module.templates[0].rows;
        let Instruction::ListenerBinding {
            to, modifiers, from, ..
        } = all_instructions(rows)[0]
        else {
            panic!("expected listener");
        };
        assert_eq!(*to, "click");
        assert_eq!(modifiers.as_slice(), ["stop"]);
        let BindingSource::Expr { id, .. } = from else {
            panic!("expected expr source");
        };
        let entry = out.module.expr_table.get(*id).unwrap();
        assert_eq!(entry.kind, ExpressionKind::Listener);
    }

    #[test]
    fn attribute_interpolation_on_plain_attr() {
        let src = r#"<template><div class="item ${cls}"></div></template>"#;
        let out = lower(src);
        let rows = &out.module.templates[0].rows;
        let Instruction::AttributeBinding { to, from, .. } = all_instructions(rows)[0] else {
            panic!("expected attribute binding");
        };
        assert_eq!(*to, "class");
        let BindingSource::Interp { parts, exprs, .. } = from else {
            panic!("expected interpolation");
        };
        assert_eq!(parts.as_slice(), ["item ", ""]);
        assert_eq!(exprs.len(), 1);
    }

    #[test]
    fn unknown_command_still_lowers_expression() {
        let src = r#"<template><div value.bindd="x"></div></template>"#;
        let out = lower(src);
        assert_eq!(out.command_refs.len(), 1);
        assert_eq!(out.command_refs[0].name, "bindd");
        assert_eq!(out.module.expr_table.len(), 1);
    }

    #[test]
    fn switch_case_branches() {
        let src = r#"<template switch.bind="status"><span case="'on'">on</span><span default-case>off</span></template>"#;
        let out = lower(src);
        let rows = &out.module.templates[0].rows;
        let branches: Vec<_> = all_instructions(rows)
            .into_iter()
            .filter_map(|i| match i {
                Instruction::HydrateTemplateController { branch, .. } => branch.as_ref(),
                _ => None,
            })
            .collect();
        assert_eq!(branches.len(), 2);
        assert_eq!(branches[0].kind, BranchKind::Case);
        assert!(branches[0].expr.is_some());
        assert_eq!(branches[1].kind, BranchKind::Default);
    }

    #[test]
    fn markup_errors_surface_as_diagnostics() {
        let out = lower("<template><div></template>");
        assert!(out
            .diagnostics
            .iter()
            .any(|d| d.code == DiagCode::MarkupParseError));
    }

    #[test]
    fn determinism_same_input_same_output() {
        let src = r#"<template><div repeat.for="x of xs">${x}</div><p>${y | fmt}</p></template>"#;
        let a = lower(src);
        let b = lower(src);
        let json_a = serde_json::to_string(&a.module).unwrap();
        let json_b = serde_json::to_string(&b.module).unwrap();
        assert_eq!(json_a, json_b);
    }
}
