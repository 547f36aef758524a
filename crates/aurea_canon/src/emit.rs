//! Overlay emission.
//!
//! The emitted module declares the helper prelude, the VM alias, every frame
//! type from the plan, and one lambda per expression occurrence. Lambda
//! bodies are spliced from the authored template text: scope references gain
//! an `o.` prefix, `$this` becomes `o`, converter/behavior applications are
//! rewritten through the pass-through `__AU_TTC_pipe` helper, and everything
//! else (including whitespace) is copied verbatim. The splice table doubles
//! as the source of exact segment spans for the mapping.

use aurea_carton::TextSpan;
use aurea_croquis::ScopeTemplate;
use aurea_musea::dom_event_type;
use aurea_relief::{
    Expr, ExprId, ExprTableEntry, ExpressionKind, Instruction, InstructionRow, IrModule,
};
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::mapping::{aggregate_group_segments, SegmentMap, TemplateMappingEntry};
use crate::plan::OverlayPlan;

/// The emitted overlay.
#[derive(Debug, Clone, Serialize)]
pub struct OverlayEmit {
    pub text: String,
    pub mapping: Vec<TemplateMappingEntry>,
    /// Overlay span of every emitted frame type declaration, used to anchor
    /// frame-local symbol names (repeat locals, lets, promise aliases) for
    /// rename and find-references.
    pub decl_spans: Vec<(aurea_relief::FrameId, TextSpan)>,
}

/// Emit the overlay text and its template mapping.
pub fn emit_overlay(
    source: &str,
    module: &IrModule,
    scope: &ScopeTemplate,
    plan: &OverlayPlan,
    uri: &str,
) -> OverlayEmit {
    tracing::debug!(uri, "emitting overlay");
    let events = collect_listener_events(module);

    let mut text = String::new();
    let mut mapping = Vec::new();

    text.push_str(&format!("// Aurea type-check overlay for {uri}\n"));
    text.push_str(&format!(
        "type {elem}<T> = T extends ReadonlyArray<infer E> ? E : T extends Iterable<infer E> ? E : any;\n",
        elem = plan.elem_of_alias
    ));
    text.push_str(&format!(
        "declare function {pipe}<T>(value: T, ...args: any[]): T;\n",
        pipe = plan.pipe_helper
    ));
    text.push_str(&format!(
        "type {alias} = {expr};\n",
        alias = plan.vm_alias,
        expr = plan.vm_type_expr
    ));

    let mut decl_spans = Vec::new();
    for frame_plan in &plan.frames {
        for decl in &frame_plan.decls {
            let start = text.len() as u32;
            text.push_str(&format!("type {} = {};\n", decl.name, decl.expr));
            decl_spans.push((frame_plan.frame, TextSpan::new(start, text.len() as u32)));
        }
        for entry in module.expr_table.iter() {
            if scope.frame_of(entry.id) != Some(frame_plan.frame) {
                continue;
            }
            let param_type = plan
                .lambda_param_type(frame_plan.frame, entry.id)
                .unwrap_or(frame_plan.type_name.as_str());
            let mut entry_mapping =
                emit_lambda(source, &mut text, plan, entry, param_type, &events);
            entry_mapping.frame = Some(frame_plan.frame);
            mapping.push(entry_mapping);
        }
    }
    text.push_str("export {};\n");

    aggregate_group_segments(&mut mapping, &module.expr_table);
    tracing::debug!(lambdas = mapping.len(), bytes = text.len(), "overlay emitted");
    OverlayEmit {
        text,
        mapping,
        decl_spans,
    }
}

/// Event type per listener expression, `Event` as the fallback.
fn collect_listener_events(module: &IrModule) -> FxHashMap<ExprId, &'static str> {
    let mut events = FxHashMap::default();
    fn walk_rows(rows: &[InstructionRow], events: &mut FxHashMap<ExprId, &'static str>) {
        for row in rows {
            for instruction in &row.instructions {
                walk_instruction(instruction, events);
            }
        }
    }
    fn walk_instruction(instruction: &Instruction, events: &mut FxHashMap<ExprId, &'static str>) {
        match instruction {
            Instruction::ListenerBinding { to, from, .. } => {
                let ty = dom_event_type(to).unwrap_or("Event");
                for id in from.expr_ids() {
                    events.insert(id, ty);
                }
            }
            Instruction::HydrateTemplateController { props, def, .. } => {
                for prop in props {
                    walk_instruction(prop, events);
                }
                walk_rows(&def.rows, events);
            }
            Instruction::HydrateElement { props, .. }
            | Instruction::HydrateAttribute { props, .. } => {
                for prop in props {
                    walk_instruction(prop, events);
                }
            }
            _ => {}
        }
    }
    for template in &module.templates {
        walk_rows(&template.rows, &mut events);
    }
    events
}

/// One text splice: replace `[at, end)` of the template with `text`
/// (`at == end` is a pure insertion).
struct Edit {
    at: u32,
    end: u32,
    text: String,
}

/// A verbatim-copied region, for exact html → overlay position mapping.
struct Chunk {
    html_start: u32,
    overlay_start: u32,
    len: u32,
}

fn map_pos(chunks: &[Chunk], html_pos: u32) -> Option<u32> {
    chunks
        .iter()
        .find(|c| c.html_start <= html_pos && html_pos <= c.html_start + c.len)
        .map(|c| c.overlay_start + (html_pos - c.html_start))
}

fn map_span(chunks: &[Chunk], span: TextSpan) -> Option<TextSpan> {
    let start = map_pos(chunks, span.start)?;
    let end = map_pos(chunks, span.end)?;
    (start <= end).then_some(TextSpan::new(start, end))
}

fn emit_lambda(
    source: &str,
    text: &mut String,
    plan: &OverlayPlan,
    entry: &ExprTableEntry,
    param_type: &str,
    events: &FxHashMap<ExprId, &'static str>,
) -> TemplateMappingEntry {
    let prefix_len = plan.vm_alias.len() - "VM".len();
    let prefix = &plan.vm_alias[..prefix_len];

    // Iterator entries check the iterable; everything else checks the whole
    // authored slice so interior whitespace is preserved verbatim.
    let body_span = match entry.kind {
        ExpressionKind::Iterator => entry.ast.span(),
        _ => entry.span,
    };

    text.push_str(&format!("const {prefix}E{} = (o: {param_type}", entry.id.as_u32()));
    if entry.kind == ExpressionKind::Listener {
        let event_type = events.get(&entry.id).copied().unwrap_or("Event");
        text.push_str(&format!(", $event: {event_type}"));
    }
    text.push_str(") => (");

    let body_start = text.len() as u32;
    let mut chunks = Vec::new();

    if entry.ast.is_bad() {
        text.push_str("undefined /*bad*/");
    } else {
        let mut edits = Vec::new();
        collect_edits(&entry.ast, entry.kind, &plan.pipe_helper, &mut edits);
        edits.sort_by_key(|e| (e.at, e.end));
        splice(source, text, body_span, &edits, &mut chunks);
    }
    let body_end = text.len() as u32;
    text.push_str(");\n");

    // Exact member segments from the splice table.
    let mut segments = Vec::new();
    if !entry.ast.is_bad() {
        let mut raw = Vec::new();
        collect_segments(&entry.ast, &mut raw);
        for (path, html_span) in raw {
            if let Some(overlay_span) = map_span(&chunks, html_span) {
                segments.push(SegmentMap {
                    path,
                    html_span,
                    overlay_span,
                });
            }
        }
    }

    TemplateMappingEntry {
        expr_id: entry.id,
        html_span: body_span,
        overlay_span: TextSpan::new(body_start, body_end),
        frame: None,
        segments,
        interp_group: entry.interp_group,
    }
}

/// Copy `body_span` of `source` into `out`, applying `edits` and recording
/// verbatim chunks.
fn splice(
    source: &str,
    out: &mut String,
    body_span: TextSpan,
    edits: &[Edit],
    chunks: &mut Vec<Chunk>,
) {
    let mut cursor = body_span.start;
    let mut copy = |from: u32, to: u32, out: &mut String, chunks: &mut Vec<Chunk>| {
        if to > from {
            chunks.push(Chunk {
                html_start: from,
                overlay_start: out.len() as u32,
                len: to - from,
            });
            out.push_str(&source[from as usize..to as usize]);
        }
    };
    for edit in edits {
        if edit.at < cursor || edit.end > body_span.end {
            continue;
        }
        copy(cursor, edit.at, out, chunks);
        out.push_str(&edit.text);
        cursor = edit.end;
    }
    copy(cursor, body_span.end, out, chunks);
}

/// Gather the splices that rewrite scope references through `o`.
fn collect_edits(expr: &Expr, kind: ExpressionKind, pipe: &str, edits: &mut Vec<Edit>) {
    match expr {
        Expr::AccessScope {
            name,
            ancestor,
            span,
            ..
        } => {
            if kind == ExpressionKind::Listener && name == "$event" && *ancestor == 0 {
                return;
            }
            edits.push(Edit {
                at: span.start,
                end: span.start,
                text: "o.".to_string(),
            });
        }
        Expr::AccessThis { ancestor, span } => {
            if *ancestor == 0 {
                edits.push(Edit {
                    at: span.start,
                    end: span.end,
                    text: "o".to_string(),
                });
            } else {
                edits.push(Edit {
                    at: span.start,
                    end: span.start,
                    text: "o.".to_string(),
                });
            }
        }
        Expr::AccessMember { object, .. } => collect_edits(object, kind, pipe, edits),
        Expr::AccessKeyed { object, key, .. } => {
            collect_edits(object, kind, pipe, edits);
            collect_edits(key, kind, pipe, edits);
        }
        Expr::Call { callee, args, .. } => {
            collect_edits(callee, kind, pipe, edits);
            for arg in args {
                collect_edits(arg, kind, pipe, edits);
            }
        }
        Expr::Literal { .. } | Expr::Bad { .. } => {}
        Expr::ArrayLiteral { elements, .. } => {
            for element in elements {
                collect_edits(element, kind, pipe, edits);
            }
        }
        Expr::ObjectLiteral { entries, .. } => {
            for entry in entries {
                if entry.shorthand {
                    // `{ b }` must become `{ b: o.b }`.
                    edits.push(Edit {
                        at: entry.key_span.end,
                        end: entry.key_span.end,
                        text: format!(": o.{}", entry.key),
                    });
                } else {
                    collect_edits(&entry.value, kind, pipe, edits);
                }
            }
        }
        Expr::Unary { operand, .. } => collect_edits(operand, kind, pipe, edits),
        Expr::Binary { lhs, rhs, .. } => {
            collect_edits(lhs, kind, pipe, edits);
            collect_edits(rhs, kind, pipe, edits);
        }
        Expr::Conditional {
            condition,
            yes,
            no,
            ..
        } => {
            collect_edits(condition, kind, pipe, edits);
            collect_edits(yes, kind, pipe, edits);
            collect_edits(no, kind, pipe, edits);
        }
        Expr::Assign { target, value, .. } => {
            collect_edits(target, kind, pipe, edits);
            collect_edits(value, kind, pipe, edits);
        }
        Expr::ValueConverter {
            expr: inner,
            name_span,
            args,
            span,
            ..
        } | Expr::BindingBehavior {
            expr: inner,
            name_span,
            args,
            span,
            ..
        } => {
            // `items | take:5` → `__AU_TTC_pipe(o.items, 5)`: the converter
            // name vanishes, operands keep their authored positions.
            edits.push(Edit {
                at: span.start,
                end: span.start,
                text: format!("{pipe}("),
            });
            collect_edits(inner, kind, pipe, edits);
            let mut cut_from = inner.span().end;
            if args.is_empty() {
                edits.push(Edit {
                    at: cut_from,
                    end: name_span.end,
                    text: String::new(),
                });
            } else {
                for arg in args {
                    edits.push(Edit {
                        at: cut_from,
                        end: arg.span().start,
                        text: ", ".to_string(),
                    });
                    collect_edits(arg, kind, pipe, edits);
                    cut_from = arg.span().end;
                }
            }
            edits.push(Edit {
                at: span.end,
                end: span.end,
                text: ")".to_string(),
            });
        }
    }
}

/// Collect `(dotted path, html span)` for every qualified access chain.
fn collect_segments(expr: &Expr, out: &mut Vec<(String, TextSpan)>) {
    fn path_of(expr: &Expr, out: &mut Vec<(String, TextSpan)>) -> Option<String> {
        match expr {
            Expr::AccessScope {
                name,
                ancestor,
                span,
                ..
            } => {
                if name == "$event" {
                    return None;
                }
                let mut path = String::new();
                for _ in 0..*ancestor {
                    path.push_str("$parent.");
                }
                path.push_str(name);
                out.push((path.clone(), *span));
                Some(path)
            }
            Expr::AccessMember {
                object, name, span, ..
            } => {
                let base = path_of(object, out)?;
                let path = format!("{base}.{name}");
                out.push((path.clone(), *span));
                Some(path)
            }
            _ => {
                collect_segments(expr, out);
                None
            }
        }
    }

    match expr {
        Expr::AccessScope { .. } | Expr::AccessMember { .. } => {
            path_of(expr, out);
        }
        Expr::AccessKeyed { object, key, .. } => {
            collect_segments(object, out);
            collect_segments(key, out);
        }
        Expr::Call { callee, args, .. } => {
            collect_segments(callee, out);
            for arg in args {
                collect_segments(arg, out);
            }
        }
        Expr::ArrayLiteral { elements, .. } => {
            for element in elements {
                collect_segments(element, out);
            }
        }
        Expr::ObjectLiteral { entries, .. } => {
            for entry in entries {
                collect_segments(&entry.value, out);
            }
        }
        Expr::Unary { operand, .. } => collect_segments(operand, out),
        Expr::Binary { lhs, rhs, .. } => {
            collect_segments(lhs, out);
            collect_segments(rhs, out);
        }
        Expr::Conditional {
            condition,
            yes,
            no,
            ..
        } => {
            collect_segments(condition, out);
            collect_segments(yes, out);
            collect_segments(no, out);
        }
        Expr::Assign { target, value, .. } => {
            collect_segments(target, out);
            collect_segments(value, out);
        }
        Expr::ValueConverter { expr, args, .. } | Expr::BindingBehavior { expr, args, .. } => {
            collect_segments(expr, out);
            for arg in args {
                collect_segments(arg, out);
            }
        }
        Expr::AccessThis { .. } | Expr::Literal { .. } | Expr::Bad { .. } => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{plan_overlay, VmInfo};
    use aurea_croquis::{bind_template, lower_template};
    use aurea_musea::default_catalog;
    use aurea_relief::IdAllocator;

    fn emit(source: &str) -> (IrModule, OverlayEmit) {
        let view = default_catalog().materialize_root();
        let mut ids = IdAllocator::new();
        let lowered = lower_template(source, "file:///app/t.html", &view, &mut ids);
        let bound = bind_template(&lowered.module, &view, &mut ids, "file:///app/t.html");
        let plan = plan_overlay(&lowered.module, &bound.scope, &VmInfo::new("App"));
        let emitted = emit_overlay(
            source,
            &lowered.module,
            &bound.scope,
            &plan,
            "file:///app/t.html",
        );
        (lowered.module, emitted)
    }

    fn body_of<'t>(emit: &'t OverlayEmit, index: usize) -> &'t str {
        let entry = &emit.mapping[index];
        &emit.text[entry.overlay_span.start as usize..entry.overlay_span.end as usize]
    }

    #[test]
    fn simple_interpolation_lambda() {
        let src = "<template>${title}</template>";
        let (_, emitted) = emit(src);
        assert!(emitted
            .text
            .contains("const __AU_TTC_E0 = (o: __AU_TTC_F0) => (o.title);"));
        let entry = &emitted.mapping[0];
        assert_eq!(entry.html_span.slice(src), "title");
        assert_eq!(body_of(&emitted, 0), "o.title");
        // The `title` segment maps back to the authored slice exactly.
        let segment = &entry.segments[0];
        assert_eq!(segment.path, "title");
        assert_eq!(segment.html_span.slice(src), "title");
        assert_eq!(
            &emitted.text[segment.overlay_span.start as usize..segment.overlay_span.end as usize],
            "title"
        );
    }

    #[test]
    fn member_chain_keeps_segment_spans() {
        let src = "<template>${person.name}</template>";
        let (_, emitted) = emit(src);
        assert_eq!(body_of(&emitted, 0), "o.person.name");
        let segments = &emitted.mapping[0].segments;
        let full = segments.iter().find(|s| s.path == "person.name").unwrap();
        assert_eq!(full.html_span.slice(src), "person.name");
        let base = segments.iter().find(|s| s.path == "person").unwrap();
        assert_eq!(base.html_span.slice(src), "person");
    }

    #[test]
    fn whitespace_is_preserved_verbatim() {
        let src = "<template>${\n   title\n  }</template>";
        let (_, emitted) = emit(src);
        assert_eq!(body_of(&emitted, 0), "\n   o.title\n  ");
    }

    #[test]
    fn this_and_parent_rewrites() {
        let src = r#"<template><div with.bind="box">${$parent.count}${$this}</div></template>"#;
        let (_, emitted) = emit(src);
        // $parent chains go through the frame's $parent member.
        assert!(emitted.text.contains("=> (o.$parent.count)"));
        assert!(emitted.text.contains("=> (o)"));
    }

    #[test]
    fn converter_rewrites_through_pipe_helper() {
        let src = "<template>${items | take:5}</template>";
        let (_, emitted) = emit(src);
        assert_eq!(body_of(&emitted, 0), "__AU_TTC_pipe(o.items, 5)");
    }

    #[test]
    fn converter_without_args_and_behavior() {
        let src = "<template>${items | sort & signal:'tick'}</template>";
        let (_, emitted) = emit(src);
        assert_eq!(
            body_of(&emitted, 0),
            "__AU_TTC_pipe(__AU_TTC_pipe(o.items), 'tick')"
        );
    }

    #[test]
    fn listener_gets_typed_event_parameter() {
        let src = r#"<template><button click.trigger="save($event)">x</button></template>"#;
        let (_, emitted) = emit(src);
        assert!(emitted
            .text
            .contains("(o: __AU_TTC_F0, $event: MouseEvent) => (o.save($event))"));
    }

    #[test]
    fn unknown_event_falls_back_to_event() {
        let src = r#"<template><button frob.trigger="go()">x</button></template>"#;
        let (_, emitted) = emit(src);
        assert!(emitted.text.contains("$event: Event) => (o.go())"));
    }

    #[test]
    fn bad_expression_emits_sentinel_mapped_to_authored_text() {
        let src = "<template>${title..}</template>";
        let (_, emitted) = emit(src);
        assert_eq!(body_of(&emitted, 0), "undefined /*bad*/");
        assert_eq!(emitted.mapping[0].html_span.slice(src), "title..");
    }

    #[test]
    fn iterator_lambda_checks_the_iterable() {
        let src = r#"<template><li repeat.for="item of items">${item.name}</li></template>"#;
        let (module, emitted) = emit(src);
        let iter_id = module
            .expr_table
            .iter()
            .find(|e| e.kind == ExpressionKind::Iterator)
            .unwrap()
            .id;
        let entry = emitted
            .mapping
            .iter()
            .find(|m| m.expr_id == iter_id)
            .unwrap();
        assert_eq!(entry.html_span.slice(src), "items");
        let body = &emitted.text
            [entry.overlay_span.start as usize..entry.overlay_span.end as usize];
        assert_eq!(body, "o.items");
    }

    #[test]
    fn interpolation_group_keeps_leaf_segments_only() {
        let src = "<template>${person.name} ${person.age}</template>";
        let (_, emitted) = emit(src);
        let paths: Vec<_> = emitted
            .mapping
            .iter()
            .flat_map(|m| m.segments.iter().map(|s| s.path.clone()))
            .collect();
        assert!(paths.contains(&"person.name".to_string()));
        assert!(paths.contains(&"person.age".to_string()));
        assert!(!paths.contains(&"person".to_string()));
    }

    #[test]
    fn shorthand_object_literal_expands() {
        let src = "<template>${fmt({ a: 1, b })}</template>";
        let (_, emitted) = emit(src);
        assert_eq!(body_of(&emitted, 0), "o.fmt({ a: 1, b: o.b })");
    }

    #[test]
    fn overlay_is_deterministic() {
        let src = r#"<template><div repeat.for="x of xs">${x | fmt}</div></template>"#;
        let (_, a) = emit(src);
        let (_, b) = emit(src);
        assert_eq!(a.text, b.text);
        assert_eq!(
            serde_json::to_string(&a.mapping).unwrap(),
            serde_json::to_string(&b.mapping).unwrap()
        );
    }

    #[test]
    fn mapping_roundtrip_covers_expressions() {
        let src = r#"<template><p>${a}</p><p>${b.c}</p></template>"#;
        let (_, emitted) = emit(src);
        assert_eq!(emitted.mapping.len(), 2);
        for entry in &emitted.mapping {
            assert!(entry.html_span.start < entry.html_span.end);
            assert!(entry.overlay_span.start < entry.overlay_span.end);
            let body = &emitted.text
                [entry.overlay_span.start as usize..entry.overlay_span.end as usize];
            assert!(body.starts_with("o."));
        }
    }
}
