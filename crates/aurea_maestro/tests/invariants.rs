//! Universal pipeline invariants, checked over representative templates.

mod common;

use aurea_maestro::{compile_with_defaults, Compilation, StaticVmReflection};
use aurea_relief::Surface;
use common::FakeChecker;

const URI: &str = "/app/view.html";

const RICH_TEMPLATE: &str = "<template promise.bind=\"load()\">\n  <ul repeat.for=\"[k, v] of pairs\">\n    <li if.bind=\"v\">${k} = ${v | fmt:2}</li>\n  </ul>\n  <span then.from-view=\"data\">${data}</span>\n  <span catch.from-view=\"err\">${err.message}</span>\n  <let tally.bind=\"pairs.length\"></let>\n  <p>${tally}</p>\n</template>";

fn compile_rich() -> Compilation {
    compile_with_defaults(RICH_TEMPLATE, URI, &StaticVmReflection::new("V"))
}

/// Invariant 1 — identifiers are pairwise distinct and dense.
#[test]
fn identifier_uniqueness() {
    let comp = compile_rich();
    let mut expr_ids: Vec<u32> = comp
        .module
        .expr_table
        .iter()
        .map(|e| e.id.as_u32())
        .collect();
    let before = expr_ids.len();
    expr_ids.dedup();
    assert_eq!(expr_ids.len(), before);
    let mut frame_ids: Vec<u32> = comp.scope.frames.iter().map(|f| f.id.as_u32()).collect();
    frame_ids.sort();
    frame_ids.dedup();
    assert_eq!(frame_ids.len(), comp.scope.frames.len());
}

/// Invariant 2 — every diagnostic and mapping span is well-formed.
#[test]
fn span_well_formedness() {
    let mut comp = compile_rich();
    let source_len = comp.source.len() as u32;
    let overlay_len = comp.overlay.text.len() as u32;
    for entry in &comp.overlay.mapping {
        assert!(entry.html_span.start <= entry.html_span.end);
        assert!(entry.html_span.end <= source_len);
        assert!(entry.overlay_span.start <= entry.overlay_span.end);
        assert!(entry.overlay_span.end <= overlay_len);
        for segment in &entry.segments {
            assert!(segment.html_span.start <= segment.html_span.end);
            assert!(segment.html_span.end <= source_len);
            assert!(segment.overlay_span.end <= overlay_len);
        }
    }
    let routed = comp.finish_diagnostics();
    for diag in routed.surface(Surface::Lsp) {
        if let Some(location) = &diag.location {
            assert!(location.span.start <= location.span.end);
            assert!(location.span.end <= source_len);
        }
    }
}

/// Invariant 3 — every expression referenced by an instruction has a frame.
#[test]
fn expression_to_frame_totality() {
    let comp = compile_rich();
    for entry in comp.module.expr_table.iter() {
        assert!(
            comp.scope.frame_of(entry.id).is_some(),
            "expression '{}' has no frame",
            entry.code
        );
    }
}

/// Invariants 4 & 5 — the frames form a forest and only overlay controllers
/// allocate.
#[test]
fn frame_forest_and_scope_rule() {
    let comp = compile_rich();
    // promise + repeat + then + catch = 4 overlay frames + root. The `if`
    // controller reuses and must not allocate.
    assert_eq!(comp.scope.frames.len(), 5);
    for frame in &comp.scope.frames {
        match frame.parent {
            None => assert_eq!(frame.id, comp.scope.root),
            Some(parent) => {
                assert!(parent.index() < comp.scope.frames.len());
                assert!(parent != frame.id);
            }
        }
    }
}

/// Invariant 6 — the overlay mapping round-trips through provenance.
#[test]
fn mapping_roundtrip() {
    let comp = compile_rich();
    for entry in &comp.overlay.mapping {
        if entry.overlay_span.is_empty() {
            continue;
        }
        let mid = entry.overlay_span.start + entry.overlay_span.len() / 2;
        let edge = comp
            .provenance
            .lookup_generated(&comp.overlay_uri, mid)
            .expect("overlay offset must resolve");
        // The edge's template side covers the authored expression.
        assert!(edge.from_span.start >= entry.html_span.start || edge.expr_id.is_none());
        let back = comp
            .provenance
            .generated_offset_to_source(&comp.overlay_uri, mid)
            .expect("must map back");
        assert!(back <= comp.source.len() as u32);

        let forward = comp
            .provenance
            .source_offset_to_generated(&comp.uri, entry.html_span.start)
            .expect("template offset must resolve");
        assert!(forward <= comp.overlay.text.len() as u32);
    }
}

/// Invariant 7 — segments select exactly the authored member slice.
#[test]
fn segment_correctness() {
    let src = "<template>${person.name}</template>";
    let comp = compile_with_defaults(src, URI, &StaticVmReflection::new("V"));
    let segment = comp.overlay.mapping[0]
        .segments
        .iter()
        .find(|s| s.path == "person.name")
        .expect("expected person.name segment");
    assert_eq!(segment.html_span.slice(src), "person.name");
}

/// Invariant 9 — aggregation dedupe is idempotent.
#[test]
fn dedupe_idempotence() {
    let src = r#"<template><p>${x | nope}</p><p>${y | nope}</p></template>"#;
    let mut comp = compile_with_defaults(src, URI, &StaticVmReflection::new("V"));
    let routed = comp.finish_diagnostics();
    let converters: Vec<_> = routed
        .surface(Surface::Lsp)
        .iter()
        .filter(|d| d.code.as_str() == "aurelia/unknown-converter")
        .collect();
    // Two distinct spans survive; same-span duplicates would have collapsed.
    assert_eq!(converters.len(), 2);
    let spans: Vec<_> = converters
        .iter()
        .map(|d| d.location.as_ref().unwrap().span)
        .collect();
    assert_ne!(spans[0], spans[1]);
}

/// Invariant 10 — identical input yields byte-identical artifacts.
#[test]
fn deterministic_output() {
    let compile_once = || {
        let mut comp = compile_rich();
        comp.apply_type_check(&FakeChecker::default());
        let routed = comp.finish_diagnostics();
        (
            comp.overlay.text.clone(),
            comp.overlay.mapping.clone(),
            serde_json::to_string(&routed).expect("routed diagnostics serialize"),
        )
    };
    let (text_a, mapping_a, routed_a) = compile_once();
    let (text_b, mapping_b, routed_b) = compile_once();
    assert_eq!(text_a, text_b);
    assert_eq!(mapping_a, mapping_b);
    assert_eq!(routed_a, routed_b);
}

/// The facade is pure: compiling does not depend on prior compilations.
#[test]
fn compilations_do_not_share_state() {
    let a = compile_with_defaults("<template>${a}</template>", URI, &StaticVmReflection::new("V"));
    let b = compile_with_defaults("<template>${b}</template>", URI, &StaticVmReflection::new("V"));
    // Ids restart per compilation.
    assert_eq!(a.module.expr_table.iter().next().unwrap().id.as_u32(), 0);
    assert_eq!(b.module.expr_table.iter().next().unwrap().id.as_u32(), 0);
}
