//! The compilation facade.
//!
//! One [`compile`] call runs the full pipeline — lower, resolve, bind, plan,
//! emit, provenance — and collects every stage's diagnostics into the
//! engine. The compilation is pure and synchronous; only
//! [`Compilation::apply_type_check`] touches an external collaborator.
//!
//! Type-checker output is projected back through provenance: spans map to
//! authored template slices, synthesized alias names are replaced with the
//! view-model display name, diagnostics for expressions whose instruction
//! target did not resolve are cascade-suppressed, and locally raised type
//! mismatches are withdrawn when the checker stayed silent on their span
//! (post-check reconciliation).

use aurea_canon::{emit_overlay, plan_overlay, OverlayEmit, OverlayPlan, VmInfo};
use aurea_carton::{normalize_uri, uri::overlay_uri_for, SourceSpan, TextSpan};
use aurea_croquis::{
    bind_template, lower_template, resolve_template, LinkedModule, LocalImports, ScopeTemplate,
};
use aurea_musea::{default_catalog, Catalog, CollectionScopeId};
use aurea_relief::{
    DiagCode, DiagSource, Diagnostic, IdAllocator, IrModule, Severity,
};
use compact_str::CompactString;

use crate::engine::{DiagnosticsEngine, RoutedDiagnostics};
use crate::external::{
    Completion, OverlayDoc, QuickInfo, TsDiag, TsEdit, TsLocation, TypeChecker, VmReflection,
};
use crate::provenance::ProvenanceIndex;

/// Per-compilation configuration. The catalog is immutable and shared.
pub struct CompileOptions<'a> {
    pub catalog: &'a Catalog,
    pub collection_scope: Option<CollectionScopeId>,
    pub imports: LocalImports,
}

impl Default for CompileOptions<'_> {
    fn default() -> Self {
        Self {
            catalog: default_catalog(),
            collection_scope: None,
            imports: LocalImports::default(),
        }
    }
}

/// One compiled template: every pipeline artifact plus the diagnostics
/// engine, still accepting type-check appends until aggregation.
pub struct Compilation {
    pub uri: CompactString,
    pub overlay_uri: CompactString,
    pub source: String,
    pub module: IrModule,
    pub linked: LinkedModule,
    pub scope: ScopeTemplate,
    pub plan: OverlayPlan,
    pub overlay: OverlayEmit,
    pub provenance: ProvenanceIndex,
    pub engine: DiagnosticsEngine,
    vm_display_name: String,
    vm_prefix: String,
}

/// Run the pipeline over one template document.
pub fn compile(
    source: &str,
    uri: &str,
    vm: &dyn VmReflection,
    options: &CompileOptions<'_>,
) -> Compilation {
    let uri = normalize_uri(uri);
    let overlay_uri = overlay_uri_for(&uri);
    tracing::debug!(%uri, "compiling template");

    let view = options.catalog.materialize(options.collection_scope);
    let mut ids = IdAllocator::new();
    let mut engine = DiagnosticsEngine::new();

    let lowered = lower_template(source, &uri, &view, &mut ids);
    engine.extend(DiagSource::Lower, lowered.diagnostics.clone());

    let linked = resolve_template(&lowered, &view, &options.imports, &uri);
    engine.extend(DiagSource::Link, linked.diagnostics.clone());

    let bound = bind_template(&lowered.module, &view, &mut ids, &uri);
    engine.extend(DiagSource::Bind, bound.diagnostics.clone());

    let vm_info = VmInfo {
        type_expr: vm.root_vm_type_expr(),
        display_name: vm.display_name(),
        synthetic_prefix: vm.synthetic_prefix(),
    };
    let plan = plan_overlay(&lowered.module, &bound.scope, &vm_info);
    let overlay = emit_overlay(source, &lowered.module, &bound.scope, &plan, &uri);
    let mut provenance = ProvenanceIndex::from_mapping(&uri, &overlay_uri, &overlay.mapping);
    add_symbol_edges(&mut provenance, &bound.scope, &overlay, &uri, &overlay_uri);

    Compilation {
        uri,
        overlay_uri,
        source: source.to_string(),
        module: lowered.module,
        linked,
        scope: bound.scope,
        plan,
        overlay,
        provenance,
        engine,
        vm_display_name: vm_info.display_name,
        vm_prefix: vm_info.synthetic_prefix,
    }
}

impl Compilation {
    fn overlay_doc(&self) -> OverlayDoc<'_> {
        OverlayDoc {
            uri: &self.overlay_uri,
            text: &self.overlay.text,
        }
    }

    /// Run the external checker over the overlay and fold its diagnostics
    /// into the engine (regime 3: always errors).
    pub fn apply_type_check(&mut self, checker: &dyn TypeChecker) {
        let ts_diags = checker.diagnostics(&self.overlay_doc());
        tracing::debug!(count = ts_diags.len(), "type-check diagnostics received");

        let mut projected_spans: Vec<TextSpan> = Vec::new();
        let mut accepted: Vec<Diagnostic> = Vec::new();

        for ts in ts_diags {
            let span = TextSpan::new(ts.start, ts.start.saturating_add(ts.length));
            let message =
                substitute_aliases(&ts.message, &self.vm_prefix, &self.vm_display_name);
            let mut diag = Diagnostic::with_severity(
                DiagCode::External(ts.code.clone()),
                Severity::Error,
                message,
                None,
                DiagSource::Typecheck,
            );
            for related in &ts.related {
                let location = self.project_location(&related.uri, related.span);
                diag = diag.with_related(
                    location,
                    substitute_aliases(&related.message, &self.vm_prefix, &self.vm_display_name),
                );
            }

            match self.provenance.project_generated_span(&self.overlay_uri, span) {
                Some((edge, html_span)) => {
                    let unresolved = edge
                        .expr_id
                        .is_some_and(|id| self.linked.unresolved_exprs.contains(&id));
                    diag.location = Some(SourceSpan::in_file(html_span, self.uri.clone()));
                    if unresolved {
                        // The root cause is the unresolved target reported by
                        // resolve; the type error would only echo it.
                        self.engine.suppress(diag, "cascade-suppression");
                        continue;
                    }
                    projected_spans.push(html_span);
                    accepted.push(diag);
                }
                None => {
                    // Safety fallback: keep overlay coordinates.
                    diag.location =
                        Some(SourceSpan::in_file(span, self.overlay_uri.clone()));
                    accepted.push(diag);
                }
            }
        }

        self.engine.extend(DiagSource::Typecheck, accepted);

        // Post-check reconciliation: a local type-mismatch claim the checker
        // did not corroborate is withdrawn.
        self.engine.withdraw_where(|diag| {
            diag.code == DiagCode::ExprTypeMismatch
                && diag
                    .location
                    .as_ref()
                    .map(|l| !projected_spans.contains(&l.span))
                    .unwrap_or(true)
        });
    }

    /// Aggregate and route every queued diagnostic. Freezes the engine.
    pub fn finish_diagnostics(&mut self) -> RoutedDiagnostics {
        self.engine.aggregate(&self.uri, &self.source)
    }

    /// A location in overlay coordinates projected back to the template when
    /// possible.
    fn project_location(&self, uri: &str, span: TextSpan) -> SourceSpan {
        if uri == self.overlay_uri {
            if let Some((_, mapped)) = self.provenance.project_generated_span(uri, span) {
                return SourceSpan::in_file(mapped, self.uri.clone());
            }
        }
        SourceSpan::in_file(span, uri)
    }

    /// Map a template offset into the overlay for checker queries.
    fn overlay_offset(&self, template_offset: u32) -> Option<u32> {
        self.provenance
            .source_offset_to_generated(&self.uri, template_offset)
    }

    /// Hover information at a template offset.
    pub fn quick_info_at(
        &self,
        checker: &dyn TypeChecker,
        template_offset: u32,
    ) -> Option<QuickInfo> {
        let offset = self.overlay_offset(template_offset)?;
        let info = checker.quick_info(&self.overlay_doc(), offset)?;
        let span = self
            .provenance
            .project_generated_span(&self.overlay_uri, info.span)
            .map(|(_, mapped)| mapped)
            .unwrap_or_else(|| TextSpan::empty(template_offset));
        Some(QuickInfo {
            text: substitute_aliases(&info.text, &self.vm_prefix, &self.vm_display_name),
            span,
        })
    }

    /// Go-to-definition from a template offset.
    pub fn definition_at(
        &self,
        checker: &dyn TypeChecker,
        template_offset: u32,
    ) -> Vec<TsLocation> {
        let Some(offset) = self.overlay_offset(template_offset) else {
            return Vec::new();
        };
        self.project_locations(checker.definition(&self.overlay_doc(), offset))
    }

    /// Find-references from a template offset.
    pub fn references_at(
        &self,
        checker: &dyn TypeChecker,
        template_offset: u32,
    ) -> Vec<TsLocation> {
        let Some(offset) = self.overlay_offset(template_offset) else {
            return Vec::new();
        };
        self.project_locations(checker.references(&self.overlay_doc(), offset))
    }

    /// Completions at a template offset (labels pass through unchanged).
    pub fn completions_at(
        &self,
        checker: &dyn TypeChecker,
        template_offset: u32,
    ) -> Vec<Completion> {
        let Some(offset) = self.overlay_offset(template_offset) else {
            return Vec::new();
        };
        checker.completions(&self.overlay_doc(), offset)
    }

    /// Rename at a template offset; returned edits are in template (or
    /// foreign-file) coordinates.
    pub fn rename_at(
        &self,
        checker: &dyn TypeChecker,
        template_offset: u32,
        new_name: &str,
    ) -> Vec<TsEdit> {
        let Some(offset) = self.overlay_offset(template_offset) else {
            return Vec::new();
        };
        let edits = checker.rename_edits(&self.overlay_doc(), offset, new_name);
        let mut projected = Vec::new();
        for edit in edits {
            if edit.uri == self.overlay_uri {
                if let Some((_, mapped)) = self
                    .provenance
                    .project_generated_span(&edit.uri, edit.span)
                {
                    let mapped_edit = TsEdit {
                        uri: self.uri.clone(),
                        span: mapped,
                        new_text: edit.new_text,
                    };
                    if !projected.contains(&mapped_edit) {
                        projected.push(mapped_edit);
                    }
                }
                // Synthetic overlay positions with no authored counterpart
                // are dropped; the user never sees the overlay.
            } else if !projected.contains(&edit) {
                projected.push(edit);
            }
        }
        projected
    }

    fn project_locations(&self, locations: Vec<TsLocation>) -> Vec<TsLocation> {
        let mut projected = Vec::new();
        for location in locations {
            if location.uri == self.overlay_uri {
                if let Some((_, mapped)) = self
                    .provenance
                    .project_generated_span(&location.uri, location.span)
                {
                    let mapped_location = TsLocation {
                        uri: self.uri.clone(),
                        span: mapped,
                    };
                    if !projected.contains(&mapped_location) {
                        projected.push(mapped_location);
                    }
                }
            } else if !projected.contains(&location) {
                projected.push(location);
            }
        }
        projected
    }
}

/// Anchor frame-local symbol declarations (repeat locals, lets, promise
/// aliases) to their field in the emitted frame type, so rename and
/// find-references resolve at the declaration site too.
fn add_symbol_edges(
    provenance: &mut ProvenanceIndex,
    scope: &ScopeTemplate,
    overlay: &OverlayEmit,
    template_uri: &str,
    overlay_uri: &str,
) {
    for frame in &scope.frames {
        for symbol in &frame.symbols {
            let Some(html_span) = symbol.span() else {
                continue;
            };
            let name = symbol.name();
            let Some(overlay_span) = find_field_position(overlay, frame.id, name) else {
                continue;
            };
            provenance.add_edge(crate::provenance::Edge {
                from_uri: CompactString::from(template_uri),
                from_span: html_span,
                to_uri: CompactString::from(overlay_uri),
                to_span: overlay_span,
                expr_id: None,
                member_path: Some(name.to_string()),
            });
        }
    }
}

/// Find `name` as a field (`name:`) inside the frame's emitted type
/// declarations, respecting identifier boundaries.
fn find_field_position(
    overlay: &OverlayEmit,
    frame: aurea_relief::FrameId,
    name: &str,
) -> Option<TextSpan> {
    for (decl_frame, decl_span) in &overlay.decl_spans {
        if *decl_frame != frame {
            continue;
        }
        let decl_text = decl_span.slice(&overlay.text);
        let mut search_from = 0usize;
        while let Some(found) = decl_text[search_from..].find(name) {
            let at = search_from + found;
            let before_ok = at == 0
                || !decl_text.as_bytes()[at - 1].is_ascii_alphanumeric()
                    && decl_text.as_bytes()[at - 1] != b'_'
                    && decl_text.as_bytes()[at - 1] != b'$';
            let after = decl_text[at + name.len()..].trim_start();
            if before_ok && after.starts_with(':') {
                let start = decl_span.start + at as u32;
                return Some(TextSpan::new(start, start + name.len() as u32));
            }
            search_from = at + name.len().max(1);
        }
    }
    None
}

/// Replace synthesized alias identifiers (`__AU_TTC_VM`, `__AU_TTC_F1`, ...)
/// with the view-model display name.
pub fn substitute_aliases(message: &str, prefix: &str, display_name: &str) -> String {
    if prefix.is_empty() || !message.contains(prefix) {
        return message.to_string();
    }
    let mut out = String::with_capacity(message.len());
    let mut rest = message;
    while let Some(pos) = rest.find(prefix) {
        out.push_str(&rest[..pos]);
        let after = &rest[pos..];
        let ident_len = after
            .char_indices()
            .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '$'))
            .map(|(i, _)| i)
            .unwrap_or(after.len());
        out.push_str(display_name);
        rest = &after[ident_len..];
    }
    out.push_str(rest);
    out
}

/// Convenience: compile against the default catalog.
pub fn compile_with_defaults(source: &str, uri: &str, vm: &dyn VmReflection) -> Compilation {
    compile(source, uri, vm, &CompileOptions::default())
}
