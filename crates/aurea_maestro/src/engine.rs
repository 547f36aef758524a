//! The diagnostics engine.
//!
//! Every producing phase appends into its own queue. Aggregation freezes the
//! engine and then, in order: trims diagnostic spans to their non-whitespace
//! core, dedupes by `(code, uri, start, end)`, sorts by
//! `(uri, start, end, code)`, applies the confidence → severity regime, and
//! routes into per-surface lists. Demoted and cascade-suppressed entries land
//! in `suppressed` with a reason so debugging can enumerate them.

use aurea_relief::{Confidence, DiagSource, Diagnostic, Severity, Surface};
use serde::Serialize;

/// A diagnostic kept off every surface, with the reason.
#[derive(Debug, Clone, Serialize)]
pub struct SuppressedDiagnostic {
    pub diagnostic: Diagnostic,
    pub suppression_reason: String,
}

/// The aggregation result.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RoutedDiagnostics {
    pub by_surface: Vec<(Surface, Vec<Diagnostic>)>,
    pub suppressed: Vec<SuppressedDiagnostic>,
}

impl RoutedDiagnostics {
    /// The diagnostics routed to one surface.
    pub fn surface(&self, surface: Surface) -> &[Diagnostic] {
        self.by_surface
            .iter()
            .find(|(s, _)| *s == surface)
            .map(|(_, diags)| diags.as_slice())
            .unwrap_or(&[])
    }
}

/// Append-only per-source queues, frozen by [`DiagnosticsEngine::aggregate`].
#[derive(Debug, Default)]
pub struct DiagnosticsEngine {
    queues: Vec<(DiagSource, Vec<Diagnostic>)>,
    suppressed: Vec<SuppressedDiagnostic>,
    frozen: bool,
}

impl DiagnosticsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append diagnostics from one producing phase.
    pub fn extend(&mut self, source: DiagSource, diagnostics: Vec<Diagnostic>) {
        debug_assert!(!self.frozen, "diagnostics engine is frozen");
        if diagnostics.is_empty() {
            return;
        }
        match self.queues.iter_mut().find(|(s, _)| *s == source) {
            Some((_, queue)) => queue.extend(diagnostics),
            None => self.queues.push((source, diagnostics)),
        }
    }

    pub fn push(&mut self, source: DiagSource, diagnostic: Diagnostic) {
        self.extend(source, vec![diagnostic]);
    }

    /// Record a diagnostic dropped before routing (cascade suppression).
    pub fn suppress(&mut self, diagnostic: Diagnostic, reason: impl Into<String>) {
        self.suppressed.push(SuppressedDiagnostic {
            diagnostic,
            suppression_reason: reason.into(),
        });
    }

    /// Withdraw queued diagnostics matching `predicate` (post-check
    /// reconciliation).
    pub fn withdraw_where(&mut self, predicate: impl Fn(&Diagnostic) -> bool) {
        for (_, queue) in &mut self.queues {
            queue.retain(|d| !predicate(d));
        }
    }

    /// All queued diagnostics, unaggregated, in append order.
    pub fn pending(&self) -> impl Iterator<Item = &Diagnostic> {
        self.queues.iter().flat_map(|(_, q)| q.iter())
    }

    /// Flatten, normalize, and route. Freezes the engine.
    pub fn aggregate(&mut self, template_uri: &str, template_text: &str) -> RoutedDiagnostics {
        self.frozen = true;

        let mut all: Vec<Diagnostic> = Vec::new();
        for (_, queue) in &self.queues {
            all.extend(queue.iter().cloned());
        }

        // Whitespace rule: a diagnostic span never covers the indentation
        // around the authored expression. Spans derive from per-expression
        // ranges, so this trim cannot shift any other diagnostic.
        for diag in &mut all {
            if let Some(location) = &mut diag.location {
                let in_template = location
                    .file
                    .as_deref()
                    .map(|f| f == template_uri)
                    .unwrap_or(true);
                if in_template {
                    location.span = location.span.trim_whitespace(template_text);
                }
            }
        }

        // Dedupe by (code, uri, start, end).
        let mut seen: Vec<(String, Option<String>, u32, u32)> = Vec::new();
        all.retain(|diag| {
            let key = dedupe_key(diag);
            if seen.contains(&key) {
                false
            } else {
                seen.push(key);
                true
            }
        });

        // Strict ordering by (uri, start, end, code).
        all.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));

        // Confidence-gated severity (regime 2).
        let mut routed: Vec<Diagnostic> = Vec::new();
        let mut suppressed = std::mem::take(&mut self.suppressed);
        for mut diag in all {
            if diag.code.is_confidence_gated() {
                match diag.confidence {
                    Some(Confidence::High) | None => diag.severity = Severity::Error,
                    Some(Confidence::Medium) => diag.severity = Severity::Warning,
                    Some(Confidence::Low) => {
                        diag.severity = Severity::Warning;
                        suppressed.push(SuppressedDiagnostic {
                            diagnostic: diag,
                            suppression_reason: "confidence-demotion".to_string(),
                        });
                        continue;
                    }
                }
            }
            routed.push(diag);
        }

        RoutedDiagnostics {
            by_surface: vec![(Surface::Lsp, routed)],
            suppressed,
        }
    }
}

fn dedupe_key(diag: &Diagnostic) -> (String, Option<String>, u32, u32) {
    let (uri, start, end) = match &diag.location {
        Some(location) => (
            location.file.as_ref().map(|f| f.to_string()),
            location.span.start,
            location.span.end,
        ),
        None => (None, 0, 0),
    };
    (diag.code.as_str().to_string(), uri, start, end)
}

fn sort_key(diag: &Diagnostic) -> (String, u32, u32, String) {
    let (uri, start, end) = match &diag.location {
        Some(location) => (
            location
                .file
                .as_ref()
                .map(|f| f.to_string())
                .unwrap_or_default(),
            location.span.start,
            location.span.end,
        ),
        None => (String::new(), 0, 0),
    };
    (uri, start, end, diag.code.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use aurea_carton::{SourceSpan, TextSpan};
    use aurea_relief::DiagCode;

    const URI: &str = "file:///t.html";

    fn diag(code: DiagCode, start: u32, end: u32) -> Diagnostic {
        Diagnostic::error(
            code,
            "m",
            Some(SourceSpan::in_file(TextSpan::new(start, end), URI)),
            DiagSource::Link,
        )
    }

    #[test]
    fn dedupe_is_idempotent() {
        let mut engine = DiagnosticsEngine::new();
        engine.extend(
            DiagSource::Lower,
            vec![
                diag(DiagCode::ExprParseError, 5, 9),
                diag(DiagCode::ExprParseError, 5, 9),
            ],
        );
        engine.push(DiagSource::Link, diag(DiagCode::ExprParseError, 5, 9));
        let routed = engine.aggregate(URI, "0123456789abcdef");
        assert_eq!(routed.surface(Surface::Lsp).len(), 1);
    }

    #[test]
    fn sorted_by_uri_start_end_code() {
        let mut engine = DiagnosticsEngine::new();
        engine.extend(
            DiagSource::Link,
            vec![
                diag(DiagCode::UnknownCommand, 20, 25),
                diag(DiagCode::ExprParseError, 3, 7),
                diag(DiagCode::InvalidCommandUsage, 3, 7),
            ],
        );
        let routed = engine.aggregate(URI, &" ".repeat(40));
        let spans: Vec<(u32, &str)> = routed
            .surface(Surface::Lsp)
            .iter()
            .map(|d| (d.location.as_ref().unwrap().span.start, d.code.as_str()))
            .collect();
        assert_eq!(
            spans,
            [
                (3, "aurelia/expr-parse-error"),
                (3, "aurelia/invalid-command-usage"),
                (20, "aurelia/unknown-command"),
            ]
        );
    }

    #[test]
    fn confidence_demotion_regimes() {
        let text = "x".repeat(64);
        let mut engine = DiagnosticsEngine::new();
        engine.extend(
            DiagSource::Link,
            vec![
                diag(DiagCode::UnknownElement, 0, 4).with_confidence(Confidence::High),
                diag(DiagCode::UnknownElement, 10, 14).with_confidence(Confidence::Medium),
                diag(DiagCode::UnknownElement, 20, 24).with_confidence(Confidence::Low),
            ],
        );
        let routed = engine.aggregate(URI, &text);
        let surfaced = routed.surface(Surface::Lsp);
        assert_eq!(surfaced.len(), 2);
        assert_eq!(surfaced[0].severity, Severity::Error);
        assert_eq!(surfaced[1].severity, Severity::Warning);
        assert_eq!(routed.suppressed.len(), 1);
        assert_eq!(
            routed.suppressed[0].suppression_reason,
            "confidence-demotion"
        );
    }

    #[test]
    fn grammar_deterministic_codes_stay_errors() {
        let text = "x".repeat(16);
        let mut engine = DiagnosticsEngine::new();
        engine.push(DiagSource::Lower, diag(DiagCode::ExprParseError, 0, 4));
        let routed = engine.aggregate(URI, &text);
        assert_eq!(routed.surface(Surface::Lsp)[0].severity, Severity::Error);
    }

    #[test]
    fn whitespace_is_trimmed_from_spans() {
        let text = "ab   name   cd";
        let mut engine = DiagnosticsEngine::new();
        engine.push(DiagSource::Link, diag(DiagCode::UnknownCommand, 2, 12));
        let routed = engine.aggregate(URI, text);
        let span = routed.surface(Surface::Lsp)[0]
            .location
            .as_ref()
            .unwrap()
            .span;
        assert_eq!(span, TextSpan::new(5, 9));
        assert_eq!(span.slice(text), "name");
    }

    #[test]
    fn withdraw_removes_matching_pending_diags() {
        let mut engine = DiagnosticsEngine::new();
        engine.push(DiagSource::Bind, diag(DiagCode::ExprTypeMismatch, 0, 4));
        engine.push(DiagSource::Bind, diag(DiagCode::DuplicateLocal, 6, 8));
        engine.withdraw_where(|d| d.code == DiagCode::ExprTypeMismatch);
        let routed = engine.aggregate(URI, "abcdefghij");
        assert_eq!(routed.surface(Surface::Lsp).len(), 1);
        assert_eq!(
            routed.surface(Surface::Lsp)[0].code,
            DiagCode::DuplicateLocal
        );
    }

    #[test]
    fn cascade_suppressions_surface_in_the_suppressed_list() {
        let mut engine = DiagnosticsEngine::new();
        engine.suppress(diag(DiagCode::ExprTypeMismatch, 0, 4), "cascade-suppression");
        let routed = engine.aggregate(URI, "abcdefgh");
        assert!(routed.surface(Surface::Lsp).is_empty());
        assert_eq!(routed.suppressed.len(), 1);
        assert_eq!(routed.suppressed[0].suppression_reason, "cascade-suppression");
    }
}
