//! Provenance: the dense bidirectional index between template, overlay, and
//! view-model coordinates.
//!
//! Construction is a single pass over the mapping emitted by the overlay
//! emitter. Lookups are keyed by `(uri, offset)`; at equal offsets the
//! innermost (shortest-span) edge wins. Edges covering a qualified member
//! slice carry the member path so rename and find-references can target the
//! right segment under the cursor.

use aurea_canon::{project_segment_span, TemplateMappingEntry};
use aurea_carton::TextSpan;
use aurea_relief::ExprId;
use compact_str::CompactString;
use serde::Serialize;

/// One authoring edge between a template slice and an overlay slice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub from_uri: CompactString,
    pub from_span: TextSpan,
    pub to_uri: CompactString,
    pub to_span: TextSpan,
    pub expr_id: Option<ExprId>,
    pub member_path: Option<String>,
}

/// Roll-up facts about a template's overlay.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateStats {
    pub overlay_uri: CompactString,
    pub overlay_edges: usize,
}

/// The bidirectional index.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProvenanceIndex {
    edges: Vec<Edge>,
    template_uri: CompactString,
    overlay_uri: CompactString,
}

impl ProvenanceIndex {
    /// Build the index from an overlay mapping. Duplicate edges collapse.
    pub fn from_mapping(
        template_uri: &str,
        overlay_uri: &str,
        mapping: &[TemplateMappingEntry],
    ) -> Self {
        let mut index = Self {
            edges: Vec::new(),
            template_uri: CompactString::from(template_uri),
            overlay_uri: CompactString::from(overlay_uri),
        };
        for entry in mapping {
            index.push_edge(Edge {
                from_uri: index.template_uri.clone(),
                from_span: entry.html_span,
                to_uri: index.overlay_uri.clone(),
                to_span: entry.overlay_span,
                expr_id: Some(entry.expr_id),
                member_path: None,
            });
            for segment in &entry.segments {
                index.push_edge(Edge {
                    from_uri: index.template_uri.clone(),
                    from_span: segment.html_span,
                    to_uri: index.overlay_uri.clone(),
                    to_span: segment.overlay_span,
                    expr_id: Some(entry.expr_id),
                    member_path: Some(segment.path.clone()),
                });
            }
        }
        index
    }

    fn push_edge(&mut self, edge: Edge) {
        if !self.edges.contains(&edge) {
            self.edges.push(edge);
        }
    }

    /// Add an edge after construction (frame-local symbol anchors).
    pub fn add_edge(&mut self, edge: Edge) {
        self.push_edge(edge);
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// The edge covering an overlay offset, innermost first. Ties prefer
    /// the edge whose template side is narrower too (member segments map
    /// text-to-text, whole-expression edges include the rewrite prefix).
    pub fn lookup_generated(&self, overlay_uri: &str, offset: u32) -> Option<&Edge> {
        self.edges
            .iter()
            .filter(|e| e.to_uri == overlay_uri && covers_inclusive(e.to_span, offset))
            .min_by_key(|e| (e.to_span.len(), e.from_span.len()))
    }

    /// The edge covering a template offset, innermost first.
    pub fn lookup_source(&self, template_uri: &str, offset: u32) -> Option<&Edge> {
        self.edges
            .iter()
            .filter(|e| e.from_uri == template_uri && covers_inclusive(e.from_span, offset))
            .min_by_key(|e| (e.from_span.len(), e.to_span.len()))
    }

    /// Project an overlay span back to the template, preferring the
    /// narrowest covering edge. Exact edges map exactly; partial slices use
    /// the proportional fallback.
    pub fn project_generated_span(
        &self,
        overlay_uri: &str,
        span: TextSpan,
    ) -> Option<(&Edge, TextSpan)> {
        let edge = self
            .edges
            .iter()
            .filter(|e| {
                e.to_uri == overlay_uri
                    && e.to_span.start <= span.start
                    && span.end <= e.to_span.end
            })
            .min_by_key(|e| e.to_span.len())?;
        let mapped = if span == edge.to_span {
            edge.from_span
        } else {
            project_segment_span(span, edge.to_span, edge.from_span)
        };
        Some((edge, mapped))
    }

    /// Project a template span into the overlay, preferring the narrowest
    /// covering edge.
    pub fn project_source_span(
        &self,
        template_uri: &str,
        span: TextSpan,
    ) -> Option<(&Edge, TextSpan)> {
        let edge = self
            .edges
            .iter()
            .filter(|e| {
                e.from_uri == template_uri
                    && e.from_span.start <= span.start
                    && span.end <= e.from_span.end
            })
            .min_by_key(|e| e.from_span.len())?;
        let mapped = if span == edge.from_span {
            edge.to_span
        } else {
            project_segment_span(span, edge.from_span, edge.to_span)
        };
        Some((edge, mapped))
    }

    /// Map a single template offset into the overlay.
    pub fn source_offset_to_generated(&self, template_uri: &str, offset: u32) -> Option<u32> {
        let edge = self.lookup_source(template_uri, offset)?;
        let relative = offset - edge.from_span.start;
        Some((edge.to_span.start + relative).min(edge.to_span.end))
    }

    /// Map a single overlay offset back to the template.
    pub fn generated_offset_to_source(&self, overlay_uri: &str, offset: u32) -> Option<u32> {
        let edge = self.lookup_generated(overlay_uri, offset)?;
        let relative = offset - edge.to_span.start;
        Some((edge.from_span.start + relative).min(edge.from_span.end))
    }

    pub fn template_stats(&self, template_uri: &str) -> Option<TemplateStats> {
        if self.template_uri != template_uri {
            return None;
        }
        Some(TemplateStats {
            overlay_uri: self.overlay_uri.clone(),
            overlay_edges: self.edges.len(),
        })
    }
}

/// Half-open coverage that also accepts the end position, so a caret sitting
/// just after the last character still resolves.
fn covers_inclusive(span: TextSpan, offset: u32) -> bool {
    span.start <= offset && offset <= span.end
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> ProvenanceIndex {
        // Template "….${person.name}…": expression at 10..21, overlay body
        // at 100..113 ("o.person.name").
        let entry = TemplateMappingEntry {
            expr_id: ExprId::new(0),
            html_span: TextSpan::new(10, 21),
            overlay_span: TextSpan::new(100, 113),
            frame: None,
            segments: vec![
                aurea_canon::SegmentMap {
                    path: "person".into(),
                    html_span: TextSpan::new(10, 16),
                    overlay_span: TextSpan::new(102, 108),
                },
                aurea_canon::SegmentMap {
                    path: "person.name".into(),
                    html_span: TextSpan::new(10, 21),
                    overlay_span: TextSpan::new(102, 113),
                },
            ],
        interp_group: None,
        };
        ProvenanceIndex::from_mapping("file:///t.html", "file:///t.__au.ttc.overlay.ts", &[entry])
    }

    #[test]
    fn innermost_edge_wins() {
        let index = index();
        // Offset inside "person": the member edge is narrower than the
        // whole-expression edge.
        let edge = index
            .lookup_generated("file:///t.__au.ttc.overlay.ts", 104)
            .unwrap();
        assert_eq!(edge.member_path.as_deref(), Some("person"));
        let edge = index.lookup_source("file:///t.html", 12).unwrap();
        assert_eq!(edge.member_path.as_deref(), Some("person"));
    }

    #[test]
    fn exact_span_projection_is_exact() {
        let index = index();
        let (edge, mapped) = index
            .project_generated_span(
                "file:///t.__au.ttc.overlay.ts",
                TextSpan::new(102, 108),
            )
            .unwrap();
        assert_eq!(edge.member_path.as_deref(), Some("person"));
        assert_eq!(mapped, TextSpan::new(10, 16));
    }

    #[test]
    fn offsets_roundtrip() {
        let index = index();
        let generated = index
            .source_offset_to_generated("file:///t.html", 11)
            .unwrap();
        let back = index
            .generated_offset_to_source("file:///t.__au.ttc.overlay.ts", generated)
            .unwrap();
        assert_eq!(back, 11);
    }

    #[test]
    fn duplicate_edges_collapse() {
        let entry = TemplateMappingEntry {
            expr_id: ExprId::new(0),
            html_span: TextSpan::new(0, 5),
            overlay_span: TextSpan::new(50, 57),
            frame: None,
            segments: vec![],
            interp_group: None,
        };
        let index = ProvenanceIndex::from_mapping(
            "file:///t.html",
            "file:///o.ts",
            &[entry.clone(), entry],
        );
        assert_eq!(index.edges().len(), 1);
    }

    #[test]
    fn template_stats_reports_overlay() {
        let index = index();
        let stats = index.template_stats("file:///t.html").unwrap();
        assert_eq!(stats.overlay_uri, "file:///t.__au.ttc.overlay.ts");
        assert_eq!(stats.overlay_edges, 3);
        assert!(index.template_stats("file:///other.html").is_none());
    }
}
