//! Template ↔ overlay mapping.
//!
//! One [`TemplateMappingEntry`] per emitted lambda, carrying the authored
//! expression span, the lambda body span in the overlay, and per qualified
//! member access a segment pair. Exact segment spans tracked during emission
//! take precedence; the proportional projection below is the fallback for
//! overlay slices with no tracked counterpart.

use aurea_carton::TextSpan;
use aurea_relief::{ExprId, ExprTable, FrameId};
use serde::Serialize;

/// A qualified-member slice pair inside one expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentMap {
    /// Dotted member path, e.g. `person.name`.
    pub path: String,
    pub html_span: TextSpan,
    pub overlay_span: TextSpan,
}

/// One expression's mapping between template and overlay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateMappingEntry {
    pub expr_id: ExprId,
    /// Authored expression span in the template.
    pub html_span: TextSpan,
    /// Lambda body span in the overlay.
    pub overlay_span: TextSpan,
    pub frame: Option<FrameId>,
    pub segments: Vec<SegmentMap>,
    /// Shared by all `${…}` slices of one interpolation.
    pub interp_group: Option<u32>,
}

/// Project an overlay member slice back into the authored span when no exact
/// segment was tracked. Best-effort linear interpolation:
///
/// 1. a slice covering the whole overlay expression maps to the whole
///    authored span;
/// 2. otherwise both endpoints project by their relative position, clamp
///    into the authored span, round, and reorder if inverted.
pub fn project_segment_span(
    slice: TextSpan,
    overlay_expr: TextSpan,
    template_expr: TextSpan,
) -> TextSpan {
    if slice == overlay_expr {
        return template_expr;
    }
    let overlay_len = (overlay_expr.end - overlay_expr.start).max(1) as f64;
    let start_ratio = (slice.start.saturating_sub(overlay_expr.start)) as f64 / overlay_len;
    let end_ratio = (slice.end.saturating_sub(overlay_expr.start)) as f64 / overlay_len;

    let template_len = (template_expr.end - template_expr.start) as f64;
    let raw_start = template_expr.start as f64 + start_ratio * template_len;
    let raw_end = template_expr.start as f64 + end_ratio * template_len;

    let clamp = |value: f64| -> u32 {
        let rounded = value.round();
        let clamped = rounded
            .max(template_expr.start as f64)
            .min(template_expr.end as f64);
        clamped as u32
    };
    let mut start = clamp(raw_start);
    let mut end = clamp(raw_end);
    if start > end {
        std::mem::swap(&mut start, &mut end);
    }
    TextSpan::new(start, end)
}

/// Drop non-leaf member paths from entries that share an interpolation group
/// with more than one expression, so `person.name` and `person.age` survive
/// aggregation but the shared `person` prefix does not.
pub fn aggregate_group_segments(entries: &mut [TemplateMappingEntry], table: &ExprTable) {
    // Group sizes come from the expression table, not the entries, so dead
    // expressions cannot shrink a group.
    let mut group_sizes: Vec<(u32, usize)> = Vec::new();
    for entry in table.iter() {
        if let Some(group) = entry.interp_group {
            match group_sizes.iter_mut().find(|(g, _)| *g == group) {
                Some((_, count)) => *count += 1,
                None => group_sizes.push((group, 1)),
            }
        }
    }

    for (group, count) in group_sizes {
        if count < 2 {
            continue;
        }
        // Union of paths across the group.
        let mut all_paths: Vec<String> = Vec::new();
        for entry in entries.iter() {
            if entry.interp_group == Some(group) {
                for segment in &entry.segments {
                    if !all_paths.contains(&segment.path) {
                        all_paths.push(segment.path.clone());
                    }
                }
            }
        }
        let is_leaf = |path: &str| -> bool {
            !all_paths
                .iter()
                .any(|other| other.len() > path.len() && is_prefix_path(path, other))
        };
        let leaves: Vec<String> = all_paths.iter().filter(|p| is_leaf(p)).cloned().collect();
        for entry in entries.iter_mut() {
            if entry.interp_group == Some(group) {
                entry.segments.retain(|s| leaves.contains(&s.path));
            }
        }
    }
}

/// Whether `prefix` is a proper dotted-path prefix of `path`.
fn is_prefix_path(prefix: &str, path: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.starts_with('.'))
}

/// Choose the best segment for `path` among competing entries: prefer the
/// entry whose expression id matches the query, then the shorter authored
/// span, then the shorter overlay span.
pub fn pick_segment<'m>(
    entries: impl IntoIterator<Item = &'m TemplateMappingEntry>,
    path: &str,
    query_expr: Option<ExprId>,
) -> Option<&'m SegmentMap> {
    let mut best: Option<(&'m TemplateMappingEntry, &'m SegmentMap)> = None;
    for entry in entries {
        for segment in entry.segments.iter().filter(|s| s.path == path) {
            let better = match &best {
                None => true,
                Some((best_entry, best_segment)) => {
                    let query_hit = |e: &TemplateMappingEntry| Some(e.expr_id) == query_expr;
                    let key = (
                        !query_hit(entry),
                        segment.html_span.len(),
                        segment.overlay_span.len(),
                    );
                    let best_key = (
                        !query_hit(best_entry),
                        best_segment.html_span.len(),
                        best_segment.overlay_span.len(),
                    );
                    key < best_key
                }
            };
            if better {
                best = Some((entry, segment));
            }
        }
    }
    best.map(|(_, segment)| segment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_slice_projects_to_full_span() {
        let overlay = TextSpan::new(100, 120);
        let template = TextSpan::new(10, 30);
        assert_eq!(project_segment_span(overlay, overlay, template), template);
    }

    #[test]
    fn partial_slice_projects_proportionally() {
        let overlay = TextSpan::new(100, 120);
        let template = TextSpan::new(10, 30);
        // Slice covering the middle half of the overlay expression.
        let slice = TextSpan::new(105, 115);
        let projected = project_segment_span(slice, overlay, template);
        assert_eq!(projected, TextSpan::new(15, 25));
    }

    #[test]
    fn projection_clamps_and_reorders() {
        let overlay = TextSpan::new(100, 101);
        let template = TextSpan::new(10, 12);
        // Degenerate slice outside the expression still lands inside.
        let slice = TextSpan::new(99, 150);
        let projected = project_segment_span(slice, overlay, template);
        assert!(projected.start >= 10 && projected.end <= 12);
        assert!(projected.start <= projected.end);
    }

    #[test]
    fn prefix_path_detection() {
        assert!(is_prefix_path("person", "person.name"));
        assert!(!is_prefix_path("person", "personnel.name"));
        assert!(!is_prefix_path("person.name", "person"));
    }

    #[test]
    fn pick_segment_prefers_query_then_shorter_spans() {
        let seg = |start: u32, end: u32| SegmentMap {
            path: "a.b".to_string(),
            html_span: TextSpan::new(start, end),
            overlay_span: TextSpan::new(start + 100, end + 100),
        };
        let entry = |id: u32, s: SegmentMap| TemplateMappingEntry {
            expr_id: ExprId::new(id),
            html_span: TextSpan::new(0, 50),
            overlay_span: TextSpan::new(100, 150),
            frame: None,
            segments: vec![s],
            interp_group: Some(0),
        };
        let a = entry(1, seg(0, 20));
        let b = entry(2, seg(0, 10));
        // Query matches the longer entry: it wins anyway.
        let chosen = pick_segment([&a, &b], "a.b", Some(ExprId::new(1))).unwrap();
        assert_eq!(chosen.html_span, TextSpan::new(0, 20));
        // No query: shorter html span wins.
        let chosen = pick_segment([&a, &b], "a.b", None).unwrap();
        assert_eq!(chosen.html_span, TextSpan::new(0, 10));
    }
}
