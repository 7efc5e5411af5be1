//! Reconciles findings from a facet's local and remote passes

use crate::{Finding, Span};
use std::cmp::Ordering;

/// Findings from the remote pass, or why there are none
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteFindings {
    Available(Vec<Finding>),
    Unavailable { reason: String },
}

impl RemoteFindings {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        RemoteFindings::Unavailable {
            reason: reason.into(),
        }
    }

    fn findings(&self) -> &[Finding] {
        match self {
            RemoteFindings::Available(findings) => findings,
            RemoteFindings::Unavailable { .. } => &[],
        }
    }
}

/// Total order over every field of a finding: position first, then content
pub fn canonical_cmp(a: &Finding, b: &Finding) -> Ordering {
    a.span
        .start
        .cmp(&b.span.start)
        .then(a.span.end.cmp(&b.span.end))
        .then(a.kind.cmp(&b.kind))
        .then(a.severity.cmp(&b.severity))
        .then_with(|| a.message.cmp(&b.message))
        .then_with(|| a.suggestion.cmp(&b.suggestion))
        .then_with(|| a.explanation.cmp(&b.explanation))
        .then(a.confidence.total_cmp(&b.confidence))
        .then(a.source.cmp(&b.source))
}

/// Merge the two passes into one deduplicated list ordered by span start.
///
/// 1. Every remote finding is accepted unless an accepted one already has the
///    same `(start, end, kind)`.
/// 2. A local finding is accepted only if no accepted finding has both
///    endpoints within `tolerance` characters of its own.
///
/// Inputs are put in canonical order first, so the result does not depend on
/// the order either list arrived in.
pub fn merge(local: &[Finding], remote: &RemoteFindings, tolerance: usize) -> Vec<Finding> {
    let mut remote_sorted: Vec<&Finding> = remote.findings().iter().collect();
    remote_sorted.sort_by(|a, b| canonical_cmp(a, b));
    let mut local_sorted: Vec<&Finding> = local.iter().collect();
    local_sorted.sort_by(|a, b| canonical_cmp(a, b));

    let mut accepted: Vec<Finding> = Vec::with_capacity(remote_sorted.len() + local_sorted.len());

    for finding in remote_sorted {
        let duplicate = accepted
            .iter()
            .any(|a| a.span == finding.span && a.kind == finding.kind);
        if !duplicate {
            accepted.push(finding.clone());
        }
    }

    for finding in local_sorted {
        if !overlaps_any(&finding.span, &accepted, tolerance) {
            accepted.push(finding.clone());
        }
    }

    accepted.sort_by(canonical_cmp);
    accepted
}

fn overlaps_any(span: &Span, accepted: &[Finding], tolerance: usize) -> bool {
    accepted.iter().any(|a| a.span.near(span, tolerance))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FindingKind, Severity};

    fn local(start: usize, end: usize, kind: FindingKind) -> Finding {
        Finding::local(kind, Severity::Medium, Span::new(start, end), "local")
    }

    fn remote(start: usize, end: usize, kind: FindingKind) -> Finding {
        Finding::remote(kind, Severity::High, Span::new(start, end), "remote")
    }

    #[test]
    fn test_remote_preferred_over_nearby_local() {
        let merged = merge(
            &[local(10, 20, FindingKind::Spelling)],
            &RemoteFindings::Available(vec![remote(12, 22, FindingKind::Grammar)]),
            5,
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].source, crate::Source::Remote);
    }

    #[test]
    fn test_tolerance_is_inclusive() {
        let merged = merge(
            &[local(15, 25, FindingKind::Spelling), local(40, 46, FindingKind::Spelling)],
            &RemoteFindings::Available(vec![remote(10, 20, FindingKind::Spelling)]),
            5,
        );
        // 15/25 is exactly 5 away on both ends and is dropped; 40/46 survives
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[1].span, Span::new(40, 46));
    }

    #[test]
    fn test_exact_remote_duplicates_collapse() {
        let merged = merge(
            &[],
            &RemoteFindings::Available(vec![
                remote(0, 4, FindingKind::Spelling),
                remote(0, 4, FindingKind::Spelling),
                remote(0, 4, FindingKind::Style),
                remote(1, 4, FindingKind::Spelling),
            ]),
            5,
        );
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn test_unavailable_remote_keeps_filtered_local_order() {
        let findings = vec![
            local(0, 3, FindingKind::Spelling),
            local(2, 5, FindingKind::Grammar),
            local(30, 35, FindingKind::Style),
            local(50, 52, FindingKind::Punctuation),
        ];
        let merged = merge(&findings, &RemoteFindings::unavailable("disabled"), 5);
        assert_eq!(
            merged,
            vec![findings[0].clone(), findings[2].clone(), findings[3].clone()]
        );
    }

    #[test]
    fn test_sorted_by_start_regardless_of_source() {
        let merged = merge(
            &[local(100, 110, FindingKind::Style), local(0, 2, FindingKind::Spelling)],
            &RemoteFindings::Available(vec![remote(50, 60, FindingKind::Grammar)]),
            5,
        );
        let starts: Vec<usize> = merged.iter().map(|f| f.span.start).collect();
        assert_eq!(starts, vec![0, 50, 100]);
    }

    #[test]
    fn test_input_permutation_does_not_matter() {
        let a = vec![
            local(5, 9, FindingKind::Spelling),
            local(7, 11, FindingKind::Grammar),
            local(60, 64, FindingKind::Style),
        ];
        let mut b = a.clone();
        b.reverse();
        let r = vec![remote(61, 63, FindingKind::Style), remote(20, 30, FindingKind::Clarity)];
        let mut r2 = r.clone();
        r2.reverse();
        assert_eq!(
            merge(&a, &RemoteFindings::Available(r), 5),
            merge(&b, &RemoteFindings::Available(r2), 5)
        );
    }
}
