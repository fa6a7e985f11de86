//! When to decompose a request instead of running it directly

use serde::Serialize;

use super::complexity::{THRESHOLD_MEDIUM, THRESHOLD_SIMPLE};

/// Template matches below this confidence are treated as weak
pub const TEMPLATE_MATCH_THRESHOLD: f64 = 0.70;

/// Decision plus the rule that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DecompositionDecision {
    pub decompose: bool,
    pub reason: &'static str,
}

/// Decide whether a request with this score and template-match confidence
/// should be decomposed
pub fn should_decompose(score: u8, template_match: f64) -> bool {
    should_decompose_detailed(score, template_match).decompose
}

pub fn should_decompose_detailed(score: u8, template_match: f64) -> DecompositionDecision {
    should_decompose_with_threshold(score, template_match, TEMPLATE_MATCH_THRESHOLD)
}

/// Same rules with a configurable weak-match threshold
pub fn should_decompose_with_threshold(
    score: u8,
    template_match: f64,
    threshold: f64,
) -> DecompositionDecision {
    if score > THRESHOLD_MEDIUM {
        return DecompositionDecision {
            decompose: true,
            reason: "high complexity score",
        };
    }

    if score > THRESHOLD_SIMPLE && template_match < threshold {
        return DecompositionDecision {
            decompose: true,
            reason: "medium complexity with weak template match",
        };
    }

    DecompositionDecision {
        decompose: false,
        reason: "complexity manageable with available templates",
    }
}
