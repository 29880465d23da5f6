//! Selection of candidates from tiered recommendations

use super::CandidateSet;
use crate::models::{ResourceAxis, ResourceEstimate, TieredRecommendation};
use crate::policy::{ApplyTarget, EffectiveConfig};

fn band(rec: &TieredRecommendation, target: ApplyTarget) -> Option<&ResourceEstimate> {
    match target {
        ApplyTarget::Frugal => Some(&rec.lower_bound),
        ApplyTarget::Balanced => Some(&rec.target),
        ApplyTarget::Peak => Some(&rec.upper_bound),
        // Auto limits are derived from the request by the apply engine
        ApplyTarget::Auto => None,
    }
}

/// Pick one candidate per axis from `rec` according to each axis's apply target
pub fn select(rec: &TieredRecommendation, config: &EffectiveConfig) -> CandidateSet {
    let mut candidates = CandidateSet::default();
    for axis in ResourceAxis::ALL {
        let target = config.axis(axis).apply_target;
        if let Some(value) = band(rec, target).and_then(|b| b.get(axis.kind())) {
            candidates.insert(axis, value);
        }
    }
    candidates
}
