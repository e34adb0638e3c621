//! SLO burn-rate calculator
//!
//! Pure computation from raw event counts to achieved availability,
//! error-budget consumption, and health status. Counting the events
//! over the SLO window is the store's job; this module never does I/O.

use crate::models::{EventCounts, SloBurn, SloDefinition, SloStatus};

/// Width of the tolerance band below target that classifies as
/// at-risk instead of violating, in percentage points. Prevents
/// status flapping right at the threshold.
const AT_RISK_BAND: f64 = 1.0;

/// Compute the burn state for one SLO from event counts over its window.
///
/// Zero traffic reports 100% achieved and healthy. That is a documented
/// fallback, not a bug: callers that must distinguish "no data" from
/// "perfect reliability" check `total_events` on the returned burn.
pub fn compute_burn(def: &SloDefinition, counts: EventCounts) -> SloBurn {
    let total = counts.total_events as f64;
    let bad = counts.bad_events as f64;

    let achieved = if counts.total_events == 0 {
        100.0
    } else {
        (total - bad) / total * 100.0
    };

    // A 100% target leaves no budget at all
    let error_budget = if def.target_percent >= 100.0 {
        0.0
    } else {
        (100.0 - def.target_percent) / 100.0 * total
    };

    let consumed = if error_budget == 0.0 {
        0.0
    } else {
        bad / error_budget * 100.0
    };

    SloBurn {
        slo_id: def.id.clone(),
        service: def.service.clone(),
        window: def.window.label(),
        achieved_percent: achieved,
        target_percent: def.target_percent,
        error_budget_consumed_percent: consumed,
        status: classify(achieved, def.target_percent),
        total_events: counts.total_events,
        bad_events: counts.bad_events,
    }
}

/// Classify achieved availability against the target.
///
/// Exactly `target - 1` is still at-risk; only strictly below the band
/// is violating.
pub fn classify(achieved: f64, target: f64) -> SloStatus {
    if achieved >= target {
        SloStatus::Healthy
    } else if achieved >= target - AT_RISK_BAND {
        SloStatus::AtRisk
    } else {
        SloStatus::Violating
    }
}
