//! Non-negotiable safety overrides applied to every classifier output.
//!
//! The gate enforces one invariant above all: GREEN is never the final
//! tier when the classifier reports HIGH uncertainty.

use crate::config::DEFAULT_DISCLAIMER;
use crate::models::{AiResponse, TriageLevel, UncertaintyLevel};
use crate::pipeline::rules::tier_template;

const HIGH_CAUTION_STEP: &str =
    "Because the assessment is uncertain, err on the side of being seen sooner rather than later.";
const URGENT_CAUTION_STEP: &str =
    "If symptoms change or worsen at all, seek care urgently rather than waiting.";
const UNCERTAINTY_WATCH_OUT: &str =
    "Assessment uncertainty is high. Reassess frequently.";

/// Apply safety constraints to a classifier response.
///
/// RED is never modified, regardless of uncertainty. HIGH uncertainty
/// upgrades GREEN to YELLOW and hardens YELLOW in place.
pub fn apply_safety_constraints(mut response: AiResponse) -> AiResponse {
    if response.uncertainty != UncertaintyLevel::High {
        return response;
    }
    match response.risk_tier {
        TriageLevel::Red => response,
        TriageLevel::Green => {
            tracing::warn!("safety gate: upgrading GREEN to YELLOW for HIGH uncertainty");
            let (mut steps, watch_outs, referral) = tier_template(TriageLevel::Yellow);
            steps.push(HIGH_CAUTION_STEP.into());
            response.risk_tier = TriageLevel::Yellow;
            response.recommended_next_steps = steps;
            response.watch_outs = watch_outs;
            response.referral_recommended = referral;
            response.reasoning.push_str(
                " Safety escalation: upgraded from GREEN to YELLOW because the classifier reported HIGH uncertainty.",
            );
            response
        }
        TriageLevel::Yellow => {
            response.recommended_next_steps.push(URGENT_CAUTION_STEP.into());
            response.watch_outs.push(UNCERTAINTY_WATCH_OUT.into());
            response.reasoning.push_str(
                " Safety warning: HIGH uncertainty at YELLOW tier; monitor closely.",
            );
            response
        }
    }
}

/// Guarantee a non-empty disclaimer on every outgoing response.
pub fn ensure_disclaimer(mut response: AiResponse) -> AiResponse {
    if response.disclaimer.trim().is_empty() {
        response.disclaimer = DEFAULT_DISCLAIMER.into();
    }
    response
}
