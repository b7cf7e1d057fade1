//! Keyword-based tier guess for mock mode.
//!
//! Mirrors the inference server's own heuristic fallback so demo and
//! development flows produce the same answers with the model offline.

use crate::config::DEFAULT_DISCLAIMER;
use crate::models::{AiResponse, TriageLevel, UncertaintyLevel};

const RED_TERMS: &[&str] = &[
    "chest pain",
    "cannot breathe",
    "can't breathe",
    "unconscious",
    "seizure",
    "convulsion",
];

const YELLOW_TERMS: &[&str] = &["fever", "vomit", "vomiting", "pain", "cough", "weakness"];

/// Deterministic keyword triage. Never calls anything.
pub fn heuristic_triage(symptoms: &str) -> AiResponse {
    let lower = symptoms.to_lowercase();

    if RED_TERMS.iter().any(|t| lower.contains(t)) {
        return AiResponse {
            risk_tier: TriageLevel::Red,
            danger_signs: vec!["Critical symptom pattern".into()],
            uncertainty: UncertaintyLevel::Low,
            recommended_next_steps: vec!["Seek emergency care immediately.".into()],
            watch_outs: vec![
                "Breathing difficulty".into(),
                "Loss of consciousness".into(),
            ],
            referral_recommended: true,
            disclaimer: DEFAULT_DISCLAIMER.into(),
            reasoning: "Heuristic detected emergency red-flag symptoms.".into(),
        };
    }

    if YELLOW_TERMS.iter().any(|t| lower.contains(t)) {
        return AiResponse {
            risk_tier: TriageLevel::Yellow,
            danger_signs: vec![],
            uncertainty: UncertaintyLevel::Medium,
            recommended_next_steps: vec![
                "Visit a clinic within 24 hours.".into(),
                "Monitor symptoms closely.".into(),
            ],
            watch_outs: vec![
                "Worsening fever".into(),
                "Persistent vomiting".into(),
                "New danger signs".into(),
            ],
            referral_recommended: true,
            disclaimer: DEFAULT_DISCLAIMER.into(),
            reasoning: "Heuristic detected moderate-risk symptoms.".into(),
        };
    }

    AiResponse {
        risk_tier: TriageLevel::Green,
        danger_signs: vec![],
        uncertainty: UncertaintyLevel::Medium,
        recommended_next_steps: vec!["Home care and monitor symptoms.".into()],
        watch_outs: vec!["If symptoms worsen, seek care promptly.".into()],
        referral_recommended: false,
        disclaimer: DEFAULT_DISCLAIMER.into(),
        reasoning: "No high-risk symptom terms detected.".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn red_terms_give_red_low() {
        let resp = heuristic_triage("sudden CHEST PAIN while resting");
        assert_eq!(resp.risk_tier, TriageLevel::Red);
        assert_eq!(resp.uncertainty, UncertaintyLevel::Low);
        assert!(resp.referral_recommended);
    }

    #[test]
    fn yellow_terms_give_yellow_medium() {
        let resp = heuristic_triage("fever and vomiting since last night");
        assert_eq!(resp.risk_tier, TriageLevel::Yellow);
        assert_eq!(resp.uncertainty, UncertaintyLevel::Medium);
    }

    #[test]
    fn red_wins_over_yellow() {
        let resp = heuristic_triage("fever and now a seizure");
        assert_eq!(resp.risk_tier, TriageLevel::Red);
    }

    #[test]
    fn everything_else_is_green() {
        let resp = heuristic_triage("itchy rash on the arm");
        assert_eq!(resp.risk_tier, TriageLevel::Green);
        assert!(!resp.referral_recommended);
    }
}
