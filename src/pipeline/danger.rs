//! Red-flag scanner over patient free text.
//!
//! A danger sign independently and unconditionally mandates RED, so the
//! patterns here are hard-coded and checked before any classifier runs.
//! Terms follow WHO-style emergency sign lists.

use std::sync::LazyLock;

use regex::Regex;

/// A compiled red-flag pattern with its sign identifier.
struct DangerPattern {
    regex: Regex,
    sign: &'static str,
}

fn pattern(re: &str, sign: &'static str) -> DangerPattern {
    DangerPattern {
        regex: Regex::new(re).expect("invalid danger-sign pattern"),
        sign,
    }
}

static DANGER_PATTERNS: LazyLock<Vec<DangerPattern>> = LazyLock::new(|| {
    vec![
        pattern(
            r"(?i)\b(?:unconscious|unresponsive|passed\s+out|won'?t\s+wake|not\s+waking)\b",
            "unconsciousness",
        ),
        pattern(
            r"(?i)\b(?:seizure|convuls\w*|fitting)\b",
            "convulsions",
        ),
        pattern(
            r"(?i)(?:can(?:'?t|not)\s+breathe|cannot\s+breathe|difficulty\s+breathing|struggling\s+to\s+breathe|gasping)",
            "breathing_difficulty",
        ),
        pattern(
            r"(?i)chest\s+(?:pain|tightness|pressure)|pressure\s+in\s+(?:my\s+|the\s+)?chest",
            "chest_pain",
        ),
        pattern(
            r"(?i)(?:severe|heavy|uncontroll\w*)\s+bleeding|bleeding\s+(?:heavily|won'?t\s+stop)",
            "severe_bleeding",
        ),
        pattern(
            r"(?i)\b(?:blue\s+lips|turning\s+blue|cyanosis)\b",
            "cyanosis",
        ),
        pattern(r"(?i)\bstiff\s+neck\b", "stiff_neck"),
        pattern(
            r"(?i)(?:unable\s+to|can(?:'?t|not))\s+(?:drink|feed|swallow)|not\s+feeding",
            "unable_to_drink_or_feed",
        ),
        pattern(
            r"(?i)(?:vomit\w*|coughing(?:\s+up)?)\s+blood",
            "bleeding_vomit_or_cough",
        ),
        pattern(
            r"(?i)(?:sudden\s+)?weakness\s+(?:on|down)\s+one\s+side|face\s+droop\w*|slurred\s+speech",
            "stroke_signs",
        ),
    ]
});

/// Scan free text for red-flag phrases.
///
/// Pure and deterministic. Returns matched sign identifiers in pattern
/// order, each at most once; an empty result is a valid outcome, not a
/// failure.
pub fn detect(text: &str) -> Vec<String> {
    DANGER_PATTERNS
        .iter()
        .filter(|p| p.regex.is_match(text))
        .map(|p| p.sign.to_string())
        .collect()
}
