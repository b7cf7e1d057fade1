//! Deterministic, offline-capable rule engine.
//!
//! Everything here is pure: same input, same output, no network, no clock.
//! This is the classifier of last resort when the AI provider is down, and
//! the source of the tier recommendation templates shared across the
//! pipeline.

use std::sync::LazyLock;

use regex::Regex;

use crate::config::DEFAULT_DISCLAIMER;
use crate::models::{AiResponse, PainSeverity, SymptomCategory, TriageLevel, UncertaintyLevel};

/// Category keyword tables. A symptom text may hit several categories.
const CATEGORY_KEYWORDS: &[(SymptomCategory, &[&str])] = &[
    (
        SymptomCategory::Respiratory,
        &[
            "cough", "breath", "wheez", "sore throat", "phlegm", "chest congestion",
            "pneumonia", "runny nose",
        ],
    ),
    (
        SymptomCategory::Gastrointestinal,
        &[
            "vomit", "diarrh", "stomach", "nausea", "abdominal", "belly", "constipat",
        ],
    ),
    (
        SymptomCategory::Neurological,
        &[
            "headache", "dizz", "confus", "numb", "faint", "tingling", "blurred vision",
        ],
    ),
    (
        SymptomCategory::Cardiovascular,
        &[
            "chest pain", "palpitation", "heart", "racing heart", "pressure in chest",
        ],
    ),
    (
        SymptomCategory::Fever,
        &["fever", "temperature", "chills", "sweats", "burning up", "hot body"],
    ),
    (
        SymptomCategory::Pain,
        &["pain", "ache", "aching", "hurts", "sore ", "cramp"],
    ),
];

/// Priority order for category-specific follow-up questions.
const FOLLOWUP_PRIORITY: &[SymptomCategory] = &[
    SymptomCategory::Cardiovascular,
    SymptomCategory::Respiratory,
    SymptomCategory::Gastrointestinal,
    SymptomCategory::Neurological,
    SymptomCategory::Fever,
    SymptomCategory::Pain,
];

/// Map a symptom text to a non-empty set of categories (fallback: Other).
pub fn categorize_symptoms(text: &str) -> Vec<SymptomCategory> {
    let lower = text.to_lowercase();
    let mut categories: Vec<SymptomCategory> = CATEGORY_KEYWORDS
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(category, _)| *category)
        .collect();
    if categories.is_empty() {
        categories.push(SymptomCategory::Other);
    }
    categories
}

static SEVERE_PAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:severe|unbearable|excruciating|worst|intense)\b|(?:9|10)\s*(?:/|out\s+of)\s*10")
        .expect("invalid severity pattern")
});

static MODERATE_PAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:moderate|bad|strong|throbbing)\b|(?:5|6|7|8)\s*(?:/|out\s+of)\s*10")
        .expect("invalid severity pattern")
});

/// Assess pain severity from descriptive words and pain-scale mentions.
pub fn assess_pain_severity(text: &str) -> PainSeverity {
    if SEVERE_PAIN.is_match(text) {
        PainSeverity::Severe
    } else if MODERATE_PAIN.is_match(text) {
        PainSeverity::Moderate
    } else {
        PainSeverity::Mild
    }
}

static DURATION_DAYS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s*day").expect("invalid duration pattern"));
static DURATION_WEEKS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s*week").expect("invalid duration pattern"));

/// Parse a symptom duration in days from "N day(s)" / "N week(s)" phrases.
/// Returns the longest duration mentioned, 0 when absent. Numbers that do
/// not fit a day count are discarded like any other unparseable token.
pub fn extract_duration_days(text: &str) -> u32 {
    let days = DURATION_DAYS
        .captures_iter(text)
        .filter_map(|c| c[1].parse::<u32>().ok());
    let weeks = DURATION_WEEKS
        .captures_iter(text)
        .filter_map(|c| c[1].parse::<u32>().ok().and_then(|n| n.checked_mul(7)));
    days.chain(weeks).max().unwrap_or(0)
}

/// Assign a triage tier. Rule order matters; the first matching rule wins:
/// 1. any danger sign present: RED, unconditionally;
/// 2. age under 2 with fever: YELLOW;
/// 3. age over 65 with respiratory symptoms: YELLOW;
/// 4. at least moderate pain lasting more than 3 days: YELLOW;
/// 5. otherwise GREEN.
pub fn assess_triage_level(age: u32, symptoms: &str, danger_signs: &[String]) -> TriageLevel {
    if !danger_signs.is_empty() {
        return TriageLevel::Red;
    }
    let categories = categorize_symptoms(symptoms);
    if age < 2 && categories.contains(&SymptomCategory::Fever) {
        return TriageLevel::Yellow;
    }
    if age > 65 && categories.contains(&SymptomCategory::Respiratory) {
        return TriageLevel::Yellow;
    }
    if assess_pain_severity(symptoms) >= PainSeverity::Moderate
        && extract_duration_days(symptoms) > 3
    {
        return TriageLevel::Yellow;
    }
    TriageLevel::Green
}

fn category_questions(category: SymptomCategory) -> &'static [&'static str] {
    match category {
        SymptomCategory::Cardiovascular => &[
            "Does the pain spread to your arm, neck, or jaw?",
            "Do you feel short of breath or sweaty with it?",
            "Does it get worse with activity?",
        ],
        SymptomCategory::Respiratory => &[
            "Can you speak full sentences without stopping for breath?",
            "Is the cough bringing anything up?",
            "Do you wheeze or feel chest tightness?",
        ],
        SymptomCategory::Gastrointestinal => &[
            "Are you able to keep fluids down?",
            "Have you noticed blood in vomit or stool?",
            "How many times have you vomited or passed loose stool today?",
        ],
        SymptomCategory::Neurological => &[
            "Have you fainted or felt close to fainting?",
            "Any weakness or numbness on one side of your body?",
            "Is light or noise making it worse?",
        ],
        SymptomCategory::Fever => &[
            "Have you measured the temperature, and how high was it?",
            "Are there chills or shaking?",
            "Is there any rash alongside the fever?",
        ],
        SymptomCategory::Pain => &[
            "Where exactly is the pain?",
            "Does anything make it better or worse?",
        ],
        SymptomCategory::Other => &[
            "Have you taken any medication for this?",
            "Has this happened before?",
        ],
    }
}

/// Generate 3 to 5 unique follow-up questions for a symptom text.
///
/// Always opens with a duration question and a severity-scale question,
/// then adds 2 to 3 category questions chosen by priority
/// (cardiovascular first, generic last), truncated to 5 overall.
pub fn generate_followup_questions(symptoms: &str) -> Vec<String> {
    let mut questions: Vec<String> = vec![
        "How long have you had these symptoms?".into(),
        "On a scale of 1 to 10, how severe is it right now?".into(),
    ];

    let categories = categorize_symptoms(symptoms);
    let mut specific: Vec<&str> = Vec::new();
    for category in FOLLOWUP_PRIORITY {
        if categories.contains(category) {
            specific.extend(category_questions(*category));
        }
    }
    if specific.is_empty() {
        specific.extend(category_questions(SymptomCategory::Other));
    }

    for question in specific.into_iter().take(3) {
        let question = question.to_string();
        if !questions.contains(&question) {
            questions.push(question);
        }
    }
    questions.truncate(5);
    questions
}

/// Tier recommendation templates: (next steps, watch-outs, referral).
///
/// Shared wording contract between the rule engine, the safety gate, and
/// the orchestrator's danger-sign shortcut.
pub fn tier_template(level: TriageLevel) -> (Vec<String>, Vec<String>, bool) {
    match level {
        TriageLevel::Red => (
            vec![
                "Seek emergency care immediately.".into(),
                "Go to the nearest hospital or call emergency services now.".into(),
            ],
            vec![
                "Loss of consciousness".into(),
                "Severe difficulty breathing".into(),
                "Uncontrolled bleeding".into(),
            ],
            true,
        ),
        TriageLevel::Yellow => (
            vec![
                "Visit a clinic within 24 hours.".into(),
                "Monitor symptoms closely until seen.".into(),
            ],
            vec![
                "Worsening fever".into(),
                "Persistent vomiting".into(),
                "New danger signs".into(),
            ],
            true,
        ),
        TriageLevel::Green => (
            vec![
                "Home care: rest and drink plenty of fluids.".into(),
                "Monitor symptoms for the next 48 hours.".into(),
            ],
            vec!["If symptoms worsen or new symptoms appear, seek care promptly.".into()],
            false,
        ),
    }
}

/// Full rule-based triage response.
///
/// Uncertainty is always MEDIUM: the rules are deliberately conservative
/// and make no claim to model-grade confidence.
pub fn generate_triage_response(
    age: u32,
    symptoms: &str,
    danger_signs: &[String],
) -> AiResponse {
    let risk_tier = assess_triage_level(age, symptoms, danger_signs);
    let (recommended_next_steps, watch_outs, referral_recommended) = tier_template(risk_tier);
    let categories: Vec<&str> = categorize_symptoms(symptoms)
        .iter()
        .map(|c| c.as_str())
        .collect();

    AiResponse {
        risk_tier,
        danger_signs: danger_signs.to_vec(),
        uncertainty: UncertaintyLevel::Medium,
        recommended_next_steps,
        watch_outs,
        referral_recommended,
        disclaimer: DEFAULT_DISCLAIMER.into(),
        reasoning: format!(
            "Rule-based assessment for a {age}-year-old patient; detected symptom categories: {}.",
            categories.join(", ")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categorize_hits_multiple_categories() {
        let cats = categorize_symptoms("Fever and cough for two days");
        assert!(cats.contains(&SymptomCategory::Fever));
        assert!(cats.contains(&SymptomCategory::Respiratory));
    }

    #[test]
    fn categorize_empty_match_is_other() {
        assert_eq!(categorize_symptoms("feeling strange"), vec![SymptomCategory::Other]);
        assert_eq!(categorize_symptoms(""), vec![SymptomCategory::Other]);
    }

    #[test]
    fn pain_severity_from_words_and_scale() {
        assert_eq!(assess_pain_severity("severe stomach pain"), PainSeverity::Severe);
        assert_eq!(assess_pain_severity("pain is 9/10"), PainSeverity::Severe);
        assert_eq!(assess_pain_severity("a bad headache"), PainSeverity::Moderate);
        assert_eq!(assess_pain_severity("about 7 out of 10"), PainSeverity::Moderate);
        assert_eq!(assess_pain_severity("slight ache"), PainSeverity::Mild);
    }

    #[test]
    fn duration_parses_days_and_weeks() {
        assert_eq!(extract_duration_days("cough for 5 days"), 5);
        assert_eq!(extract_duration_days("2 weeks of headache"), 14);
        assert_eq!(extract_duration_days("1 day, maybe 1 week"), 7);
        assert_eq!(extract_duration_days("since yesterday"), 0);
        assert_eq!(extract_duration_days(""), 0);
    }

    #[test]
    fn absurd_durations_are_discarded_not_wrapped() {
        // Week counts whose day equivalent exceeds u32 must not panic or
        // wrap; they are dropped like any unparseable number.
        assert_eq!(extract_duration_days("ongoing for 613566757 weeks"), 0);
        assert_eq!(extract_duration_days("613566757 weeks and 4 days"), 4);
        assert_eq!(extract_duration_days("99999999999999 days"), 0);
    }

    #[test]
    fn danger_signs_force_red_over_everything() {
        let signs = vec!["unconsciousness".to_string()];
        assert_eq!(assess_triage_level(1, "fever", &signs), TriageLevel::Red);
        assert_eq!(assess_triage_level(70, "cough", &signs), TriageLevel::Red);
        assert_eq!(assess_triage_level(30, "", &signs), TriageLevel::Red);
    }

    #[test]
    fn infant_fever_is_yellow() {
        assert_eq!(
            assess_triage_level(1, "my baby has a fever", &[]),
            TriageLevel::Yellow
        );
        // At exactly 2 the rule no longer applies.
        assert_eq!(assess_triage_level(2, "a fever", &[]), TriageLevel::Green);
    }

    #[test]
    fn elderly_respiratory_is_yellow() {
        assert_eq!(
            assess_triage_level(70, "cough and shortness of breath", &[]),
            TriageLevel::Yellow
        );
        assert_eq!(assess_triage_level(65, "a cough", &[]), TriageLevel::Green);
    }

    #[test]
    fn prolonged_moderate_pain_is_yellow() {
        assert_eq!(
            assess_triage_level(30, "bad back pain for 5 days", &[]),
            TriageLevel::Yellow
        );
        // 3 days is not "more than 3 days".
        assert_eq!(
            assess_triage_level(30, "bad back pain for 3 days", &[]),
            TriageLevel::Green
        );
        // Mild pain never triggers the rule.
        assert_eq!(
            assess_triage_level(30, "slight pain for 10 days", &[]),
            TriageLevel::Green
        );
    }

    #[test]
    fn default_is_green() {
        assert_eq!(assess_triage_level(30, "mild headache", &[]), TriageLevel::Green);
    }

    #[test]
    fn followups_are_three_to_five_unique_questions() {
        for symptoms in [
            "",
            "mild headache",
            "chest pain and palpitations",
            "fever cough vomiting headache chest pain",
        ] {
            let questions = generate_followup_questions(symptoms);
            assert!(
                (3..=5).contains(&questions.len()),
                "{symptoms}: {}",
                questions.len()
            );
            for q in &questions {
                assert!(q.ends_with('?'), "{q}");
                assert!(!q.trim().is_empty());
            }
            let mut unique = questions.clone();
            unique.sort();
            unique.dedup();
            assert_eq!(unique.len(), questions.len());
        }
    }

    #[test]
    fn followups_always_include_duration_and_severity() {
        let questions = generate_followup_questions("chest pain");
        assert_eq!(questions[0], "How long have you had these symptoms?");
        assert_eq!(questions[1], "On a scale of 1 to 10, how severe is it right now?");
    }

    #[test]
    fn followups_prefer_cardiovascular_over_fever() {
        let questions = generate_followup_questions("fever and chest pain");
        assert!(questions[2].contains("arm, neck, or jaw"));
    }

    #[test]
    fn rule_response_is_deterministic() {
        let a = generate_triage_response(70, "cough and shortness of breath", &[]);
        let b = generate_triage_response(70, "cough and shortness of breath", &[]);
        assert_eq!(a, b);
    }

    #[test]
    fn rule_response_reasoning_states_age_and_categories() {
        let resp = generate_triage_response(70, "cough and fever", &[]);
        assert!(resp.reasoning.contains("Rule-based assessment"));
        assert!(resp.reasoning.contains("70-year-old"));
        assert!(resp.reasoning.contains("respiratory"));
        assert!(resp.reasoning.contains("fever"));
        assert_eq!(resp.uncertainty, UncertaintyLevel::Medium);
    }

    #[test]
    fn rule_response_tier_templates() {
        let green = generate_triage_response(30, "mild headache", &[]);
        assert_eq!(green.risk_tier, TriageLevel::Green);
        assert!(!green.referral_recommended);
        assert!(green.recommended_next_steps[0].contains("Home care"));

        let yellow = generate_triage_response(1, "my baby has a fever", &[]);
        assert_eq!(yellow.risk_tier, TriageLevel::Yellow);
        assert!(yellow.referral_recommended);
        assert!(yellow.recommended_next_steps[0].contains("24 hours"));

        let red = generate_triage_response(30, "anything", &["convulsions".into()]);
        assert_eq!(red.risk_tier, TriageLevel::Red);
        assert!(red.referral_recommended);
        assert!(red.recommended_next_steps[0].contains("emergency"));
        assert_eq!(red.danger_signs, vec!["convulsions"]);
    }
}
