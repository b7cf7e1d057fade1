//! Deterministic narration fallbacks.
//!
//! When the provider cannot write the SOAP note, patient explanation, or
//! referral summary, these templates are built directly from the encounter
//! and the resolved assessment. Narration failure is never fatal.

use crate::models::{AiResponse, Encounter, TriageLevel};

/// Templated SOAP note from the encounter and the gated response.
pub fn fallback_soap_note(encounter: &Encounter, response: &AiResponse) -> String {
    let danger = if response.danger_signs.is_empty() {
        "none detected".to_string()
    } else {
        response.danger_signs.join(", ")
    };
    format!(
        "S: Patient reports: {symptoms}\n\
         O: {age}-year-old {sex}, location {location}. Danger signs: {danger}.\n\
         A: Triage tier {tier}. {reasoning}\n\
         P: {plan}",
        symptoms = encounter.symptoms,
        age = encounter.demographics.age,
        sex = encounter.demographics.sex.as_str(),
        location = encounter.demographics.location,
        tier = response.risk_tier.as_str(),
        reasoning = response.reasoning,
        plan = response.recommended_next_steps.join(" "),
    )
}

/// Plain-language explanation of the outcome for the patient.
pub fn fallback_patient_explanation(encounter: &Encounter, response: &AiResponse) -> String {
    let headline = match response.risk_tier {
        TriageLevel::Red => "Your symptoms need emergency care right away.",
        TriageLevel::Yellow => "Your symptoms should be checked by a health worker within 24 hours.",
        TriageLevel::Green => "Your symptoms can usually be managed at home for now.",
    };
    format!(
        "{headline} Based on what you told us ({symptoms}), here is what to do: {steps} \
         Watch for: {watch}. {disclaimer}",
        symptoms = encounter.symptoms,
        steps = response.recommended_next_steps.join(" "),
        watch = response.watch_outs.join("; "),
        disclaimer = response.disclaimer,
    )
}

/// Referral summary for the receiving facility.
pub fn fallback_referral_summary(encounter: &Encounter, response: &AiResponse) -> String {
    format!(
        "Referral for a {age}-year-old {sex} patient from {location}. \
         Presenting complaint: {symptoms}. Triage tier {tier} \
         (uncertainty {uncertainty}). {reasoning} Recommended actions: {steps}",
        age = encounter.demographics.age,
        sex = encounter.demographics.sex.as_str(),
        location = encounter.demographics.location,
        symptoms = encounter.symptoms,
        tier = response.risk_tier.as_str(),
        uncertainty = response.uncertainty.as_str(),
        reasoning = response.reasoning,
        steps = response.recommended_next_steps.join(" "),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Demographics, Sex, UncertaintyLevel};
    use crate::pipeline::rules::generate_triage_response;

    fn encounter() -> Encounter {
        Encounter::new(
            Demographics {
                age: 70,
                sex: Sex::Male,
                location: "Mbale".into(),
            },
            "cough and shortness of breath",
        )
    }

    #[test]
    fn soap_note_has_four_sections() {
        let enc = encounter();
        let response = generate_triage_response(70, &enc.symptoms, &[]);
        let note = fallback_soap_note(&enc, &response);
        for prefix in ["S:", "O:", "A:", "P:"] {
            assert!(note.contains(prefix), "missing {prefix}");
        }
        assert!(note.contains("cough and shortness of breath"));
        assert!(note.contains("YELLOW"));
    }

    #[test]
    fn patient_explanation_matches_tier() {
        let enc = encounter();
        let mut response = generate_triage_response(70, &enc.symptoms, &[]);
        response.uncertainty = UncertaintyLevel::Medium;
        let text = fallback_patient_explanation(&enc, &response);
        assert!(text.contains("within 24 hours"));
        assert!(text.contains(&response.disclaimer));
    }

    #[test]
    fn referral_summary_names_demographics_and_tier() {
        let enc = encounter();
        let response = generate_triage_response(70, &enc.symptoms, &[]);
        let text = fallback_referral_summary(&enc, &response);
        assert!(text.contains("70-year-old"));
        assert!(text.contains("Mbale"));
        assert!(text.contains("YELLOW"));
    }
}
