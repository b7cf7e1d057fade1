use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use super::encounter::EncounterId;
use super::enums::{TriageLevel, UncertaintyLevel};

/// A malformed classifier response. Field-specific so that observability
/// can tell a missing `riskTier` apart from a mistyped `watchOuts`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// Classifier output contract, shared by the AI provider and the rule
/// engine. Wire format is the camelCase JSON spoken by the inference
/// server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiResponse {
    pub risk_tier: TriageLevel,
    pub danger_signs: Vec<String>,
    pub uncertainty: UncertaintyLevel,
    pub recommended_next_steps: Vec<String>,
    pub watch_outs: Vec<String>,
    pub referral_recommended: bool,
    pub disclaimer: String,
    pub reasoning: String,
}

impl AiResponse {
    /// Strict field-by-field validation of a raw classifier payload.
    ///
    /// Every field must be present and type-correct; a violation is a
    /// classification failure, never a silent default.
    pub fn from_json(value: &Value) -> Result<Self, ValidationError> {
        let risk_tier = require_enum::<TriageLevel>(value, "riskTier")?;
        let danger_signs = require_string_array(value, "dangerSigns", false)?;
        let uncertainty = require_enum::<UncertaintyLevel>(value, "uncertainty")?;
        let recommended_next_steps =
            require_string_array(value, "recommendedNextSteps", true)?;
        let watch_outs = require_string_array(value, "watchOuts", true)?;
        let referral_recommended = require_bool(value, "referralRecommended")?;
        let disclaimer = require_string(value, "disclaimer")?;
        if disclaimer.trim().is_empty() {
            return Err(ValidationError::InvalidField {
                field: "disclaimer",
                reason: "must be non-empty".into(),
            });
        }
        let reasoning = require_string(value, "reasoning")?;

        Ok(Self {
            risk_tier,
            danger_signs,
            uncertainty,
            recommended_next_steps,
            watch_outs,
            referral_recommended,
            disclaimer,
            reasoning,
        })
    }
}

fn require_field<'a>(value: &'a Value, field: &'static str) -> Result<&'a Value, ValidationError> {
    match value.get(field) {
        Some(v) if !v.is_null() => Ok(v),
        _ => Err(ValidationError::MissingField(field)),
    }
}

fn require_string(value: &Value, field: &'static str) -> Result<String, ValidationError> {
    require_field(value, field)?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ValidationError::InvalidField {
            field,
            reason: "expected a string".into(),
        })
}

fn require_bool(value: &Value, field: &'static str) -> Result<bool, ValidationError> {
    require_field(value, field)?
        .as_bool()
        .ok_or_else(|| ValidationError::InvalidField {
            field,
            reason: "expected a boolean".into(),
        })
}

fn require_string_array(
    value: &Value,
    field: &'static str,
    non_empty: bool,
) -> Result<Vec<String>, ValidationError> {
    let arr = require_field(value, field)?
        .as_array()
        .ok_or_else(|| ValidationError::InvalidField {
            field,
            reason: "expected an array of strings".into(),
        })?;
    let mut out = Vec::with_capacity(arr.len());
    for item in arr {
        let s = item.as_str().ok_or_else(|| ValidationError::InvalidField {
            field,
            reason: "expected an array of strings".into(),
        })?;
        out.push(s.to_string());
    }
    if non_empty && out.is_empty() {
        return Err(ValidationError::InvalidField {
            field,
            reason: "must contain at least one entry".into(),
        });
    }
    Ok(out)
}

fn require_enum<T>(value: &Value, field: &'static str) -> Result<T, ValidationError>
where
    T: std::str::FromStr<Err = super::InvalidEnumValue>,
{
    let raw = require_string(value, field)?;
    raw.parse().map_err(|e: super::InvalidEnumValue| {
        ValidationError::InvalidField {
            field,
            reason: format!("out-of-enum value {:?}", e.value),
        }
    })
}

/// Structured intake extracted from free-text symptoms by the provider's
/// `normalize_intake` task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntakeSummary {
    pub primary_complaint: String,
    pub duration: String,
    /// "Mild" | "Moderate" | "Severe" | "Unknown". Kept as text: the
    /// sentinel "Unknown" drives follow-up generation.
    pub severity: String,
    pub extracted_symptoms: Vec<String>,
}

impl IntakeSummary {
    pub fn severity_unknown(&self) -> bool {
        self.severity.trim().is_empty() || self.severity.eq_ignore_ascii_case("unknown")
    }
}

/// Persisted outcome of one `perform_triage` call. Immutable after
/// creation; a later triage of the same encounter writes a new result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriageResult {
    pub id: Uuid,
    pub encounter_id: EncounterId,
    /// Final, safety-gated classification. `danger_signs` inside carries
    /// the detector output when the detector fired.
    #[serde(flatten)]
    pub response: AiResponse,
    pub followup_questions: Option<Vec<String>>,
    pub soap_note: Option<String>,
    pub patient_explanation: Option<String>,
    pub acoustic_summary: Option<String>,
    pub ai_latency_ms: u64,
    pub used_fallback: bool,
    pub timestamp: DateTime<Utc>,
    /// Retention marker: unix seconds after which storage may drop the row.
    pub expires_at: i64,
}

/// Audit record of a successful intelligent-classifier invocation.
///
/// Deliberately absent on danger-sign short-circuits and fallback paths:
/// a Decision row always means "the model was called and answered".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub id: Uuid,
    pub encounter_id: EncounterId,
    pub raw_response: Value,
    pub model: String,
    pub processing_ms: u64,
    pub timestamp: DateTime<Utc>,
    pub expires_at: i64,
}
