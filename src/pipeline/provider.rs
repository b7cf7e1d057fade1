//! The AI capability contract and a configurable mock implementation.
//!
//! The pipeline depends on these operations but never on how they are
//! served; see `medgemma.rs` for the HTTP adapter. Every operation may
//! fail, and the orchestrator treats failure as a first-class branch.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use serde_json::Value;
use thiserror::Error;

use crate::models::{AiResponse, Demographics, Encounter, IntakeSummary, ValidationError};

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("cannot reach inference server at {0}")]
    Connection(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("inference server returned status {status}: {body}")]
    Http { status: u16, body: String },

    #[error("http client error: {0}")]
    Request(String),

    #[error("response is not valid JSON: {0}")]
    Json(String),

    #[error("invalid classifier response: {0}")]
    Validation(#[from] ValidationError),
}

/// A successful classifier invocation: the validated response plus the raw
/// payload and model identity, which feed the Decision audit record.
#[derive(Debug, Clone)]
pub struct Assessment {
    pub response: AiResponse,
    pub raw: Value,
    pub model: String,
}

/// Pluggable intelligent classifier.
pub trait AiProvider {
    /// Model identity recorded on Decision audit rows.
    fn model_id(&self) -> &str;

    /// Extract structured intake from free-text symptoms.
    fn normalize_intake(
        &self,
        symptoms: &str,
        demographics: &Demographics,
    ) -> impl Future<Output = Result<IntakeSummary, ProviderError>> + Send;

    /// Adaptive follow-up questions for an under-specified complaint.
    fn generate_followup_questions(
        &self,
        symptoms: &str,
        demographics: &Demographics,
    ) -> impl Future<Output = Result<Vec<String>, ProviderError>> + Send;

    /// Full triage assessment.
    fn generate_triage_assessment(
        &self,
        encounter: &Encounter,
        followup_responses: &[String],
        protocols: Option<&str>,
    ) -> impl Future<Output = Result<Assessment, ProviderError>> + Send;

    /// Clinician-facing SOAP note for the resolved assessment.
    fn generate_soap_note(
        &self,
        encounter: &Encounter,
        response: &AiResponse,
    ) -> impl Future<Output = Result<String, ProviderError>> + Send;

    /// Plain-language explanation for the patient.
    fn generate_patient_explanation(
        &self,
        encounter: &Encounter,
        response: &AiResponse,
    ) -> impl Future<Output = Result<String, ProviderError>> + Send;

    /// Referral summary for the receiving facility.
    fn generate_referral_summary(
        &self,
        encounter: &Encounter,
        response: &AiResponse,
    ) -> impl Future<Output = Result<String, ProviderError>> + Send;
}

type MockResult<T> = Result<T, String>;

/// Mock provider for pipeline tests: canned or failing responses per task,
/// with call counters so tests can assert which stages actually ran.
pub struct MockAiProvider {
    intake: Mutex<MockResult<IntakeSummary>>,
    questions: Mutex<MockResult<Vec<String>>>,
    assessment: Mutex<MockResult<Value>>,
    narration: Mutex<MockResult<String>>,
    pub normalize_calls: AtomicU32,
    pub question_calls: AtomicU32,
    pub assessment_calls: AtomicU32,
    pub narration_calls: AtomicU32,
}

impl Default for MockAiProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAiProvider {
    pub fn new() -> Self {
        Self {
            intake: Mutex::new(Ok(IntakeSummary {
                primary_complaint: "headache".into(),
                duration: "2 days".into(),
                severity: "Moderate".into(),
                extracted_symptoms: vec!["headache".into()],
            })),
            questions: Mutex::new(Ok(vec![
                "How long have you had these symptoms?".into(),
                "On a scale of 1 to 10, how severe is it right now?".into(),
                "Has this happened before?".into(),
            ])),
            assessment: Mutex::new(Ok(serde_json::json!({
                "riskTier": "GREEN",
                "dangerSigns": [],
                "uncertainty": "LOW",
                "recommendedNextSteps": ["Home care and monitor symptoms."],
                "watchOuts": ["If symptoms worsen, seek care promptly."],
                "referralRecommended": false,
                "disclaimer": "This is not a diagnosis. Seek professional medical care.",
                "reasoning": "Model assessment."
            }))),
            narration: Mutex::new(Ok("Model-written narrative.".into())),
            normalize_calls: AtomicU32::new(0),
            question_calls: AtomicU32::new(0),
            assessment_calls: AtomicU32::new(0),
            narration_calls: AtomicU32::new(0),
        }
    }

    pub fn with_intake(self, intake: IntakeSummary) -> Self {
        *self.intake.lock().unwrap() = Ok(intake);
        self
    }

    pub fn with_unknown_severity(self) -> Self {
        let current = self.intake.lock().unwrap().clone();
        if let Ok(mut intake) = current {
            intake.severity = "Unknown".into();
            *self.intake.lock().unwrap() = Ok(intake);
        }
        self
    }

    pub fn with_assessment(self, payload: Value) -> Self {
        *self.assessment.lock().unwrap() = Ok(payload);
        self
    }

    pub fn failing_normalize(self) -> Self {
        *self.intake.lock().unwrap() = Err("normalize unavailable".into());
        self
    }

    pub fn failing_assessment(self) -> Self {
        *self.assessment.lock().unwrap() = Err("assessment unavailable".into());
        self
    }

    pub fn failing_narration(self) -> Self {
        *self.narration.lock().unwrap() = Err("narration unavailable".into());
        self
    }

    fn unwrap_mock<T: Clone>(slot: &Mutex<MockResult<T>>) -> Result<T, ProviderError> {
        slot.lock()
            .unwrap()
            .clone()
            .map_err(ProviderError::Connection)
    }
}

impl AiProvider for MockAiProvider {
    fn model_id(&self) -> &str {
        "mock-model"
    }

    async fn normalize_intake(
        &self,
        _symptoms: &str,
        _demographics: &Demographics,
    ) -> Result<IntakeSummary, ProviderError> {
        self.normalize_calls.fetch_add(1, Ordering::SeqCst);
        Self::unwrap_mock(&self.intake)
    }

    async fn generate_followup_questions(
        &self,
        _symptoms: &str,
        _demographics: &Demographics,
    ) -> Result<Vec<String>, ProviderError> {
        self.question_calls.fetch_add(1, Ordering::SeqCst);
        Self::unwrap_mock(&self.questions)
    }

    async fn generate_triage_assessment(
        &self,
        _encounter: &Encounter,
        _followup_responses: &[String],
        _protocols: Option<&str>,
    ) -> Result<Assessment, ProviderError> {
        self.assessment_calls.fetch_add(1, Ordering::SeqCst);
        let raw = Self::unwrap_mock(&self.assessment)?;
        let response = AiResponse::from_json(&raw)?;
        Ok(Assessment {
            response,
            raw,
            model: self.model_id().to_string(),
        })
    }

    async fn generate_soap_note(
        &self,
        _encounter: &Encounter,
        _response: &AiResponse,
    ) -> Result<String, ProviderError> {
        self.narration_calls.fetch_add(1, Ordering::SeqCst);
        Self::unwrap_mock(&self.narration)
    }

    async fn generate_patient_explanation(
        &self,
        _encounter: &Encounter,
        _response: &AiResponse,
    ) -> Result<String, ProviderError> {
        self.narration_calls.fetch_add(1, Ordering::SeqCst);
        Self::unwrap_mock(&self.narration)
    }

    async fn generate_referral_summary(
        &self,
        _encounter: &Encounter,
        _response: &AiResponse,
    ) -> Result<String, ProviderError> {
        self.narration_calls.fetch_add(1, Ordering::SeqCst);
        Self::unwrap_mock(&self.narration)
    }
}
