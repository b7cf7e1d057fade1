//! Triage pipeline orchestrator.
//!
//! One pass per call:
//! load -> acoustic? -> normalize -> followup? -> danger check ->
//! {RED shortcut | classify} -> safety gate -> narrate -> persist.
//!
//! Each invocation is a self-contained task; concurrent calls for the
//! same encounter are allowed and last-write-wins on the encounter row
//! (results and decisions live under their own sort keys).

use std::future::Future;
use std::time::Instant;

use chrono::Utc;
use uuid::Uuid;

use super::acoustic::{AcousticAnalyzer, NoopAnalyzer};
use super::danger;
use super::heuristic::heuristic_triage;
use super::narrative;
use super::provider::{AiProvider, Assessment, ProviderError};
use super::rules;
use super::safety;
use super::TriageError;
use crate::config::{TriageConfig, TriageMode, DEFAULT_DISCLAIMER};
use crate::models::{
    AiResponse, Encounter, EncounterId, EncounterStatus, TriageLevel, TriageResult,
    UncertaintyLevel,
};
use crate::models::Decision;
use crate::storage::{expiry_timestamp, RetryingStore, Storage, TriageRepository};

/// Per-call input beyond the stored encounter.
#[derive(Debug, Clone, Default)]
pub struct TriageRequest {
    /// Answers to previously issued follow-up questions, if any.
    pub followup_responses: Vec<String>,
    /// Optional audio sample for acoustic analysis.
    pub audio: Option<Vec<u8>>,
    /// Optional protocol text handed to the classifier.
    pub protocols: Option<String>,
}

/// How the tier was produced. The orchestrator pattern-matches this to
/// decide Decision-record logging: only `Ai` writes one.
pub enum ClassificationOutcome {
    Ai {
        assessment: Assessment,
        latency_ms: u64,
    },
    Fallback {
        response: AiResponse,
        latency_ms: u64,
    },
    DangerShortCircuit {
        response: AiResponse,
    },
}

pub struct TriageOrchestrator<A, S, X = NoopAnalyzer>
where
    A: AiProvider,
    S: Storage,
    X: AcousticAnalyzer,
{
    provider: A,
    repo: TriageRepository<S>,
    acoustic: Option<X>,
    config: TriageConfig,
}

impl<A: AiProvider, S: Storage> TriageOrchestrator<A, S, NoopAnalyzer> {
    pub fn new(provider: A, repo: TriageRepository<S>, config: TriageConfig) -> Self {
        Self {
            provider,
            repo,
            acoustic: None,
            config,
        }
    }
}

impl<A: AiProvider, S: Storage + Sync> TriageOrchestrator<A, RetryingStore<S>, NoopAnalyzer> {
    /// Construct over a raw storage backend, wrapping it in the bounded
    /// retry discipline with `config.storage_retry_base` as the backoff
    /// base.
    pub fn with_retrying_store(provider: A, backend: S, config: TriageConfig) -> Self {
        let repo = TriageRepository::new(RetryingStore::new(
            backend,
            config.storage_retry_base,
        ));
        Self::new(provider, repo, config)
    }
}

impl<A, S, X> TriageOrchestrator<A, S, X>
where
    A: AiProvider,
    S: Storage,
    X: AcousticAnalyzer,
{
    pub fn with_acoustic(
        provider: A,
        repo: TriageRepository<S>,
        analyzer: X,
        config: TriageConfig,
    ) -> Self {
        Self {
            provider,
            repo,
            acoustic: Some(analyzer),
            config,
        }
    }

    pub fn repository(&self) -> &TriageRepository<S> {
        &self.repo
    }

    pub fn provider(&self) -> &A {
        &self.provider
    }

    /// Bound an AI call by the configured timeout; timeout is failure.
    async fn with_ai_timeout<T>(
        &self,
        fut: impl Future<Output = Result<T, ProviderError>>,
    ) -> Result<T, ProviderError> {
        match tokio::time::timeout(self.config.ai_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(self.config.ai_timeout.as_secs())),
        }
    }

    /// Run the full triage pipeline for one encounter.
    ///
    /// Only two failures surface to the caller: a missing encounter and
    /// exhausted storage retries. Classifier and narration failures
    /// degrade into the result itself.
    pub async fn perform_triage(
        &self,
        encounter_id: EncounterId,
        request: TriageRequest,
    ) -> Result<TriageResult, TriageError> {
        let encounter = self
            .repo
            .get_encounter(&encounter_id)
            .await?
            .ok_or(TriageError::EncounterNotFound(encounter_id))?;

        if self.config.mode == TriageMode::Mock {
            return self.mock_triage(&encounter).await;
        }

        // Acoustic analysis, when supplied. Failure never aborts.
        let mut acoustic_failed = false;
        let acoustic_summary = match (&self.acoustic, &request.audio) {
            (Some(analyzer), Some(audio)) => match analyzer.analyze(audio).await {
                Ok(summary) => Some(summary),
                Err(e) => {
                    tracing::warn!(encounter_id = %encounter_id, error = %e, "acoustic analysis failed");
                    acoustic_failed = true;
                    None
                }
            },
            _ => None,
        };

        // Intake normalization. Failure abandons the whole AI path.
        let intake = match self
            .with_ai_timeout(
                self.provider
                    .normalize_intake(&encounter.symptoms, &encounter.demographics),
            )
            .await
        {
            Ok(intake) => Some(intake),
            Err(e) => {
                tracing::warn!(encounter_id = %encounter_id, error = %e, "intake normalization failed; abandoning AI path");
                None
            }
        };
        let ai_available = intake.is_some();

        // Candidate follow-up questions, returned to the caller for the
        // next turn. Only when nothing was answered yet and severity is
        // still unknown.
        let followup_questions = if request.followup_responses.is_empty()
            && intake.as_ref().is_some_and(|i| i.severity_unknown())
        {
            let questions = match self
                .with_ai_timeout(
                    self.provider
                        .generate_followup_questions(&encounter.symptoms, &encounter.demographics),
                )
                .await
            {
                Ok(questions) if !questions.is_empty() => questions,
                Ok(_) => rules::generate_followup_questions(&encounter.symptoms),
                Err(e) => {
                    tracing::warn!(encounter_id = %encounter_id, error = %e, "AI follow-up generation failed; using rule-based questions");
                    rules::generate_followup_questions(&encounter.symptoms)
                }
            };
            Some(questions)
        } else {
            None
        };

        // Danger scan over all gathered text.
        let danger_input = gather_danger_input(
            &encounter,
            intake.as_ref(),
            &request.followup_responses,
            acoustic_summary.as_deref(),
        );
        let danger_signs = danger::detect(&danger_input);

        let outcome = if !danger_signs.is_empty() {
            tracing::warn!(encounter_id = %encounter_id, signs = ?danger_signs, "danger signs detected; short-circuiting to RED");
            ClassificationOutcome::DangerShortCircuit {
                response: danger_response(danger_signs),
            }
        } else if ai_available {
            let call_started = Instant::now();
            let attempt = self
                .with_ai_timeout(self.provider.generate_triage_assessment(
                    &encounter,
                    &request.followup_responses,
                    request.protocols.as_deref(),
                ))
                .await;
            let latency_ms = call_started.elapsed().as_millis() as u64;
            match attempt {
                Ok(assessment) => ClassificationOutcome::Ai {
                    assessment,
                    latency_ms,
                },
                Err(e) => {
                    tracing::warn!(encounter_id = %encounter_id, error = %e, latency_ms, "classifier unavailable; using rule-based fallback");
                    ClassificationOutcome::Fallback {
                        response: fallback_response(&encounter),
                        latency_ms,
                    }
                }
            }
        } else {
            ClassificationOutcome::Fallback {
                response: fallback_response(&encounter),
                latency_ms: 0,
            }
        };

        let (mut response, used_fallback, ai_latency_ms, decision) = match outcome {
            ClassificationOutcome::Ai {
                assessment,
                latency_ms,
            } => (
                assessment.response,
                false,
                latency_ms,
                Some((assessment.raw, assessment.model, latency_ms)),
            ),
            ClassificationOutcome::Fallback {
                response,
                latency_ms,
            } => (response, true, latency_ms, None),
            ClassificationOutcome::DangerShortCircuit { response } => (response, false, 0, None),
        };

        if acoustic_failed {
            response
                .reasoning
                .push_str(" Acoustic sample analysis was unavailable for this assessment.");
        }

        // Safety gate. Non-negotiable, applies to every path.
        let response = safety::ensure_disclaimer(safety::apply_safety_constraints(response));

        // Narration: best effort, deterministic templates on failure.
        let (soap_note, patient_explanation) = self
            .narrate(&encounter, &response, ai_available)
            .await;

        let now = Utc::now();
        let result = TriageResult {
            id: Uuid::new_v4(),
            encounter_id,
            response,
            followup_questions,
            soap_note: Some(soap_note),
            patient_explanation: Some(patient_explanation),
            acoustic_summary,
            ai_latency_ms,
            used_fallback,
            timestamp: now,
            expires_at: expiry_timestamp(now),
        };

        self.repo.put_result(&result).await?;
        if let Some((raw_response, model, processing_ms)) = decision {
            self.repo
                .put_decision(&Decision {
                    id: Uuid::new_v4(),
                    encounter_id,
                    raw_response,
                    model,
                    processing_ms,
                    timestamp: now,
                    expires_at: expiry_timestamp(now),
                })
                .await?;
        }
        self.repo
            .set_encounter_status(&encounter_id, EncounterStatus::Completed)
            .await?;

        tracing::info!(
            encounter_id = %encounter_id,
            tier = result.response.risk_tier.as_str(),
            used_fallback,
            ai_latency_ms,
            "triage completed"
        );
        Ok(result)
    }

    async fn narrate(
        &self,
        encounter: &Encounter,
        response: &AiResponse,
        ai_available: bool,
    ) -> (String, String) {
        let soap_note = if ai_available {
            match self
                .with_ai_timeout(self.provider.generate_soap_note(encounter, response))
                .await
            {
                Ok(note) => note,
                Err(e) => {
                    tracing::warn!(encounter_id = %encounter.id, error = %e, "SOAP generation failed; using template");
                    narrative::fallback_soap_note(encounter, response)
                }
            }
        } else {
            narrative::fallback_soap_note(encounter, response)
        };

        let patient_explanation = if ai_available {
            match self
                .with_ai_timeout(
                    self.provider
                        .generate_patient_explanation(encounter, response),
                )
                .await
            {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(encounter_id = %encounter.id, error = %e, "explanation generation failed; using template");
                    narrative::fallback_patient_explanation(encounter, response)
                }
            }
        } else {
            narrative::fallback_patient_explanation(encounter, response)
        };

        (soap_note, patient_explanation)
    }

    /// Mock-mode pass: deterministic keyword tier, no provider calls, no
    /// Decision record. Results are still persisted so demo flows behave
    /// end to end.
    async fn mock_triage(&self, encounter: &Encounter) -> Result<TriageResult, TriageError> {
        let response = safety::ensure_disclaimer(heuristic_triage(&encounter.symptoms));
        let soap_note = narrative::fallback_soap_note(encounter, &response);
        let patient_explanation = narrative::fallback_patient_explanation(encounter, &response);

        let now = Utc::now();
        let result = TriageResult {
            id: Uuid::new_v4(),
            encounter_id: encounter.id,
            response,
            followup_questions: None,
            soap_note: Some(soap_note),
            patient_explanation: Some(patient_explanation),
            acoustic_summary: None,
            ai_latency_ms: 0,
            used_fallback: false,
            timestamp: now,
            expires_at: expiry_timestamp(now),
        };

        self.repo.put_result(&result).await?;
        self.repo
            .set_encounter_status(&encounter.id, EncounterStatus::Completed)
            .await?;
        tracing::info!(encounter_id = %encounter.id, tier = result.response.risk_tier.as_str(), "mock triage completed");
        Ok(result)
    }
}

/// Concatenate everything the danger scanner should see.
///
/// The raw symptom text is deliberately included alongside the normalized
/// complaint and extracted symptoms: a red-flag phrase that normalization
/// rewrote away (or that never got normalized at all) must still be caught.
fn gather_danger_input(
    encounter: &Encounter,
    intake: Option<&crate::models::IntakeSummary>,
    followup_responses: &[String],
    acoustic_summary: Option<&str>,
) -> String {
    let mut parts: Vec<&str> = vec![encounter.symptoms.as_str()];
    if let Some(intake) = intake {
        parts.push(intake.primary_complaint.as_str());
        parts.extend(intake.extracted_symptoms.iter().map(String::as_str));
    }
    parts.extend(followup_responses.iter().map(String::as_str));
    if let Some(summary) = acoustic_summary {
        parts.push(summary);
    }
    parts.join(". ")
}

fn danger_response(danger_signs: Vec<String>) -> AiResponse {
    let (recommended_next_steps, watch_outs, referral_recommended) =
        rules::tier_template(TriageLevel::Red);
    let reasoning = format!(
        "Danger sign(s) detected: {}. Escalated to RED without classifier consultation.",
        danger_signs.join(", ")
    );
    AiResponse {
        risk_tier: TriageLevel::Red,
        danger_signs,
        uncertainty: UncertaintyLevel::Low,
        recommended_next_steps,
        watch_outs,
        referral_recommended,
        disclaimer: DEFAULT_DISCLAIMER.into(),
        reasoning,
    }
}

/// Rule-based substitute when the classifier is unavailable. Uncertainty
/// is forced HIGH so the safety gate never lets a GREEN fallback through.
fn fallback_response(encounter: &Encounter) -> AiResponse {
    let mut response =
        rules::generate_triage_response(encounter.demographics.age, &encounter.symptoms, &[]);
    response.uncertainty = UncertaintyLevel::High;
    response.disclaimer = format!("[Automated fallback] {}", response.disclaimer);
    response.reasoning = format!(
        "AI classifier unavailable; rule-based fallback applied. {}",
        response.reasoning
    );
    response
}
