//! HTTP adapter to the MedGemma inference server.
//!
//! Speaks the server's `/infer` multi-task wire format. Prompt
//! construction and model hosting live server-side; this adapter only
//! shapes requests, strips code fences from model output, and runs the
//! strict response validation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::provider::{AiProvider, Assessment, ProviderError};
use crate::models::{AiResponse, Demographics, Encounter, IntakeSummary};

/// Async client for a remote MedGemma inference endpoint.
pub struct MedGemmaClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl MedGemmaClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: "medgemma-4b-it".to_string(),
            client,
            timeout_secs,
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    /// Probe the server's health endpoint. True when the model is loaded.
    pub async fn is_available(&self) -> Result<bool, ProviderError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Health {
            model_loaded: bool,
        }

        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_request_error(e))?;
        let health: Health = response
            .json()
            .await
            .map_err(|e| ProviderError::Json(e.to_string()))?;
        Ok(health.model_loaded)
    }

    fn map_request_error(&self, e: reqwest::Error) -> ProviderError {
        if e.is_connect() {
            ProviderError::Connection(self.base_url.clone())
        } else if e.is_timeout() {
            ProviderError::Timeout(self.timeout_secs)
        } else {
            ProviderError::Request(e.to_string())
        }
    }

    /// POST one `/infer` task and return the parsed JSON payload.
    async fn infer(&self, request: &InferRequest<'_>) -> Result<Value, ProviderError> {
        let url = format!("{}/infer", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| self.map_request_error(e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.map_request_error(e))?;
        if !status.is_success() {
            return Err(ProviderError::Http {
                status: status.as_u16(),
                body,
            });
        }

        parse_json_payload(&body)
    }

    fn request<'a>(
        &self,
        task: &'a str,
        symptoms: &'a str,
        demographics: &'a Demographics,
        followup_responses: &'a [String],
    ) -> InferRequest<'a> {
        InferRequest {
            symptoms,
            age: demographics.age,
            sex: demographics.sex.as_str(),
            location: &demographics.location,
            followup_responses,
            task,
        }
    }
}

/// Request body for `/infer`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InferRequest<'a> {
    symptoms: &'a str,
    age: u32,
    sex: &'a str,
    location: &'a str,
    followup_responses: &'a [String],
    task: &'a str,
}

/// Extract the first JSON object from model output, tolerating markdown
/// code fences and surrounding prose.
pub(crate) fn parse_json_payload(text: &str) -> Result<Value, ProviderError> {
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        if value.is_object() {
            return Ok(value);
        }
    }

    let start = text
        .find('{')
        .ok_or_else(|| ProviderError::Json("no JSON object in response".into()))?;
    let end = text
        .rfind('}')
        .ok_or_else(|| ProviderError::Json("unterminated JSON object in response".into()))?;
    if end < start {
        return Err(ProviderError::Json("unterminated JSON object in response".into()));
    }
    serde_json::from_str(&text[start..=end]).map_err(|e| ProviderError::Json(e.to_string()))
}

fn string_field(value: &Value, field: &str) -> Result<String, ProviderError> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ProviderError::Json(format!("missing {field} in response")))
}

impl AiProvider for MedGemmaClient {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn normalize_intake(
        &self,
        symptoms: &str,
        demographics: &Demographics,
    ) -> Result<IntakeSummary, ProviderError> {
        let payload = self
            .infer(&self.request("normalize_intake", symptoms, demographics, &[]))
            .await?;
        serde_json::from_value(payload).map_err(|e| ProviderError::Json(e.to_string()))
    }

    async fn generate_followup_questions(
        &self,
        symptoms: &str,
        demographics: &Demographics,
    ) -> Result<Vec<String>, ProviderError> {
        #[derive(Deserialize)]
        struct Questions {
            questions: Vec<String>,
        }

        let payload = self
            .infer(&self.request("generate_followup", symptoms, demographics, &[]))
            .await?;
        let parsed: Questions =
            serde_json::from_value(payload).map_err(|e| ProviderError::Json(e.to_string()))?;
        Ok(parsed.questions)
    }

    async fn generate_triage_assessment(
        &self,
        encounter: &Encounter,
        followup_responses: &[String],
        _protocols: Option<&str>,
    ) -> Result<Assessment, ProviderError> {
        let payload = self
            .infer(&self.request(
                "triage",
                &encounter.symptoms,
                &encounter.demographics,
                followup_responses,
            ))
            .await?;
        let response = AiResponse::from_json(&payload)?;
        let model = payload
            .get("model")
            .and_then(Value::as_str)
            .unwrap_or(&self.model)
            .to_string();
        Ok(Assessment {
            response,
            raw: payload,
            model,
        })
    }

    async fn generate_soap_note(
        &self,
        encounter: &Encounter,
        _response: &AiResponse,
    ) -> Result<String, ProviderError> {
        let payload = self
            .infer(&self.request(
                "generate_soap",
                &encounter.symptoms,
                &encounter.demographics,
                &[],
            ))
            .await?;
        string_field(&payload, "summary")
    }

    async fn generate_patient_explanation(
        &self,
        encounter: &Encounter,
        _response: &AiResponse,
    ) -> Result<String, ProviderError> {
        let payload = self
            .infer(&self.request(
                "explain_result",
                &encounter.symptoms,
                &encounter.demographics,
                &[],
            ))
            .await?;
        string_field(&payload, "summary")
    }

    async fn generate_referral_summary(
        &self,
        encounter: &Encounter,
        _response: &AiResponse,
    ) -> Result<String, ProviderError> {
        let payload = self
            .infer(&self.request(
                "generate_referral",
                &encounter.symptoms,
                &encounter.demographics,
                &[],
            ))
            .await?;
        string_field(&payload, "summary")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Sex;

    #[test]
    fn constructor_trims_trailing_slash() {
        let client = MedGemmaClient::new("http://localhost:8000/", 30);
        assert_eq!(client.base_url, "http://localhost:8000");
        assert_eq!(client.timeout_secs, 30);
    }

    #[test]
    fn request_body_uses_camel_case_wire_names() {
        let demographics = Demographics {
            age: 32,
            sex: Sex::Female,
            location: "Kampala".into(),
        };
        let answers = vec!["two days".to_string()];
        let client = MedGemmaClient::new("http://localhost:8000", 30);
        let body =
            serde_json::to_value(client.request("triage", "fever", &demographics, &answers))
                .unwrap();
        assert_eq!(body["symptoms"], "fever");
        assert_eq!(body["age"], 32);
        assert_eq!(body["sex"], "F");
        assert_eq!(body["followupResponses"][0], "two days");
        assert_eq!(body["task"], "triage");
    }

    #[test]
    fn bare_json_object_parses() {
        let value = parse_json_payload(r#"{"riskTier": "RED"}"#).unwrap();
        assert_eq!(value["riskTier"], "RED");
    }

    #[test]
    fn fenced_json_parses() {
        let text = "```json\n{\"questions\": [\"How long?\"]}\n```";
        let value = parse_json_payload(text).unwrap();
        assert_eq!(value["questions"][0], "How long?");
    }

    #[test]
    fn json_embedded_in_prose_parses() {
        let text = "Here is the assessment:\n{\"riskTier\": \"GREEN\"}\nHope this helps.";
        let value = parse_json_payload(text).unwrap();
        assert_eq!(value["riskTier"], "GREEN");
    }

    #[test]
    fn plain_text_is_a_json_error() {
        let err = parse_json_payload("I could not produce JSON.").unwrap_err();
        assert!(matches!(err, ProviderError::Json(_)));
    }

    #[test]
    fn model_id_defaults_and_overrides() {
        let client = MedGemmaClient::new("http://localhost:8000", 30);
        assert_eq!(client.model_id(), "medgemma-4b-it");
        let client = client.with_model("medgemma:27b");
        assert_eq!(client.model_id(), "medgemma:27b");
    }
}
