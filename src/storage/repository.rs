use serde_json::json;

use super::{Storage, StorageError, StoreItem};
use crate::models::{Decision, Encounter, EncounterId, EncounterStatus, TriageResult};

/// Typed persistence layer over the storage port.
///
/// Key conventions: one partition per encounter (`ENCOUNTER#<id>`), with
/// the encounter row at sort key `META` and results/decisions under
/// timestamped sort keys so concurrent triage calls never clobber each
/// other's rows (last-write-wins applies to the encounter row only).
pub struct TriageRepository<S: Storage> {
    store: S,
}

fn encounter_pk(id: &EncounterId) -> String {
    format!("ENCOUNTER#{id}")
}

const META_SK: &str = "META";

impl<S: Storage> TriageRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn put_encounter(&self, encounter: &Encounter) -> Result<(), StorageError> {
        self.store
            .put(StoreItem {
                pk: encounter_pk(&encounter.id),
                sk: META_SK.into(),
                body: serde_json::to_value(encounter)?,
                expires_at: super::expiry_timestamp(encounter.created_at),
            })
            .await
    }

    pub async fn get_encounter(
        &self,
        id: &EncounterId,
    ) -> Result<Option<Encounter>, StorageError> {
        match self.store.get(&encounter_pk(id), META_SK).await? {
            None => Ok(None),
            Some(item) => Ok(Some(serde_json::from_value(item.body)?)),
        }
    }

    pub async fn set_encounter_status(
        &self,
        id: &EncounterId,
        status: EncounterStatus,
    ) -> Result<(), StorageError> {
        self.store
            .update(
                &encounter_pk(id),
                META_SK,
                json!({ "status": status.as_str() }),
            )
            .await
    }

    pub async fn put_result(&self, result: &TriageResult) -> Result<(), StorageError> {
        self.store
            .put(StoreItem {
                pk: encounter_pk(&result.encounter_id),
                sk: format!("RESULT#{}#{}", result.timestamp.timestamp_millis(), result.id),
                body: serde_json::to_value(result)?,
                expires_at: result.expires_at,
            })
            .await
    }

    pub async fn list_results(
        &self,
        id: &EncounterId,
    ) -> Result<Vec<TriageResult>, StorageError> {
        let items = self.store.query(&encounter_pk(id), Some("RESULT#")).await?;
        items
            .into_iter()
            .map(|item| serde_json::from_value(item.body).map_err(StorageError::from))
            .collect()
    }

    pub async fn put_decision(&self, decision: &Decision) -> Result<(), StorageError> {
        self.store
            .put(StoreItem {
                pk: encounter_pk(&decision.encounter_id),
                sk: format!(
                    "DECISION#{}#{}",
                    decision.timestamp.timestamp_millis(),
                    decision.id
                ),
                body: serde_json::to_value(decision)?,
                expires_at: decision.expires_at,
            })
            .await
    }

    pub async fn list_decisions(
        &self,
        id: &EncounterId,
    ) -> Result<Vec<Decision>, StorageError> {
        let items = self
            .store
            .query(&encounter_pk(id), Some("DECISION#"))
            .await?;
        items
            .into_iter()
            .map(|item| serde_json::from_value(item.body).map_err(StorageError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AiResponse, Demographics, Sex, TriageLevel, UncertaintyLevel};
    use crate::storage::MemoryStore;
    use chrono::Utc;
    use uuid::Uuid;

    fn sample_encounter() -> Encounter {
        Encounter::new(
            Demographics {
                age: 32,
                sex: Sex::Female,
                location: "Kampala".into(),
            },
            "fever and cough for two days",
        )
    }

    fn sample_response() -> AiResponse {
        AiResponse {
            risk_tier: TriageLevel::Yellow,
            danger_signs: vec![],
            uncertainty: UncertaintyLevel::Medium,
            recommended_next_steps: vec!["Visit a clinic within 24 hours.".into()],
            watch_outs: vec!["Worsening fever".into()],
            referral_recommended: true,
            disclaimer: "This is not a diagnosis. Seek professional medical care.".into(),
            reasoning: "test".into(),
        }
    }

    fn sample_result(encounter_id: EncounterId) -> TriageResult {
        let now = Utc::now();
        TriageResult {
            id: Uuid::new_v4(),
            encounter_id,
            response: sample_response(),
            followup_questions: None,
            soap_note: None,
            patient_explanation: None,
            acoustic_summary: None,
            ai_latency_ms: 50,
            used_fallback: false,
            timestamp: now,
            expires_at: crate::storage::expiry_timestamp(now),
        }
    }

    #[tokio::test]
    async fn encounter_round_trips() {
        let repo = TriageRepository::new(MemoryStore::new());
        let enc = sample_encounter();
        repo.put_encounter(&enc).await.unwrap();
        let loaded = repo.get_encounter(&enc.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, enc.id);
        assert_eq!(loaded.symptoms, enc.symptoms);
        assert_eq!(loaded.status, EncounterStatus::Created);
    }

    #[tokio::test]
    async fn missing_encounter_is_none() {
        let repo = TriageRepository::new(MemoryStore::new());
        assert!(repo.get_encounter(&Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn status_update_preserves_other_fields() {
        let repo = TriageRepository::new(MemoryStore::new());
        let enc = sample_encounter();
        repo.put_encounter(&enc).await.unwrap();
        repo.set_encounter_status(&enc.id, EncounterStatus::Completed)
            .await
            .unwrap();
        let loaded = repo.get_encounter(&enc.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, EncounterStatus::Completed);
        assert_eq!(loaded.symptoms, enc.symptoms);
    }

    #[tokio::test]
    async fn results_and_decisions_are_listed_separately() {
        let repo = TriageRepository::new(MemoryStore::new());
        let enc = sample_encounter();
        repo.put_encounter(&enc).await.unwrap();

        repo.put_result(&sample_result(enc.id)).await.unwrap();
        repo.put_result(&sample_result(enc.id)).await.unwrap();

        let decision = Decision {
            id: Uuid::new_v4(),
            encounter_id: enc.id,
            raw_response: serde_json::json!({"riskTier": "YELLOW"}),
            model: "medgemma-4b-it".into(),
            processing_ms: 420,
            timestamp: Utc::now(),
            expires_at: 0,
        };
        repo.put_decision(&decision).await.unwrap();

        assert_eq!(repo.list_results(&enc.id).await.unwrap().len(), 2);
        let decisions = repo.list_decisions(&enc.id).await.unwrap();
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].model, "medgemma-4b-it");
    }

    #[tokio::test]
    async fn concurrent_results_never_collide() {
        // Same timestamp, different result ids: both rows must survive.
        let repo = TriageRepository::new(MemoryStore::new());
        let enc = sample_encounter();
        let now = Utc::now();
        let mut a = sample_result(enc.id);
        let mut b = sample_result(enc.id);
        a.timestamp = now;
        b.timestamp = now;
        repo.put_result(&a).await.unwrap();
        repo.put_result(&b).await.unwrap();
        assert_eq!(repo.list_results(&enc.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn repository_works_over_sqlite() {
        let repo = TriageRepository::new(crate::storage::SqliteStore::open_memory().unwrap());
        let enc = sample_encounter();
        repo.put_encounter(&enc).await.unwrap();
        repo.put_result(&sample_result(enc.id)).await.unwrap();
        repo.set_encounter_status(&enc.id, EncounterStatus::Completed)
            .await
            .unwrap();
        assert_eq!(repo.list_results(&enc.id).await.unwrap().len(), 1);
        assert_eq!(
            repo.get_encounter(&enc.id).await.unwrap().unwrap().status,
            EncounterStatus::Completed
        );
    }
}
