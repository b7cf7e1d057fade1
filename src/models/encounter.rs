use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{EncounterStatus, Sex};

pub type EncounterId = Uuid;

/// Basic patient demographics collected at intake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Demographics {
    pub age: u32,
    pub sex: Sex,
    pub location: String,
}

/// A patient-reported encounter, created by an intake collaborator
/// (SMS/USSD/voice/app adapter). The pipeline only ever mutates its
/// status to `completed`; deletion and retention belong to storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Encounter {
    pub id: EncounterId,
    #[serde(flatten)]
    pub demographics: Demographics,
    pub symptoms: String,
    pub status: EncounterStatus,
    pub offline_created: bool,
    pub created_at: DateTime<Utc>,
}

impl Encounter {
    pub fn new(demographics: Demographics, symptoms: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            demographics,
            symptoms: symptoms.into(),
            status: EncounterStatus::Created,
            offline_created: false,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_encounter_starts_created() {
        let enc = Encounter::new(
            Demographics {
                age: 32,
                sex: Sex::Female,
                location: "Kampala".into(),
            },
            "fever and cough for two days",
        );
        assert_eq!(enc.status, EncounterStatus::Created);
        assert!(!enc.offline_created);
    }

    #[test]
    fn encounter_serializes_demographics_inline() {
        let enc = Encounter::new(
            Demographics {
                age: 70,
                sex: Sex::Male,
                location: "Nairobi".into(),
            },
            "cough",
        );
        let v = serde_json::to_value(&enc).unwrap();
        assert_eq!(v["age"], 70);
        assert_eq!(v["sex"], "M");
        assert_eq!(v["status"], "created");
    }
}
