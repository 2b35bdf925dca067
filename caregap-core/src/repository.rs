//! Resource set của bệnh nhân và kho lưu giữ chúng.
//!
//! Mỗi set là snapshot bất biến. Nhập dữ liệu tạo ra giá trị kho mới; kho cũ
//! vẫn giữ nguyên, nên lần nhập lỗi không để lại trạng thái dở dang.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{IngestError, Observation, Patient, RelatedRecords};

/// Nguồn gốc của resource set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Seed,
    Upload,
}

/// Bệnh nhân cùng mọi hồ sơ tham chiếu tới họ.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceSet {
    pub patient: Patient,
    pub origin: Origin,
    pub records: RelatedRecords,
}

impl ResourceSet {
    pub fn new(patient: Patient, origin: Origin, records: RelatedRecords) -> Self {
        Self {
            patient,
            origin,
            records,
        }
    }

    /// Bản sao của set với thêm một observation ở cuối.
    pub fn with_observation(&self, observation: Observation) -> Self {
        let mut next = self.clone();
        next.records.observations.push(observation);
        next
    }
}

/// Các resource set theo mã bệnh nhân.
#[derive(Debug, Clone, Default)]
pub struct Repository {
    sets: BTreeMap<String, Arc<ResourceSet>>,
}

impl Repository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, patient_id: &str) -> Option<&ResourceSet> {
        self.sets.get(patient_id).map(Arc::as_ref)
    }

    pub fn patient_ids(&self) -> impl Iterator<Item = &str> {
        self.sets.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Kho mới có thêm `set`, thay set cũ của cùng bệnh nhân nếu có.
    pub fn with_set(&self, set: ResourceSet) -> Self {
        let mut sets = self.sets.clone();
        tracing::info!(
            patient = %set.patient.id,
            origin = ?set.origin,
            "resource set accepted"
        );
        sets.insert(set.patient.id.clone(), Arc::new(set));
        Self { sets }
    }

    /// Kho mới trong đó set của bệnh nhân có thêm một observation.
    pub fn with_observation(
        &self,
        patient_id: &str,
        observation: Observation,
    ) -> Result<Self, IngestError> {
        let current = self
            .sets
            .get(patient_id)
            .ok_or_else(|| IngestError::UnknownPatient(patient_id.to_string()))?;
        let updated = current.with_observation(observation);
        let mut sets = self.sets.clone();
        sets.insert(patient_id.to_string(), Arc::new(updated));
        tracing::info!(patient = %patient_id, "observation accepted");
        Ok(Self { sets })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Gender;

    fn set(id: &str) -> ResourceSet {
        ResourceSet::new(
            Patient {
                id: id.to_string(),
                given_name: None,
                family_name: None,
                gender: Gender::Unknown,
                birth_date: None,
            },
            Origin::Seed,
            RelatedRecords::default(),
        )
    }

    fn observation(id: &str) -> Observation {
        Observation {
            id: id.to_string(),
            subject: "Patient/p1".to_string(),
            effective: None,
            label: Some("Hemoglobin A1c".to_string()),
            value: None,
        }
    }

    #[test]
    fn ingest_returns_new_snapshot() {
        let empty = Repository::new();
        assert!(empty.is_empty());

        let before = empty.with_set(set("p1"));
        assert!(empty.is_empty());
        assert!(!before.is_empty());
        let after = before.with_observation("p1", observation("o1")).unwrap();

        assert!(before.get("p1").unwrap().records.observations.is_empty());
        assert_eq!(after.get("p1").unwrap().records.observations.len(), 1);
    }

    #[test]
    fn unknown_patient_is_rejected() {
        let repo = Repository::new().with_set(set("p1"));
        let err = repo.with_observation("p2", observation("o1")).unwrap_err();
        assert!(matches!(err, IngestError::UnknownPatient(id) if id == "p2"));
        assert_eq!(repo.len(), 1);
    }

    #[test]
    fn sets_for_different_patients_coexist() {
        let mut upload = set("p2");
        upload.origin = Origin::Upload;
        let repo = Repository::new().with_set(set("p1")).with_set(upload);

        assert_eq!(repo.patient_ids().collect::<Vec<_>>(), vec!["p1", "p2"]);
        assert_eq!(repo.get("p2").unwrap().origin, Origin::Upload);
    }
}
