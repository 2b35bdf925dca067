//! Bệnh nhân mẫu dựng sẵn, dùng khi không truyền bundle.

use caregap_core::{
    Condition, Encounter, Gender, Immunization, Observation, ObservationValue, Origin, Patient,
    RelatedRecords, Repository, ResourceSet,
};
use chrono::NaiveDate;

fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(y, m, d)
}

fn quantity(value: f64, unit: &str) -> Option<ObservationValue> {
    Some(ObservationValue::Quantity {
        value,
        unit: Some(unit.to_string()),
    })
}

pub fn seed_repository() -> Repository {
    Repository::new()
        .with_set(james_carter())
        .with_set(linda_nguyen())
}

fn james_carter() -> ResourceSet {
    let subject = "Patient/seed-001".to_string();
    ResourceSet::new(
        Patient {
            id: "seed-001".to_string(),
            given_name: Some("James".to_string()),
            family_name: Some("Carter".to_string()),
            gender: Gender::Male,
            birth_date: date(1957, 9, 3),
        },
        Origin::Seed,
        RelatedRecords {
            conditions: vec![
                Condition {
                    id: "seed-001-dm".to_string(),
                    subject: subject.clone(),
                    display: Some("Type 2 diabetes mellitus".to_string()),
                    clinical_status: Some("active".to_string()),
                },
                Condition {
                    id: "seed-001-htn".to_string(),
                    subject: subject.clone(),
                    display: Some("Hypertension".to_string()),
                    clinical_status: Some("active".to_string()),
                },
            ],
            encounters: vec![Encounter {
                id: "seed-001-awv".to_string(),
                subject: subject.clone(),
                start: date(2024, 2, 14),
                type_label: Some("Annual wellness visit".to_string()),
            }],
            observations: vec![
                Observation {
                    id: "seed-001-a1c".to_string(),
                    subject: subject.clone(),
                    effective: date(2024, 2, 14),
                    label: Some("Hemoglobin A1c".to_string()),
                    value: quantity(7.4, "%"),
                },
                Observation {
                    id: "seed-001-bp".to_string(),
                    subject: subject.clone(),
                    effective: date(2024, 2, 14),
                    label: Some("Blood pressure".to_string()),
                    value: Some(ObservationValue::Text("142/90 mmHg".to_string())),
                },
            ],
            immunizations: vec![Immunization {
                id: "seed-001-flu".to_string(),
                patient: subject,
                occurred: date(2024, 10, 7),
                vaccine: Some("Influenza vaccine".to_string()),
            }],
        },
    )
}

fn linda_nguyen() -> ResourceSet {
    let subject = "Patient/seed-002".to_string();
    ResourceSet::new(
        Patient {
            id: "seed-002".to_string(),
            given_name: Some("Linda".to_string()),
            family_name: Some("Nguyen".to_string()),
            gender: Gender::Female,
            birth_date: date(1971, 5, 22),
        },
        Origin::Seed,
        RelatedRecords {
            encounters: vec![Encounter {
                id: "seed-002-office".to_string(),
                subject: subject.clone(),
                start: date(2025, 6, 2),
                type_label: Some("Office visit".to_string()),
            }],
            immunizations: vec![Immunization {
                id: "seed-002-tdap".to_string(),
                patient: subject,
                occurred: date(2023, 8, 19),
                vaccine: Some("Tdap".to_string()),
            }],
            ..RelatedRecords::default()
        },
    )
}
