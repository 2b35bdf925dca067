//! Gộp encounter, observation và immunization thành một chuỗi sự kiện theo ngày.

use crate::{EventKind, RelatedRecords, TimelineEvent};

/// Dựng timeline từ hồ sơ liên quan của bệnh nhân.
///
/// Hồ sơ không có ngày bị bỏ qua. Sự kiện sắp xếp tăng dần theo ngày, sắp xếp
/// ổn định nên sự kiện cùng ngày giữ thứ tự encounter, observation,
/// immunization, mỗi nhóm theo thứ tự nguồn.
pub fn build_timeline(records: &RelatedRecords) -> Vec<TimelineEvent> {
    let mut events = Vec::new();

    for encounter in &records.encounters {
        let Some(date) = encounter.start else {
            tracing::debug!(id = %encounter.id, "encounter without start date left off timeline");
            continue;
        };
        events.push(TimelineEvent {
            id: format!("enc-{}", encounter.id),
            date,
            kind: EventKind::Encounter,
            label: label_or_kind(encounter.type_label.as_deref(), EventKind::Encounter),
            detail: None,
        });
    }

    for observation in &records.observations {
        let Some(date) = observation.effective else {
            tracing::debug!(id = %observation.id, "observation without effective date left off timeline");
            continue;
        };
        events.push(TimelineEvent {
            id: format!("obs-{}", observation.id),
            date,
            kind: EventKind::Observation,
            label: label_or_kind(observation.label.as_deref(), EventKind::Observation),
            detail: observation.value.as_ref().map(|value| value.display()),
        });
    }

    for immunization in &records.immunizations {
        let Some(date) = immunization.occurred else {
            tracing::debug!(id = %immunization.id, "immunization without date left off timeline");
            continue;
        };
        events.push(TimelineEvent {
            id: format!("imm-{}", immunization.id),
            date,
            kind: EventKind::Immunization,
            label: label_or_kind(immunization.vaccine.as_deref(), EventKind::Immunization),
            detail: None,
        });
    }

    events.sort_by_key(|event| event.date);
    events
}

fn label_or_kind(text: Option<&str>, kind: EventKind) -> String {
    match text.map(str::trim) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => kind.name().to_string(),
    }
}
