//! FHIR JSON bundle to canonical `ResourceSet` converter.
//!
//! Only the fields the timeline and the care-gap rules consume are read.
//! Unknown resource types and records that do not point at the bundle's
//! patient are dropped without error.

use caregap_core::dates::parse_iso_date;
use caregap_core::{
    Condition, Encounter, Gender, Immunization, IngestError, Observation, ObservationValue,
    Origin, Patient, RelatedRecords, ResourceSet,
};
use chrono::NaiveDate;
use serde_json::Value;

/// Parse a bundle from a JSON string.
pub fn parse_bundle_str(bundle_json: &str) -> Result<ResourceSet, IngestError> {
    let value: Value =
        serde_json::from_str(bundle_json).map_err(|err| IngestError::Parse(err.to_string()))?;
    parse_bundle_value(&value)
}

/// Parse a bundle from a `serde_json::Value`.
///
/// The first `Patient` entry is the subject of the bundle; later ones are
/// ignored. A missing or malformed `entry` list counts as empty.
pub fn parse_bundle_value(bundle: &Value) -> Result<ResourceSet, IngestError> {
    // Entry positions are kept so resources without an id still get distinct ones.
    let resources: Vec<(usize, &Value)> = bundle
        .get("entry")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .enumerate()
                .filter_map(|(index, entry)| entry.get("resource").map(|res| (index, res)))
                .filter(|(_, resource)| {
                    resource.get("resourceType").and_then(Value::as_str).is_some()
                })
                .collect()
        })
        .unwrap_or_default();

    let (_, patient_resource) = resources
        .iter()
        .find(|(_, resource)| resource_type(resource) == "Patient")
        .ok_or(IngestError::NoPatient)?;
    let patient = parse_patient(patient_resource)?;
    let reference = patient.reference();

    let mut records = RelatedRecords::default();
    let mut dropped = 0usize;

    for &(index, resource) in &resources {
        match resource_type(resource) {
            "Patient" => {}
            "Condition" if reference_is(resource, "subject", &reference) => {
                records.conditions.push(parse_condition(resource, &reference, index));
            }
            "Encounter" if reference_is(resource, "subject", &reference) => {
                records.encounters.push(parse_encounter(resource, &reference, index));
            }
            "Observation" if reference_is(resource, "subject", &reference) => {
                records.observations.push(parse_observation(resource, &reference, index));
            }
            "Immunization"
                if reference_is(resource, "patient", &reference)
                    || reference_is(resource, "subject", &reference) =>
            {
                records.immunizations.push(parse_immunization(resource, &reference, index));
            }
            _ => dropped += 1,
        }
    }

    if dropped > 0 {
        tracing::debug!(dropped, patient = %patient.id, "bundle resources dropped");
    }
    tracing::info!(
        patient = %patient.id,
        conditions = records.conditions.len(),
        encounters = records.encounters.len(),
        observations = records.observations.len(),
        immunizations = records.immunizations.len(),
        "bundle parsed"
    );

    Ok(ResourceSet::new(patient, Origin::Upload, records))
}

fn resource_type(resource: &Value) -> &str {
    resource
        .get("resourceType")
        .and_then(Value::as_str)
        .unwrap_or_default()
}

fn reference_is(resource: &Value, field: &str, expected: &str) -> bool {
    resource
        .get(field)
        .and_then(|value| value.get("reference"))
        .and_then(Value::as_str)
        .is_some_and(|reference| reference == expected)
}

fn parse_patient(resource: &Value) -> Result<Patient, IngestError> {
    let id = resource
        .get("id")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or(IngestError::MissingPatientId)?
        .to_string();

    let name = resource
        .get("name")
        .and_then(Value::as_array)
        .and_then(|names| names.first());
    let given_name = name
        .and_then(|name| name.get("given"))
        .and_then(Value::as_array)
        .and_then(|given| given.first())
        .and_then(Value::as_str)
        .map(str::to_string);
    let family_name = name
        .and_then(|name| name.get("family"))
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(Patient {
        id,
        given_name,
        family_name,
        gender: resource
            .get("gender")
            .and_then(Value::as_str)
            .map(Gender::parse)
            .unwrap_or_default(),
        birth_date: extract_date(resource, &["birthDate"]),
    })
}

fn parse_condition(resource: &Value, subject: &str, index: usize) -> Condition {
    Condition {
        id: resource_id(resource, "condition", index),
        subject: subject.to_string(),
        display: resource.get("code").and_then(extract_codeable_text),
        clinical_status: resource.get("clinicalStatus").and_then(|status| {
            extract_codeable_text(status).or_else(|| status.as_str().map(str::to_string))
        }),
    }
}

fn parse_encounter(resource: &Value, subject: &str, index: usize) -> Encounter {
    let type_label = resource
        .get("type")
        .and_then(Value::as_array)
        .and_then(|types| types.first())
        .and_then(extract_codeable_text)
        .or_else(|| resource.get("class").and_then(extract_codeable_text));

    Encounter {
        id: resource_id(resource, "encounter", index),
        subject: subject.to_string(),
        start: resource
            .get("period")
            .and_then(|period| period.get("start"))
            .and_then(Value::as_str)
            .and_then(parse_iso_date),
        type_label,
    }
}

fn parse_observation(resource: &Value, subject: &str, index: usize) -> Observation {
    Observation {
        id: resource_id(resource, "observation", index),
        subject: subject.to_string(),
        effective: extract_date(resource, &["effectiveDateTime", "effectiveInstant", "issued"])
            .or_else(|| {
                resource
                    .get("effectivePeriod")
                    .and_then(|period| period.get("start"))
                    .and_then(Value::as_str)
                    .and_then(parse_iso_date)
            }),
        label: resource.get("code").and_then(extract_codeable_text),
        value: observation_value(resource),
    }
}

fn parse_immunization(resource: &Value, patient: &str, index: usize) -> Immunization {
    Immunization {
        id: resource_id(resource, "immunization", index),
        patient: patient.to_string(),
        occurred: extract_date(resource, &["occurrenceDateTime", "date"]),
        vaccine: resource.get("vaccineCode").and_then(extract_codeable_text),
    }
}

fn observation_value(resource: &Value) -> Option<ObservationValue> {
    if let Some(quantity) = resource.get("valueQuantity") {
        if let Some(value) = quantity.get("value").and_then(Value::as_f64) {
            let unit = quantity
                .get("unit")
                .or_else(|| quantity.get("code"))
                .and_then(Value::as_str)
                .map(str::to_string);
            return Some(ObservationValue::Quantity { value, unit });
        }
    }

    if let Some(text) = resource.get("valueString").and_then(Value::as_str) {
        if !text.is_empty() {
            return Some(ObservationValue::Text(text.to_string()));
        }
    }

    if let Some(text) = resource.get("valueCodeableConcept").and_then(extract_codeable_text) {
        return Some(ObservationValue::Text(text));
    }

    summarize_components(resource).map(ObservationValue::Text)
}

/// Systolic/diastolic style readings, e.g. `128/82 mmHg`.
fn summarize_components(resource: &Value) -> Option<String> {
    let components = resource.get("component")?.as_array()?;
    let mut numbers = Vec::new();
    let mut unit = None;
    for component in components {
        let Some(quantity) = component.get("valueQuantity") else {
            continue;
        };
        let Some(value) = quantity.get("value").and_then(Value::as_f64) else {
            continue;
        };
        numbers.push(ObservationValue::Quantity { value, unit: None }.display());
        if unit.is_none() {
            unit = quantity.get("unit").and_then(Value::as_str).map(str::to_string);
        }
    }

    if numbers.is_empty() {
        return None;
    }
    let joined = numbers.join("/");
    Some(match unit {
        Some(unit) => format!("{joined} {unit}"),
        None => joined,
    })
}

fn extract_codeable_text(value: &Value) -> Option<String> {
    if let Some(text) = value.get("text").and_then(Value::as_str) {
        if !text.trim().is_empty() {
            return Some(text.trim().to_string());
        }
    }

    if let Some(codings) = value.get("coding").and_then(Value::as_array) {
        for coding in codings {
            if let Some(display) = coding.get("display").and_then(Value::as_str) {
                if !display.trim().is_empty() {
                    return Some(display.trim().to_string());
                }
            }
            if let Some(code) = coding.get("code").and_then(Value::as_str) {
                if !code.trim().is_empty() {
                    return Some(code.trim().to_string());
                }
            }
        }
    }

    // Encounter.class is a bare Coding in R4.
    if let Some(display) = value.get("display").and_then(Value::as_str) {
        if !display.trim().is_empty() {
            return Some(display.trim().to_string());
        }
    }

    None
}

/// Resources without an id are named after their position in the bundle.
fn resource_id(resource: &Value, fallback: &str, index: usize) -> String {
    resource
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("{fallback}-{index}"))
}

fn extract_date(resource: &Value, fields: &[&str]) -> Option<NaiveDate> {
    fields
        .iter()
        .filter_map(|field| resource.get(*field).and_then(Value::as_str))
        .find_map(parse_iso_date)
}
