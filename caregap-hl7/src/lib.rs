//! Pipe-delimited lab message to canonical `Observation` converter.
//!
//! A message is a set of line-separated segments. The `MSH` header and the
//! first `OBX|` result segment are read; everything else is ignored. Only the
//! fields needed for a single measurement are extracted:
//!
//! | field     | use                                              |
//! |-----------|--------------------------------------------------|
//! | OBX-3     | label (last non-empty `^` component)             |
//! | OBX-5/6   | value and unit, kept as display text             |
//! | OBX-14    | observation date (`YYYYMMDD...`)                 |
//! | MSH-7     | message date, used when OBX-14 is missing        |

use caregap_core::dates::decode_compact_date;
use caregap_core::{IngestError, Observation, ObservationValue};
use chrono::{NaiveDate, Utc};
use uuid::Uuid;

const HEADER_PREFIX: &str = "MSH";
const RESULT_PREFIX: &str = "OBX|";

const OBX_CODE: usize = 3;
const OBX_VALUE: usize = 5;
const OBX_UNIT: usize = 6;
const OBX_DATE: usize = 14;
// MSH-1 is the field separator itself, so MSH-7 sits at split index 6.
const MSH_DATE: usize = 6;

const DEFAULT_LABEL: &str = "Lab result";

/// Parse a message for `patient_id`, falling back to today's date when the
/// message carries none.
pub fn parse_message(content: &str, patient_id: &str) -> Result<Observation, IngestError> {
    parse_message_on(content, patient_id, Utc::now().date_naive())
}

/// Same as [`parse_message`] with an explicit fallback date.
pub fn parse_message_on(
    content: &str,
    patient_id: &str,
    today: NaiveDate,
) -> Result<Observation, IngestError> {
    let lines: Vec<&str> = content
        .lines()
        .flat_map(|line| line.split('\r'))
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let header = lines.iter().find(|line| line.starts_with(HEADER_PREFIX));
    let result = lines
        .iter()
        .find(|line| line.starts_with(RESULT_PREFIX))
        .ok_or(IngestError::NoResultSegment)?;

    let fields: Vec<&str> = result.split('|').collect();
    let field = |index: usize| {
        fields
            .get(index)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    };

    let label = field(OBX_CODE)
        .map(coded_label)
        .unwrap_or_else(|| DEFAULT_LABEL.to_string());

    let value = field(OBX_VALUE).map(|value| {
        let text = match field(OBX_UNIT) {
            Some(unit) => format!("{value} {unit}"),
            None => value.to_string(),
        };
        ObservationValue::Text(text)
    });

    let effective = field(OBX_DATE)
        .and_then(decode_compact_date)
        .or_else(|| {
            header
                .and_then(|header| header.split('|').nth(MSH_DATE))
                .and_then(decode_compact_date)
        })
        .unwrap_or_else(|| {
            tracing::debug!("message carries no usable date, using current date");
            today
        });

    tracing::info!(patient = %patient_id, label = %label, %effective, "result segment parsed");

    Ok(Observation {
        id: format!("hl7-{}", Uuid::new_v4()),
        subject: format!("Patient/{patient_id}"),
        effective: Some(effective),
        label: Some(label),
        value,
    })
}

/// The most specific term of a coded field is listed last.
fn coded_label(field: &str) -> String {
    field
        .split('^')
        .map(str::trim)
        .filter(|component| !component.is_empty())
        .last()
        .unwrap_or(field)
        .to_string()
}
