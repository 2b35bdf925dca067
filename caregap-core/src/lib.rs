//! Mô hình hồ sơ bệnh nhân chuẩn hóa, dựng timeline và luật phát hiện care gap.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub mod dates;
pub mod repository;
pub mod rules;
pub mod timeline;

pub use repository::{Origin, Repository, ResourceSet};
pub use rules::{
    evaluate_care_gaps, evaluate_care_gaps_on, CareGapEngine, CareGapRule, RuleContext,
};
pub use timeline::build_timeline;

/// Các ngưỡng dùng cho bộ luật care gap chuẩn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CareGapConfig {
    /// Số tháng sau đó kết quả A1c gần nhất bị coi là cũ.
    pub a1c_stale_months: i32,
    /// Số tháng sau đó lần đo huyết áp gần nhất bị coi là cũ.
    pub blood_pressure_stale_months: i32,
    pub mammogram_min_age: i32,
    pub mammogram_max_age: i32,
    /// Số tháng sau đó lần khám sức khỏe định kỳ gần nhất bị coi là cũ.
    pub wellness_stale_months: i32,
}

impl Default for CareGapConfig {
    fn default() -> Self {
        Self {
            a1c_stale_months: 12,
            blood_pressure_stale_months: 6,
            mammogram_min_age: 50,
            mammogram_max_age: 74,
            wellness_stale_months: 12,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Female,
    Male,
    Other,
    #[default]
    Unknown,
}

impl Gender {
    /// Ánh xạ mã giới tính hành chính; mã lạ thành `Unknown`.
    pub fn parse(code: &str) -> Self {
        match code.trim().to_ascii_lowercase().as_str() {
            "female" => Gender::Female,
            "male" => Gender::Male,
            "other" => Gender::Other,
            _ => Gender::Unknown,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    pub id: String,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub gender: Gender,
    pub birth_date: Option<NaiveDate>,
}

impl Patient {
    /// "Given Family", hoặc mã định danh khi không có tên.
    pub fn display_name(&self) -> String {
        let given = self.given_name.as_deref().unwrap_or("");
        let family = self.family_name.as_deref().unwrap_or("");
        let full = format!("{given} {family}").trim().to_string();
        if full.is_empty() {
            self.id.clone()
        } else {
            full
        }
    }

    /// `Patient/<id>`, dạng tham chiếu mà các hồ sơ liên quan dùng.
    pub fn reference(&self) -> String {
        format!("Patient/{}", self.id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Condition {
    pub id: String,
    pub subject: String,
    pub display: Option<String>,
    pub clinical_status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Encounter {
    pub id: String,
    pub subject: String,
    pub start: Option<NaiveDate>,
    pub type_label: Option<String>,
}

/// Giá trị đo của một observation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ObservationValue {
    Text(String),
    Quantity { value: f64, unit: Option<String> },
}

impl ObservationValue {
    pub fn display(&self) -> String {
        match self {
            ObservationValue::Text(text) => text.clone(),
            ObservationValue::Quantity { value, unit } => {
                let number = format_numeric(*value);
                match unit.as_deref().map(str::trim) {
                    Some(unit) if !unit.is_empty() => format!("{number} {unit}"),
                    _ => number,
                }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Observation {
    pub id: String,
    pub subject: String,
    /// Thời điểm đo, không phải thời điểm nhập dữ liệu.
    pub effective: Option<NaiveDate>,
    pub label: Option<String>,
    pub value: Option<ObservationValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Immunization {
    pub id: String,
    pub patient: String,
    pub occurred: Option<NaiveDate>,
    pub vaccine: Option<String>,
}

/// Toàn bộ hồ sơ liên quan của một bệnh nhân (không gồm bản thân bệnh nhân).
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct RelatedRecords {
    pub conditions: Vec<Condition>,
    pub encounters: Vec<Encounter>,
    pub observations: Vec<Observation>,
    pub immunizations: Vec<Immunization>,
}

/// Loại hồ sơ gốc của một sự kiện trên timeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EventKind {
    Encounter,
    Observation,
    Immunization,
}

impl EventKind {
    pub fn name(self) -> &'static str {
        match self {
            EventKind::Encounter => "Encounter",
            EventKind::Observation => "Observation",
            EventKind::Immunization => "Immunization",
        }
    }
}

/// Một sự kiện có ngày trên timeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimelineEvent {
    pub id: String,
    pub date: NaiveDate,
    pub kind: EventKind,
    pub label: String,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    High,
    Medium,
    Low,
}

/// Thiếu sót hoặc dữ liệu quá hạn phát hiện trong lịch sử chăm sóc.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CareGap {
    /// Cố định theo kết quả luật, ví dụ `gap-a1c-stale`.
    pub id: String,
    pub label: String,
    pub severity: Severity,
    pub last_date: Option<NaiveDate>,
    pub months_since: Option<i32>,
    pub recommendation: String,
}

/// Kết quả tổng hợp chỉ đọc trả cho tầng hiển thị.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CareSnapshot {
    pub generated_at: DateTime<Utc>,
    pub patient: Patient,
    pub timeline: Vec<TimelineEvent>,
    pub gaps: Vec<CareGap>,
}

impl CareSnapshot {
    /// Dựng timeline và care gap cho một resource set tính đến hôm nay.
    pub fn compute(set: &ResourceSet, config: &CareGapConfig) -> Self {
        Self::compute_on(set, config, Utc::now().date_naive())
    }

    /// Như [`CareSnapshot::compute`] nhưng truyền ngày đánh giá tường minh.
    pub fn compute_on(set: &ResourceSet, config: &CareGapConfig, today: NaiveDate) -> Self {
        Self {
            generated_at: Utc::now(),
            patient: set.patient.clone(),
            timeline: build_timeline(&set.records),
            gaps: evaluate_care_gaps_on(&set.patient, &set.records, config, today),
        }
    }

    pub fn timeline(&self) -> &[TimelineEvent] {
        &self.timeline
    }

    pub fn gaps(&self) -> &[CareGap] {
        &self.gaps
    }
}

/// Lỗi khi chuyển dữ liệu thô thành hồ sơ chuẩn hóa.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("no Patient resource found")]
    NoPatient,
    #[error("Patient resource has no id")]
    MissingPatientId,
    #[error("no result segment found")]
    NoResultSegment,
    #[error("could not read input: {0}")]
    Parse(String),
    #[error("unknown patient: {0}")]
    UnknownPatient(String),
}

fn format_numeric(value: f64) -> String {
    if value.fract().abs() < f64::EPSILON {
        format!("{value:.0}")
    } else {
        format!("{value}")
    }
}
