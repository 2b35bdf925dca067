//! Bộ luật phát hiện care gap.
//!
//! Mỗi luật là một đối tượng độc lập, chạy theo thứ tự khai báo cố định và
//! trả về tối đa một gap. Không có lỗi: dữ liệu thiếu chỉ cho ít gap hơn.

use chrono::{NaiveDate, Utc};

use crate::dates::{age_on, months_between};
use crate::{
    CareGap, CareGapConfig, Encounter, Gender, Observation, Patient, RelatedRecords, Severity,
};

/// Dữ liệu đầu vào của một luật.
pub struct RuleContext<'a> {
    pub patient: &'a Patient,
    pub records: &'a RelatedRecords,
    pub today: NaiveDate,
}

impl<'a> RuleContext<'a> {
    pub fn new(patient: &'a Patient, records: &'a RelatedRecords, today: NaiveDate) -> Self {
        Self {
            patient,
            records,
            today,
        }
    }

    /// Đúng nếu tên hiển thị của một condition chứa `keyword` (không phân biệt hoa thường).
    pub fn has_condition(&self, keyword: &str) -> bool {
        let needle = keyword.to_lowercase();
        self.records.conditions.iter().any(|condition| {
            condition
                .display
                .as_deref()
                .is_some_and(|text| text.to_lowercase().contains(&needle))
        })
    }

    /// Observation có ngày mới nhất với nhãn bằng `label` (không phân biệt hoa thường).
    ///
    /// Trùng ngày thì lấy id lớn nhất, nên kết quả không phụ thuộc thứ tự đầu vào.
    pub fn latest_observation(&self, label: &str) -> Option<&'a Observation> {
        self.records
            .observations
            .iter()
            .filter(|obs| label_matches(obs.label.as_deref(), label))
            .filter(|obs| obs.effective.is_some())
            .max_by(|a, b| (a.effective, &a.id).cmp(&(b.effective, &b.id)))
    }

    pub fn has_observation(&self, label: &str) -> bool {
        self.records
            .observations
            .iter()
            .any(|obs| label_matches(obs.label.as_deref(), label))
    }

    /// Encounter có ngày mới nhất với loại chứa `keyword` (không phân biệt hoa thường).
    pub fn latest_encounter(&self, keyword: &str) -> Option<&'a Encounter> {
        let needle = keyword.to_lowercase();
        self.records
            .encounters
            .iter()
            .filter(|enc| {
                enc.type_label
                    .as_deref()
                    .is_some_and(|text| text.to_lowercase().contains(&needle))
            })
            .filter(|enc| enc.start.is_some())
            .max_by(|a, b| (a.start, &a.id).cmp(&(b.start, &b.id)))
    }

    pub fn age(&self) -> Option<i32> {
        self.patient.birth_date.map(|birth| age_on(birth, self.today))
    }

    pub fn months_since(&self, date: NaiveDate) -> i32 {
        months_between(date, self.today)
    }
}

fn label_matches(label: Option<&str>, wanted: &str) -> bool {
    label.is_some_and(|label| label.trim().eq_ignore_ascii_case(wanted))
}

/// Một luật kiểm tra care gap độc lập.
pub trait CareGapRule: Send + Sync {
    fn id(&self) -> &'static str;
    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<CareGap>;
}

/// Xét nghiệm hoặc chỉ số cần theo dõi định kỳ cho một bệnh mạn.
pub struct MonitoringRule {
    id: &'static str,
    condition_keyword: &'static str,
    observation_label: &'static str,
    short_name: &'static str,
    stale_after_months: i32,
    severity: Severity,
    recommendation: &'static str,
}

impl MonitoringRule {
    /// Bệnh nhân đái tháo đường cần A1c ít nhất mỗi `a1c_stale_months` tháng.
    pub fn a1c(config: &CareGapConfig) -> Self {
        Self {
            id: "a1c",
            condition_keyword: "diabetes",
            observation_label: "Hemoglobin A1c",
            short_name: "A1c",
            stale_after_months: config.a1c_stale_months,
            severity: Severity::High,
            recommendation: "Order Hemoglobin A1c lab test",
        }
    }

    /// Bệnh nhân tăng huyết áp cần đo huyết áp ít nhất mỗi
    /// `blood_pressure_stale_months` tháng.
    pub fn blood_pressure(config: &CareGapConfig) -> Self {
        Self {
            id: "bp",
            condition_keyword: "hyper",
            observation_label: "Blood pressure",
            short_name: "Blood pressure",
            stale_after_months: config.blood_pressure_stale_months,
            severity: Severity::Medium,
            recommendation: "Schedule blood pressure check",
        }
    }
}

impl CareGapRule for MonitoringRule {
    fn id(&self) -> &'static str {
        self.id
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<CareGap> {
        if !ctx.has_condition(self.condition_keyword) {
            return None;
        }

        let Some(latest) = ctx.latest_observation(self.observation_label) else {
            return Some(CareGap {
                id: format!("gap-{}-missing", self.id),
                label: format!("No historical {} on record", self.short_name),
                severity: self.severity,
                last_date: None,
                months_since: None,
                recommendation: self.recommendation.to_string(),
            });
        };

        let last = latest.effective?;
        let months = ctx.months_since(last);
        if months <= self.stale_after_months {
            return None;
        }

        Some(CareGap {
            id: format!("gap-{}-stale", self.id),
            label: format!("{} stale: last measured {months} months ago", self.short_name),
            severity: self.severity,
            last_date: Some(last),
            months_since: Some(months),
            recommendation: self.recommendation.to_string(),
        })
    }
}

/// Tầm soát ung thư vú cho phụ nữ trong độ tuổi khuyến cáo.
pub struct MammogramRule {
    min_age: i32,
    max_age: i32,
}

impl MammogramRule {
    pub fn new(config: &CareGapConfig) -> Self {
        Self {
            min_age: config.mammogram_min_age,
            max_age: config.mammogram_max_age,
        }
    }
}

impl CareGapRule for MammogramRule {
    fn id(&self) -> &'static str {
        "mammogram"
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<CareGap> {
        if ctx.patient.gender != Gender::Female {
            return None;
        }
        let age = ctx.age()?;
        if age < self.min_age || age > self.max_age {
            return None;
        }
        if ctx.has_observation("Mammogram") {
            return None;
        }

        Some(CareGap {
            id: "gap-mammogram".to_string(),
            label: "Mammogram screening due".to_string(),
            severity: Severity::Medium,
            last_date: None,
            months_since: None,
            recommendation: "Order screening mammogram".to_string(),
        })
    }
}

/// Khám sức khỏe định kỳ hằng năm, áp dụng cho mọi bệnh nhân.
pub struct WellnessVisitRule {
    stale_after_months: i32,
}

impl WellnessVisitRule {
    pub fn new(config: &CareGapConfig) -> Self {
        Self {
            stale_after_months: config.wellness_stale_months,
        }
    }
}

impl CareGapRule for WellnessVisitRule {
    fn id(&self) -> &'static str {
        "awv"
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<CareGap> {
        let recommendation = "Schedule annual wellness visit".to_string();

        let Some(latest) = ctx.latest_encounter("annual") else {
            return Some(CareGap {
                id: "gap-awv-missing".to_string(),
                label: "No annual wellness visit on record".to_string(),
                severity: Severity::Low,
                last_date: None,
                months_since: None,
                recommendation,
            });
        };

        let last = latest.start?;
        let months = ctx.months_since(last);
        if months <= self.stale_after_months {
            return None;
        }

        Some(CareGap {
            id: "gap-awv-stale".to_string(),
            label: format!("Annual wellness visit stale: last visit {months} months ago"),
            severity: Severity::Low,
            last_date: Some(last),
            months_since: Some(months),
            recommendation,
        })
    }
}

/// Danh sách luật có thứ tự. Gap trả về theo thứ tự luật.
pub struct CareGapEngine {
    rules: Vec<Box<dyn CareGapRule>>,
}

impl CareGapEngine {
    /// A1c, huyết áp, chụp nhũ ảnh, khám định kỳ.
    pub fn standard(config: &CareGapConfig) -> Self {
        Self {
            rules: vec![
                Box::new(MonitoringRule::a1c(config)),
                Box::new(MonitoringRule::blood_pressure(config)),
                Box::new(MammogramRule::new(config)),
                Box::new(WellnessVisitRule::new(config)),
            ],
        }
    }

    /// Thêm một luật vào sau các luật hiện có.
    pub fn with_rule(mut self, rule: impl CareGapRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn rule_ids(&self) -> Vec<&'static str> {
        self.rules.iter().map(|rule| rule.id()).collect()
    }

    pub fn evaluate(
        &self,
        patient: &Patient,
        records: &RelatedRecords,
        today: NaiveDate,
    ) -> Vec<CareGap> {
        let ctx = RuleContext::new(patient, records, today);
        let gaps: Vec<CareGap> = self
            .rules
            .iter()
            .filter_map(|rule| rule.evaluate(&ctx))
            .collect();
        tracing::debug!(patient = %patient.id, gaps = gaps.len(), "care gaps evaluated");
        gaps
    }
}

/// Chạy bộ luật chuẩn theo ngày UTC hôm nay.
pub fn evaluate_care_gaps(
    patient: &Patient,
    records: &RelatedRecords,
    config: &CareGapConfig,
) -> Vec<CareGap> {
    evaluate_care_gaps_on(patient, records, config, Utc::now().date_naive())
}

/// Chạy bộ luật chuẩn theo ngày `today`.
pub fn evaluate_care_gaps_on(
    patient: &Patient,
    records: &RelatedRecords,
    config: &CareGapConfig,
    today: NaiveDate,
) -> Vec<CareGap> {
    CareGapEngine::standard(config).evaluate(patient, records, today)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Condition, ObservationValue};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn patient(gender: Gender, birth: NaiveDate) -> Patient {
        Patient {
            id: "p1".to_string(),
            given_name: Some("Ada".to_string()),
            family_name: Some("Lovelace".to_string()),
            gender,
            birth_date: Some(birth),
        }
    }

    fn condition(text: &str) -> Condition {
        Condition {
            id: format!("cond-{text}"),
            subject: "Patient/p1".to_string(),
            display: Some(text.to_string()),
            clinical_status: Some("active".to_string()),
        }
    }

    fn observation(id: &str, label: &str, effective: NaiveDate) -> Observation {
        Observation {
            id: id.to_string(),
            subject: "Patient/p1".to_string(),
            effective: Some(effective),
            label: Some(label.to_string()),
            value: Some(ObservationValue::Text("x".to_string())),
        }
    }

    fn wellness(start: NaiveDate) -> Encounter {
        Encounter {
            id: "awv".to_string(),
            subject: "Patient/p1".to_string(),
            start: Some(start),
            type_label: Some("Annual Wellness Visit".to_string()),
        }
    }

    fn today() -> NaiveDate {
        date(2025, 3, 15)
    }

    fn gaps(patient: &Patient, records: &RelatedRecords) -> Vec<CareGap> {
        evaluate_care_gaps_on(patient, records, &CareGapConfig::default(), today())
    }

    fn ids(gaps: &[CareGap]) -> Vec<&str> {
        gaps.iter().map(|gap| gap.id.as_str()).collect()
    }

    #[test]
    fn no_records_yields_only_missing_wellness_visit() {
        let patient = patient(Gender::Male, date(1960, 1, 1));
        let gaps = gaps(&patient, &RelatedRecords::default());
        assert_eq!(ids(&gaps), vec!["gap-awv-missing"]);
        assert_eq!(gaps[0].severity, Severity::Low);
    }

    #[test]
    fn a1c_boundary_is_strictly_greater_than_twelve() {
        let patient = patient(Gender::Male, date(1960, 1, 1));
        let mut records = RelatedRecords {
            conditions: vec![condition("Type 2 Diabetes Mellitus")],
            encounters: vec![wellness(date(2025, 1, 10))],
            ..RelatedRecords::default()
        };

        records.observations = vec![observation("a", "Hemoglobin A1c", date(2024, 2, 20))];
        let stale = gaps(&patient, &records);
        assert_eq!(ids(&stale), vec!["gap-a1c-stale"]);
        assert_eq!(stale[0].months_since, Some(13));
        assert_eq!(stale[0].last_date, Some(date(2024, 2, 20)));
        assert_eq!(stale[0].severity, Severity::High);
        assert!(stale[0].label.contains("13"));

        records.observations = vec![observation("a", "Hemoglobin A1c", date(2024, 3, 15))];
        assert!(gaps(&patient, &records).is_empty());
    }

    #[test]
    fn diabetic_without_a1c_gets_high_gap() {
        let patient = patient(Gender::Male, date(1960, 1, 1));
        let records = RelatedRecords {
            conditions: vec![condition("diabetes")],
            encounters: vec![wellness(date(2025, 1, 10))],
            ..RelatedRecords::default()
        };
        let gaps = gaps(&patient, &records);
        assert_eq!(ids(&gaps), vec!["gap-a1c-missing"]);
        assert_eq!(gaps[0].severity, Severity::High);
        assert_eq!(gaps[0].last_date, None);
    }

    #[test]
    fn hypertension_uses_six_month_threshold() {
        let patient = patient(Gender::Male, date(1960, 1, 1));
        let mut records = RelatedRecords {
            conditions: vec![condition("Essential hypertension")],
            encounters: vec![wellness(date(2025, 1, 10))],
            ..RelatedRecords::default()
        };

        records.observations = vec![observation("bp", "Blood pressure", date(2024, 9, 1))];
        assert!(gaps(&patient, &records).is_empty());

        records.observations = vec![observation("bp", "Blood pressure", date(2024, 8, 30))];
        let stale = gaps(&patient, &records);
        assert_eq!(ids(&stale), vec!["gap-bp-stale"]);
        assert_eq!(stale[0].severity, Severity::Medium);
        assert_eq!(stale[0].months_since, Some(7));

        records.observations.clear();
        assert_eq!(ids(&gaps(&patient, &records)), vec!["gap-bp-missing"]);
    }

    #[test]
    fn latest_observation_ignores_input_order() {
        let patient = patient(Gender::Male, date(1960, 1, 1));
        let mut records = RelatedRecords {
            observations: vec![
                observation("old", "Hemoglobin A1c", date(2022, 1, 1)),
                observation("tie-a", "Hemoglobin A1c", date(2024, 6, 1)),
                observation("tie-b", "hemoglobin a1c", date(2024, 6, 1)),
                observation("other", "Glucose", date(2025, 1, 1)),
            ],
            ..RelatedRecords::default()
        };
        let today = today();

        let forward = RuleContext::new(&patient, &records, today)
            .latest_observation("Hemoglobin A1c")
            .map(|obs| obs.id.clone());
        records.observations.reverse();
        let backward = RuleContext::new(&patient, &records, today)
            .latest_observation("Hemoglobin A1c")
            .map(|obs| obs.id.clone());

        assert_eq!(forward.as_deref(), Some("tie-b"));
        assert_eq!(forward, backward);
    }

    #[test]
    fn mammogram_age_band_is_inclusive() {
        let records = RelatedRecords {
            encounters: vec![wellness(date(2025, 1, 10))],
            ..RelatedRecords::default()
        };

        let fifty = patient(Gender::Female, date(1975, 3, 15));
        assert_eq!(ids(&gaps(&fifty, &records)), vec!["gap-mammogram"]);

        let forty_nine = patient(Gender::Female, date(1975, 3, 16));
        assert!(gaps(&forty_nine, &records).is_empty());

        let seventy_four = patient(Gender::Female, date(1950, 3, 16));
        assert_eq!(ids(&gaps(&seventy_four, &records)), vec!["gap-mammogram"]);

        let seventy_five = patient(Gender::Female, date(1950, 3, 15));
        assert!(gaps(&seventy_five, &records).is_empty());

        let male = patient(Gender::Male, date(1970, 1, 1));
        assert!(gaps(&male, &records).is_empty());
    }

    #[test]
    fn mammogram_on_record_clears_gap() {
        let patient = patient(Gender::Female, date(1965, 5, 5));
        let records = RelatedRecords {
            encounters: vec![wellness(date(2025, 1, 10))],
            observations: vec![observation("m", "Mammogram", date(2010, 1, 1))],
            ..RelatedRecords::default()
        };
        assert!(gaps(&patient, &records).is_empty());
    }

    #[test]
    fn stale_wellness_visit_carries_last_date() {
        let patient = patient(Gender::Male, date(1960, 1, 1));
        let records = RelatedRecords {
            encounters: vec![
                wellness(date(2022, 4, 1)),
                Encounter {
                    id: "er".to_string(),
                    subject: "Patient/p1".to_string(),
                    start: Some(date(2025, 3, 1)),
                    type_label: Some("Emergency".to_string()),
                },
            ],
            ..RelatedRecords::default()
        };
        let gaps = gaps(&patient, &records);
        assert_eq!(ids(&gaps), vec!["gap-awv-stale"]);
        assert_eq!(gaps[0].last_date, Some(date(2022, 4, 1)));
        assert_eq!(gaps[0].months_since, Some(35));
    }

    #[test]
    fn wellness_visit_boundary_is_strictly_greater_than_twelve() {
        let patient = patient(Gender::Male, date(1960, 1, 1));
        let visit = |start: NaiveDate| RelatedRecords {
            encounters: vec![Encounter {
                id: "physical".to_string(),
                subject: "Patient/p1".to_string(),
                start: Some(start),
                type_label: Some("ANNUAL physical".to_string()),
            }],
            ..RelatedRecords::default()
        };

        assert!(gaps(&patient, &visit(date(2024, 3, 31))).is_empty());

        let stale = gaps(&patient, &visit(date(2024, 2, 1)));
        assert_eq!(ids(&stale), vec!["gap-awv-stale"]);
        assert_eq!(stale[0].months_since, Some(13));
        assert_eq!(stale[0].severity, Severity::Low);
    }

    #[test]
    fn gaps_follow_rule_order() {
        let patient = patient(Gender::Female, date(1965, 5, 5));
        let records = RelatedRecords {
            conditions: vec![condition("Hypertension"), condition("Diabetes type 2")],
            ..RelatedRecords::default()
        };
        assert_eq!(
            ids(&gaps(&patient, &records)),
            vec!["gap-a1c-missing", "gap-bp-missing", "gap-mammogram", "gap-awv-missing"]
        );
    }

    struct AlwaysFlag;

    impl CareGapRule for AlwaysFlag {
        fn id(&self) -> &'static str {
            "always"
        }

        fn evaluate(&self, _ctx: &RuleContext<'_>) -> Option<CareGap> {
            Some(CareGap {
                id: "gap-always".to_string(),
                label: "Always".to_string(),
                severity: Severity::Low,
                last_date: None,
                months_since: None,
                recommendation: "None".to_string(),
            })
        }
    }

    #[test]
    fn extra_rules_run_after_standard_ones() {
        let engine = CareGapEngine::standard(&CareGapConfig::default()).with_rule(AlwaysFlag);
        assert_eq!(engine.rule_ids(), vec!["a1c", "bp", "mammogram", "awv", "always"]);

        let patient = patient(Gender::Male, date(1960, 1, 1));
        let gaps = engine.evaluate(&patient, &RelatedRecords::default(), today());
        assert_eq!(ids(&gaps), vec!["gap-awv-missing", "gap-always"]);
    }
}
