use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Criterion id → recorded answer.
pub type Ratings = BTreeMap<String, Answer>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Branch {
    #[default]
    Main,
    Boys,
    Girls,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchoolInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<Branch>,
}

impl SchoolInfo {
    pub fn subject(&self) -> Option<&str> {
        non_empty(self.subject.as_deref())
    }

    pub fn grade(&self) -> Option<&str> {
        non_empty(self.grade.as_deref())
    }

    pub fn school(&self) -> Option<&str> {
        non_empty(self.school.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Teacher {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<Branch>,
}

impl Teacher {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            subject: None,
            grade: None,
            school: None,
            branch: None,
        }
    }

    /// School context used to pre-fill a report when the teacher has none yet.
    pub fn default_school_info(&self) -> SchoolInfo {
        SchoolInfo {
            subject: self.subject.clone(),
            grade: self.grade.clone(),
            school: self.school.clone(),
            branch: Some(self.branch.unwrap_or_default()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CriterionKind {
    Rating,
    Select,
    Text,
    /// Any type string this build does not know; never scored.
    #[value(skip)]
    Unknown,
}

impl CriterionKind {
    pub fn is_scored(self) -> bool {
        matches!(self, Self::Rating | Self::Select)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rating => "rating",
            Self::Select => "select",
            Self::Text => "text",
            Self::Unknown => "unknown",
        }
    }

    fn from_type(value: &str) -> Self {
        match value {
            "rating" => Self::Rating,
            "select" => Self::Select,
            "text" => Self::Text,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredCriterion", into = "StoredCriterion")]
pub struct Criterion {
    pub id: String,
    pub label: String,
    pub kind: CriterionKind,
    pub options: Option<Vec<String>>,
    /// Stored type string of an `Unknown` kind, written back unchanged.
    unknown_type: Option<String>,
}

/// On-disk shape of a criterion.
#[derive(Serialize, Deserialize)]
struct StoredCriterion {
    id: String,
    label: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    options: Option<Vec<String>>,
}

impl From<StoredCriterion> for Criterion {
    fn from(stored: StoredCriterion) -> Self {
        let kind = CriterionKind::from_type(&stored.kind);
        Self {
            id: stored.id,
            label: stored.label,
            kind,
            options: stored.options,
            unknown_type: (kind == CriterionKind::Unknown).then_some(stored.kind),
        }
    }
}

impl From<Criterion> for StoredCriterion {
    fn from(criterion: Criterion) -> Self {
        let kind = criterion.type_name().to_string();
        Self {
            id: criterion.id,
            label: criterion.label,
            kind,
            options: criterion.options,
        }
    }
}

impl Criterion {
    pub fn new(id: impl Into<String>, label: impl Into<String>, kind: CriterionKind) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind,
            options: None,
            unknown_type: None,
        }
    }

    /// Type string as stored.
    pub fn type_name(&self) -> &str {
        match (&self.kind, &self.unknown_type) {
            (CriterionKind::Unknown, Some(raw)) => raw.as_str(),
            (kind, _) => kind.as_str(),
        }
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = Some(options.into_iter().map(Into::into).collect());
        self
    }

    pub fn options(&self) -> &[String] {
        self.options.as_deref().unwrap_or(&[])
    }

    /// The declared option standing at a progress state's rank.
    pub fn option_for(&self, progress: Progress) -> Option<&str> {
        self.options().get(progress.rank()).map(String::as_str)
    }
}

/// A recorded answer as stored in a report's rating map.
///
/// Ratings are JSON numbers, select and text answers are strings. Anything
/// else is kept verbatim so that foreign data still loads; it scores as
/// unanswered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Number(serde_json::Number),
    Text(String),
    Other(serde_json::Value),
}

impl Answer {
    pub fn rating(value: i64) -> Self {
        Self::Number(serde_json::Number::from(value))
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Integral numeric value, if this is one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// Canonical progress state behind a `select` answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Advanced,
    OnTrack,
    Delayed,
}

impl Progress {
    pub const ALL: [Progress; 3] = [Progress::Advanced, Progress::OnTrack, Progress::Delayed];

    pub fn tag(self) -> &'static str {
        match self {
            Progress::Advanced => "advanced",
            Progress::OnTrack => "on-track",
            Progress::Delayed => "delayed",
        }
    }

    pub fn from_tag(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|progress| progress.tag().eq_ignore_ascii_case(value))
    }

    /// Position of an option in a criterion's declared option list.
    pub fn from_rank(rank: usize) -> Option<Self> {
        Self::ALL.get(rank).copied()
    }

    pub fn rank(self) -> usize {
        match self {
            Progress::Advanced => 0,
            Progress::OnTrack => 1,
            Progress::Delayed => 2,
        }
    }

    pub fn percentage(self) -> f64 {
        match self {
            Progress::Advanced => 100.0,
            Progress::OnTrack => 75.0,
            Progress::Delayed => 25.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: Uuid,
    pub teacher_id: Uuid,
    pub date: NaiveDate,
    #[serde(default)]
    pub school_info: SchoolInfo,
    #[serde(default)]
    pub ratings: Ratings,
    #[serde(default)]
    pub strategies: String,
    #[serde(default)]
    pub aids: String,
    #[serde(default)]
    pub programs: String,
    #[serde(default)]
    pub total_percentage: f64,
}

impl Report {
    pub fn new(teacher_id: Uuid, date: NaiveDate, school_info: SchoolInfo) -> Self {
        Self {
            id: Uuid::new_v4(),
            teacher_id,
            date,
            school_info,
            ratings: Ratings::new(),
            strategies: String::new(),
            aids: String::new(),
            programs: String::new(),
            total_percentage: 0.0,
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_loads_browser_storage_shape() {
        let raw = r#"{
            "id": "3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2",
            "teacherId": "0c22f1f1-9184-4fd4-9b21-28c68a6a89dc",
            "date": "2024-03-11",
            "schoolInfo": {"subject": "Math", "grade": "", "school": "Al Noor", "branch": "girls"},
            "ratings": {"c1": 3, "c2": "مطابق", "c3": "Fractions", "c9": true},
            "strategies": "",
            "totalPercentage": 75
        }"#;

        let report: Report = serde_json::from_str(raw).expect("parse report");
        assert_eq!(report.date, NaiveDate::from_ymd_opt(2024, 3, 11).unwrap());
        assert_eq!(report.school_info.branch, Some(Branch::Girls));
        assert_eq!(report.school_info.grade(), None);
        assert_eq!(report.ratings["c1"].as_integer(), Some(3));
        assert_eq!(report.ratings["c2"].as_text(), Some("مطابق"));
        assert!(matches!(report.ratings["c9"], Answer::Other(_)));
        assert_eq!(report.aids, "");
        assert_eq!(report.total_percentage, 75.0);
    }

    #[test]
    fn report_serializes_camel_case() {
        let report = Report::new(Uuid::new_v4(), NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(), SchoolInfo::default());
        let value = serde_json::to_value(&report).unwrap();
        assert!(value.get("teacherId").is_some());
        assert!(value.get("totalPercentage").is_some());
        assert_eq!(value["date"], "2024-01-02");
    }

    #[test]
    fn unknown_criterion_type_still_loads() {
        let raw = r#"[{"id": "c1", "label": "Attendance", "type": "rating"},
                      {"id": "c2", "label": "Mood", "type": "slider"}]"#;
        let criteria: Vec<Criterion> = serde_json::from_str(raw).unwrap();
        assert_eq!(criteria[0].kind, CriterionKind::Rating);
        assert_eq!(criteria[1].kind, CriterionKind::Unknown);
        assert!(!criteria[1].kind.is_scored());

        let written = serde_json::to_value(&criteria).unwrap();
        assert_eq!(written[0]["type"], "rating");
        assert_eq!(written[1]["type"], "slider");
        assert!(written[1].get("options").is_none());
    }

    #[test]
    fn fractional_numbers_are_not_integral() {
        let answer: Answer = serde_json::from_str("2.5").unwrap();
        assert_eq!(answer.as_integer(), None);
        assert_eq!(Answer::rating(4).as_integer(), Some(4));
    }

    #[test]
    fn progress_tags_and_ranks() {
        assert_eq!(Progress::from_tag("On-Track"), Some(Progress::OnTrack));
        assert_eq!(Progress::from_rank(2), Some(Progress::Delayed));
        assert_eq!(Progress::from_rank(3), None);
        assert_eq!(Progress::Advanced.rank(), 0);
    }

    #[test]
    fn teacher_defaults_to_main_branch() {
        let teacher = Teacher::new("Avery Lee");
        assert_eq!(teacher.default_school_info().branch, Some(Branch::Main));
    }
}
