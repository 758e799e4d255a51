use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::export;
use crate::locale::Labels;
use crate::models::{Answer, Criterion, CriterionKind, Report, Teacher};
use crate::scoring;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardFilter {
    All,
    Teacher(Uuid),
    /// Every report, viewed through one scoreable criterion.
    Criterion(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardRow {
    pub report_id: Uuid,
    pub teacher_name: String,
    pub date: NaiveDate,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dashboard {
    /// Header of the value column.
    pub column: String,
    pub rows: Vec<DashboardRow>,
    pub average: f64,
}

pub fn build_dashboard(
    teachers: &[Teacher],
    reports: &[Report],
    criteria: &[Criterion],
    filter: &DashboardFilter,
    labels: &Labels,
) -> Result<Dashboard> {
    let teacher_name = |id: Uuid| {
        teachers
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.name.clone())
            .unwrap_or_else(|| labels.unknown_teacher.to_string())
    };

    let mut selected: Vec<&Report> = match filter {
        DashboardFilter::Teacher(id) => reports.iter().filter(|r| r.teacher_id == *id).collect(),
        DashboardFilter::All | DashboardFilter::Criterion(_) => reports.iter().collect(),
    };
    selected.sort_by(|a, b| b.date.cmp(&a.date));

    let dashboard = match filter {
        DashboardFilter::Criterion(id) => {
            let criterion = criteria
                .iter()
                .find(|c| &c.id == id)
                .ok_or_else(|| StoreError::CriterionNotFound(id.clone()))?;
            if !criterion.kind.is_scored() {
                return Err(StoreError::Invalid(format!(
                    "criterion {id} is not scored and cannot be used as a dashboard filter"
                )));
            }

            Dashboard {
                column: criterion.label.clone(),
                rows: selected
                    .iter()
                    .map(|report| DashboardRow {
                        report_id: report.id,
                        teacher_name: teacher_name(report.teacher_id),
                        date: report.date,
                        value: criterion_value(criterion, report, labels),
                    })
                    .collect(),
                average: scoring::criterion_average(criterion, selected.iter().copied()),
            }
        }
        DashboardFilter::All | DashboardFilter::Teacher(_) => Dashboard {
            column: labels.rating.to_string(),
            rows: selected
                .iter()
                .map(|report| DashboardRow {
                    report_id: report.id,
                    teacher_name: teacher_name(report.teacher_id),
                    date: report.date,
                    value: export::percent(report.total_percentage),
                })
                .collect(),
            average: scoring::average_total(selected.iter().copied()),
        },
    };

    Ok(dashboard)
}

fn criterion_value(criterion: &Criterion, report: &Report, labels: &Labels) -> String {
    let answer = report.ratings.get(&criterion.id);
    match criterion.kind {
        CriterionKind::Rating => match answer
            .and_then(Answer::as_integer)
            .and_then(scoring::rating_percentage)
        {
            Some(percentage) => format!("{percentage:.0}%"),
            None => labels.not_rated.to_string(),
        },
        CriterionKind::Select => match answer
            .and_then(Answer::as_text)
            .filter(|text| !text.is_empty())
        {
            Some(text) => match scoring::resolve_progress(criterion, text) {
                Some(progress) => format!(
                    "{:.0}% ({})",
                    progress.percentage(),
                    export::progress_label(criterion, progress, labels)
                ),
                None => format!("0% ({text})"),
            },
            None => labels.not_selected.to_string(),
        },
        CriterionKind::Text | CriterionKind::Unknown => answer
            .and_then(Answer::as_text)
            .map(str::to_string)
            .unwrap_or_else(|| labels.not_rated.to_string()),
    }
}
