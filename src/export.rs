use std::fmt::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDate;

use crate::dashboard::Dashboard;
use crate::locale::Labels;
use crate::models::{Answer, Criterion, CriterionKind, Progress, Report, Teacher};
use crate::{pdf, scoring};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    Txt,
    Pdf,
    Csv,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Txt => "txt",
            ExportFormat::Pdf => "pdf",
            ExportFormat::Csv => "csv",
        }
    }
}

/// Percentages are always shown with one decimal place.
pub fn percent(value: f64) -> String {
    format!("{value:.1}%")
}

/// Everything needed to render one saved report. The total shown is the
/// snapshot stored with the report.
pub struct ReportView<'a> {
    pub report: &'a Report,
    pub teacher: &'a Teacher,
    pub criteria: &'a [Criterion],
    pub labels: &'a Labels,
}

impl ReportView<'_> {
    fn answer(&self, criterion: &Criterion) -> String {
        answer_display(criterion, self.report.ratings.get(&criterion.id), self.labels)
    }

    fn or_not_set<'s>(&self, value: Option<&'s str>) -> &'s str {
        value.unwrap_or(self.labels.not_set)
    }
}

fn answer_display(criterion: &Criterion, answer: Option<&Answer>, labels: &Labels) -> String {
    match criterion.kind {
        CriterionKind::Rating => answer
            .and_then(Answer::as_integer)
            .and_then(scoring::rating_percentage)
            .map(|value| format!("{value:.0}%"))
            .unwrap_or_else(|| labels.not_rated.to_string()),
        CriterionKind::Select => match answer.and_then(Answer::as_text) {
            Some(text) if !text.is_empty() => scoring::resolve_progress(criterion, text)
                .map(|progress| progress_label(criterion, progress, labels).to_string())
                .unwrap_or_else(|| text.to_string()),
            _ => labels.not_selected.to_string(),
        },
        CriterionKind::Text | CriterionKind::Unknown => answer
            .and_then(Answer::as_text)
            .unwrap_or_default()
            .to_string(),
    }
}

/// Declared option text when the criterion has one, else the built-in label.
pub fn progress_label<'a>(criterion: &'a Criterion, progress: Progress, labels: &'a Labels) -> &'a str {
    criterion
        .option_for(progress)
        .unwrap_or_else(|| labels.progress(progress))
}

fn note<'a>(value: &'a str, labels: &'a Labels) -> &'a str {
    if value.trim().is_empty() {
        labels.none
    } else {
        value
    }
}

/// Plain text rendering. The share variant drops school details and notes.
pub fn report_text(view: &ReportView<'_>, share: bool) -> String {
    let labels = view.labels;
    let info = &view.report.school_info;
    let mut output = String::new();

    let _ = writeln!(
        output,
        "{}: {}",
        labels.teacher_performance_report, view.teacher.name
    );
    let _ = writeln!(output, "{}: {}", labels.report_date, view.report.date);
    if !share {
        let _ = writeln!(output, "{}: {}", labels.school_name, view.or_not_set(info.school()));
        let _ = writeln!(output, "{}: {}", labels.subject, view.or_not_set(info.subject()));
        let _ = writeln!(output);
    }

    let _ = writeln!(output, "--- {} ---", labels.evaluation_criteria);
    for criterion in view.criteria {
        let _ = writeln!(output, "{}: {}", criterion.label, view.answer(criterion));
    }

    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "{}: {}",
        labels.total_percentage,
        percent(view.report.total_percentage)
    );

    if !share {
        let _ = writeln!(output);
        let _ = writeln!(output, "--- {} ---", labels.additional_notes);
        let _ = writeln!(output, "{}: {}", labels.strategies, note(&view.report.strategies, labels));
        let _ = writeln!(output, "{}: {}", labels.aids, note(&view.report.aids, labels));
        let _ = writeln!(output, "{}: {}", labels.programs, note(&view.report.programs, labels));
    }

    output
}

/// Spreadsheet rows mirroring the text layout.
pub fn report_rows(view: &ReportView<'_>) -> Vec<Vec<String>> {
    let labels = view.labels;
    let info = &view.report.school_info;
    let pair = |key: &str, value: &str| vec![key.to_string(), value.to_string()];

    let mut rows = vec![
        pair(labels.teacher, &view.teacher.name),
        pair(labels.report_date, &view.report.date.to_string()),
        pair(labels.school_name, info.school().unwrap_or_default()),
        pair(labels.subject, info.subject().unwrap_or_default()),
        pair(labels.grade, info.grade().unwrap_or_default()),
        pair(labels.branch, labels.branch_name(info.branch.unwrap_or_default())),
        Vec::new(),
        pair(labels.criterion, labels.rating),
    ];

    for criterion in view.criteria {
        rows.push(pair(&criterion.label, &view.answer(criterion)));
    }

    rows.push(Vec::new());
    rows.push(pair(labels.total_percentage, &percent(view.report.total_percentage)));
    rows.push(Vec::new());
    rows.push(pair(labels.strategies, &view.report.strategies));
    rows.push(pair(labels.aids, &view.report.aids));
    rows.push(pair(labels.programs, &view.report.programs));
    rows
}

pub fn dashboard_text(
    dashboard: &Dashboard,
    labels: &Labels,
    exported_on: NaiveDate,
    share: bool,
) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "{}", labels.dashboard_title);
    if !share {
        let _ = writeln!(output, "{}: {}", labels.export_date, exported_on);
        let _ = writeln!(output);
    }

    if dashboard.rows.is_empty() {
        let _ = writeln!(output, "{}", labels.no_reports);
    }

    for row in &dashboard.rows {
        let _ = writeln!(output, "----------------------------------------");
        let _ = writeln!(output, "{}: {}", labels.teacher, row.teacher_name);
        let _ = writeln!(output, "{}: {}", labels.date, row.date);
        let _ = writeln!(output, "{}: {}", dashboard.column, row.value);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "----------------------------------------");
    let _ = writeln!(output, "{}: {}", labels.average_total, percent(dashboard.average));
    output
}

pub fn dashboard_rows(dashboard: &Dashboard, labels: &Labels) -> Vec<Vec<String>> {
    let mut rows = vec![vec![
        labels.teacher.to_string(),
        labels.date.to_string(),
        dashboard.column.clone(),
    ]];

    for row in &dashboard.rows {
        rows.push(vec![
            row.teacher_name.clone(),
            row.date.to_string(),
            row.value.clone(),
        ]);
    }

    rows.push(Vec::new());
    rows.push(vec![
        labels.average_total.to_string(),
        String::new(),
        percent(dashboard.average),
    ]);
    rows
}

pub fn to_csv(rows: &[Vec<String>]) -> anyhow::Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());

    for row in rows {
        if row.is_empty() {
            writer.write_record([""])?;
        } else {
            writer.write_record(row)?;
        }
    }

    writer
        .into_inner()
        .map_err(|err| anyhow::anyhow!("failed to flush csv output: {}", err.error()))
}

/// Renders an export in the requested format.
pub fn render(
    format: ExportFormat,
    title: &str,
    text: &str,
    rows: &[Vec<String>],
) -> anyhow::Result<Vec<u8>> {
    match format {
        ExportFormat::Txt => Ok(text.as_bytes().to_vec()),
        ExportFormat::Pdf => Ok(pdf::render(title, text)?),
        ExportFormat::Csv => to_csv(rows),
    }
}

pub fn write_export(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))
}

pub fn report_file_name(teacher: &Teacher, report: &Report, format: ExportFormat) -> PathBuf {
    PathBuf::from(format!(
        "report-{}-{}.{}",
        sanitize(&teacher.name),
        report.date,
        format.extension()
    ))
}

pub fn dashboard_file_name(exported_on: NaiveDate, format: ExportFormat) -> PathBuf {
    PathBuf::from(format!(
        "aggregated-reports-{}.{}",
        exported_on,
        format.extension()
    ))
}

pub fn share_link(text: &str) -> String {
    format!("https://wa.me/?text={}", urlencoding::encode(text))
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    use crate::dashboard::DashboardRow;
    use crate::locale::Language;
    use crate::models::SchoolInfo;

    fn fixture() -> (Teacher, Report, Vec<Criterion>) {
        let teacher = Teacher::new("Avery Lee");
        let criteria = vec![
            Criterion::new("c1", "Attendance", CriterionKind::Rating),
            Criterion::new("c2", "Curriculum progress", CriterionKind::Select)
                .with_options(["Advanced", "On Track", "Delayed"]),
            Criterion::new("c3", "Last lesson", CriterionKind::Text),
            Criterion::new("c4", "Testing", CriterionKind::Rating),
        ];
        let mut report = Report::new(
            teacher.id,
            NaiveDate::from_ymd_opt(2024, 3, 11).unwrap(),
            SchoolInfo {
                school: Some("Al Noor".into()),
                subject: Some("Math".into()),
                ..SchoolInfo::default()
            },
        );
        report.ratings.insert("c1".into(), Answer::rating(2));
        report.ratings.insert("c2".into(), Answer::text("on-track"));
        report.ratings.insert("c3".into(), Answer::text("Fractions"));
        report.strategies = "Group work".into();
        report.total_percentage = scoring::total_percentage(&criteria, &report.ratings);
        (teacher, report, criteria)
    }

    #[test]
    fn report_text_lists_criteria_in_order() {
        let (teacher, report, criteria) = fixture();
        let view = ReportView {
            report: &report,
            teacher: &teacher,
            criteria: &criteria,
            labels: Language::En.labels(),
        };

        let text = report_text(&view, false);
        let expected = "\
Teacher Performance Report: Avery Lee
Report Date: 2024-03-11
School Name: Al Noor
Subject: Math

--- Evaluation Criteria ---
Attendance: 50%
Curriculum progress: On Track
Last lesson: Fractions
Testing: Not rated

Total Percentage: 62.5%

--- Additional Notes ---
Strategies Used: Group work
Teaching Aids Used: None
Programs Implemented: None
";
        assert_eq!(text, expected);
    }

    #[test]
    fn share_text_omits_school_and_notes() {
        let (teacher, report, criteria) = fixture();
        let view = ReportView {
            report: &report,
            teacher: &teacher,
            criteria: &criteria,
            labels: Language::En.labels(),
        };

        let text = report_text(&view, true);
        assert!(!text.contains("Al Noor"));
        assert!(!text.contains("Group work"));
        assert!(text.contains("Total Percentage: 62.5%"));
    }

    #[test]
    fn arabic_labels_render_progress_in_arabic() {
        let (teacher, report, mut criteria) = fixture();
        criteria[1].options = None;
        let view = ReportView {
            report: &report,
            teacher: &teacher,
            criteria: &criteria,
            labels: Language::Ar.labels(),
        };
        assert!(report_text(&view, true).contains("Curriculum progress: مطابق"));
    }

    #[test]
    fn declared_options_are_shown_instead_of_built_in_labels() {
        let (teacher, mut report, mut criteria) = fixture();
        criteria[1] = Criterion::new("c2", "Pace", CriterionKind::Select)
            .with_options(["Ahead", "Level", "Behind"]);
        report.ratings.insert("c2".into(), Answer::text("delayed"));
        let view = ReportView {
            report: &report,
            teacher: &teacher,
            criteria: &criteria,
            labels: Language::Ar.labels(),
        };
        assert!(report_text(&view, true).contains("Pace: Behind"));
        assert!(report_rows(&view).contains(&vec!["Pace".to_string(), "Behind".to_string()]));
    }

    #[test]
    fn report_csv_has_key_value_layout() {
        let (teacher, report, criteria) = fixture();
        let view = ReportView {
            report: &report,
            teacher: &teacher,
            criteria: &criteria,
            labels: Language::En.labels(),
        };

        let csv = String::from_utf8(to_csv(&report_rows(&view)).unwrap()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Teacher,Avery Lee");
        assert_eq!(lines[5], "Branch,Main");
        assert_eq!(lines[6], "\"\"");
        assert!(lines.contains(&"Total Percentage,62.5%"));
    }

    #[test]
    fn dashboard_exports() {
        let dashboard = Dashboard {
            column: "Rating".into(),
            rows: vec![DashboardRow {
                report_id: Uuid::new_v4(),
                teacher_name: "Avery Lee".into(),
                date: NaiveDate::from_ymd_opt(2024, 3, 11).unwrap(),
                value: "62.5%".into(),
            }],
            average: 62.5,
        };
        let labels = Language::En.labels();
        let today = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();

        let text = dashboard_text(&dashboard, labels, today, false);
        assert!(text.starts_with("Aggregated Reports Dashboard\nExport Date: 2024-04-01\n"));
        assert!(text.contains("Rating: 62.5%"));
        assert!(text.ends_with("Overall Average: 62.5%\n"));
        assert!(!dashboard_text(&dashboard, labels, today, true).contains("Export Date"));

        let csv = String::from_utf8(to_csv(&dashboard_rows(&dashboard, labels)).unwrap()).unwrap();
        assert!(csv.starts_with("Teacher,Date,Rating\nAvery Lee,2024-03-11,62.5%\n"));
        assert!(csv.ends_with("Overall Average,,62.5%\n"));
    }

    #[test]
    fn share_link_is_url_encoded() {
        assert_eq!(
            share_link("Total: 62.5%\nok"),
            "https://wa.me/?text=Total%3A%2062.5%25%0Aok"
        );
    }

    #[test]
    fn file_names_are_filesystem_safe() {
        let (mut teacher, report, _) = fixture();
        teacher.name = "Avery/Lee".into();
        assert_eq!(
            report_file_name(&teacher, &report, ExportFormat::Pdf),
            PathBuf::from("report-Avery_Lee-2024-03-11.pdf")
        );
        assert_eq!(
            dashboard_file_name(NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(), ExportFormat::Csv),
            PathBuf::from("aggregated-reports-2024-04-01.csv")
        );
    }

    #[test]
    fn percent_uses_one_decimal() {
        assert_eq!(percent(62.5), "62.5%");
        assert_eq!(percent(100.0), "100.0%");
        assert_eq!(percent(200.0 / 3.0), "66.7%");
    }
}
