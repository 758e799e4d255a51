use std::path::PathBuf;

use anyhow::{bail, Context};
use chrono::Utc;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::dashboard::{self, DashboardFilter};
use crate::export::{self, ExportFormat, ReportView};
use crate::models::{Answer, Criterion, CriterionKind, Report, SchoolInfo, Teacher};
use crate::scoring;
use crate::store::{CriterionUpdate, Repository};
use crate::{CriterionCommand, NoteArgs, ReportCommand, SchoolArgs, TeacherCommand};

pub async fn teacher(
    repo: &Repository,
    config: &AppConfig,
    command: TeacherCommand,
) -> anyhow::Result<()> {
    match command {
        TeacherCommand::Add { name, school } => {
            let mut teacher = Teacher::new(name.trim());
            apply_teacher_school(&mut teacher, school);
            repo.upsert_teacher(teacher.clone()).await?;
            println!("Added {} ({}).", teacher.name, teacher.id);
        }
        TeacherCommand::Update { id, name, school } => {
            let mut teacher = repo.teacher(id).await?;
            if let Some(name) = name {
                teacher.name = name.trim().to_string();
            }
            apply_teacher_school(&mut teacher, school);
            repo.upsert_teacher(teacher.clone()).await?;
            println!("Updated {} ({}).", teacher.name, teacher.id);
        }
        TeacherCommand::Delete { id } => {
            let teacher = repo.teacher(id).await?;
            let removed = repo.reports_for_teacher(id).await?.len();
            repo.delete_teacher(id).await?;
            println!("Deleted {} and {removed} reports.", teacher.name);
        }
        TeacherCommand::List => {
            let labels = config.language.labels();
            let teachers = repo.teachers().await?;
            if teachers.is_empty() {
                println!("No teachers recorded. Run `teacher-eval seed` or `teacher-eval teacher add`.");
                return Ok(());
            }

            for teacher in teachers {
                println!("- {} ({})", teacher.name, teacher.id);
                let reports = repo.reports_for_teacher(teacher.id).await?;
                if !reports.is_empty() {
                    println!("    {}:", labels.saved_reports);
                }
                for report in reports {
                    println!(
                        "    {}  {:>6}  {}",
                        report.date,
                        export::percent(report.total_percentage),
                        report.id
                    );
                }
            }
        }
    }

    Ok(())
}

pub async fn criterion(repo: &Repository, command: CriterionCommand) -> anyhow::Result<()> {
    match command {
        CriterionCommand::Add {
            label,
            kind,
            options,
        } => {
            if kind == CriterionKind::Select && options.is_empty() {
                bail!("select criteria need --options, e.g. --options Advanced,\"On Track\",Delayed");
            }
            let (criterion, _) = repo.add_criterion(&label, kind, options).await?;
            println!("Added criterion {} ({}).", criterion.label, criterion.id);
        }
        CriterionCommand::Update { id, label, options } => {
            repo.update_criterion(&id, CriterionUpdate { label, options })
                .await?;
            println!("Updated criterion {id}.");
        }
        CriterionCommand::Delete { id } => {
            let criterion = repo.criterion(&id).await?;
            let stripped = repo
                .reports()
                .await?
                .iter()
                .filter(|r| r.ratings.contains_key(&id))
                .count();
            repo.delete_criterion(&id).await?;
            println!(
                "Deleted criterion {} ({id}); removed its answers from {stripped} reports.",
                criterion.label
            );
        }
        CriterionCommand::List => {
            for criterion in repo.criteria().await? {
                let kind = criterion.type_name();
                if criterion.options().is_empty() {
                    println!("{:<38} {:<7} {}", criterion.id, kind, criterion.label);
                } else {
                    println!(
                        "{:<38} {:<7} {} [{}]",
                        criterion.id,
                        kind,
                        criterion.label,
                        criterion.options().join(", ")
                    );
                }
            }
        }
    }

    Ok(())
}

pub async fn report(
    repo: &Repository,
    config: &AppConfig,
    command: ReportCommand,
) -> anyhow::Result<()> {
    let labels = config.language.labels();

    match command {
        ReportCommand::New {
            teacher,
            date,
            answers,
            school,
            notes,
        } => {
            let teacher = repo.teacher(teacher).await?;
            let criteria = repo.criteria().await?;
            let mut info = repo.initial_school_info(&teacher).await?;
            apply_school(&mut info, school);

            let date = date.unwrap_or_else(|| Utc::now().date_naive());
            let mut report = Report::new(teacher.id, date, info);
            set_answers(&mut report, &criteria, answers)?;
            apply_notes(&mut report, notes);

            let id = report.id;
            repo.save_report(report).await?;
            let saved = repo.report(id).await?;
            println!(
                "Saved report {id} for {} at {}.",
                teacher.name,
                export::percent(saved.total_percentage)
            );
        }
        ReportCommand::Edit {
            id,
            date,
            answers,
            clear,
            school,
            notes,
        } => {
            let mut report = repo.report(id).await?;
            let criteria = repo.criteria().await?;
            if let Some(date) = date {
                report.date = date;
            }
            for criterion_id in clear {
                report.ratings.remove(&criterion_id);
            }
            set_answers(&mut report, &criteria, answers)?;
            apply_school(&mut report.school_info, school);
            apply_notes(&mut report, notes);

            repo.save_report(report).await?;
            let saved = repo.report(id).await?;
            println!(
                "Updated report {id} at {}.",
                export::percent(saved.total_percentage)
            );
        }
        ReportCommand::Show { id } => {
            let (report, teacher, criteria) = load_report(repo, id).await?;
            let view = ReportView {
                report: &report,
                teacher: &teacher,
                criteria: &criteria,
                labels,
            };
            print!("{}", export::report_text(&view, false));
        }
        ReportCommand::Delete { id } => {
            repo.delete_report(id).await?;
            println!("Deleted report {id}.");
        }
        ReportCommand::List { teacher } => {
            let teachers = repo.teachers().await?;
            let mut reports = match teacher {
                Some(teacher_id) => repo.reports_for_teacher(teacher_id).await?,
                None => repo.reports().await?,
            };
            reports.sort_by(|a, b| b.date.cmp(&a.date));

            if reports.is_empty() {
                println!("{}", labels.no_reports);
            }
            for report in reports {
                let name = teachers
                    .iter()
                    .find(|t| t.id == report.teacher_id)
                    .map(|t| t.name.as_str())
                    .unwrap_or(labels.unknown_teacher);
                println!(
                    "{}  {:>6}  {}  {}",
                    report.date,
                    export::percent(report.total_percentage),
                    report.id,
                    name
                );
            }
        }
        ReportCommand::Export { id, format, out } => {
            let (report, teacher, criteria) = load_report(repo, id).await?;
            let view = ReportView {
                report: &report,
                teacher: &teacher,
                criteria: &criteria,
                labels,
            };
            let text = export::report_text(&view, false);
            let bytes = export::render(format, labels.teacher_performance_report, &text, &export::report_rows(&view))?;
            let path = out.unwrap_or_else(|| {
                config
                    .export_dir
                    .join(export::report_file_name(&teacher, &report, format))
            });
            export::write_export(&path, &bytes)?;
            println!("Report written to {}.", path.display());
        }
        ReportCommand::Share { id } => {
            let (report, teacher, criteria) = load_report(repo, id).await?;
            let view = ReportView {
                report: &report,
                teacher: &teacher,
                criteria: &criteria,
                labels,
            };
            println!("{}", export::share_link(&export::report_text(&view, true)));
        }
    }

    Ok(())
}

pub async fn dashboard(
    repo: &Repository,
    config: &AppConfig,
    filter: DashboardFilter,
    format: Option<ExportFormat>,
    out: Option<PathBuf>,
    share: bool,
) -> anyhow::Result<()> {
    let labels = config.language.labels();
    let teachers = repo.teachers().await?;
    let reports = repo.reports().await?;
    let criteria = repo.criteria().await?;
    let dashboard = dashboard::build_dashboard(&teachers, &reports, &criteria, &filter, labels)?;
    let today = Utc::now().date_naive();

    if share {
        let text = export::dashboard_text(&dashboard, labels, today, true);
        println!("{}", export::share_link(&text));
        return Ok(());
    }

    if let Some(format) = format {
        let text = export::dashboard_text(&dashboard, labels, today, false);
        let bytes = export::render(format, labels.dashboard_title, &text, &export::dashboard_rows(&dashboard, labels))?;
        let path = out.unwrap_or_else(|| {
            config
                .export_dir
                .join(export::dashboard_file_name(today, format))
        });
        export::write_export(&path, &bytes)?;
        println!("Dashboard written to {}.", path.display());
        return Ok(());
    }

    println!("{}", labels.dashboard_title);
    if dashboard.rows.is_empty() {
        println!("{}", labels.no_reports);
    }
    for row in &dashboard.rows {
        println!("{}  {:<30}  {}", row.date, row.teacher_name, row.value);
    }
    println!(
        "{}: {}",
        labels.average_total,
        export::percent(dashboard.average)
    );
    Ok(())
}

async fn load_report(repo: &Repository, id: Uuid) -> anyhow::Result<(Report, Teacher, Vec<Criterion>)> {
    let report = repo.report(id).await?;
    let teacher = repo
        .teacher(report.teacher_id)
        .await
        .with_context(|| format!("report {id} references a missing teacher"))?;
    let criteria = repo.criteria().await?;
    Ok((report, teacher, criteria))
}

/// Converts command line answers into stored answers, rejecting anything the
/// aggregator would silently ignore or score as zero.
fn set_answers(
    report: &mut Report,
    criteria: &[Criterion],
    answers: Vec<(String, String)>,
) -> anyhow::Result<()> {
    for (criterion_id, raw) in answers {
        let criterion = criteria
            .iter()
            .find(|c| c.id == criterion_id)
            .with_context(|| format!("unknown criterion {criterion_id}"))?;
        let answer = parse_answer_value(criterion, &raw)?;
        report.ratings.insert(criterion_id, answer);
    }
    Ok(())
}

fn parse_answer_value(criterion: &Criterion, raw: &str) -> anyhow::Result<Answer> {
    match criterion.kind {
        CriterionKind::Rating => {
            let value: i64 = raw
                .parse()
                .with_context(|| format!("rating for {} must be a number from 1 to 4", criterion.id))?;
            if scoring::rating_percentage(value).is_none() {
                bail!("rating for {} must be a number from 1 to 4, got {value}", criterion.id);
            }
            Ok(Answer::rating(value))
        }
        CriterionKind::Select => match scoring::resolve_progress(criterion, raw) {
            Some(progress) => Ok(Answer::text(progress.tag())),
            None => bail!(
                "'{raw}' is not an option of {} (expected one of: {})",
                criterion.id,
                criterion
                    .options()
                    .iter()
                    .map(String::as_str)
                    .chain(["advanced", "on-track", "delayed"])
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        },
        CriterionKind::Text => Ok(Answer::text(raw)),
        CriterionKind::Unknown => bail!("criterion {} has an unsupported type", criterion.id),
    }
}

fn apply_school(info: &mut SchoolInfo, args: SchoolArgs) {
    if args.subject.is_some() {
        info.subject = args.subject;
    }
    if args.grade.is_some() {
        info.grade = args.grade;
    }
    if args.school.is_some() {
        info.school = args.school;
    }
    if args.branch.is_some() {
        info.branch = args.branch;
    }
}

fn apply_teacher_school(teacher: &mut Teacher, args: SchoolArgs) {
    if args.subject.is_some() {
        teacher.subject = args.subject;
    }
    if args.grade.is_some() {
        teacher.grade = args.grade;
    }
    if args.school.is_some() {
        teacher.school = args.school;
    }
    if args.branch.is_some() {
        teacher.branch = args.branch;
    }
}

fn apply_notes(report: &mut Report, notes: NoteArgs) {
    if let Some(strategies) = notes.strategies {
        report.strategies = strategies;
    }
    if let Some(aids) = notes.aids {
        report.aids = aids;
    }
    if let Some(programs) = notes.programs {
        report.programs = programs;
    }
}
