use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{ArgGroup, Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod commands;
mod config;
mod dashboard;
mod db;
mod error;
mod export;
mod locale;
mod models;
mod pdf;
mod scoring;
mod store;

use crate::config::AppConfig;
use crate::export::ExportFormat;
use crate::locale::Language;
use crate::models::{Branch, CriterionKind};
use crate::store::Repository;

#[derive(Parser)]
#[command(name = "teacher-eval")]
#[command(about = "Record, score and export teacher performance evaluations", long_about = None)]
struct Cli {
    /// SQLite database URL; overrides DATABASE_URL
    #[arg(long, global = true)]
    database_url: Option<String>,
    /// Language for printed and exported text; overrides EVAL_LANGUAGE
    #[arg(long, global = true, value_enum)]
    language: Option<Language>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store the default teacher roster and criteria where none exist yet
    Seed,
    /// Manage teachers
    #[command(subcommand)]
    Teacher(TeacherCommand),
    /// Manage evaluation criteria
    #[command(subcommand)]
    Criterion(CriterionCommand),
    /// Create, edit and export evaluation reports
    #[command(subcommand)]
    Report(ReportCommand),
    /// Aggregated view over saved reports
    #[command(group(
        ArgGroup::new("scope")
            .args(["teacher", "criterion"])
            .multiple(false)
    ))]
    Dashboard {
        #[arg(long)]
        teacher: Option<Uuid>,
        #[arg(long)]
        criterion: Option<String>,
        #[arg(long, value_enum)]
        export: Option<ExportFormat>,
        #[arg(long)]
        out: Option<PathBuf>,
        /// Print a WhatsApp share link instead of the table
        #[arg(long)]
        share: bool,
    },
}

#[derive(Subcommand)]
pub enum TeacherCommand {
    /// Add a teacher
    Add {
        name: String,
        #[command(flatten)]
        school: SchoolArgs,
    },
    /// Rename a teacher or change their default school context
    Update {
        id: Uuid,
        #[arg(long)]
        name: Option<String>,
        #[command(flatten)]
        school: SchoolArgs,
    },
    /// Delete a teacher together with all of their reports
    Delete { id: Uuid },
    /// List teachers with their saved reports
    List,
}

#[derive(Subcommand)]
pub enum CriterionCommand {
    /// Append a criterion
    Add {
        label: String,
        #[arg(long = "type", value_enum)]
        kind: CriterionKind,
        /// Comma separated options for select criteria
        #[arg(long, value_delimiter = ',')]
        options: Vec<String>,
    },
    /// Change a criterion's label or options
    Update {
        id: String,
        #[arg(long)]
        label: Option<String>,
        #[arg(long, value_delimiter = ',')]
        options: Option<Vec<String>>,
    },
    /// Delete a criterion and strip its answers from stored reports
    Delete { id: String },
    /// List criteria in display order
    List,
}

#[derive(Subcommand)]
pub enum ReportCommand {
    /// Record a new report for a teacher
    New {
        #[arg(long)]
        teacher: Uuid,
        /// Defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Answer as <criterion-id>=<value>; repeatable
        #[arg(long = "answer", value_parser = parse_answer)]
        answers: Vec<(String, String)>,
        #[command(flatten)]
        school: SchoolArgs,
        #[command(flatten)]
        notes: NoteArgs,
    },
    /// Change a saved report; its total is recomputed against current criteria
    Edit {
        id: Uuid,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long = "answer", value_parser = parse_answer)]
        answers: Vec<(String, String)>,
        /// Remove the answer for a criterion; repeatable
        #[arg(long = "clear")]
        clear: Vec<String>,
        #[command(flatten)]
        school: SchoolArgs,
        #[command(flatten)]
        notes: NoteArgs,
    },
    /// Print a report
    Show { id: Uuid },
    /// Delete a report
    Delete { id: Uuid },
    /// List reports, newest first
    List {
        #[arg(long)]
        teacher: Option<Uuid>,
    },
    /// Write a report to a file
    Export {
        id: Uuid,
        #[arg(long, value_enum, default_value_t = ExportFormat::Pdf)]
        format: ExportFormat,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print a WhatsApp share link for a report
    Share { id: Uuid },
}

#[derive(Args, Debug, Default, Clone)]
pub struct SchoolArgs {
    #[arg(long)]
    pub subject: Option<String>,
    #[arg(long)]
    pub grade: Option<String>,
    #[arg(long)]
    pub school: Option<String>,
    #[arg(long, value_enum)]
    pub branch: Option<Branch>,
}

#[derive(Args, Debug, Default, Clone)]
pub struct NoteArgs {
    #[arg(long)]
    pub strategies: Option<String>,
    #[arg(long)]
    pub aids: Option<String>,
    #[arg(long)]
    pub programs: Option<String>,
}

fn parse_answer(raw: &str) -> Result<(String, String), String> {
    let (id, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected <criterion-id>=<value>, got '{raw}'"))?;
    let id = id.trim();
    if id.is_empty() {
        return Err(format!("missing criterion id in '{raw}'"));
    }
    Ok((id.to_string(), value.trim().to_string()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?.with_overrides(cli.database_url, cli.language)?;

    let pool = db::connect(&config.database_url)
        .await
        .with_context(|| format!("failed to open {}", config.database_url))?;
    db::init_db(&pool)
        .await
        .context("failed to apply database migrations")?;
    let repo = Repository::new(pool.clone());

    match cli.command {
        Commands::Seed => {
            let summary = db::seed(&pool, config.language).await?;
            println!(
                "Seeded {} teachers and {} criteria.",
                summary.teachers, summary.criteria
            );
        }
        Commands::Teacher(command) => commands::teacher(&repo, &config, command).await?,
        Commands::Criterion(command) => commands::criterion(&repo, command).await?,
        Commands::Report(command) => commands::report(&repo, &config, command).await?,
        Commands::Dashboard {
            teacher,
            criterion,
            export,
            out,
            share,
        } => {
            let filter = match (teacher, criterion) {
                (Some(id), _) => dashboard::DashboardFilter::Teacher(id),
                (None, Some(id)) => dashboard::DashboardFilter::Criterion(id),
                (None, None) => dashboard::DashboardFilter::All,
            };
            commands::dashboard(&repo, &config, filter, export, out, share).await?;
        }
    }

    Ok(())
}
