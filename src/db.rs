use std::str::FromStr;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Executor, Row, Sqlite};
use tracing::{debug, info};

use crate::error::{Result, StoreError};
use crate::locale::Language;
use crate::models::{Criterion, CriterionKind, Teacher};

pub const TEACHERS_KEY: &str = "teachers";
pub const REPORTS_KEY: &str = "reports";
pub const CRITERIA_KEY: &str = "criteria";

const DEFAULT_TEACHERS: [&str; 26] = [
    "وجدان العزي",
    "محمد الدريهم",
    "عبد الرؤوف الوصابي",
    "فهمي الجرافي",
    "آية فاتق",
    "عاصم المنعي",
    "عبد الرزاق صبيح",
    "جمال الرديني",
    "إيمان قطيش",
    "وفاء الصلوي",
    "إيمان النصيف",
    "عبد السلام المعدني",
    "علي عامر",
    "محمد المشرع",
    "إيمان العبسي",
    "رانيا العزي",
    "هدى الصغير",
    "أشواق المخلافي",
    "عائشة العريقي",
    "ألطاف جار الله",
    "هناء الحيجنة",
    "رحاب العيفري",
    "ضحى القباطي",
    "خلود صلاح",
    "هند الحبابي",
    "ناديا الورد",
];

pub async fn connect(database_url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

    // A single long-lived connection keeps `sqlite::memory:` databases alive.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    Ok(pool)
}

pub async fn init_db(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn get_json<T: DeserializeOwned>(
    pool: &SqlitePool,
    key: &'static str,
) -> Result<Option<T>> {
    let row = sqlx::query("SELECT value FROM kv_store WHERE key = ?1")
        .bind(key)
        .fetch_optional(pool)
        .await?;

    let Some(row) = row else {
        debug!(key, "no stored value");
        return Ok(None);
    };

    let raw: String = row.get("value");
    let value = serde_json::from_str(&raw)
        .map_err(|source| StoreError::Serialization { key, source })?;
    debug!(key, bytes = raw.len(), "loaded stored value");
    Ok(Some(value))
}

/// Upserts one key. Accepts a pool or a transaction's connection so several
/// keys can be written atomically.
pub async fn set_json<'e, E, T>(executor: E, key: &'static str, value: &T) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
    T: Serialize + ?Sized,
{
    let raw = serde_json::to_string(value)
        .map_err(|source| StoreError::Serialization { key, source })?;

    sqlx::query(
        r#"
        INSERT INTO kv_store (key, value, updated_at)
        VALUES (?1, ?2, ?3)
        ON CONFLICT (key) DO UPDATE
        SET value = excluded.value, updated_at = excluded.updated_at
        "#,
    )
    .bind(key)
    .bind(&raw)
    .bind(Utc::now().to_rfc3339())
    .execute(executor)
    .await?;

    debug!(key, bytes = raw.len(), "stored value");
    Ok(())
}

pub fn default_criteria(language: Language) -> Vec<Criterion> {
    let labels = language.labels();
    let kinds = [
        CriterionKind::Rating,
        CriterionKind::Select,
        CriterionKind::Text,
        CriterionKind::Rating,
        CriterionKind::Rating,
        CriterionKind::Rating,
        CriterionKind::Rating,
        CriterionKind::Rating,
    ];

    kinds
        .into_iter()
        .zip(labels.default_criteria)
        .enumerate()
        .map(|(index, (kind, label))| {
            let criterion = Criterion::new(format!("c{}", index + 1), label, kind);
            if kind == CriterionKind::Select {
                criterion.with_options(labels.progress_options)
            } else {
                criterion
            }
        })
        .collect()
}

pub fn default_teachers() -> Vec<Teacher> {
    DEFAULT_TEACHERS.iter().map(|name| Teacher::new(*name)).collect()
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub teachers: usize,
    pub criteria: usize,
}

/// Writes the default roster and criteria where nothing is stored yet.
pub async fn seed(pool: &SqlitePool, language: Language) -> Result<SeedSummary> {
    let mut summary = SeedSummary::default();

    if get_json::<Vec<Teacher>>(pool, TEACHERS_KEY).await?.is_none() {
        let teachers = default_teachers();
        set_json(pool, TEACHERS_KEY, &teachers).await?;
        summary.teachers = teachers.len();
    }

    if get_json::<Vec<Criterion>>(pool, CRITERIA_KEY).await?.is_none() {
        let criteria = default_criteria(language);
        set_json(pool, CRITERIA_KEY, &criteria).await?;
        summary.criteria = criteria.len();
    }

    info!(
        teachers = summary.teachers,
        criteria = summary.criteria,
        %language,
        "seed complete"
    );
    Ok(summary)
}

#[cfg(test)]
pub(crate) async fn memory_pool() -> SqlitePool {
    let pool = connect("sqlite::memory:").await.expect("open memory db");
    init_db(&pool).await.expect("migrate memory db");
    pool
}
