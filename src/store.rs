//! Repository over the three stored collections.
//!
//! Every mutation loads the current collection, applies the change, writes the
//! whole collection back under its fixed key and returns the new snapshot.

use sqlx::sqlite::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::{self, CRITERIA_KEY, REPORTS_KEY, TEACHERS_KEY};
use crate::error::{Result, StoreError};
use crate::models::{Criterion, CriterionKind, Report, SchoolInfo, Teacher};
use crate::scoring;

#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}

/// Fields of a criterion that may change after creation.
#[derive(Debug, Clone, Default)]
pub struct CriterionUpdate {
    pub label: Option<String>,
    pub options: Option<Vec<String>>,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn teachers(&self) -> Result<Vec<Teacher>> {
        Ok(db::get_json(&self.pool, TEACHERS_KEY).await?.unwrap_or_default())
    }

    pub async fn reports(&self) -> Result<Vec<Report>> {
        Ok(db::get_json(&self.pool, REPORTS_KEY).await?.unwrap_or_default())
    }

    pub async fn criteria(&self) -> Result<Vec<Criterion>> {
        Ok(db::get_json(&self.pool, CRITERIA_KEY).await?.unwrap_or_default())
    }

    pub async fn teacher(&self, id: Uuid) -> Result<Teacher> {
        self.teachers()
            .await?
            .into_iter()
            .find(|t| t.id == id)
            .ok_or(StoreError::TeacherNotFound(id))
    }

    pub async fn report(&self, id: Uuid) -> Result<Report> {
        self.reports()
            .await?
            .into_iter()
            .find(|r| r.id == id)
            .ok_or(StoreError::ReportNotFound(id))
    }

    pub async fn criterion(&self, id: &str) -> Result<Criterion> {
        self.criteria()
            .await?
            .into_iter()
            .find(|c| c.id == id)
            .ok_or_else(|| StoreError::CriterionNotFound(id.to_string()))
    }

    /// Newest first.
    pub async fn reports_for_teacher(&self, teacher_id: Uuid) -> Result<Vec<Report>> {
        let mut reports: Vec<Report> = self
            .reports()
            .await?
            .into_iter()
            .filter(|r| r.teacher_id == teacher_id)
            .collect();
        reports.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(reports)
    }

    /// School context for a new report: the teacher's latest report snapshot,
    /// falling back to the teacher's own defaults.
    pub async fn initial_school_info(&self, teacher: &Teacher) -> Result<SchoolInfo> {
        Ok(self
            .reports_for_teacher(teacher.id)
            .await?
            .into_iter()
            .next()
            .map(|report| report.school_info)
            .unwrap_or_else(|| teacher.default_school_info()))
    }

    pub async fn upsert_teacher(&self, teacher: Teacher) -> Result<Vec<Teacher>> {
        if teacher.name.trim().is_empty() {
            return Err(StoreError::Invalid("teacher name must not be empty".into()));
        }

        let mut teachers = self.teachers().await?;
        info!(teacher_id = %teacher.id, name = %teacher.name, "saving teacher");
        upsert_by(&mut teachers, teacher, |t| t.id);
        db::set_json(&self.pool, TEACHERS_KEY, &teachers).await?;
        Ok(teachers)
    }

    /// Removes the teacher and every report that references them.
    pub async fn delete_teacher(&self, id: Uuid) -> Result<(Vec<Teacher>, Vec<Report>)> {
        let mut teachers = self.teachers().await?;
        let before = teachers.len();
        teachers.retain(|t| t.id != id);
        if teachers.len() == before {
            return Err(StoreError::TeacherNotFound(id));
        }

        let mut reports = self.reports().await?;
        let report_count = reports.len();
        reports.retain(|r| r.teacher_id != id);

        let mut tx = self.pool.begin().await?;
        db::set_json(&mut *tx, TEACHERS_KEY, &teachers).await?;
        db::set_json(&mut *tx, REPORTS_KEY, &reports).await?;
        tx.commit().await?;
        info!(
            teacher_id = %id,
            removed_reports = report_count - reports.len(),
            "deleted teacher"
        );
        Ok((teachers, reports))
    }

    /// Stores the report with its total computed against the current
    /// criteria. The stored total is never revisited afterwards.
    pub async fn save_report(&self, mut report: Report) -> Result<Vec<Report>> {
        let teachers = self.teachers().await?;
        if !teachers.iter().any(|t| t.id == report.teacher_id) {
            return Err(StoreError::TeacherNotFound(report.teacher_id));
        }

        let criteria = self.criteria().await?;
        for issue in scoring::validate_ratings(&criteria, &report.ratings) {
            warn!(report_id = %report.id, %issue, "report answer will not score as expected");
        }
        report.total_percentage = scoring::total_percentage(&criteria, &report.ratings);

        let mut reports = self.reports().await?;
        info!(
            report_id = %report.id,
            teacher_id = %report.teacher_id,
            total = report.total_percentage,
            "saving report"
        );
        upsert_by(&mut reports, report, |r| r.id);
        db::set_json(&self.pool, REPORTS_KEY, &reports).await?;
        Ok(reports)
    }

    pub async fn delete_report(&self, id: Uuid) -> Result<Vec<Report>> {
        let mut reports = self.reports().await?;
        let before = reports.len();
        reports.retain(|r| r.id != id);
        if reports.len() == before {
            return Err(StoreError::ReportNotFound(id));
        }

        db::set_json(&self.pool, REPORTS_KEY, &reports).await?;
        info!(report_id = %id, "deleted report");
        Ok(reports)
    }

    pub async fn add_criterion(
        &self,
        label: &str,
        kind: CriterionKind,
        options: Vec<String>,
    ) -> Result<(Criterion, Vec<Criterion>)> {
        let label = label.trim();
        if label.is_empty() {
            return Err(StoreError::Invalid("criterion label must not be empty".into()));
        }
        if kind == CriterionKind::Unknown {
            return Err(StoreError::Invalid("criterion type must be rating, select or text".into()));
        }

        let mut criterion = Criterion::new(Uuid::new_v4().to_string(), label, kind);
        if kind == CriterionKind::Select {
            criterion = criterion.with_options(clean_options(options));
        }

        let mut criteria = self.criteria().await?;
        criteria.push(criterion.clone());
        db::set_json(&self.pool, CRITERIA_KEY, &criteria).await?;
        info!(criterion_id = %criterion.id, label, "added criterion");
        Ok((criterion, criteria))
    }

    pub async fn update_criterion(&self, id: &str, update: CriterionUpdate) -> Result<Vec<Criterion>> {
        let mut criteria = self.criteria().await?;
        let criterion = criteria
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| StoreError::CriterionNotFound(id.to_string()))?;

        if let Some(label) = update.label {
            let label = label.trim();
            if label.is_empty() {
                return Err(StoreError::Invalid("criterion label must not be empty".into()));
            }
            criterion.label = label.to_string();
        }

        if let Some(options) = update.options {
            if criterion.kind != CriterionKind::Select {
                return Err(StoreError::Invalid(format!(
                    "criterion {id} is not a select criterion"
                )));
            }
            criterion.options = Some(clean_options(options));
        }

        db::set_json(&self.pool, CRITERIA_KEY, &criteria).await?;
        info!(criterion_id = id, "updated criterion");
        Ok(criteria)
    }

    /// Removes the criterion and strips its answers from every stored report.
    /// Stored totals keep the value they were saved with.
    pub async fn delete_criterion(&self, id: &str) -> Result<(Vec<Criterion>, Vec<Report>)> {
        let mut criteria = self.criteria().await?;
        let before = criteria.len();
        criteria.retain(|c| c.id != id);
        if criteria.len() == before {
            return Err(StoreError::CriterionNotFound(id.to_string()));
        }

        let mut reports = self.reports().await?;
        let mut stripped = 0usize;
        for report in reports.iter_mut() {
            if report.ratings.remove(id).is_some() {
                stripped += 1;
            }
        }

        let mut tx = self.pool.begin().await?;
        db::set_json(&mut *tx, CRITERIA_KEY, &criteria).await?;
        if stripped > 0 {
            db::set_json(&mut *tx, REPORTS_KEY, &reports).await?;
        }
        tx.commit().await?;
        info!(criterion_id = id, stripped_reports = stripped, "deleted criterion");
        Ok((criteria, reports))
    }
}

fn upsert_by<T, K, F>(items: &mut Vec<T>, item: T, key: F)
where
    K: PartialEq,
    F: Fn(&T) -> K,
{
    let id = key(&item);
    match items.iter().position(|existing| key(existing) == id) {
        Some(index) => items[index] = item,
        None => items.push(item),
    }
}

fn clean_options(options: Vec<String>) -> Vec<String> {
    options
        .into_iter()
        .map(|option| option.trim().to_string())
        .filter(|option| !option.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    use crate::db::memory_pool;
    use crate::locale::Language;
    use crate::models::{Answer, Branch};

    async fn seeded_repo() -> (Repository, Teacher) {
        let pool = memory_pool().await;
        db::set_json(&pool, CRITERIA_KEY, &db::default_criteria(Language::En))
            .await
            .unwrap();
        let repo = Repository::new(pool);
        let teacher = Teacher::new("Avery Lee");
        repo.upsert_teacher(teacher.clone()).await.unwrap();
        (repo, teacher)
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, d).unwrap()
    }

    #[tokio::test]
    async fn upsert_teacher_replaces_by_id() {
        let (repo, mut teacher) = seeded_repo().await;
        teacher.name = "Avery Lee-Moreno".into();
        let teachers = repo.upsert_teacher(teacher.clone()).await.unwrap();
        assert_eq!(teachers.len(), 1);
        assert_eq!(teachers[0].name, "Avery Lee-Moreno");

        let err = repo.upsert_teacher(Teacher::new("  ")).await.unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
    }

    #[tokio::test]
    async fn save_report_computes_total_from_current_criteria() {
        let (repo, teacher) = seeded_repo().await;
        let mut report = Report::new(teacher.id, day(3), SchoolInfo::default());
        report.ratings.insert("c1".into(), Answer::rating(2));
        report.ratings.insert("c2".into(), Answer::text("on-track"));
        report.ratings.insert("c3".into(), Answer::text("Fractions"));
        report.total_percentage = 12.0;

        let reports = repo.save_report(report.clone()).await.unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].total_percentage, 62.5);
        assert_eq!(repo.report(report.id).await.unwrap().total_percentage, 62.5);
    }

    #[tokio::test]
    async fn save_report_requires_known_teacher() {
        let (repo, _) = seeded_repo().await;
        let orphan = Report::new(Uuid::new_v4(), day(1), SchoolInfo::default());
        let err = repo.save_report(orphan).await.unwrap_err();
        assert!(matches!(err, StoreError::TeacherNotFound(_)));
    }

    #[tokio::test]
    async fn deleting_teacher_cascades_to_reports() {
        let (repo, teacher) = seeded_repo().await;
        let other = Teacher::new("Jules Moreno");
        repo.upsert_teacher(other.clone()).await.unwrap();
        repo.save_report(Report::new(teacher.id, day(1), SchoolInfo::default()))
            .await
            .unwrap();
        repo.save_report(Report::new(other.id, day(2), SchoolInfo::default()))
            .await
            .unwrap();

        let (teachers, reports) = repo.delete_teacher(teacher.id).await.unwrap();
        assert_eq!(teachers.len(), 1);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].teacher_id, other.id);

        assert!(matches!(
            repo.delete_teacher(teacher.id).await,
            Err(StoreError::TeacherNotFound(_))
        ));
    }

    #[tokio::test]
    async fn deleting_criterion_strips_answers_but_keeps_totals() {
        let (repo, teacher) = seeded_repo().await;
        let mut report = Report::new(teacher.id, day(5), SchoolInfo::default());
        report.ratings.insert("c1".into(), Answer::rating(4));
        report.ratings.insert("c4".into(), Answer::rating(2));
        repo.save_report(report.clone()).await.unwrap();

        let (criteria, reports) = repo.delete_criterion("c4").await.unwrap();
        assert!(criteria.iter().all(|c| c.id != "c4"));
        assert!(!reports[0].ratings.contains_key("c4"));
        assert_eq!(reports[0].total_percentage, 75.0);

        let stored = repo.report(report.id).await.unwrap();
        assert!(stored.ratings.contains_key("c1"));
        assert_eq!(stored.total_percentage, 75.0);
    }

    #[tokio::test]
    async fn adding_criteria_does_not_touch_stored_totals() {
        let (repo, teacher) = seeded_repo().await;
        let mut report = Report::new(teacher.id, day(5), SchoolInfo::default());
        report.ratings.insert("c1".into(), Answer::rating(4));
        repo.save_report(report.clone()).await.unwrap();

        let (criterion, criteria) = repo
            .add_criterion("Lesson planning", CriterionKind::Rating, Vec::new())
            .await
            .unwrap();
        assert_eq!(criteria.len(), 9);
        assert_eq!(criteria.last(), Some(&criterion));
        assert_eq!(repo.report(report.id).await.unwrap().total_percentage, 100.0);
    }

    #[tokio::test]
    async fn criterion_updates_respect_type() {
        let (repo, _) = seeded_repo().await;
        let criteria = repo
            .update_criterion(
                "c2",
                CriterionUpdate {
                    label: Some("Syllabus pace".into()),
                    options: Some(vec![" Ahead ".into(), "".into(), "Level".into(), "Behind".into()]),
                },
            )
            .await
            .unwrap();
        let c2 = criteria.iter().find(|c| c.id == "c2").unwrap();
        assert_eq!(c2.label, "Syllabus pace");
        assert_eq!(c2.options(), ["Ahead", "Level", "Behind"]);

        let err = repo
            .update_criterion(
                "c1",
                CriterionUpdate {
                    label: None,
                    options: Some(vec!["x".into()]),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));

        let err = repo
            .update_criterion("missing", CriterionUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::CriterionNotFound(_)));
    }

    #[tokio::test]
    async fn initial_school_info_prefers_latest_report() {
        let (repo, mut teacher) = seeded_repo().await;
        teacher.school = Some("Al Noor".into());
        teacher.branch = Some(Branch::Boys);
        repo.upsert_teacher(teacher.clone()).await.unwrap();

        let info = repo.initial_school_info(&teacher).await.unwrap();
        assert_eq!(info.school(), Some("Al Noor"));
        assert_eq!(info.branch, Some(Branch::Boys));

        let older = Report::new(
            teacher.id,
            day(1),
            SchoolInfo {
                subject: Some("Science".into()),
                ..SchoolInfo::default()
            },
        );
        let newer = Report::new(
            teacher.id,
            day(9),
            SchoolInfo {
                subject: Some("Math".into()),
                ..SchoolInfo::default()
            },
        );
        repo.save_report(newer).await.unwrap();
        repo.save_report(older).await.unwrap();

        let info = repo.initial_school_info(&teacher).await.unwrap();
        assert_eq!(info.subject(), Some("Math"));

        let listed = repo.reports_for_teacher(teacher.id).await.unwrap();
        assert_eq!(listed[0].date, day(9));
        assert_eq!(listed[1].date, day(1));
    }

    /// Makes every later write to the reports key fail.
    async fn reject_report_writes(repo: &Repository) {
        sqlx::query(
            r#"
            CREATE TRIGGER reject_report_writes BEFORE UPDATE ON kv_store
            WHEN NEW.key = 'reports'
            BEGIN
                SELECT RAISE(ABORT, 'reports are read-only');
            END
            "#,
        )
        .execute(&repo.pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn failed_teacher_delete_leaves_teacher_and_reports() {
        let (repo, teacher) = seeded_repo().await;
        repo.save_report(Report::new(teacher.id, day(1), SchoolInfo::default()))
            .await
            .unwrap();
        reject_report_writes(&repo).await;

        let err = repo.delete_teacher(teacher.id).await.unwrap_err();
        assert!(matches!(err, StoreError::Database(_)));
        assert_eq!(repo.teachers().await.unwrap().len(), 1);
        assert_eq!(repo.reports_for_teacher(teacher.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_criterion_delete_keeps_criterion_and_answers() {
        let (repo, teacher) = seeded_repo().await;
        let mut report = Report::new(teacher.id, day(2), SchoolInfo::default());
        report.ratings.insert("c4".into(), Answer::rating(3));
        repo.save_report(report.clone()).await.unwrap();
        reject_report_writes(&repo).await;

        assert!(repo.delete_criterion("c4").await.is_err());
        assert_eq!(repo.criterion("c4").await.unwrap().id, "c4");
        assert!(repo.report(report.id).await.unwrap().ratings.contains_key("c4"));
    }

    #[tokio::test]
    async fn deleting_missing_report_is_an_error() {
        let (repo, _) = seeded_repo().await;
        assert!(matches!(
            repo.delete_report(Uuid::new_v4()).await,
            Err(StoreError::ReportNotFound(_))
        ));
    }
}
