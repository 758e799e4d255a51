use crate::locale;
use crate::models::{Answer, Criterion, CriterionKind, Progress, Ratings, Report};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnswerScore {
    /// Absent, empty, zero or malformed. Excluded from the denominator.
    Unanswered,
    /// A select answer outside every known option. Counts as 0.
    Unrecognized,
    Scored(f64),
}

pub fn rating_percentage(value: i64) -> Option<f64> {
    match value {
        1 => Some(25.0),
        2 => Some(50.0),
        3 => Some(75.0),
        4 => Some(100.0),
        _ => None,
    }
}

/// Resolves a select answer: declared option position first, then the
/// canonical tag, then any localized label.
pub fn resolve_progress(criterion: &Criterion, value: &str) -> Option<Progress> {
    criterion
        .options()
        .iter()
        .position(|option| option == value)
        .and_then(Progress::from_rank)
        .or_else(|| Progress::from_tag(value))
        .or_else(|| locale::progress_from_label(value))
}

pub fn score_answer(criterion: &Criterion, answer: Option<&Answer>) -> AnswerScore {
    let Some(answer) = answer else {
        return AnswerScore::Unanswered;
    };

    match criterion.kind {
        CriterionKind::Rating => answer
            .as_integer()
            .filter(|value| *value > 0)
            .and_then(rating_percentage)
            .map_or(AnswerScore::Unanswered, AnswerScore::Scored),
        CriterionKind::Select => match answer.as_text() {
            Some(value) if !value.is_empty() => resolve_progress(criterion, value)
                .map_or(AnswerScore::Unrecognized, |progress| {
                    AnswerScore::Scored(progress.percentage())
                }),
            _ => AnswerScore::Unanswered,
        },
        CriterionKind::Text | CriterionKind::Unknown => AnswerScore::Unanswered,
    }
}

/// Unweighted mean over answered scoreable criteria, in [0, 100].
pub fn total_percentage(criteria: &[Criterion], ratings: &Ratings) -> f64 {
    let mut total = 0.0;
    let mut count = 0usize;

    for criterion in criteria {
        match score_answer(criterion, ratings.get(&criterion.id)) {
            AnswerScore::Unanswered => {}
            AnswerScore::Unrecognized => count += 1,
            AnswerScore::Scored(value) => {
                total += value;
                count += 1;
            }
        }
    }

    if count > 0 {
        total / count as f64
    } else {
        0.0
    }
}

/// Mean of each report's stored total.
pub fn average_total<'a, I>(reports: I) -> f64
where
    I: IntoIterator<Item = &'a Report>,
{
    let (sum, count) = reports
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), report| {
            (sum + report.total_percentage, count + 1)
        });

    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Mean score of one criterion across reports, skipping unanswered ones.
pub fn criterion_average<'a, I>(criterion: &Criterion, reports: I) -> f64
where
    I: IntoIterator<Item = &'a Report>,
{
    let mut total = 0.0;
    let mut count = 0usize;

    for report in reports {
        match score_answer(criterion, report.ratings.get(&criterion.id)) {
            AnswerScore::Unanswered => {}
            AnswerScore::Unrecognized => count += 1,
            AnswerScore::Scored(value) => {
                total += value;
                count += 1;
            }
        }
    }

    if count > 0 {
        total / count as f64
    } else {
        0.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerIssue {
    UnknownCriterion { criterion_id: String },
    RatingOutOfRange { criterion_id: String },
    UnrecognizedOption { criterion_id: String, value: String },
    WrongAnswerType { criterion_id: String },
}

impl std::fmt::Display for AnswerIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnswerIssue::UnknownCriterion { criterion_id } => {
                write!(f, "answer for unknown criterion {criterion_id}")
            }
            AnswerIssue::RatingOutOfRange { criterion_id } => {
                write!(f, "rating for {criterion_id} is not an integer between 1 and 4")
            }
            AnswerIssue::UnrecognizedOption {
                criterion_id,
                value,
            } => write!(f, "'{value}' is not a recognized option of {criterion_id}"),
            AnswerIssue::WrongAnswerType { criterion_id } => {
                write!(f, "answer for {criterion_id} has the wrong type")
            }
        }
    }
}

/// Checks a rating map against the criteria list. The aggregator tolerates
/// every condition reported here; callers decide whether to reject.
pub fn validate_ratings(criteria: &[Criterion], ratings: &Ratings) -> Vec<AnswerIssue> {
    let mut issues = Vec::new();

    for (criterion_id, answer) in ratings {
        let Some(criterion) = criteria.iter().find(|c| &c.id == criterion_id) else {
            issues.push(AnswerIssue::UnknownCriterion {
                criterion_id: criterion_id.clone(),
            });
            continue;
        };

        let criterion_id = criterion_id.clone();
        match criterion.kind {
            CriterionKind::Rating => match answer {
                // Zero and below mean "not yet rated".
                Answer::Number(n) if n.as_f64().is_some_and(|v| v <= 0.0) => {}
                Answer::Number(_) => {
                    if answer.as_integer().and_then(rating_percentage).is_none() {
                        issues.push(AnswerIssue::RatingOutOfRange { criterion_id });
                    }
                }
                _ => issues.push(AnswerIssue::WrongAnswerType { criterion_id }),
            },
            CriterionKind::Select => match answer.as_text() {
                Some("") => {}
                Some(value) => {
                    if resolve_progress(criterion, value).is_none() {
                        issues.push(AnswerIssue::UnrecognizedOption {
                            criterion_id,
                            value: value.to_string(),
                        });
                    }
                }
                None => issues.push(AnswerIssue::WrongAnswerType { criterion_id }),
            },
            CriterionKind::Text => {
                if answer.as_text().is_none() {
                    issues.push(AnswerIssue::WrongAnswerType { criterion_id });
                }
            }
            CriterionKind::Unknown => {}
        }
    }

    issues
}
