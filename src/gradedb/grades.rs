use chrono::{DateTime, Utc};

use crate::{gradedb, models};

/// One row of a submission-grades query: a single question's grade within a submission.
#[derive(Debug, Clone, PartialEq)]
pub struct GradeRow {
    pub submission_id: i64,
    pub question_id: i64,
    pub grade: f64,
    pub submitted_at: DateTime<Utc>,
}

impl<'a> TryFrom<&'a rusqlite::Row<'a>> for GradeRow {
    type Error = rusqlite::Error;

    fn try_from(row: &rusqlite::Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            submission_id: row.get("SubmissionId")?,
            question_id: row.get("QuestionId")?,
            grade: row.get("Grade")?,
            submitted_at: gradedb::from_millis(3, row.get("SubmissionTime")?)?,
        })
    }
}

/// Rebuilds a submission from its grade rows.
///
/// The id and time come from the first row. Every row then contributes the
/// next slot of the grade vector, so slot `i` holds the `i`-th row's grade
/// whatever its QuestionId. No rows means no submission.
pub fn reconstruct(
    rows: impl IntoIterator<Item = GradeRow>,
    username: &str,
    exercise_id: i64,
    question_count: usize,
) -> Option<models::GradedSubmission> {
    let mut rows = rows.into_iter().peekable();
    let first = rows.peek()?;

    let id = first.submission_id;
    let submitted_at = first.submitted_at;

    let mut grades = Vec::with_capacity(question_count);
    grades.extend(rows.map(|row| row.grade));

    if grades.len() != question_count {
        log::warn!(
            "[reconstruct] Submission {id} has {} grades but exercise {exercise_id} has {question_count} questions.",
            grades.len()
        );
    }

    Some(models::GradedSubmission {
        id,
        username: username.to_string(),
        exercise_id,
        submitted_at,
        grades,
    })
}
