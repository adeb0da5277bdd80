use rusqlite::Connection;

use crate::{
    gradedb::{self, DBError, DBResult, grades, users},
    models::{self, Ranking},
};

/////*============== SUBMISSION QUERIES ==============*/
impl Ranking {
    /// The column a submission-grades query sorts submissions by, best first.
    fn rank_key(self) -> &'static str {
        match self {
            Ranking::Recency => "s.SubmissionTime",
            Ranking::TotalScore => "t.Total",
        }
    }
}

/// Builds the query returning one row per question of the submission that
/// ranks first under `ranking`.
///
/// Rows are sorted by rank, then SubmissionId (highest wins ties), then
/// QuestionId. Every row of the winning submission therefore comes before any
/// other submission's, so `LIMIT :limit` with the exercise's question count
/// returns exactly that submission's grades.
///
/// Parameters: `:username`, `:exercise_id`, `:limit`.
pub fn submission_grades_query(ranking: Ranking) -> String {
    format!(
        "SELECT s.SubmissionId   AS SubmissionId,
                g.QuestionId     AS QuestionId,
                g.Grade          AS Grade,
                s.SubmissionTime AS SubmissionTime
         FROM Submission s
         JOIN QuestionGrade g ON g.SubmissionId = s.SubmissionId
         JOIN (
             SELECT SubmissionId, SUM(Grade) AS Total
             FROM QuestionGrade
             GROUP BY SubmissionId
         ) t ON t.SubmissionId = s.SubmissionId
         WHERE s.UserId = (SELECT UserId FROM User WHERE Username = :username)
           AND s.ExerciseId = :exercise_id
         ORDER BY {} DESC, s.SubmissionId DESC, g.QuestionId ASC
         LIMIT :limit",
        ranking.rank_key()
    )
}

/// Returns the submission by `username` for `exercise` that ranks first under
/// `ranking`, with its grades in QuestionId order.
///
/// Returns None if the user never submitted the exercise or doesn't exist.
pub fn query_submission(
    connection: &Connection,
    username: &str,
    exercise: &models::Exercise,
    ranking: Ranking,
) -> DBResult<Option<models::GradedSubmission>> {
    let Some(exercise_id) = exercise.id else {
        log::trace!("[query_submission] Exercise '{}' has no id, so no submissions.", exercise.name);
        return Ok(None);
    };
    let question_count = exercise.questions.len();
    let limit = question_count as i64;

    log::trace!("[query_submission] Querying {ranking:?} submission of exercise {exercise_id} for {username}...");

    let query_params = rusqlite::named_params! {
            ":username":    username,
            ":exercise_id": exercise_id,
            ":limit":       limit,
    };

    let rows = connection
        .prepare(&submission_grades_query(ranking))?
        .query_map(query_params, |row| grades::GradeRow::try_from(row))?
        .collect::<Result<Vec<grades::GradeRow>, _>>()?;

    let submission = grades::reconstruct(rows, username, exercise_id, question_count);
    if submission.is_none() {
        log::trace!("[query_submission] {username} has no submissions for exercise {exercise_id}.");
    }

    Ok(submission)
}

/// Stores a submission along with one normalized grade per question.
///
/// `submission.scores[i]` is divided by the points of the exercise's i-th
/// question (by QuestionId). The submission row and all of its grades are
/// written in one transaction.
///
/// Returns the submission id, or None if the user or exercise doesn't exist.
/// Every score must be finite.
pub fn insert_submission(connection: &mut Connection, submission: &models::Submission) -> DBResult<Option<i64>> {
    let username = &submission.username;
    let exercise_id = submission.exercise_id;
    log::trace!("[insert_submission] Inserting submission of exercise {exercise_id} by {username}...");

    // NaN would be stored as a NULL grade, which no reader can rebuild.
    if let Some((position, &score)) = (1..).zip(&submission.scores).find(|(_, score)| !score.is_finite()) {
        return Err(DBError::NonFiniteScore { position, score });
    }

    let tx = connection.transaction()?;

    let Some(user_id) = users::query_user_id(&tx, username)? else {
        log::warn!("[insert_submission] No such user: {username}");
        return Ok(None);
    };

    let exercise_exists = tx
        .prepare("SELECT 1 FROM Exercise WHERE ExerciseId = :exercise_id")?
        .exists(rusqlite::named_params! { ":exercise_id": exercise_id })?;
    if !exercise_exists {
        log::warn!("[insert_submission] No such exercise: {exercise_id}");
        return Ok(None);
    }

    let questions = tx
        .prepare(
            "SELECT QuestionId, Points
             FROM Question
             WHERE ExerciseId = :exercise_id
             ORDER BY QuestionId"
        )?
        .query_map(rusqlite::named_params! { ":exercise_id": exercise_id }, |row| {
            Ok((row.get::<_, i64>("QuestionId")?, row.get::<_, i64>("Points")?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    if questions.len() != submission.scores.len() {
        return Err(DBError::ScoreCountMismatch {
            expected: questions.len(),
            actual: submission.scores.len(),
        });
    }

    let submission_time = gradedb::to_millis(&submission.submitted_at);
    let query_params = rusqlite::named_params! {
            ":submission_id":   submission.id,
            ":user_id":         user_id,
            ":exercise_id":     exercise_id,
            ":submission_time": submission_time,
    };

    let inserted = tx
        .prepare(
            "INSERT INTO Submission ( SubmissionId,  UserId,  ExerciseId,  SubmissionTime)
             VALUES                 (:submission_id, :user_id, :exercise_id, :submission_time)"
        )?
        .execute(query_params)
        .map_or_else(gradedb::swallow_constraint_violation, |_| Ok(true))?;

    if !inserted {
        let submission_id = submission.id.unwrap_or_default();
        log::warn!("[insert_submission] Submission {submission_id} already exists.");
        return Err(DBError::DuplicateSubmission(submission_id));
    }

    let submission_id = tx.last_insert_rowid();

    {
        let mut insert_grade = tx.prepare(
            "INSERT INTO QuestionGrade ( SubmissionId,  QuestionId,  Grade)
             VALUES                    (:submission_id, :question_id, :grade)"
        )?;

        for (&(question_id, points), &score) in questions.iter().zip(&submission.scores) {
            insert_grade
                .execute(rusqlite::named_params! {
                    ":submission_id": submission_id,
                    ":question_id":   question_id,
                    ":grade":         score / points as f64,
                })
                .inspect_err(|err| log::error!("[insert_submission] Could not grade question \
                                                {question_id} of submission {submission_id}: {err}"))?;
        }
    }

    tx.commit()?;

    log::info!("Submission {submission_id} of exercise {exercise_id} by {username} has been stored.");
    Ok(Some(submission_id))
}
