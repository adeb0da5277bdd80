use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::path::Path;

use crate::models;

pub mod exercises;
pub mod grades;
pub mod schema;
pub mod submissions;
pub mod users;

#[derive(Debug, thiserror::Error)]
pub enum DBError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("exercise {0} already exists")]
    DuplicateExercise(i64),
    #[error("submission {0} already exists")]
    DuplicateSubmission(i64),
    #[error("expected {expected} scores (one per question), got {actual}")]
    ScoreCountMismatch { expected: usize, actual: usize },
    #[error("score {score} for question {position} is not a finite number")]
    NonFiniteScore { position: usize, score: f64 },
    #[error("question '{question}' must be worth more than 0 points, got {points}")]
    NonPositivePoints { question: String, points: i64 },
}

impl DBError {
    /// True when the caller handed us bad input, false when storage itself failed.
    pub fn is_caller_error(&self) -> bool {
        !matches!(self, DBError::Sqlite(_))
    }
}

pub type DBResult<T> = Result<T, DBError>;

/// Maps a constraint violation to `Ok(false)`, passing every other error through.
pub(crate) fn swallow_constraint_violation(err: rusqlite::Error) -> DBResult<bool> {
    match err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation => {
            log::trace!("[swallow_constraint_violation] Ignoring constraint violation: {e}");
            Ok(false)
        }
        err => Err(err.into()),
    }
}

pub(crate) fn to_millis(timestamp: &DateTime<Utc>) -> i64 {
    timestamp.timestamp_millis()
}

/// Reads an epoch-ms column back into a timestamp.
pub(crate) fn from_millis(column: usize, millis: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(column, millis))
}

/// The single storage connection for the whole process.
///
/// Opening it bootstraps the schema. Every data-access function borrows the
/// connection from here; writes that span several rows borrow it mutably so
/// they can run inside one transaction.
pub struct GradeDb {
    connection: Connection,
}

impl GradeDb {
    pub fn open(path: impl AsRef<Path>) -> DBResult<Self> {
        let path = path.as_ref();
        log::debug!("[open] Opening database at {}...", path.display());
        Self::bootstrap(Connection::open(path)?)
    }

    pub fn open_in_memory() -> DBResult<Self> {
        log::debug!("[open_in_memory] Opening in-memory database...");
        Self::bootstrap(Connection::open_in_memory()?)
    }

    fn bootstrap(connection: Connection) -> DBResult<Self> {
        schema::initialize_db(&connection)?;
        Ok(Self { connection })
    }

    /// Closes the connection, reporting any error SQLite raises while doing so.
    pub fn close(self) -> DBResult<()> {
        log::debug!("[close] Closing database.");
        self.connection
            .close()
            .map_err(|(_, err)| DBError::from(err))
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn upsert_user(&self, user: &models::User, password: &str) -> DBResult<i64> {
        users::upsert_user(&self.connection, user, password)
    }

    pub fn verify_login(&self, username: &str, password: &str) -> DBResult<bool> {
        users::verify_login(&self.connection, username, password)
    }

    pub fn query_user(&self, username: &str) -> DBResult<Option<models::User>> {
        users::query_user(&self.connection, username)
    }

    pub fn create_exercise(&mut self, exercise: &models::Exercise) -> DBResult<i64> {
        exercises::insert_exercise(&mut self.connection, exercise)
    }

    pub fn query_exercise(&self, exercise_id: i64) -> DBResult<Option<models::Exercise>> {
        exercises::query_exercise(&self.connection, exercise_id)
    }

    pub fn list_exercises(&self) -> DBResult<Vec<models::Exercise>> {
        exercises::query_exercises(&self.connection)
    }

    pub fn store_submission(&mut self, submission: &models::Submission) -> DBResult<Option<i64>> {
        submissions::insert_submission(&mut self.connection, submission)
    }

    pub fn query_latest_submission(
        &self,
        username: &str,
        exercise: &models::Exercise,
    ) -> DBResult<Option<models::GradedSubmission>> {
        submissions::query_submission(&self.connection, username, exercise, models::Ranking::Recency)
    }

    pub fn query_best_submission(
        &self,
        username: &str,
        exercise: &models::Exercise,
    ) -> DBResult<Option<models::GradedSubmission>> {
        submissions::query_submission(&self.connection, username, exercise, models::Ranking::TotalScore)
    }
}
