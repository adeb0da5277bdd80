use rusqlite::Connection;

use crate::gradedb::DBResult;

pub const USER_SCHEMA: &str =
    "CREATE TABLE IF NOT EXISTS User (
        UserId         INTEGER     PRIMARY KEY,
        Username       TEXT        UNIQUE,
        Firstname      TEXT,
        Lastname       TEXT,
        Password       TEXT
    )";

pub const EXERCISE_SCHEMA: &str =
    "CREATE TABLE IF NOT EXISTS Exercise (
        ExerciseId     INTEGER     PRIMARY KEY,
        Name           TEXT,
        DueDate        INTEGER
    )";

pub const QUESTION_SCHEMA: &str =
    "CREATE TABLE IF NOT EXISTS Question (
        ExerciseId     INTEGER,
        QuestionId     INTEGER,
        Name           TEXT,
        \"Desc\"       TEXT,
        Points         INTEGER,

        PRIMARY KEY (ExerciseId, QuestionId)
    )";

pub const SUBMISSION_SCHEMA: &str =
    "CREATE TABLE IF NOT EXISTS Submission (
        SubmissionId   INTEGER     PRIMARY KEY,
        UserId         INTEGER,
        ExerciseId     INTEGER,
        SubmissionTime INTEGER
    )";

pub const QUESTION_GRADE_SCHEMA: &str =
    "CREATE TABLE IF NOT EXISTS QuestionGrade (
        SubmissionId   INTEGER,
        QuestionId     INTEGER,
        Grade          REAL,

        PRIMARY KEY (SubmissionId, QuestionId)
    )";

/// Creates any of the five tables that don't exist yet. Safe to run on every startup.
pub fn initialize_db(connection: &Connection) -> DBResult<()> {
    let tables = [
        ("User", USER_SCHEMA),
        ("Exercise", EXERCISE_SCHEMA),
        ("Question", QUESTION_SCHEMA),
        ("Submission", SUBMISSION_SCHEMA),
        ("QuestionGrade", QUESTION_GRADE_SCHEMA),
    ];

    for (name, schema) in tables {
        log::debug!("[initialize_db] creating {name} table...");
        connection.execute(schema, [])?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_names(connection: &Connection) -> Vec<String> {
        connection
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn creates_all_tables() {
        let connection = Connection::open_in_memory().unwrap();
        initialize_db(&connection).unwrap();

        assert_eq!(
            table_names(&connection),
            ["Exercise", "Question", "QuestionGrade", "Submission", "User"]
        );
    }

    #[test]
    fn is_idempotent() {
        let connection = Connection::open_in_memory().unwrap();
        initialize_db(&connection).unwrap();
        connection
            .execute("INSERT INTO Exercise (ExerciseId, Name, DueDate) VALUES (7, 'kept', 0)", [])
            .unwrap();

        initialize_db(&connection).unwrap();

        let kept: i64 = connection
            .query_row("SELECT COUNT(*) FROM Exercise", [], |row| row.get(0))
            .unwrap();
        assert_eq!(kept, 1);
    }
}
