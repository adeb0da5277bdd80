use itertools::Itertools;
use rusqlite::Connection;

use crate::{
    gradedb::{self, DBError, DBResult},
    models,
};

/////*============== EXERCISE QUERIES ==============*/
/// One row of the Exercise/Question join. Exercises without questions come
/// back once, with `question` empty.
struct ExerciseRow {
    exercise: models::Exercise,
    question: Option<models::Question>,
}

impl<'a> TryFrom<&'a rusqlite::Row<'a>> for ExerciseRow {
    type Error = rusqlite::Error;

    fn try_from(row: &rusqlite::Row) -> Result<Self, rusqlite::Error> {
        let due_date = gradedb::from_millis(2, row.get("DueDate")?)?;
        let exercise = models::Exercise::new(row.get("ExerciseId")?, row.get::<_, String>("ExerciseName")?, due_date);

        let question = match row.get::<_, Option<i64>>("QuestionId")? {
            Some(_) => Some(models::Question {
                name: row.get::<_, Option<String>>("QuestionName")?.unwrap_or_default(),
                desc: row.get::<_, Option<String>>("QuestionDesc")?.unwrap_or_default(),
                points: row.get("Points")?,
            }),
            None => None,
        };

        Ok(Self { exercise, question })
    }
}

/// Inserts the exercise and all of its questions as one unit.
///
/// Questions get QuestionId 1, 2, ... in the order they appear on the exercise.
/// Returns the exercise id, or `DBError::DuplicateExercise` if the id is taken,
/// in which case nothing is written.
pub fn insert_exercise(connection: &mut Connection, exercise: &models::Exercise) -> DBResult<i64> {
    log::trace!("[insert_exercise] Inserting exercise '{}' into Exercise...", exercise.name);

    if let Some(question) = exercise.questions.iter().find(|q| q.points <= 0) {
        return Err(DBError::NonPositivePoints {
            question: question.name.clone(),
            points: question.points,
        });
    }

    let tx = connection.transaction()?;

    let due_date = gradedb::to_millis(&exercise.due_date);
    let query_params = rusqlite::named_params! {
            ":exercise_id": exercise.id,
            ":name":        exercise.name,
            ":due_date":    due_date,
    };

    let inserted = tx
        .prepare(
            "INSERT INTO Exercise ( ExerciseId,  Name,  DueDate)
             VALUES               (:exercise_id, :name, :due_date)"
        )?
        .execute(query_params)
        .map_or_else(gradedb::swallow_constraint_violation, |_| Ok(true))?;

    if !inserted {
        let exercise_id = exercise.id.unwrap_or_default();
        log::warn!("[insert_exercise] Exercise {exercise_id} already exists.");
        return Err(DBError::DuplicateExercise(exercise_id));
    }

    let exercise_id = tx.last_insert_rowid();

    {
        let mut insert_question = tx.prepare(
            "INSERT INTO Question ( ExerciseId,  QuestionId,  Name, \"Desc\",  Points)
             VALUES               (:exercise_id, :question_id, :name, :desc, :points)"
        )?;

        for (question_id, question) in (1_i64..).zip(&exercise.questions) {
            insert_question
                .execute(rusqlite::named_params! {
                    ":exercise_id": exercise_id,
                    ":question_id": question_id,
                    ":name":        question.name,
                    ":desc":        question.desc,
                    ":points":      question.points,
                })
                .inspect_err(|err| log::error!("[insert_exercise] Could not add question \
                                                {question_id} of exercise {exercise_id}: {err}"))?;
        }
    }

    tx.commit()?;

    log::info!(
        "Exercise {exercise_id} ('{}') has been added with {} questions.",
        exercise.name,
        exercise.questions.len()
    );
    Ok(exercise_id)
}

/// Returns the exercise with id `exercise_id` and its questions, if it exists.
pub fn query_exercise(connection: &Connection, exercise_id: i64) -> DBResult<Option<models::Exercise>> {
    log::trace!("[query_exercise] Querying exercise {exercise_id}.");
    Ok(load_exercises(connection, Some(exercise_id))?.into_iter().next())
}

/// Gathers all exercises, ordered by id, each with its questions in QuestionId order.
pub fn query_exercises(connection: &Connection) -> DBResult<Vec<models::Exercise>> {
    log::trace!("[query_exercises] Querying all exercises.");
    load_exercises(connection, None)
}

/// [internal] Loads one exercise, or all of them when `exercise_id` is `None`.
fn load_exercises(connection: &Connection, exercise_id: Option<i64>) -> DBResult<Vec<models::Exercise>> {
    let mut stmt = connection.prepare(
        "SELECT e.ExerciseId, e.Name AS ExerciseName, e.DueDate,
                q.QuestionId, q.Name AS QuestionName, q.\"Desc\" AS QuestionDesc, q.Points
         FROM Exercise e
         LEFT JOIN Question q ON q.ExerciseId = e.ExerciseId
         WHERE :exercise_id IS NULL OR e.ExerciseId = :exercise_id
         ORDER BY e.ExerciseId, q.QuestionId",
    )?;

    let rows = stmt
        .query_map(rusqlite::named_params! { ":exercise_id": exercise_id }, |row| {
            ExerciseRow::try_from(row)
        })?
        .collect::<Result<Vec<ExerciseRow>, _>>()?;

    // Rows are sorted by exercise, so each exercise's rows are contiguous.
    let chunks = rows.into_iter().chunk_by(|row| row.exercise.id);
    let exercises = chunks
        .into_iter()
        .filter_map(|(_, mut chunk)| {
            let first = chunk.next()?;
            let mut exercise = first.exercise;
            exercise.questions = std::iter::once(first.question)
                .chain(chunk.map(|row| row.question))
                .flatten()
                .collect();
            Some(exercise)
        })
        .collect();

    Ok(exercises)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gradedb::schema;
    use chrono::{DateTime, Utc};

    fn connection() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        schema::initialize_db(&connection).unwrap();
        connection
    }

    fn due() -> DateTime<Utc> {
        DateTime::from_timestamp_millis(1_700_000_000_000).unwrap()
    }

    fn exercise(id: Option<i64>, name: &str, points: &[i64]) -> models::Exercise {
        let mut exercise = models::Exercise::new(id, name, due());
        for (i, &p) in points.iter().enumerate() {
            exercise.add_question(format!("q{}", i + 1), format!("question {}", i + 1), p);
        }
        exercise
    }

    #[test]
    fn lists_exercises_by_id_with_questions_in_order() {
        let mut connection = connection();
        insert_exercise(&mut connection, &exercise(Some(3), "third", &[5])).unwrap();
        insert_exercise(&mut connection, &exercise(Some(1), "first", &[10, 20, 30])).unwrap();
        insert_exercise(&mut connection, &exercise(Some(2), "empty", &[])).unwrap();

        let exercises = query_exercises(&connection).unwrap();

        let ids = exercises.iter().map(|e| e.id).collect::<Vec<_>>();
        assert_eq!(ids, [Some(1), Some(2), Some(3)]);
        assert_eq!(exercises[0], exercise(Some(1), "first", &[10, 20, 30]));
        assert!(exercises[1].questions.is_empty());
        assert_eq!(exercises[2].questions.len(), 1);
    }

    #[test]
    fn assigns_an_id_when_none_is_given() {
        let mut connection = connection();
        insert_exercise(&mut connection, &exercise(Some(41), "given", &[1])).unwrap();
        let assigned = insert_exercise(&mut connection, &exercise(None, "assigned", &[1, 2])).unwrap();

        assert_eq!(assigned, 42);
        let stored = query_exercise(&connection, assigned).unwrap().unwrap();
        assert_eq!(stored.name, "assigned");
        assert_eq!(stored.due_date, due());
        assert_eq!(stored.questions.len(), 2);
    }

    #[test]
    fn duplicate_ids_are_rejected_without_touching_questions() {
        let mut connection = connection();
        insert_exercise(&mut connection, &exercise(Some(1), "original", &[10])).unwrap();

        let err = insert_exercise(&mut connection, &exercise(Some(1), "imposter", &[1, 2, 3])).unwrap_err();
        assert!(matches!(err, DBError::DuplicateExercise(1)));
        assert!(err.is_caller_error());

        let stored = query_exercise(&connection, 1).unwrap().unwrap();
        assert_eq!(stored, exercise(Some(1), "original", &[10]));
        let questions: i64 = connection
            .query_row("SELECT COUNT(*) FROM Question", [], |row| row.get(0))
            .unwrap();
        assert_eq!(questions, 1);
    }

    #[test]
    fn questions_worth_nothing_are_rejected() {
        let mut connection = connection();
        let err = insert_exercise(&mut connection, &exercise(Some(1), "free points", &[3, 0])).unwrap_err();

        assert!(matches!(err, DBError::NonPositivePoints { points: 0, .. }));
        assert_eq!(query_exercise(&connection, 1).unwrap(), None);
    }
}
