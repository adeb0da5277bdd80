use crate::gradedb::GradeDb;
use crate::models;

use anyhow::{Context, Result, anyhow};
use itertools::Itertools;
use regex::Regex;
use std::sync::LazyLock;

const MAX_CMD_LENGTH: usize = 12;

static VALID_CMD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").expect("command regex is valid"));

struct CommandInstance<'a> {
    db: &'a mut GradeDb,

    parameters: Vec<&'a str>,
    // Everything after the command, untokenized. JSON payloads are read from here.
    rest: &'a str,
}

pub struct Commands;
impl Commands {
    /// Runs one `$command` line against the database and returns the reply.
    pub fn run_command(db: &mut GradeDb, input: &str) -> Result<String> {
        // Skip the first letter for the command: it's the call token
        let input = input
            .trim()
            .strip_prefix('$')
            .context("Commands start with '$', see $help for commands.")?;

        let (command, rest) = input
            .split_once(char::is_whitespace)
            .map_or((input, ""), |(command, rest)| (command, rest.trim()));

        let cmd = CommandInstance { db, parameters: rest.split_whitespace().collect(), rest };

        let result: String = match command {
                 "user" => cmd.user()?,
                "login" => cmd.login()?,
             "exercise" => cmd.exercise()?,
            "exercises" => cmd.exercises()?,
               "submit" => cmd.submit()?,
               "latest" => cmd.submission(models::Ranking::Recency)?,
                 "best" => cmd.submission(models::Ranking::TotalScore)?,
                 "help" => Self::get_help(),
            _ => {
                if Commands::is_valid_cmd(command) {
                    log::info!("User submitted unknown command: {}", command);
                    return Err(anyhow!(
                        "No such command found: {}, see $help for commands.",
                        command
                    ));
                } else {
                    log::info!("User submitted invalid command: {}", command);
                    return Err(anyhow!("Invalid command syntax."));
                }
            }
        };

        Ok(result)
    }

    /// Ensures that the string slice conforms to C-like identifier regex
    fn is_valid_cmd(s: &str) -> bool {
        s.len() <= MAX_CMD_LENGTH && VALID_CMD.is_match(s)
    }

    /// Gets a help string. Should be updated after a new command is added
    pub fn get_help() -> String {
        String::from(
r#"
**Command List:**
`$user <username> <firstname> <lastname> <password>`:  Add a user, or update an existing one
`$login <username> <password>`:  Check a user's credentials
`$exercise <json>`:  Add an exercise, e.g. {"id":1,"name":"loops","due_date":"2025-01-01T00:00:00Z","questions":[{"name":"for","desc":"...","points":10}]}
`$exercises`:  List all exercises
`$submit <json>`:  Store a submission, e.g. {"username":"ada","exercise_id":1,"submitted_at":"2025-01-01T12:00:00Z","scores":[7.5]}
`$latest <username> <exercise id>`:  Show a user's most recent submission
`$best <username> <exercise id>`:  Show a user's highest-scoring submission
`$help`:  Get information on supported commands
"#)
    }
}

impl CommandInstance<'_> {
    fn user(self) -> Result<String> {
        let &[username, firstname, lastname, password] = self.parameters.as_slice() else {
            return Err(anyhow!("Usage: $user <username> <firstname> <lastname> <password>"));
        };

        let user = models::User {
            username: username.to_string(),
            firstname: firstname.to_string(),
            lastname: lastname.to_string(),
        };
        let user_id = self.db.upsert_user(&user, password)?;

        Ok(format!("{user} is user {user_id}."))
    }

    fn login(self) -> Result<String> {
        let &[username, password] = self.parameters.as_slice() else {
            return Err(anyhow!("Usage: $login <username> <password>"));
        };

        Ok(if self.db.verify_login(username, password)? {
            format!("Welcome back, {username}.")
        } else {
            String::from("Invalid username or password.")
        })
    }

    fn exercise(self) -> Result<String> {
        let exercise: models::Exercise = serde_json::from_str(self.rest)
            .context("Expected an exercise as JSON, see $help.")?;
        let exercise_id = self.db.create_exercise(&exercise)?;

        Ok(format!("Exercise {exercise_id} has been added."))
    }

    fn exercises(self) -> Result<String> {
        let exercises = self.db.list_exercises()?;
        if exercises.is_empty() {
            return Ok(String::from("No exercises yet."));
        }

        Ok(exercises.iter().join("\n\n"))
    }

    fn submit(self) -> Result<String> {
        let submission: models::Submission = serde_json::from_str(self.rest)
            .context("Expected a submission as JSON, see $help.")?;

        let submission_id = self.db.store_submission(&submission)?.with_context(|| {
            format!(
                "No user {} or no exercise {} to submit to.",
                submission.username, submission.exercise_id
            )
        })?;

        Ok(format!("Submission {submission_id} has been stored."))
    }

    fn submission(self, ranking: models::Ranking) -> Result<String> {
        let &[username, exercise_id] = self.parameters.as_slice() else {
            return Err(anyhow!("Usage: $latest|$best <username> <exercise id>"));
        };
        let exercise_id: i64 = exercise_id
            .parse()
            .with_context(|| format!("Not an exercise id: {exercise_id}"))?;

        let exercise = self
            .db
            .query_exercise(exercise_id)?
            .with_context(|| format!("No such exercise: {exercise_id}"))?;

        let submission = match ranking {
            models::Ranking::Recency => self.db.query_latest_submission(username, &exercise)?,
            models::Ranking::TotalScore => self.db.query_best_submission(username, &exercise)?,
        };

        Ok(submission.map_or_else(
            || format!("{username} has not submitted exercise {exercise_id}."),
            |submission| submission.to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(db: &mut GradeDb, input: &str) -> String {
        Commands::run_command(db, input).unwrap_or_else(|err| format!("ERROR: {err}"))
    }

    fn seeded() -> GradeDb {
        let mut db = GradeDb::open_in_memory().unwrap();
        run(&mut db, "$user ada Ada Lovelace hunter2");
        run(
            &mut db,
            r#"$exercise {"id":1,"name":"loops","due_date":"2025-01-01T00:00:00Z",
                "questions":[{"name":"for","desc":"a for loop","points":10},
                             {"name":"while","desc":"a while loop","points":20}]}"#,
        );
        db
    }

    #[test]
    fn users_can_log_in() {
        let mut db = seeded();
        assert_eq!(run(&mut db, "$login ada hunter2"), "Welcome back, ada.");
        assert_eq!(run(&mut db, "$login ada wrong"), "Invalid username or password.");
    }

    #[test]
    fn exercises_are_listed() {
        let mut db = seeded();
        let listing = run(&mut db, "$exercises");
        assert!(listing.contains("**Exercise 1**: loops"));
        assert!(listing.contains("2. while (20 pts)"));
    }

    #[test]
    fn submissions_round_trip_through_commands() {
        let mut db = seeded();
        assert_eq!(
            run(&mut db, r#"$submit {"username":"ada","exercise_id":1,"submitted_at":"2025-01-02T00:00:00Z","scores":[5,20]}"#),
            "Submission 1 has been stored."
        );
        assert_eq!(
            run(&mut db, r#"$submit {"username":"ada","exercise_id":1,"submitted_at":"2025-01-03T00:00:00Z","scores":[1,2]}"#),
            "Submission 2 has been stored."
        );

        assert!(run(&mut db, "$latest ada 1").starts_with("**Submission 2**"));
        assert!(run(&mut db, "$best ada 1").starts_with("**Submission 1**"));
        assert_eq!(run(&mut db, "$best grace 1"), "grace has not submitted exercise 1.");
    }

    #[test]
    fn bad_input_is_reported() {
        let mut db = seeded();
        assert!(run(&mut db, "$submit {").starts_with("ERROR: Expected a submission"));
        assert_eq!(run(&mut db, "$latest ada 9"), "ERROR: No such exercise: 9");
        assert_eq!(run(&mut db, "$frobnicate"), "ERROR: No such command found: frobnicate, see $help for commands.");
        assert_eq!(run(&mut db, "$not-a-cmd"), "ERROR: Invalid command syntax.");
        assert!(run(&mut db, "$exercise {\"id\":1,\"name\":\"again\",\"due_date\":\"2025-01-01T00:00:00Z\"}")
            .contains("already exists"));
    }
}
