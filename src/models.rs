use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,

    pub firstname: String,
    pub lastname: String,
}

impl std::fmt::Display for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} ({})", self.firstname, self.lastname, self.username)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub name: String,
    pub desc: String,
    pub points: i64,
}

/// An exercise and its questions, in QuestionId order.
///
/// `id` is `None` until the store has assigned one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exercise {
    pub id: Option<i64>,
    pub name: String,
    pub due_date: DateTime<Utc>,

    #[serde(default)]
    pub questions: Vec<Question>,
}

impl Exercise {
    pub fn new(id: Option<i64>, name: impl Into<String>, due_date: DateTime<Utc>) -> Self {
        Self { id, name: name.into(), due_date, questions: Vec::new() }
    }

    pub fn add_question(&mut self, name: impl Into<String>, desc: impl Into<String>, points: i64) {
        self.questions.push(Question { name: name.into(), desc: desc.into(), points });
    }
}

impl std::fmt::Display for Exercise {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "**Exercise {}**: {}\n\
             \tDue:       {}\n\
             \tQuestions: {}",
            self.id.map_or_else(|| String::from("?"), |id| id.to_string()),
            self.name,
            self.due_date,
            self.questions.len()
        )?;

        for (position, question) in self.questions.iter().enumerate() {
            write!(f, "\n\t  {}. {} ({} pts)", position + 1, question.name, question.points)?;
        }

        Ok(())
    }
}

/// One attempt at an exercise, as handed to the store.
///
/// `scores[i]` is the raw score for the i-th question of the exercise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    #[serde(default)]
    pub id: Option<i64>,

    pub username: String,
    pub exercise_id: i64,
    pub submitted_at: DateTime<Utc>,

    pub scores: Vec<f64>,
}

/// A stored submission read back with its normalized grades, in QuestionId order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradedSubmission {
    pub id: i64,

    pub username: String,
    pub exercise_id: i64,
    pub submitted_at: DateTime<Utc>,

    pub grades: Vec<f64>,
}

impl GradedSubmission {
    pub fn total(&self) -> f64 {
        self.grades.iter().sum()
    }
}

impl std::fmt::Display for GradedSubmission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "**Submission {}** by {} for exercise {}\n\
             \tSubmitted: {}\n\
             \tTotal:     {:.3}",
            self.id, self.username, self.exercise_id, self.submitted_at, self.total()
        )?;

        for (position, grade) in self.grades.iter().enumerate() {
            write!(f, "\n\t  {}. {:.3}", position + 1, grade)?;
        }

        Ok(())
    }
}

/// Which of a user's submissions for an exercise counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ranking {
    /// Most recent SubmissionTime.
    Recency,
    /// Highest sum of normalized grades.
    TotalScore,
}
