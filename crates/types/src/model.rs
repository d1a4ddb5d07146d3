//! Learning-platform resources returned by the API.

use serde::{Deserialize, Serialize};

/// Problem difficulty tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// Starter code for a problem in one language.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: u64,
    pub problem_id: u64,
    pub language: String,
    pub code: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Problem {
    pub id: u64,
    pub lesson_id: u64,
    pub name: String,
    pub statement: String,
    pub difficulty: Difficulty,
    /// Milliseconds.
    pub time_limit: u64,
    /// Megabytes.
    pub memory_limit: u64,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<Template>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub languages: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lesson {
    pub id: u64,
    pub course_id: u64,
    pub name: String,
    pub description: String,
    pub position: u32,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub problems: Vec<Problem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: u64,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub enrolled: bool,
    #[serde(default)]
    pub lessons: Vec<Lesson>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: u64,
    pub login: String,
    pub created_at: String,
}

/// Judge verdict for a submitted attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttemptStatus {
    #[serde(rename = "pending")]
    Pending,
    /// Accepted.
    #[serde(rename = "AC")]
    Accepted,
    #[serde(rename = "WA")]
    WrongAnswer,
    #[serde(rename = "CE")]
    CompilationError,
    #[serde(rename = "RE")]
    RuntimeError,
    #[serde(rename = "TLE")]
    TimeLimitExceeded,
    #[serde(rename = "MLE")]
    MemoryLimitExceeded,
}

impl AttemptStatus {
    /// Whether the judge has finished with this attempt.
    #[must_use]
    pub fn is_final(self) -> bool {
        self != Self::Pending
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    pub id: u64,
    pub user_id: u64,
    pub problem_id: u64,
    pub duration: u64,
    pub memory_usage: u64,
    pub language: String,
    pub code: String,
    pub status: AttemptStatus,
    #[serde(default)]
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub attempt_id: u64,
}
