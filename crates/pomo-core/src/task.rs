use crate::error::{PomoError, Result};
use crate::types::OwnerId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MAX_DESCRIPTION_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub owner: OwnerId,
    pub description: String,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Build a new, incomplete task. The description is trimmed and validated.
    pub fn new(owner: OwnerId, description: &str) -> Result<Self> {
        Ok(Self {
            id: Uuid::new_v4(),
            owner,
            description: validate_description(description)?,
            is_completed: false,
            created_at: Utc::now(),
        })
    }
}

/// Body of a task creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    pub description: String,
}

/// Body of a completion toggle request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdate {
    pub is_completed: bool,
}

/// Result of clearing completed tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cleared {
    pub deleted: usize,
}

/// Trim `raw` and check it is non-empty and at most 200 characters.
pub fn validate_description(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PomoError::Validation(
            "task description must not be empty".to_string(),
        ));
    }
    let chars = trimmed.chars().count();
    if chars > MAX_DESCRIPTION_CHARS {
        return Err(PomoError::Validation(format!(
            "task description is {chars} characters; the limit is {MAX_DESCRIPTION_CHARS}"
        )));
    }
    Ok(trimmed.to_string())
}

/// Human-readable summary: "2/5 completed"
pub fn summarize(tasks: &[Task]) -> String {
    let done = tasks.iter().filter(|t| t.is_completed).count();
    format!("{done}/{} completed", tasks.len())
}
