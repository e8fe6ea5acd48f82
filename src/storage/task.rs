//! The `Task` entity and its wire/storage representations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;

/// Reserved `extra_args` key that selects a task's identity instead of being
/// stored as part of its arguments.
pub const TASK_ID_KEY: &str = "task_id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
}

/// A scalar value accepted inside `extra_args`: integer, float, string, or
/// boolean. Arrays and nested objects are rejected at the HTTP boundary.
pub type ExtraArgs = BTreeMap<String, Value>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub prompt: String,
    #[serde(default)]
    pub extra_args: ExtraArgs,
    pub status: TaskStatus,
    /// Milliseconds since the UNIX epoch. Set once at insertion, never updated.
    pub created_at: u64,
    /// Relative path under the artifact directory, populated only once `status == Completed`.
    pub image_path: Option<String>,
}

impl Task {
    pub fn new(task_id: String, prompt: String, extra_args: ExtraArgs, created_at: u64) -> Self {
        Task {
            task_id,
            prompt,
            extra_args,
            status: TaskStatus::Pending,
            created_at,
            image_path: None,
        }
    }
}

/// Validate that every value in a caller-supplied `extra_args` map is a
/// scalar (not an array or nested object), per the contract in §4.4.
pub fn validate_scalar_map(map: &serde_json::Map<String, Value>) -> Result<(), AppError> {
    for (key, value) in map {
        match value {
            Value::Array(_) | Value::Object(_) => {
                return Err(AppError::BadRequest(format!(
                    "extra_args.{key} must be a scalar (string, number, or boolean), not an array or object"
                )))
            }
            _ => {}
        }
    }
    Ok(())
}
