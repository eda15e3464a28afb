//! Fitness goal models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::{blank_to_none, non_blank, parse_date, parse_optional_date};
use crate::error::AppError;

pub const STATUS_IN_PROGRESS: &str = "in_progress";
pub const STATUS_COMPLETED: &str = "completed";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Goal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: String,
    pub goal_date: NaiveDate,
    pub completion_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated goal fields ready for storage
#[derive(Debug, Clone)]
pub struct GoalInput {
    pub name: String,
    pub description: String,
    pub goal_date: NaiveDate,
    pub completion_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub status: String,
}

fn known_status(value: &str) -> Result<(), ValidationError> {
    match value {
        STATUS_IN_PROGRESS | STATUS_COMPLETED => Ok(()),
        _ => Err(ValidationError::new("status")),
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateGoalRequest {
    #[serde(default)]
    #[validate(
        custom(function = "non_blank", message = "name is required"),
        length(max = 100, message = "name must be at most 100 characters")
    )]
    pub name: String,

    #[serde(default)]
    #[validate(
        custom(function = "non_blank", message = "description is required"),
        length(max = 500, message = "description must be at most 500 characters")
    )]
    pub description: String,

    #[serde(default)]
    #[validate(custom(function = "non_blank", message = "goal date is required"))]
    pub goal_date: String,

    #[validate(length(max = 500, message = "notes must be at most 500 characters"))]
    pub notes: Option<String>,
}

impl CreateGoalRequest {
    pub fn into_input(self) -> Result<GoalInput, AppError> {
        self.validate()?;

        Ok(GoalInput {
            // 目标名称统一小写，保证同一用户下唯一
            name: self.name.trim().to_lowercase(),
            description: self.description,
            goal_date: parse_date(&self.goal_date, "goal date")?,
            completion_date: None,
            notes: blank_to_none(self.notes),
            status: STATUS_IN_PROGRESS.to_string(),
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateGoalRequest {
    #[serde(default)]
    #[validate(
        custom(function = "non_blank", message = "name is required"),
        length(max = 100, message = "name must be at most 100 characters")
    )]
    pub name: String,

    #[serde(default)]
    #[validate(
        custom(function = "non_blank", message = "description is required"),
        length(max = 500, message = "description must be at most 500 characters")
    )]
    pub description: String,

    #[serde(default)]
    #[validate(custom(function = "non_blank", message = "goal date is required"))]
    pub goal_date: String,

    pub completion_date: Option<String>,

    #[validate(length(max = 500, message = "notes must be at most 500 characters"))]
    pub notes: Option<String>,

    #[serde(default)]
    #[validate(custom(
        function = "known_status",
        message = "status must be one of: in_progress, completed"
    ))]
    pub status: String,
}

impl UpdateGoalRequest {
    pub fn into_input(self) -> Result<GoalInput, AppError> {
        self.validate()?;

        Ok(GoalInput {
            name: self.name.trim().to_lowercase(),
            description: self.description,
            goal_date: parse_date(&self.goal_date, "goal date")?,
            completion_date: parse_optional_date(
                self.completion_date.as_deref(),
                "completion date",
            )?,
            notes: blank_to_none(self.notes),
            status: self.status,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct GoalResponse {
    pub goal_id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: String,
    pub goal_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Goal> for GoalResponse {
    fn from(goal: Goal) -> Self {
        Self {
            goal_id: goal.id,
            user_id: goal.user_id,
            name: goal.name,
            description: goal.description,
            goal_date: goal.goal_date,
            completion_date: goal.completion_date,
            notes: goal.notes,
            status: goal.status,
            created_at: goal.created_at,
            updated_at: goal.updated_at,
        }
    }
}
