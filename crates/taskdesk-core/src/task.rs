use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::validation::{self, JsonText, ValidationErrors};

pub const TITLE_MAX_CHARS: usize = 255;

const INVALID_STATUS: &str = "The selected status is invalid.";
const INVALID_DEADLINE: &str = "The deadline field must be a valid date.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub const ALL: &[TaskStatus] = &[
        TaskStatus::Pending,
        TaskStatus::InProgress,
        TaskStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TaskStatus::Pending),
            "in_progress" => Some(TaskStatus::InProgress),
            "completed" => Some(TaskStatus::Completed),
            _ => None,
        }
    }
}

/// A task row as persisted. `attachment_path` is the store key, never shown to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub deadline: NaiveDate,
    pub attachment_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateTask {
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub deadline: NaiveDate,
    pub attachment_path: Option<String>,
}

/// Whole-record replacement of the business fields.
///
/// `attachment_path: None` leaves the stored reference as it is.
#[derive(Debug, Clone)]
pub struct UpdateTask {
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub deadline: NaiveDate,
    pub attachment_path: Option<String>,
}

/// Raw, untrusted task fields as submitted by a client (JSON body or multipart form).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub deadline: Option<String>,
}

/// Validated business fields shared by create and update.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskFields {
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub deadline: NaiveDate,
}

impl TaskInput {
    pub const FIELDS: &'static [&'static str] = &["title", "description", "status", "deadline"];

    /// Read a JSON object body. Non-string values are reported together with
    /// the regular checks on the other fields.
    pub fn from_json(body: &Map<String, Value>) -> Result<TaskInput, ValidationErrors> {
        let mut json = JsonText::new(body);
        let input = TaskInput {
            title: json.field("title"),
            description: json.field("description"),
            status: json.field_or("status", INVALID_STATUS),
            deadline: json.field_or("deadline", INVALID_DEADLINE),
        };
        json.finish(input, Self::FIELDS, TaskInput::validate)
    }

    pub fn validate(&self) -> Result<TaskFields, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let title = match validation::non_blank(self.title.as_deref()) {
            None => {
                errors.add("title", validation::required("title"));
                None
            }
            Some(t) if t.chars().count() > TITLE_MAX_CHARS => {
                errors.add("title", validation::too_long("title", TITLE_MAX_CHARS));
                None
            }
            Some(t) => Some(t.to_string()),
        };

        let description = validation::non_blank(self.description.as_deref()).map(String::from);

        let status = match validation::non_blank(self.status.as_deref()) {
            None => {
                errors.add("status", validation::required("status"));
                None
            }
            Some(s) => {
                let parsed = TaskStatus::parse_str(s);
                if parsed.is_none() {
                    errors.add("status", INVALID_STATUS);
                }
                parsed
            }
        };

        let deadline = match validation::non_blank(self.deadline.as_deref()) {
            None => {
                errors.add("deadline", validation::required("deadline"));
                None
            }
            Some(d) => {
                let parsed = parse_date(d);
                if parsed.is_none() {
                    errors.add("deadline", INVALID_DEADLINE);
                }
                parsed
            }
        };

        match (title, status, deadline) {
            (Some(title), Some(status), Some(deadline)) if errors.is_empty() => Ok(TaskFields {
                title,
                description,
                status,
                deadline,
            }),
            _ => Err(errors),
        }
    }
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp (date part kept).
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
}

/// Path of the ownership-checked endpoint serving a task's attachment.
pub fn preview_path(task_id: &str) -> String {
    format!("/api/tasks/{task_id}/preview")
}

pub fn preview_url(public_url: &str, task_id: &str) -> String {
    format!("{}{}", public_url.trim_end_matches('/'), preview_path(task_id))
}

/// Client-facing projection of a [`Task`].
///
/// The stored attachment path is replaced by the preview URL; a task without an
/// attachment has `attachment_url: null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskView {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub deadline: NaiveDate,
    pub attachment_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskView {
    pub fn from_task(task: &Task, public_url: &str) -> Self {
        Self {
            id: task.id.clone(),
            user_id: task.user_id.clone(),
            title: task.title.clone(),
            description: task.description.clone(),
            status: task.status,
            deadline: task.deadline,
            attachment_url: task
                .attachment_path
                .as_ref()
                .map(|_| preview_url(public_url, &task.id)),
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}
