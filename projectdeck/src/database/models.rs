//! Database models
//!
//! Rust structs representing database entities.
//! All models use serde for serialization to a presentation layer.

use crate::error::AppError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

/// Deserializes a patch field so that an absent key stays `None` (no change)
/// while an explicit `null` becomes `Some(None)` (clear).
/// Pair with `#[serde(default)]`.
mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

/// Case-folded tag name used for per-scope uniqueness
pub fn tag_name_key(name: &str) -> String {
    name.to_lowercase()
}

// ===== Vocabularies =====

/// Task workflow state. Persisted as `open`, `in_progress`, `review`, `completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Open,
    InProgress,
    Review,
    Completed,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::Open,
        TaskStatus::InProgress,
        TaskStatus::Review,
        TaskStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Open => "open",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Review => "review",
            TaskStatus::Completed => "completed",
        }
    }
}

impl FromStr for TaskStatus {
    type Err = AppError;

    /// Accepts the typed RPC spellings (`TODO`, `IN_REVIEW`, `DONE`, ...) as aliases
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" | "TODO" => Ok(TaskStatus::Open),
            "in_progress" | "IN_PROGRESS" => Ok(TaskStatus::InProgress),
            "review" | "IN_REVIEW" => Ok(TaskStatus::Review),
            "completed" | "DONE" => Ok(TaskStatus::Completed),
            other => Err(AppError::Validation(format!("Unknown task status: {other}"))),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task priority. Persisted as `Low`, `Medium`, `High`, `Urgent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl TaskPriority {
    pub const ALL: [TaskPriority; 4] = [
        TaskPriority::Low,
        TaskPriority::Medium,
        TaskPriority::High,
        TaskPriority::Urgent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "Low",
            TaskPriority::Medium => "Medium",
            TaskPriority::High => "High",
            TaskPriority::Urgent => "Urgent",
        }
    }
}

impl FromStr for TaskPriority {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Low" | "LOW" => Ok(TaskPriority::Low),
            "Medium" | "MEDIUM" => Ok(TaskPriority::Medium),
            "High" | "HIGH" => Ok(TaskPriority::High),
            "Urgent" | "URGENT" => Ok(TaskPriority::Urgent),
            other => Err(AppError::Validation(format!("Unknown task priority: {other}"))),
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Project lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    #[default]
    Active,
    Archived,
    Completed,
}

impl ProjectStatus {
    pub const ALL: [ProjectStatus; 3] = [
        ProjectStatus::Active,
        ProjectStatus::Archived,
        ProjectStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Active => "active",
            ProjectStatus::Archived => "archived",
            ProjectStatus::Completed => "completed",
        }
    }
}

impl FromStr for ProjectStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" | "ACTIVE" => Ok(ProjectStatus::Active),
            "archived" | "ARCHIVED" => Ok(ProjectStatus::Archived),
            "completed" | "COMPLETED" => Ok(ProjectStatus::Completed),
            other => Err(AppError::Validation(format!("Unknown project status: {other}"))),
        }
    }
}

impl TryFrom<String> for ProjectStatus {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Role carried by a membership row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProjectRole {
    Admin,
    #[default]
    Member,
}

impl ProjectRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectRole::Admin => "admin",
            ProjectRole::Member => "member",
        }
    }
}

impl FromStr for ProjectRole {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" | "ADMIN" => Ok(ProjectRole::Admin),
            "member" | "MEMBER" => Ok(ProjectRole::Member),
            other => Err(AppError::Validation(format!("Unknown project role: {other}"))),
        }
    }
}

impl TryFrom<String> for ProjectRole {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ===== Identity =====

/// The authenticated identity handed over by the session provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
}

/// User profile, one per principal
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub id: String,
    pub display_name: String,
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub job_title: Option<String>,
    pub github_url: Option<String>,
    pub linkedin_url: Option<String>,
    /// JSON-encoded object of free-form user preferences
    pub preferences_json: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn preferences(&self) -> serde_json::Result<serde_json::Map<String, serde_json::Value>> {
        serde_json::from_str(&self.preferences_json)
    }

    pub fn summary(&self) -> ProfileSummary {
        ProfileSummary {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ProfileSummary {
    pub id: String,
    pub display_name: String,
}

/// Create profile request
#[derive(Debug, Clone, Deserialize)]
pub struct NewProfile {
    pub id: String,
    pub display_name: String,
}

/// Partial profile update. `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfilePatch {
    pub display_name: Option<String>,
    #[serde(default, deserialize_with = "double_option::deserialize")]
    pub full_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option::deserialize")]
    pub bio: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option::deserialize")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option::deserialize")]
    pub location: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option::deserialize")]
    pub job_title: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option::deserialize")]
    pub github_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option::deserialize")]
    pub linkedin_url: Option<Option<String>>,
    pub preferences: Option<serde_json::Map<String, serde_json::Value>>,
}

// ===== Projects =====

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: String,
    #[sqlx(try_from = "String")]
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create project request
#[derive(Debug, Clone, Deserialize)]
pub struct NewProject {
    pub name: String,
    pub description: Option<String>,
    pub owner_id: String,
}

/// Partial project update
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectPatch {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option::deserialize")]
    pub description: Option<Option<String>>,
    pub status: Option<ProjectStatus>,
}

/// Which joined views `get_project` should load
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectInclude {
    pub members: bool,
    pub tags: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectDetails {
    #[serde(flatten)]
    pub project: Project,
    pub owner: Option<ProfileSummary>,
    pub members: Option<Vec<MemberProfile>>,
    pub tags: Option<Vec<Tag>>,
    pub task_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProjectMember {
    pub project_id: String,
    pub user_id: String,
    #[sqlx(try_from = "String")]
    pub role: ProjectRole,
    pub joined_at: DateTime<Utc>,
}

/// Membership row joined with the member's profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct MemberProfile {
    pub user_id: String,
    pub display_name: String,
    #[sqlx(try_from = "String")]
    pub role: ProjectRole,
}

// ===== Tasks =====

/// A unit of work. Status and priority keep the stored text so rows written
/// by older clients survive; use `status()`/`priority()` for typed access.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub priority: String,
    pub due_date: Option<NaiveDate>,
    pub project_id: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn status(&self) -> Option<TaskStatus> {
        self.status.parse().ok()
    }

    pub fn priority(&self) -> Option<TaskPriority> {
        self.priority.parse().ok()
    }
}

/// Create task request. Status and priority default when omitted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub assignee_ids: Vec<String>,
    #[serde(default)]
    pub tag_ids: Vec<String>,
}

/// Row-level insert handed to the store
#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<NaiveDate>,
    pub project_id: String,
    pub created_by: String,
}

/// Row-level partial update handed to the store
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<Option<NaiveDate>>,
}

/// Update task request. Association lists, when present, replace the full set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option::deserialize")]
    pub description: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    #[serde(default, deserialize_with = "double_option::deserialize")]
    pub due_date: Option<Option<NaiveDate>>,
    pub assignee_ids: Option<Vec<String>>,
    pub tag_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Assignee {
    pub user_id: String,
    pub display_name: String,
    pub assigned_by: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskDetails {
    #[serde(flatten)]
    pub task: Task,
    pub tags: Vec<Tag>,
    pub assignees: Vec<Assignee>,
    pub overdue: bool,
}

// ===== Tags =====

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Tag {
    pub id: String,
    pub name: String,
    pub color: Option<String>,
    /// `None` for tags in the global scope
    pub project_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTag {
    pub name: String,
    pub color: Option<String>,
    pub project_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TagPatch {
    pub name: Option<String>,
    pub color: Option<String>,
}

// ===== Comments =====

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Comment {
    pub id: String,
    pub content: String,
    pub task_id: String,
    pub author_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewComment {
    pub content: String,
    pub task_id: String,
    pub author_id: String,
}
