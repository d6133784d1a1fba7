//! Services module
//!
//! Business logic services that coordinate between callers and the
//! persistence provider. Each service holds the shared `Arc<dyn Store>` and
//! consults `access` before touching anything project-owned.

pub mod comments;
pub mod dashboard;
pub mod members;
pub mod profiles;
pub mod projects;
pub mod tags;
pub mod tasks;

pub use comments::CommentsService;
pub use dashboard::DashboardService;
pub use members::MembersService;
pub use profiles::ProfilesService;
pub use projects::ProjectsService;
pub use tags::TagsService;
pub use tasks::TasksService;

use crate::error::{AppError, Result};
use chrono::{DateTime, Duration, Utc};

/// Trim `value` and check it is non-empty and within `max_len` characters
pub(crate) fn required_text(field: &str, value: &str, max_len: usize) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{field} is required")));
    }
    if trimmed.chars().count() > max_len {
        return Err(AppError::Validation(format!(
            "{field} must be at most {max_len} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Blank optional text is stored as absent
pub(crate) fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Timestamp for a row refresh, strictly after `previous` even when the
/// clock has not advanced (or went backwards) since the last write.
pub(crate) fn next_updated_at(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    let floor = previous + Duration::milliseconds(1);
    if now > previous {
        now
    } else {
        floor
    }
}
