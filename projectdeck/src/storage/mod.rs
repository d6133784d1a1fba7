//! Storage module
//!
//! `Store` is the persistence-provider contract the service layer runs
//! against. Two providers implement it: the SQLite `database::Repository`
//! and the in-process `MemoryStore`.

pub mod memory;

pub use memory::MemoryStore;

use crate::database::models::*;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Row operations over the `profiles`, `projects`, `project_members`,
/// `tasks`, `task_assignees`, `tags`, `task_tags` and `comments` collections.
///
/// Lookups return `Ok(None)` for a missing row; updates and deletes of a
/// missing row return `AppError::NotFound`. Deleting a project or task
/// cascades to everything it owns.
#[async_trait]
pub trait Store: Send + Sync {
    // ========================================================================
    // Profiles
    // ========================================================================

    async fn insert_profile(&self, profile: &NewProfile) -> Result<Profile>;

    async fn get_profile(&self, id: &str) -> Result<Option<Profile>>;

    /// All profiles ordered by display name
    async fn list_profiles(&self) -> Result<Vec<Profile>>;

    async fn update_profile(
        &self,
        id: &str,
        patch: &ProfilePatch,
        updated_at: DateTime<Utc>,
    ) -> Result<Profile>;

    /// Delete a profile with its memberships, assignments and comments.
    /// Fails with `Invariant` while the profile still owns a project.
    /// Tasks it created keep the creator id.
    async fn delete_profile(&self, id: &str) -> Result<()>;

    // ========================================================================
    // Projects
    // ========================================================================

    /// Insert a project together with an admin membership row for its owner
    async fn insert_project(&self, project: &NewProject) -> Result<Project>;

    async fn get_project(&self, id: &str) -> Result<Option<Project>>;

    /// Projects the user owns or holds a membership in, newest first
    async fn list_projects_for_user(&self, user_id: &str) -> Result<Vec<Project>>;

    async fn update_project(
        &self,
        id: &str,
        patch: &ProjectPatch,
        updated_at: DateTime<Utc>,
    ) -> Result<Project>;

    /// Delete a project with its memberships, tasks, tags and their links
    async fn delete_project(&self, id: &str) -> Result<()>;

    // ========================================================================
    // Memberships
    // ========================================================================

    async fn get_membership(&self, project_id: &str, user_id: &str)
        -> Result<Option<ProjectMember>>;

    /// Fails with `AppError::Conflict` if the pair already exists
    async fn insert_membership(
        &self,
        project_id: &str,
        user_id: &str,
        role: ProjectRole,
    ) -> Result<ProjectMember>;

    async fn delete_membership(&self, project_id: &str, user_id: &str) -> Result<()>;

    /// Membership rows joined with profile display names, oldest first
    async fn list_members(&self, project_id: &str) -> Result<Vec<MemberProfile>>;

    // ========================================================================
    // Tasks
    // ========================================================================

    async fn insert_task(&self, task: &NewTask) -> Result<Task>;

    async fn get_task(&self, id: &str) -> Result<Option<Task>>;

    async fn list_tasks_by_project(&self, project_id: &str) -> Result<Vec<Task>>;

    async fn update_task(
        &self,
        id: &str,
        patch: &TaskPatch,
        updated_at: DateTime<Utc>,
    ) -> Result<Task>;

    /// Delete a task with its comments, tag links and assignee links
    async fn delete_task(&self, id: &str) -> Result<()>;

    /// Replace every assignee link of a task. Unknown users fail with
    /// `AppError::NotFound` and leave the previous set in place.
    async fn replace_task_assignees(
        &self,
        task_id: &str,
        user_ids: &[String],
        assigned_by: &str,
    ) -> Result<()>;

    async fn list_task_assignees(&self, task_id: &str) -> Result<Vec<Assignee>>;

    // ========================================================================
    // Tags
    // ========================================================================

    /// Fails with `AppError::Conflict` if the name exists in the scope,
    /// compared case-insensitively
    async fn insert_tag(&self, tag: &NewTag) -> Result<Tag>;

    async fn get_tag(&self, id: &str) -> Result<Option<Tag>>;

    /// Tags of one scope ordered by name; `None` selects the global scope
    async fn list_tags(&self, project_id: Option<&str>) -> Result<Vec<Tag>>;

    async fn update_tag(&self, id: &str, patch: &TagPatch) -> Result<Tag>;

    /// Delete a tag and its task links
    async fn delete_tag(&self, id: &str) -> Result<()>;

    /// Replace every tag link of a task. Unknown tags fail with
    /// `AppError::NotFound` and leave the previous set in place.
    async fn replace_task_tags(&self, task_id: &str, tag_ids: &[String]) -> Result<()>;

    async fn list_tags_for_task(&self, task_id: &str) -> Result<Vec<Tag>>;

    // ========================================================================
    // Comments
    // ========================================================================

    async fn insert_comment(&self, comment: &NewComment) -> Result<Comment>;

    async fn get_comment(&self, id: &str) -> Result<Option<Comment>>;

    /// Comments of a task, oldest first
    async fn list_comments_for_task(&self, task_id: &str) -> Result<Vec<Comment>>;

    async fn update_comment(
        &self,
        id: &str,
        content: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<Comment>;

    async fn delete_comment(&self, id: &str) -> Result<()>;
}
