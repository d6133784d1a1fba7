//! Tasks service
//!
//! Task lifecycle plus the tag and assignee sets attached to each task.
//! Association lists always replace the whole set. When linking fails after
//! the task row has been written the task is kept and the failure comes back
//! as `AppError::Association`, so the caller can retry with
//! `set_task_tags` / `set_task_assignees` alone.

use crate::access::{self, AccessLevel};
use crate::config::MAX_TASK_TITLE_LENGTH;
use crate::database::models::{
    CreateTaskRequest, NewTask, Project, Task, TaskDetails, TaskPatch, UpdateTaskRequest,
};
use crate::error::{AppError, Result};
use crate::services::tags::check_tag_scope;
use crate::services::{next_updated_at, optional_text, required_text};
use crate::stats;
use crate::storage::Store;
use chrono::Utc;
use std::sync::Arc;

/// Service for managing tasks
#[derive(Clone)]
pub struct TasksService {
    store: Arc<dyn Store>,
}

impl TasksService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Create a task in `project_id`. Status defaults to `open`, priority to `Medium`.
    pub async fn create_task(
        &self,
        project_id: &str,
        req: CreateTaskRequest,
        created_by: &str,
    ) -> Result<Task> {
        let project =
            access::require_access(&*self.store, project_id, created_by, AccessLevel::Member)
                .await?;
        let title = required_text("Task title", &req.title, MAX_TASK_TITLE_LENGTH)?;

        tracing::info!("Creating task '{}' in project {}", title, project_id);

        let task = self
            .store
            .insert_task(&NewTask {
                title,
                description: optional_text(req.description),
                status: req.status.unwrap_or_default(),
                priority: req.priority.unwrap_or_default(),
                due_date: req.due_date,
                project_id: project_id.to_string(),
                created_by: created_by.to_string(),
            })
            .await?;

        if !req.assignee_ids.is_empty() || !req.tag_ids.is_empty() {
            self.associate(
                &project,
                &task,
                Some(req.assignee_ids.as_slice()),
                Some(req.tag_ids.as_slice()),
                created_by,
            )
            .await?;
        }

        tracing::info!("Task created successfully: {}", task.id);

        Ok(task)
    }

    /// All tasks of a project, oldest first. Performs no access check.
    pub async fn list_tasks_by_project(&self, project_id: &str) -> Result<Vec<Task>> {
        self.store.list_tasks_by_project(project_id).await
    }

    /// Task with its tags, assignees and overdue flag
    pub async fn get_task_details(&self, id: &str, caller_id: &str) -> Result<TaskDetails> {
        let task = self.load_task(id).await?;
        access::require_access(&*self.store, &task.project_id, caller_id, AccessLevel::Member)
            .await?;

        let tags = self.store.list_tags_for_task(id).await?;
        let assignees = self.store.list_task_assignees(id).await?;
        let overdue = stats::is_overdue(&task, Utc::now());

        Ok(TaskDetails {
            task,
            tags,
            assignees,
            overdue,
        })
    }

    /// Patch a task; `assignee_ids`/`tag_ids`, when present, replace the full sets
    pub async fn update_task(
        &self,
        id: &str,
        req: UpdateTaskRequest,
        caller_id: &str,
    ) -> Result<Task> {
        let current = self.load_task(id).await?;
        let project = access::require_access(
            &*self.store,
            &current.project_id,
            caller_id,
            AccessLevel::Member,
        )
        .await?;

        let patch = TaskPatch {
            title: req
                .title
                .map(|t| required_text("Task title", &t, MAX_TASK_TITLE_LENGTH))
                .transpose()?,
            description: req.description.map(optional_text),
            status: req.status,
            priority: req.priority,
            due_date: req.due_date,
        };

        tracing::debug!("Updating task: {}", id);

        let task = self
            .store
            .update_task(id, &patch, next_updated_at(current.updated_at))
            .await?;

        if req.assignee_ids.is_some() || req.tag_ids.is_some() {
            self.associate(
                &project,
                &task,
                req.assignee_ids.as_deref(),
                req.tag_ids.as_deref(),
                caller_id,
            )
            .await?;
        }

        tracing::debug!("Task updated successfully: {}", id);

        Ok(task)
    }

    /// Delete a task together with its comments and links
    pub async fn delete_task(&self, id: &str, caller_id: &str) -> Result<()> {
        let task = self.load_task(id).await?;
        access::require_access(&*self.store, &task.project_id, caller_id, AccessLevel::Member)
            .await?;

        tracing::info!("Deleting task: {}", id);

        self.store.delete_task(id).await?;

        tracing::info!("Task deleted successfully: {}", id);

        Ok(())
    }

    /// Replace the task's tag set. An empty list clears it.
    pub async fn set_task_tags(
        &self,
        task_id: &str,
        tag_ids: &[String],
        caller_id: &str,
    ) -> Result<()> {
        let task = self.load_task(task_id).await?;
        let project =
            access::require_access(&*self.store, &task.project_id, caller_id, AccessLevel::Member)
                .await?;

        self.replace_tags(&project, &task, tag_ids).await
    }

    /// Replace the task's assignee set. An empty list clears it.
    pub async fn set_task_assignees(
        &self,
        task_id: &str,
        user_ids: &[String],
        caller_id: &str,
    ) -> Result<()> {
        let task = self.load_task(task_id).await?;
        let project =
            access::require_access(&*self.store, &task.project_id, caller_id, AccessLevel::Member)
                .await?;

        self.replace_assignees(&project, &task, user_ids, caller_id)
            .await
    }

    async fn load_task(&self, id: &str) -> Result<Task> {
        self.store
            .get_task(id)
            .await?
            .ok_or_else(|| AppError::not_found("Task", id))
    }

    async fn associate(
        &self,
        project: &Project,
        task: &Task,
        assignee_ids: Option<&[String]>,
        tag_ids: Option<&[String]>,
        caller_id: &str,
    ) -> Result<()> {
        self.link(project, task, assignee_ids, tag_ids, caller_id)
            .await
            .map_err(|source| {
                tracing::warn!("Association failed for task {}: {}", task.id, source);
                AppError::Association {
                    task_id: task.id.clone(),
                    source: Box::new(source),
                }
            })
    }

    async fn link(
        &self,
        project: &Project,
        task: &Task,
        assignee_ids: Option<&[String]>,
        tag_ids: Option<&[String]>,
        caller_id: &str,
    ) -> Result<()> {
        if let Some(user_ids) = assignee_ids {
            self.replace_assignees(project, task, user_ids, caller_id)
                .await?;
        }
        if let Some(tag_ids) = tag_ids {
            self.replace_tags(project, task, tag_ids).await?;
        }
        Ok(())
    }

    async fn replace_tags(&self, project: &Project, task: &Task, tag_ids: &[String]) -> Result<()> {
        check_tag_scope(&*self.store, &project.id, tag_ids).await?;
        self.store.replace_task_tags(&task.id, tag_ids).await
    }

    async fn replace_assignees(
        &self,
        project: &Project,
        task: &Task,
        user_ids: &[String],
        assigned_by: &str,
    ) -> Result<()> {
        for user_id in user_ids {
            let is_member = project.owner_id == *user_id
                || self
                    .store
                    .get_membership(&project.id, user_id)
                    .await?
                    .is_some();
            if !is_member {
                return Err(AppError::Validation(format!(
                    "User {} is not a member of project {}",
                    user_id, project.id
                )));
            }
        }

        self.store
            .replace_task_assignees(&task.id, user_ids, assigned_by)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{
        NewProfile, NewProject, NewTag, ProjectRole, TaskPriority, TaskStatus,
    };
    use crate::storage::MemoryStore;
    use chrono::NaiveDate;

    struct Fixture {
        service: TasksService,
        store: Arc<MemoryStore>,
        project: Project,
    }

    async fn setup() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        for (id, name) in [("alice", "Alice"), ("bob", "Bob"), ("eve", "Eve")] {
            store
                .insert_profile(&NewProfile {
                    id: id.to_string(),
                    display_name: name.to_string(),
                })
                .await
                .unwrap();
        }
        let project = store
            .insert_project(&NewProject {
                name: "Apollo".to_string(),
                description: None,
                owner_id: "alice".to_string(),
            })
            .await
            .unwrap();
        store
            .insert_membership(&project.id, "bob", ProjectRole::Member)
            .await
            .unwrap();

        Fixture {
            service: TasksService::new(store.clone()),
            store,
            project,
        }
    }

    async fn global_tag(store: &MemoryStore, name: &str) -> String {
        store
            .insert_tag(&NewTag {
                name: name.to_string(),
                color: None,
                project_id: None,
            })
            .await
            .unwrap()
            .id
    }

    fn titled(title: &str) -> CreateTaskRequest {
        CreateTaskRequest {
            title: title.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_applies_defaults() {
        let f = setup().await;

        let task = f
            .service
            .create_task(&f.project.id, titled("Write docs"), "bob")
            .await
            .unwrap();
        assert_eq!(task.status(), Some(TaskStatus::Open));
        assert_eq!(task.priority(), Some(TaskPriority::Medium));
        assert_eq!(task.created_by, "bob");
    }

    #[tokio::test]
    async fn test_create_rejects_outsider_and_empty_title() {
        let f = setup().await;

        let denied = f
            .service
            .create_task(&f.project.id, titled("x"), "eve")
            .await;
        assert!(matches!(denied, Err(AppError::Permission(_))));

        let invalid = f.service.create_task(&f.project.id, titled(" "), "bob").await;
        assert!(matches!(invalid, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_create_with_associations() {
        let f = setup().await;
        let bug = global_tag(&f.store, "Bug").await;

        let task = f
            .service
            .create_task(
                &f.project.id,
                CreateTaskRequest {
                    title: "Fix login".to_string(),
                    assignee_ids: vec!["bob".to_string(), "alice".to_string()],
                    tag_ids: vec![bug.clone()],
                    ..Default::default()
                },
                "alice",
            )
            .await
            .unwrap();

        let details = f.service.get_task_details(&task.id, "bob").await.unwrap();
        assert_eq!(details.tags.len(), 1);
        assert_eq!(details.tags[0].id, bug);
        let names: Vec<_> = details.assignees.iter().map(|a| a.display_name.as_str()).collect();
        assert_eq!(names, vec!["Alice", "Bob"]);
        assert!(!details.overdue);
    }

    #[tokio::test]
    async fn test_failed_association_keeps_task() {
        let f = setup().await;

        let result = f
            .service
            .create_task(
                &f.project.id,
                CreateTaskRequest {
                    title: "Fix login".to_string(),
                    tag_ids: vec!["no-such-tag".to_string()],
                    ..Default::default()
                },
                "bob",
            )
            .await;

        let task_id = match result {
            Err(AppError::Association { task_id, source }) => {
                assert!(matches!(*source, AppError::NotFound { entity: "Tag", .. }));
                task_id
            }
            other => panic!("expected association error, got {:?}", other),
        };

        // Task row survived, and association can be retried on its own
        let bug = global_tag(&f.store, "Bug").await;
        f.service
            .set_task_tags(&task_id, &[bug], "bob")
            .await
            .unwrap();
        assert_eq!(f.store.list_tags_for_task(&task_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_assignee_must_belong_to_project() {
        let f = setup().await;
        let task = f
            .service
            .create_task(&f.project.id, titled("Deploy"), "bob")
            .await
            .unwrap();

        let result = f
            .service
            .set_task_assignees(&task.id, &["eve".to_string()], "bob")
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_foreign_project_tag_rejected() {
        let f = setup().await;
        let other = f
            .store
            .insert_project(&NewProject {
                name: "Other".to_string(),
                description: None,
                owner_id: "eve".to_string(),
            })
            .await
            .unwrap();
        let foreign = f
            .store
            .insert_tag(&NewTag {
                name: "Secret".to_string(),
                color: None,
                project_id: Some(other.id.clone()),
            })
            .await
            .unwrap();
        let task = f
            .service
            .create_task(&f.project.id, titled("Deploy"), "bob")
            .await
            .unwrap();

        let result = f
            .service
            .set_task_tags(&task.id, &[foreign.id], "bob")
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_tag_sets_replace_not_accumulate() {
        let f = setup().await;
        let bug = global_tag(&f.store, "Bug").await;
        let feature = global_tag(&f.store, "Feature").await;
        let task = f
            .service
            .create_task(&f.project.id, titled("Deploy"), "bob")
            .await
            .unwrap();

        f.service
            .set_task_tags(&task.id, &[bug.clone()], "bob")
            .await
            .unwrap();
        f.service
            .set_task_tags(&task.id, &[feature.clone()], "bob")
            .await
            .unwrap();
        let tags = f.store.list_tags_for_task(&task.id).await.unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].id, feature);

        f.service.set_task_tags(&task.id, &[], "bob").await.unwrap();
        assert!(f.store.list_tags_for_task(&task.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_refreshes_timestamp_and_replaces_sets() {
        let f = setup().await;
        let bug = global_tag(&f.store, "Bug").await;
        let task = f
            .service
            .create_task(
                &f.project.id,
                CreateTaskRequest {
                    title: "Deploy".to_string(),
                    tag_ids: vec![bug],
                    assignee_ids: vec!["bob".to_string()],
                    ..Default::default()
                },
                "bob",
            )
            .await
            .unwrap();

        let updated = f
            .service
            .update_task(
                &task.id,
                UpdateTaskRequest {
                    status: Some(TaskStatus::Completed),
                    due_date: Some(NaiveDate::from_ymd_opt(2001, 1, 1)),
                    tag_ids: Some(vec![]),
                    ..Default::default()
                },
                "alice",
            )
            .await
            .unwrap();
        assert_eq!(updated.status(), Some(TaskStatus::Completed));
        assert!(updated.updated_at > task.updated_at);

        let details = f.service.get_task_details(&task.id, "alice").await.unwrap();
        assert!(details.tags.is_empty());
        // Assignees untouched when the list is absent
        assert_eq!(details.assignees.len(), 1);
        assert!(!details.overdue);
    }

    #[tokio::test]
    async fn test_delete_task_requires_access() {
        let f = setup().await;
        let task = f
            .service
            .create_task(&f.project.id, titled("Deploy"), "bob")
            .await
            .unwrap();

        let denied = f.service.delete_task(&task.id, "eve").await;
        assert!(matches!(denied, Err(AppError::Permission(_))));

        f.service.delete_task(&task.id, "bob").await.unwrap();
        let missing = f.service.delete_task(&task.id, "bob").await;
        assert!(matches!(missing, Err(AppError::NotFound { .. })));
    }
}
