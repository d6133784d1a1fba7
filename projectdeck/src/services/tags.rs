//! Tags service
//!
//! Tags live either in the global scope or in a single project. Names are
//! unique per scope, compared case-insensitively.

use crate::access::{self, AccessLevel};
use crate::config::{DEFAULT_TAG_COLOR, MAX_TAG_NAME_LENGTH};
use crate::database::models::{tag_name_key, NewTag, Tag, TagPatch};
use crate::error::{AppError, Result};
use crate::services::required_text;
use crate::storage::Store;
use std::collections::HashSet;
use std::sync::Arc;

/// Accepts `#RRGGBB`
fn validate_color(color: &str) -> Result<String> {
    let valid = color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit());

    if valid {
        Ok(color.to_string())
    } else {
        Err(AppError::Validation(format!(
            "Tag color must be #RRGGBB, got '{color}'"
        )))
    }
}

/// Every tag must exist and be either global or scoped to `project_id`
pub(crate) async fn check_tag_scope(
    store: &dyn Store,
    project_id: &str,
    tag_ids: &[String],
) -> Result<()> {
    for tag_id in tag_ids {
        let tag = store
            .get_tag(tag_id)
            .await?
            .ok_or_else(|| AppError::not_found("Tag", tag_id.as_str()))?;

        if let Some(scope) = &tag.project_id {
            if scope != project_id {
                return Err(AppError::Validation(format!(
                    "Tag '{}' belongs to another project",
                    tag.name
                )));
            }
        }
    }
    Ok(())
}

/// Service for managing tags and task tagging
#[derive(Clone)]
pub struct TagsService {
    store: Arc<dyn Store>,
}

impl TagsService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Create a tag. Project-scoped tags need admin on the project.
    pub async fn create_tag(
        &self,
        name: &str,
        color: Option<&str>,
        project_id: Option<&str>,
        caller_id: &str,
    ) -> Result<Tag> {
        let name = required_text("Tag name", name, MAX_TAG_NAME_LENGTH)?;
        let color = validate_color(color.unwrap_or(DEFAULT_TAG_COLOR))?;

        if let Some(project_id) = project_id {
            access::require_access(&*self.store, project_id, caller_id, AccessLevel::Admin)
                .await?;
        }

        tracing::info!("Creating tag '{}' in scope {:?}", name, project_id);

        self.store
            .insert_tag(&NewTag {
                name,
                color: Some(color),
                project_id: project_id.map(str::to_string),
            })
            .await
    }

    /// Tags of one scope ordered by name. `None` lists the global scope.
    pub async fn list_tags(&self, project_id: Option<&str>) -> Result<Vec<Tag>> {
        self.store.list_tags(project_id).await
    }

    /// Global tags plus the project's own, as offered when tagging a task
    pub async fn list_available_tags(&self, project_id: &str, caller_id: &str) -> Result<Vec<Tag>> {
        access::require_access(&*self.store, project_id, caller_id, AccessLevel::Member).await?;

        let mut tags = self.store.list_tags(None).await?;
        tags.extend(self.store.list_tags(Some(project_id)).await?);
        tags.sort_by_key(|t| tag_name_key(&t.name));
        Ok(tags)
    }

    pub async fn update_tag(&self, id: &str, patch: TagPatch, caller_id: &str) -> Result<Tag> {
        self.authorize_tag(id, caller_id).await?;

        let patch = TagPatch {
            name: patch
                .name
                .map(|n| required_text("Tag name", &n, MAX_TAG_NAME_LENGTH))
                .transpose()?,
            color: patch.color.map(|c| validate_color(&c)).transpose()?,
        };

        tracing::debug!("Updating tag: {}", id);

        self.store.update_tag(id, &patch).await
    }

    /// Delete a tag; it disappears from every task carrying it
    pub async fn delete_tag(&self, id: &str, caller_id: &str) -> Result<()> {
        self.authorize_tag(id, caller_id).await?;

        tracing::info!("Deleting tag: {}", id);

        self.store.delete_tag(id).await
    }

    /// Replace-all: the task ends up with exactly `tag_ids`.
    /// The caller must be a member of the task's project.
    pub async fn assign_tags_to_task(
        &self,
        task_id: &str,
        tag_ids: &[String],
        caller_id: &str,
    ) -> Result<()> {
        let task = self
            .store
            .get_task(task_id)
            .await?
            .ok_or_else(|| AppError::not_found("Task", task_id))?;

        access::require_access(&*self.store, &task.project_id, caller_id, AccessLevel::Member)
            .await?;
        check_tag_scope(&*self.store, &task.project_id, tag_ids).await?;

        tracing::debug!("Assigning {} tags to task {}", tag_ids.len(), task_id);
        self.store.replace_task_tags(task_id, tag_ids).await
    }

    pub async fn get_tags_for_task(&self, task_id: &str) -> Result<Vec<Tag>> {
        self.store.list_tags_for_task(task_id).await
    }

    /// Insert whichever of `names` are missing from the scope.
    /// Safe to call repeatedly; returns only the tags it created.
    pub async fn ensure_default_tag_set(
        &self,
        project_id: Option<&str>,
        names: &[String],
    ) -> Result<Vec<Tag>> {
        let mut seen: HashSet<String> = self
            .store
            .list_tags(project_id)
            .await?
            .into_iter()
            .map(|t| tag_name_key(&t.name))
            .collect();

        let mut created = Vec::new();

        for name in names {
            let name = name.trim();
            if name.is_empty() || !seen.insert(tag_name_key(name)) {
                continue;
            }

            let new_tag = NewTag {
                name: name.to_string(),
                color: Some(DEFAULT_TAG_COLOR.to_string()),
                project_id: project_id.map(str::to_string),
            };
            match self.store.insert_tag(&new_tag).await {
                Ok(tag) => created.push(tag),
                // Inserted concurrently since the listing above
                Err(AppError::Conflict(_)) => {}
                Err(e) => return Err(e),
            }
        }

        if !created.is_empty() {
            tracing::info!(
                "Seeded {} default tags in scope {:?}",
                created.len(),
                project_id
            );
        }

        Ok(created)
    }

    /// Project-scoped tags need admin on their project; global tags are
    /// editable by any caller.
    async fn authorize_tag(&self, id: &str, caller_id: &str) -> Result<Tag> {
        let tag = self
            .store
            .get_tag(id)
            .await?
            .ok_or_else(|| AppError::not_found("Tag", id))?;

        if let Some(project_id) = &tag.project_id {
            access::require_access(&*self.store, project_id, caller_id, AccessLevel::Admin)
                .await?;
        }
        Ok(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{NewProfile, NewProject, NewTask, Project, ProjectRole, Task};
    use crate::storage::MemoryStore;

    async fn setup() -> (TagsService, Arc<MemoryStore>, Project) {
        let store = Arc::new(MemoryStore::new());
        for id in ["alice", "bob", "eve"] {
            store
                .insert_profile(&NewProfile {
                    id: id.to_string(),
                    display_name: id.to_string(),
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
        (TagsService::new(store.clone()), store, project)
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_validate_color() {
        assert!(validate_color("#1a2B3c").is_ok());
        assert!(validate_color("1a2b3c").is_err());
        assert!(validate_color("#1a2b3").is_err());
        assert!(validate_color("#zzzzzz").is_err());
    }

    #[tokio::test]
    async fn test_create_defaults_color() {
        let (service, _, _) = setup().await;

        let tag = service.create_tag("Bug", None, None, "bob").await.unwrap();
        assert_eq!(tag.color.as_deref(), Some(DEFAULT_TAG_COLOR));
        assert_eq!(tag.project_id, None);
    }

    #[tokio::test]
    async fn test_project_tag_requires_admin() {
        let (service, _, project) = setup().await;

        let denied = service
            .create_tag("Sprint", None, Some(project.id.as_str()), "bob")
            .await;
        assert!(matches!(denied, Err(AppError::Permission(_))));

        let tag = service
            .create_tag("Sprint", Some("#ff0000"), Some(project.id.as_str()), "alice")
            .await
            .unwrap();

        let denied = service
            .update_tag(
                &tag.id,
                TagPatch {
                    name: Some("Iteration".to_string()),
                    color: None,
                },
                "bob",
            )
            .await;
        assert!(matches!(denied, Err(AppError::Permission(_))));
    }

    #[tokio::test]
    async fn test_duplicate_in_scope_conflicts() {
        let (service, _, project) = setup().await;
        service.create_tag("Bug", None, None, "bob").await.unwrap();

        let dup = service.create_tag("bug", None, None, "bob").await;
        assert!(matches!(dup, Err(AppError::Conflict(_))));

        // Same name in a project scope is a different tag
        service
            .create_tag("Bug", None, Some(project.id.as_str()), "alice")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_available_tags_merge_scopes() {
        let (service, _, project) = setup().await;
        service.create_tag("Zeta", None, None, "bob").await.unwrap();
        service
            .create_tag("Alpha", None, Some(project.id.as_str()), "alice")
            .await
            .unwrap();

        let tags = service.list_available_tags(&project.id, "bob").await.unwrap();
        let names: Vec<_> = tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Zeta"]);
    }

    #[tokio::test]
    async fn test_ensure_default_inserts_only_missing() {
        let (service, _, _) = setup().await;
        service.create_tag("Bug", None, None, "bob").await.unwrap();

        let created = service
            .ensure_default_tag_set(None, &names(&["Bug", "Feature"]))
            .await
            .unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].name, "Feature");
    }

    #[tokio::test]
    async fn test_ensure_default_is_idempotent() {
        let (service, _, _) = setup().await;
        let defaults = names(&["Bug", "Feature", "feature", "Docs"]);

        let first = service.ensure_default_tag_set(None, &defaults).await.unwrap();
        assert_eq!(first.len(), 3);

        let second = service.ensure_default_tag_set(None, &defaults).await.unwrap();
        assert!(second.is_empty());
        assert_eq!(service.list_tags(None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_ensure_default_is_case_insensitive() {
        let (service, _, _) = setup().await;
        service.create_tag("BUG", None, None, "bob").await.unwrap();

        let created = service
            .ensure_default_tag_set(None, &names(&["bug"]))
            .await
            .unwrap();
        assert!(created.is_empty());
    }

    async fn insert_task(store: &MemoryStore, project_id: &str) -> Task {
        store
            .insert_task(&NewTask {
                title: "Crash".to_string(),
                description: None,
                status: Default::default(),
                priority: Default::default(),
                due_date: None,
                project_id: project_id.to_string(),
                created_by: "bob".to_string(),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_assign_requires_project_member() {
        let (service, store, project) = setup().await;
        let tag = service.create_tag("Bug", None, None, "bob").await.unwrap();
        let task = insert_task(&store, &project.id).await;

        let denied = service
            .assign_tags_to_task(&task.id, &[tag.id.clone()], "eve")
            .await;
        assert!(matches!(denied, Err(AppError::Permission(_))));
        assert!(service.get_tags_for_task(&task.id).await.unwrap().is_empty());

        let missing = service
            .assign_tags_to_task("no-such-task", &[tag.id.clone()], "bob")
            .await;
        assert!(matches!(missing, Err(AppError::NotFound { entity: "Task", .. })));
    }

    #[tokio::test]
    async fn test_assign_rejects_other_project_tag() {
        let (service, store, project) = setup().await;
        let task = insert_task(&store, &project.id).await;
        let other = store
            .insert_project(&NewProject {
                name: "Hermes".to_string(),
                description: None,
                owner_id: "eve".to_string(),
            })
            .await
            .unwrap();
        let foreign = service
            .create_tag("Secret", None, Some(other.id.as_str()), "eve")
            .await
            .unwrap();

        let result = service
            .assign_tags_to_task(&task.id, &[foreign.id.clone()], "bob")
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(service.get_tags_for_task(&task.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_tag_detaches_from_tasks() {
        let (service, store, project) = setup().await;
        let tag = service.create_tag("Bug", None, None, "bob").await.unwrap();
        let task = insert_task(&store, &project.id).await;
        service
            .assign_tags_to_task(&task.id, &[tag.id.clone()], "bob")
            .await
            .unwrap();
        assert_eq!(service.get_tags_for_task(&task.id).await.unwrap().len(), 1);

        service.delete_tag(&tag.id, "bob").await.unwrap();
        assert!(service.get_tags_for_task(&task.id).await.unwrap().is_empty());
    }
}
