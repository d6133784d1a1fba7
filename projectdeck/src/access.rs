//! Project authorization
//!
//! Every mutating service call resolves the caller's relationship to the
//! owning project here, rather than checking owner/membership inline.

use crate::database::models::{Project, ProjectRole};
use crate::error::{AppError, Result};
use crate::storage::Store;

/// What a caller may do inside a project, weakest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AccessLevel {
    Member,
    Admin,
    Owner,
}

impl AccessLevel {
    fn label(&self) -> &'static str {
        match self {
            AccessLevel::Member => "member",
            AccessLevel::Admin => "admin",
            AccessLevel::Owner => "owner",
        }
    }
}

impl From<ProjectRole> for AccessLevel {
    fn from(role: ProjectRole) -> Self {
        match role {
            ProjectRole::Admin => AccessLevel::Admin,
            ProjectRole::Member => AccessLevel::Member,
        }
    }
}

/// Resolve the caller's level in an already loaded project.
/// The owner needs no membership row.
async fn level_in(
    store: &dyn Store,
    project: &Project,
    user_id: &str,
) -> Result<Option<AccessLevel>> {
    if project.owner_id == user_id {
        return Ok(Some(AccessLevel::Owner));
    }

    let membership = store.get_membership(&project.id, user_id).await?;
    Ok(membership.map(|m| AccessLevel::from(m.role)))
}

async fn load_project(store: &dyn Store, project_id: &str) -> Result<Project> {
    store
        .get_project(project_id)
        .await?
        .ok_or_else(|| AppError::not_found("Project", project_id))
}

/// True when `user_id` may act in the project with at least `required_role`.
/// `None` means any membership. Unknown projects are `NotFound`.
pub async fn has_project_access(
    store: &dyn Store,
    project_id: &str,
    user_id: &str,
    required_role: Option<ProjectRole>,
) -> Result<bool> {
    let project = load_project(store, project_id).await?;
    let required = required_role
        .map(AccessLevel::from)
        .unwrap_or(AccessLevel::Member);

    let level = level_in(store, &project, user_id).await?;
    Ok(level.is_some_and(|level| level >= required))
}

/// Load the project and check the caller holds at least `required`.
/// Returns the project so callers do not fetch it twice.
pub async fn require_access(
    store: &dyn Store,
    project_id: &str,
    user_id: &str,
    required: AccessLevel,
) -> Result<Project> {
    let project = load_project(store, project_id).await?;

    match level_in(store, &project, user_id).await? {
        Some(level) if level >= required => Ok(project),
        _ => {
            tracing::warn!(
                "Denied {} access to project {} for user {}",
                required.label(),
                project_id,
                user_id
            );
            Err(AppError::Permission(format!(
                "{} access to project {} required",
                required.label(),
                project_id
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{NewProfile, NewProject};
    use crate::storage::MemoryStore;

    async fn setup() -> (MemoryStore, Project) {
        let store = MemoryStore::new();
        for id in ["owner", "admin", "member", "outsider"] {
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
                name: "Hermes".to_string(),
                description: None,
                owner_id: "owner".to_string(),
            })
            .await
            .unwrap();
        store
            .insert_membership(&project.id, "admin", ProjectRole::Admin)
            .await
            .unwrap();
        store
            .insert_membership(&project.id, "member", ProjectRole::Member)
            .await
            .unwrap();
        (store, project)
    }

    #[tokio::test]
    async fn test_owner_without_membership_row_has_every_role() {
        let (store, project) = setup().await;
        store.delete_membership(&project.id, "owner").await.unwrap();

        for role in [None, Some(ProjectRole::Member), Some(ProjectRole::Admin)] {
            assert!(has_project_access(&store, &project.id, "owner", role)
                .await
                .unwrap());
        }
        let loaded = require_access(&store, &project.id, "owner", AccessLevel::Owner)
            .await
            .unwrap();
        assert_eq!(loaded.id, project.id);
    }

    #[tokio::test]
    async fn test_role_requirements() {
        let (store, project) = setup().await;

        assert!(has_project_access(&store, &project.id, "admin", Some(ProjectRole::Admin))
            .await
            .unwrap());
        assert!(has_project_access(&store, &project.id, "member", None)
            .await
            .unwrap());
        assert!(
            !has_project_access(&store, &project.id, "member", Some(ProjectRole::Admin))
                .await
                .unwrap()
        );
        assert!(!has_project_access(&store, &project.id, "outsider", None)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_admin_is_not_owner() {
        let (store, project) = setup().await;

        let result = require_access(&store, &project.id, "admin", AccessLevel::Owner).await;
        assert!(matches!(result, Err(AppError::Permission(_))));
    }

    #[tokio::test]
    async fn test_missing_project_is_not_found() {
        let (store, _) = setup().await;

        let result = has_project_access(&store, "nope", "owner", None).await;
        assert!(matches!(result, Err(AppError::NotFound { entity: "Project", .. })));
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_closed() {
        let (store, project) = setup().await;
        store.set_available(false);

        let result = require_access(&store, &project.id, "owner", AccessLevel::Member).await;
        assert!(matches!(result, Err(AppError::Storage(_))));
        assert!(has_project_access(&store, &project.id, "owner", None)
            .await
            .is_err());
    }
}
