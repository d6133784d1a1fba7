//! Projects service
//!
//! Project lifecycle: creation (with the owner's admin membership), listing,
//! detail views, patching and cascading deletion.

use crate::access::{self, AccessLevel};
use crate::config::MAX_PROJECT_NAME_LENGTH;
use crate::database::models::{
    NewProject, Project, ProjectDetails, ProjectInclude, ProjectPatch,
};
use crate::error::{AppError, Result};
use crate::services::{next_updated_at, optional_text, required_text};
use crate::storage::Store;
use std::sync::Arc;

/// Service for managing projects
#[derive(Clone)]
pub struct ProjectsService {
    store: Arc<dyn Store>,
}

impl ProjectsService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Create a project owned by `owner_id`
    pub async fn create_project(
        &self,
        name: &str,
        description: Option<String>,
        owner_id: &str,
    ) -> Result<Project> {
        let name = required_text("Project name", name, MAX_PROJECT_NAME_LENGTH)?;

        if self.store.get_profile(owner_id).await?.is_none() {
            return Err(AppError::not_found("Profile", owner_id));
        }

        tracing::info!("Creating project '{}' for {}", name, owner_id);

        let project = self
            .store
            .insert_project(&NewProject {
                name,
                description: optional_text(description),
                owner_id: owner_id.to_string(),
            })
            .await?;

        tracing::info!("Project created successfully: {}", project.id);

        Ok(project)
    }

    /// Projects the caller owns or is a member of, newest first
    pub async fn list_projects(&self, caller_id: &str) -> Result<Vec<Project>> {
        self.store.list_projects_for_user(caller_id).await
    }

    /// Load a project with its owner summary, task count and the requested
    /// joins. Performs no access check of its own.
    pub async fn get_project(&self, id: &str, include: ProjectInclude) -> Result<ProjectDetails> {
        let project = self
            .store
            .get_project(id)
            .await?
            .ok_or_else(|| AppError::not_found("Project", id))?;

        let owner = self
            .store
            .get_profile(&project.owner_id)
            .await?
            .map(|p| p.summary());

        let members = if include.members {
            Some(self.store.list_members(id).await?)
        } else {
            None
        };

        let tags = if include.tags {
            Some(self.store.list_tags(Some(id)).await?)
        } else {
            None
        };

        let task_count = self.store.list_tasks_by_project(id).await?.len();

        Ok(ProjectDetails {
            project,
            owner,
            members,
            tags,
            task_count,
        })
    }

    /// Patch a project. Requires owner or admin.
    pub async fn update_project(
        &self,
        id: &str,
        patch: ProjectPatch,
        caller_id: &str,
    ) -> Result<Project> {
        let current = access::require_access(&*self.store, id, caller_id, AccessLevel::Admin).await?;

        let patch = ProjectPatch {
            name: patch
                .name
                .map(|n| required_text("Project name", &n, MAX_PROJECT_NAME_LENGTH))
                .transpose()?,
            description: patch.description.map(optional_text),
            status: patch.status,
        };

        tracing::debug!("Updating project: {}", id);

        let project = self
            .store
            .update_project(id, &patch, next_updated_at(current.updated_at))
            .await?;

        tracing::info!("Project updated successfully: {}", id);

        Ok(project)
    }

    /// Delete a project and everything it owns. Owner only.
    pub async fn delete_project(&self, id: &str, caller_id: &str) -> Result<()> {
        access::require_access(&*self.store, id, caller_id, AccessLevel::Owner).await?;

        tracing::info!("Deleting project: {}", id);

        self.store.delete_project(id).await?;

        tracing::info!("Project deleted successfully: {}", id);

        Ok(())
    }
}
