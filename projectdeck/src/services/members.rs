//! Members service
//!
//! Adds and removes project memberships. The owner is always part of the
//! team, with or without a membership row, and can never be removed.

use crate::access::{self, AccessLevel};
use crate::database::models::{MemberProfile, ProjectMember, ProjectRole};
use crate::error::{AppError, Result};
use crate::storage::Store;
use std::sync::Arc;

/// Service for managing project membership
#[derive(Clone)]
pub struct MembersService {
    store: Arc<dyn Store>,
}

impl MembersService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Add `user_id` to the project. Requires admin; duplicate rows are `Conflict`.
    pub async fn add_member(
        &self,
        project_id: &str,
        user_id: &str,
        role: ProjectRole,
        caller_id: &str,
    ) -> Result<ProjectMember> {
        access::require_access(&*self.store, project_id, caller_id, AccessLevel::Admin).await?;

        if self.store.get_profile(user_id).await?.is_none() {
            return Err(AppError::not_found("Profile", user_id));
        }

        tracing::info!(
            "Adding {} to project {} as {}",
            user_id,
            project_id,
            role.as_str()
        );

        self.store.insert_membership(project_id, user_id, role).await
    }

    /// Remove a membership. The owner check comes first so it fails the same
    /// way whoever the caller is.
    pub async fn remove_member(
        &self,
        project_id: &str,
        user_id: &str,
        caller_id: &str,
    ) -> Result<()> {
        let project = self
            .store
            .get_project(project_id)
            .await?
            .ok_or_else(|| AppError::not_found("Project", project_id))?;

        if project.owner_id == user_id {
            return Err(AppError::Invariant(format!(
                "The owner of project {} cannot be removed",
                project_id
            )));
        }

        access::require_access(&*self.store, project_id, caller_id, AccessLevel::Admin).await?;

        tracing::info!("Removing {} from project {}", user_id, project_id);

        self.store.delete_membership(project_id, user_id).await
    }

    /// Membership rows joined with profile names, in join order
    pub async fn list_members(&self, project_id: &str) -> Result<Vec<MemberProfile>> {
        self.store.list_members(project_id).await
    }

    /// Members plus the owner when the owner has no membership row
    pub async fn list_team(&self, project_id: &str) -> Result<Vec<MemberProfile>> {
        let project = self
            .store
            .get_project(project_id)
            .await?
            .ok_or_else(|| AppError::not_found("Project", project_id))?;

        let mut team = self.store.list_members(project_id).await?;
        if !team.iter().any(|m| m.user_id == project.owner_id) {
            let display_name = self
                .store
                .get_profile(&project.owner_id)
                .await?
                .map(|p| p.display_name)
                .unwrap_or_else(|| "Unknown".to_string());

            team.insert(
                0,
                MemberProfile {
                    user_id: project.owner_id,
                    display_name,
                    role: ProjectRole::Admin,
                },
            );
        }
        Ok(team)
    }
}
