//! Profiles service
//!
//! One profile per authenticated principal, created at signup.

use crate::config::MAX_DISPLAY_NAME_LENGTH;
use crate::database::models::{NewProfile, Principal, Profile, ProfilePatch};
use crate::error::{AppError, Result};
use crate::services::{next_updated_at, optional_text, required_text};
use crate::storage::Store;
use std::sync::Arc;

/// Display name for a fresh profile: the principal's own, else the local
/// part of the email address
fn initial_display_name(principal: &Principal) -> String {
    principal
        .display_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| {
            principal
                .email
                .split('@')
                .next()
                .unwrap_or_default()
                .to_string()
        })
}

#[derive(Clone)]
pub struct ProfilesService {
    store: Arc<dyn Store>,
}

impl ProfilesService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Create the profile for a newly signed-up principal
    pub async fn register(&self, principal: &Principal) -> Result<Profile> {
        let display_name = required_text(
            "Display name",
            &initial_display_name(principal),
            MAX_DISPLAY_NAME_LENGTH,
        )?;

        if self.store.get_profile(&principal.id).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "Profile {} already exists",
                principal.id
            )));
        }

        tracing::info!("Registering profile for {}", principal.id);

        self.store
            .insert_profile(&NewProfile {
                id: principal.id.clone(),
                display_name,
            })
            .await
    }

    pub async fn get_profile(&self, id: &str) -> Result<Profile> {
        self.store
            .get_profile(id)
            .await?
            .ok_or_else(|| AppError::not_found("Profile", id))
    }

    /// All profiles by display name, for user pickers
    pub async fn list_profiles(&self) -> Result<Vec<Profile>> {
        self.store.list_profiles().await
    }

    /// Users may only edit their own profile
    pub async fn update_profile(
        &self,
        id: &str,
        patch: ProfilePatch,
        caller_id: &str,
    ) -> Result<Profile> {
        if id != caller_id {
            tracing::warn!("User {} tried to edit profile {}", caller_id, id);
            return Err(AppError::Permission(
                "Profiles can only be edited by their owner".to_string(),
            ));
        }
        let current = self.get_profile(id).await?;

        let patch = ProfilePatch {
            display_name: patch
                .display_name
                .map(|n| required_text("Display name", &n, MAX_DISPLAY_NAME_LENGTH))
                .transpose()?,
            full_name: patch.full_name.map(optional_text),
            bio: patch.bio.map(optional_text),
            phone: patch.phone.map(optional_text),
            location: patch.location.map(optional_text),
            job_title: patch.job_title.map(optional_text),
            github_url: patch.github_url.map(optional_text),
            linkedin_url: patch.linkedin_url.map(optional_text),
            preferences: patch.preferences,
        };

        tracing::debug!("Updating profile: {}", id);

        self.store
            .update_profile(id, &patch, next_updated_at(current.updated_at))
            .await
    }

    /// Users may only delete their own profile, and only once they own no
    /// projects. Their memberships, assignments and comments go with it.
    pub async fn delete_profile(&self, id: &str, caller_id: &str) -> Result<()> {
        if id != caller_id {
            tracing::warn!("User {} tried to delete profile {}", caller_id, id);
            return Err(AppError::Permission(
                "Profiles can only be deleted by their owner".to_string(),
            ));
        }

        tracing::info!("Deleting profile: {}", id);

        self.store.delete_profile(id).await
    }
}
