//! Application state and initialization
//!
//! This module wires the persistence provider and every service together.
//! All services share one `Arc<dyn Store>` and are made available through
//! `AppState`.

use crate::config::AppConfig;
use crate::database::{self, Repository};
use crate::error::Result;
use crate::services::{
    CommentsService, DashboardService, MembersService, ProfilesService, ProjectsService,
    TagsService, TasksService,
};
use crate::storage::Store;
use std::sync::Arc;

/// Central application state holding all services
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub profiles: ProfilesService,
    pub projects: ProjectsService,
    pub members: MembersService,
    pub tasks: TasksService,
    pub tags: TagsService,
    pub comments: CommentsService,
    pub dashboard: DashboardService,
}

impl AppState {
    /// Build every service on top of an existing provider
    pub fn with_store(store: Arc<dyn Store>) -> Self {
        Self {
            profiles: ProfilesService::new(store.clone()),
            projects: ProjectsService::new(store.clone()),
            members: MembersService::new(store.clone()),
            tasks: TasksService::new(store.clone()),
            tags: TagsService::new(store.clone()),
            comments: CommentsService::new(store.clone()),
            dashboard: DashboardService::new(store.clone()),
            store,
        }
    }

    /// Open the SQLite database described by `config`, run migrations and
    /// seed the global default tags when enabled.
    pub async fn initialize(config: &AppConfig) -> Result<Self> {
        tracing::info!("Initializing application");

        let pool = database::create_pool_with_config(config).await?;
        let state = Self::with_store(Arc::new(Repository::new(pool)));

        if config.seed_default_tags {
            let created = state
                .tags
                .ensure_default_tag_set(None, &config.default_tags)
                .await?;
            tracing::debug!("Default tag seeding created {} tags", created.len());
        }

        tracing::info!("Application initialized successfully");

        Ok(state)
    }
}
