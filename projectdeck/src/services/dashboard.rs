//! Dashboard service
//!
//! Loads what the caller can see and hands it to `stats`.

use crate::error::Result;
use crate::stats::DashboardSummary;
use crate::storage::Store;
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[derive(Clone)]
pub struct DashboardService {
    store: Arc<dyn Store>,
}

impl DashboardService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Summary over every project the caller owns or belongs to
    pub async fn summary_for(&self, caller_id: &str, now: DateTime<Utc>) -> Result<DashboardSummary> {
        let projects = self.store.list_projects_for_user(caller_id).await?;

        let mut tasks = Vec::new();
        for project in &projects {
            tasks.extend(self.store.list_tasks_by_project(&project.id).await?);
        }

        tracing::debug!(
            "Dashboard for {}: {} projects, {} tasks",
            caller_id,
            projects.len(),
            tasks.len()
        );

        Ok(DashboardSummary::build(&projects, &tasks, now))
    }
}
