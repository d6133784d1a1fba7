//! Comments service
//!
//! Discussion on tasks. Any project member can comment; only the author
//! edits while still a member, and the author or a project admin deletes.

use crate::access::{self, AccessLevel};
use crate::config::MAX_COMMENT_LENGTH;
use crate::database::models::{Comment, NewComment, Task};
use crate::error::{AppError, Result};
use crate::services::{next_updated_at, required_text};
use crate::storage::Store;
use std::sync::Arc;

#[derive(Clone)]
pub struct CommentsService {
    store: Arc<dyn Store>,
}

impl CommentsService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn create_comment(
        &self,
        task_id: &str,
        content: &str,
        caller_id: &str,
    ) -> Result<Comment> {
        let task = self.load_task(task_id).await?;
        access::require_access(&*self.store, &task.project_id, caller_id, AccessLevel::Member)
            .await?;
        let content = required_text("Comment", content, MAX_COMMENT_LENGTH)?;

        tracing::info!("Adding comment to task {}", task_id);

        self.store
            .insert_comment(&NewComment {
                content,
                task_id: task_id.to_string(),
                author_id: caller_id.to_string(),
            })
            .await
    }

    /// Comments on a task, oldest first
    pub async fn list_comments(&self, task_id: &str, caller_id: &str) -> Result<Vec<Comment>> {
        let task = self.load_task(task_id).await?;
        access::require_access(&*self.store, &task.project_id, caller_id, AccessLevel::Member)
            .await?;

        self.store.list_comments_for_task(task_id).await
    }

    pub async fn update_comment(
        &self,
        id: &str,
        content: &str,
        caller_id: &str,
    ) -> Result<Comment> {
        let comment = self.load_comment(id).await?;
        let task = self.load_task(&comment.task_id).await?;
        access::require_access(&*self.store, &task.project_id, caller_id, AccessLevel::Member)
            .await?;

        if comment.author_id != caller_id {
            tracing::warn!("User {} tried to edit comment {} of {}", caller_id, id, comment.author_id);
            return Err(AppError::Permission(
                "Only the author can edit a comment".to_string(),
            ));
        }
        let content = required_text("Comment", content, MAX_COMMENT_LENGTH)?;

        self.store
            .update_comment(id, &content, next_updated_at(comment.updated_at))
            .await
    }

    pub async fn delete_comment(&self, id: &str, caller_id: &str) -> Result<()> {
        let comment = self.load_comment(id).await?;

        if comment.author_id != caller_id {
            let task = self.load_task(&comment.task_id).await?;
            access::require_access(&*self.store, &task.project_id, caller_id, AccessLevel::Admin)
                .await?;
        }

        tracing::info!("Deleting comment: {}", id);

        self.store.delete_comment(id).await
    }

    async fn load_task(&self, id: &str) -> Result<Task> {
        self.store
            .get_task(id)
            .await?
            .ok_or_else(|| AppError::not_found("Task", id))
    }

    async fn load_comment(&self, id: &str) -> Result<Comment> {
        self.store
            .get_comment(id)
            .await?
            .ok_or_else(|| AppError::not_found("Comment", id))
    }
}
