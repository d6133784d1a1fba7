//! Repository layer for database operations
//!
//! SQLite implementation of `storage::Store`. Multi-row writes (project plus
//! owner membership, replace-all association sets) run in one transaction.

use super::models::*;
use crate::error::{AppError, Result};
use crate::storage::Store;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Turn a unique-constraint violation into `AppError::Conflict`
fn conflict_on_unique(err: sqlx::Error, message: impl FnOnce() -> String) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Conflict(message()),
        _ => AppError::Database(err),
    }
}

#[async_trait]
impl Store for Repository {
    async fn insert_profile(&self, profile: &NewProfile) -> Result<Profile> {
        let now = Utc::now();

        let created = sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profiles (id, display_name, preferences_json, created_at, updated_at)
            VALUES (?, ?, '{}', ?, ?)
            RETURNING *
            "#,
        )
        .bind(&profile.id)
        .bind(&profile.display_name)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, || format!("Profile {} already exists", profile.id)))?;

        tracing::debug!("Created profile: {}", created.id);
        Ok(created)
    }

    async fn get_profile(&self, id: &str) -> Result<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(profile)
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>> {
        let profiles = sqlx::query_as::<_, Profile>(
            "SELECT * FROM profiles ORDER BY display_name COLLATE NOCASE ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(profiles)
    }

    async fn update_profile(
        &self,
        id: &str,
        patch: &ProfilePatch,
        updated_at: DateTime<Utc>,
    ) -> Result<Profile> {
        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE profiles SET updated_at = ");
        qb.push_bind(updated_at);

        if let Some(display_name) = &patch.display_name {
            qb.push(", display_name = ").push_bind(display_name.clone());
        }

        let optional_columns = [
            ("full_name", &patch.full_name),
            ("bio", &patch.bio),
            ("phone", &patch.phone),
            ("location", &patch.location),
            ("job_title", &patch.job_title),
            ("github_url", &patch.github_url),
            ("linkedin_url", &patch.linkedin_url),
        ];
        for (column, value) in optional_columns {
            if let Some(value) = value {
                qb.push(format!(", {column} = ")).push_bind(value.clone());
            }
        }

        if let Some(preferences) = &patch.preferences {
            qb.push(", preferences_json = ")
                .push_bind(serde_json::to_string(preferences)?);
        }

        qb.push(" WHERE id = ").push_bind(id.to_string());
        qb.push(" RETURNING *");

        let profile = qb
            .build_query_as::<Profile>()
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found("Profile", id))?;

        tracing::debug!("Updated profile: {}", id);
        Ok(profile)
    }

    async fn delete_profile(&self, id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let owned: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM projects WHERE owner_id = ?")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if owned > 0 {
            return Err(AppError::Invariant(format!(
                "Profile {id} still owns {owned} project(s)"
            )));
        }

        for sql in [
            "DELETE FROM comments WHERE author_id = ?",
            "DELETE FROM task_assignees WHERE user_id = ?",
            "DELETE FROM project_members WHERE user_id = ?",
        ] {
            sqlx::query(sql).bind(id).execute(&mut *tx).await?;
        }

        let rows = sqlx::query("DELETE FROM profiles WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if rows == 0 {
            return Err(AppError::not_found("Profile", id));
        }

        tx.commit().await?;

        tracing::debug!("Deleted profile: {}", id);
        Ok(())
    }

    async fn insert_project(&self, project: &NewProject) -> Result<Project> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, Project>(
            r#"
            INSERT INTO projects (id, name, description, owner_id, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(&project.name)
        .bind(&project.description)
        .bind(&project.owner_id)
        .bind(ProjectStatus::default().as_str())
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO project_members (project_id, user_id, role, joined_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&project.owner_id)
        .bind(ProjectRole::Admin.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!("Created project: {} owned by {}", id, project.owner_id);
        Ok(created)
    }

    async fn get_project(&self, id: &str) -> Result<Option<Project>> {
        let project = sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(project)
    }

    async fn list_projects_for_user(&self, user_id: &str) -> Result<Vec<Project>> {
        let projects = sqlx::query_as::<_, Project>(
            r#"
            SELECT p.* FROM projects p
            LEFT JOIN project_members m ON m.project_id = p.id AND m.user_id = ?
            WHERE p.owner_id = ? OR m.user_id IS NOT NULL
            ORDER BY p.created_at DESC
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(projects)
    }

    async fn update_project(
        &self,
        id: &str,
        patch: &ProjectPatch,
        updated_at: DateTime<Utc>,
    ) -> Result<Project> {
        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE projects SET updated_at = ");
        qb.push_bind(updated_at);

        if let Some(name) = &patch.name {
            qb.push(", name = ").push_bind(name.clone());
        }
        if let Some(description) = &patch.description {
            qb.push(", description = ").push_bind(description.clone());
        }
        if let Some(status) = patch.status {
            qb.push(", status = ").push_bind(status.as_str());
        }

        qb.push(" WHERE id = ").push_bind(id.to_string());
        qb.push(" RETURNING *");

        let project = qb
            .build_query_as::<Project>()
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found("Project", id))?;

        tracing::debug!("Updated project: {}", id);
        Ok(project)
    }

    async fn delete_project(&self, id: &str) -> Result<()> {
        let rows = sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::not_found("Project", id));
        }

        tracing::debug!("Deleted project: {}", id);
        Ok(())
    }

    async fn get_membership(
        &self,
        project_id: &str,
        user_id: &str,
    ) -> Result<Option<ProjectMember>> {
        let member = sqlx::query_as::<_, ProjectMember>(
            "SELECT * FROM project_members WHERE project_id = ? AND user_id = ?",
        )
        .bind(project_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(member)
    }

    async fn insert_membership(
        &self,
        project_id: &str,
        user_id: &str,
        role: ProjectRole,
    ) -> Result<ProjectMember> {
        let member = sqlx::query_as::<_, ProjectMember>(
            r#"
            INSERT INTO project_members (project_id, user_id, role, joined_at)
            VALUES (?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(project_id)
        .bind(user_id)
        .bind(role.as_str())
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            conflict_on_unique(e, || {
                format!("User {user_id} is already a member of project {project_id}")
            })
        })?;

        tracing::debug!("Added member {} to project {}", user_id, project_id);
        Ok(member)
    }

    async fn delete_membership(&self, project_id: &str, user_id: &str) -> Result<()> {
        let rows = sqlx::query("DELETE FROM project_members WHERE project_id = ? AND user_id = ?")
            .bind(project_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::not_found(
                "Membership",
                format!("{project_id}/{user_id}"),
            ));
        }

        tracing::debug!("Removed member {} from project {}", user_id, project_id);
        Ok(())
    }

    async fn list_members(&self, project_id: &str) -> Result<Vec<MemberProfile>> {
        let members = sqlx::query_as::<_, MemberProfile>(
            r#"
            SELECT m.user_id AS user_id,
                   COALESCE(p.display_name, 'Unknown') AS display_name,
                   m.role AS role
            FROM project_members m
            LEFT JOIN profiles p ON p.id = m.user_id
            WHERE m.project_id = ?
            ORDER BY m.joined_at ASC
            "#,
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(members)
    }

    async fn insert_task(&self, task: &NewTask) -> Result<Task> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let created = sqlx::query_as::<_, Task>(
            r#"
            INSERT INTO tasks (id, title, description, status, priority, due_date,
                               project_id, created_by, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.status.as_str())
        .bind(task.priority.as_str())
        .bind(task.due_date)
        .bind(&task.project_id)
        .bind(&task.created_by)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Created task: {} in project {}", id, task.project_id);
        Ok(created)
    }

    async fn get_task(&self, id: &str) -> Result<Option<Task>> {
        let task = sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(task)
    }

    async fn list_tasks_by_project(&self, project_id: &str) -> Result<Vec<Task>> {
        let tasks = sqlx::query_as::<_, Task>(
            "SELECT * FROM tasks WHERE project_id = ? ORDER BY created_at ASC",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(tasks)
    }

    async fn update_task(
        &self,
        id: &str,
        patch: &TaskPatch,
        updated_at: DateTime<Utc>,
    ) -> Result<Task> {
        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE tasks SET updated_at = ");
        qb.push_bind(updated_at);

        if let Some(title) = &patch.title {
            qb.push(", title = ").push_bind(title.clone());
        }
        if let Some(description) = &patch.description {
            qb.push(", description = ").push_bind(description.clone());
        }
        if let Some(status) = patch.status {
            qb.push(", status = ").push_bind(status.as_str());
        }
        if let Some(priority) = patch.priority {
            qb.push(", priority = ").push_bind(priority.as_str());
        }
        if let Some(due_date) = patch.due_date {
            qb.push(", due_date = ").push_bind(due_date);
        }

        qb.push(" WHERE id = ").push_bind(id.to_string());
        qb.push(" RETURNING *");

        let task = qb
            .build_query_as::<Task>()
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found("Task", id))?;

        tracing::debug!("Updated task: {}", id);
        Ok(task)
    }

    async fn delete_task(&self, id: &str) -> Result<()> {
        let rows = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::not_found("Task", id));
        }

        tracing::debug!("Deleted task: {}", id);
        Ok(())
    }

    async fn replace_task_assignees(
        &self,
        task_id: &str,
        user_ids: &[String],
        assigned_by: &str,
    ) -> Result<()> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let task_exists: Option<String> = sqlx::query_scalar("SELECT id FROM tasks WHERE id = ?")
            .bind(task_id)
            .fetch_optional(&mut *tx)
            .await?;
        if task_exists.is_none() {
            return Err(AppError::not_found("Task", task_id));
        }

        sqlx::query("DELETE FROM task_assignees WHERE task_id = ?")
            .bind(task_id)
            .execute(&mut *tx)
            .await?;

        for user_id in user_ids {
            let profile: Option<String> = sqlx::query_scalar("SELECT id FROM profiles WHERE id = ?")
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?;
            if profile.is_none() {
                return Err(AppError::not_found("Profile", user_id.as_str()));
            }

            sqlx::query(
                r#"
                INSERT OR IGNORE INTO task_assignees (task_id, user_id, assigned_by, assigned_at)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(task_id)
            .bind(user_id)
            .bind(assigned_by)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::debug!("Replaced assignees of task {} ({} users)", task_id, user_ids.len());
        Ok(())
    }

    async fn list_task_assignees(&self, task_id: &str) -> Result<Vec<Assignee>> {
        let assignees = sqlx::query_as::<_, Assignee>(
            r#"
            SELECT a.user_id AS user_id,
                   COALESCE(p.display_name, 'Unknown') AS display_name,
                   a.assigned_by AS assigned_by
            FROM task_assignees a
            LEFT JOIN profiles p ON p.id = a.user_id
            WHERE a.task_id = ?
            ORDER BY display_name COLLATE NOCASE ASC
            "#,
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(assignees)
    }

    async fn insert_tag(&self, tag: &NewTag) -> Result<Tag> {
        let id = Uuid::new_v4().to_string();

        let created = sqlx::query_as::<_, Tag>(
            r#"
            INSERT INTO tags (id, name, name_key, color, project_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(&tag.name)
        .bind(tag_name_key(&tag.name))
        .bind(&tag.color)
        .bind(&tag.project_id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, || format!("Tag '{}' already exists", tag.name)))?;

        tracing::debug!("Created tag: {} ({})", created.name, id);
        Ok(created)
    }

    async fn get_tag(&self, id: &str) -> Result<Option<Tag>> {
        let tag = sqlx::query_as::<_, Tag>("SELECT * FROM tags WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(tag)
    }

    async fn list_tags(&self, project_id: Option<&str>) -> Result<Vec<Tag>> {
        let tags = match project_id {
            Some(project_id) => {
                sqlx::query_as::<_, Tag>(
                    "SELECT * FROM tags WHERE project_id = ? ORDER BY name_key ASC",
                )
                .bind(project_id)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Tag>(
                    "SELECT * FROM tags WHERE project_id IS NULL ORDER BY name_key ASC",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(tags)
    }

    async fn update_tag(&self, id: &str, patch: &TagPatch) -> Result<Tag> {
        let Some(current) = self.get_tag(id).await? else {
            return Err(AppError::not_found("Tag", id));
        };

        let name = patch.name.clone().unwrap_or(current.name);
        let color = patch.color.clone().or(current.color);

        let tag = sqlx::query_as::<_, Tag>(
            "UPDATE tags SET name = ?, name_key = ?, color = ? WHERE id = ? RETURNING *",
        )
        .bind(&name)
        .bind(tag_name_key(&name))
        .bind(&color)
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, || format!("Tag '{name}' already exists")))?;

        tracing::debug!("Updated tag: {}", id);
        Ok(tag)
    }

    async fn delete_tag(&self, id: &str) -> Result<()> {
        let rows = sqlx::query("DELETE FROM tags WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::not_found("Tag", id));
        }

        tracing::debug!("Deleted tag: {}", id);
        Ok(())
    }

    async fn replace_task_tags(&self, task_id: &str, tag_ids: &[String]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let task_exists: Option<String> = sqlx::query_scalar("SELECT id FROM tasks WHERE id = ?")
            .bind(task_id)
            .fetch_optional(&mut *tx)
            .await?;
        if task_exists.is_none() {
            return Err(AppError::not_found("Task", task_id));
        }

        sqlx::query("DELETE FROM task_tags WHERE task_id = ?")
            .bind(task_id)
            .execute(&mut *tx)
            .await?;

        for tag_id in tag_ids {
            let tag: Option<String> = sqlx::query_scalar("SELECT id FROM tags WHERE id = ?")
                .bind(tag_id)
                .fetch_optional(&mut *tx)
                .await?;
            if tag.is_none() {
                return Err(AppError::not_found("Tag", tag_id.as_str()));
            }

            sqlx::query("INSERT OR IGNORE INTO task_tags (task_id, tag_id) VALUES (?, ?)")
                .bind(task_id)
                .bind(tag_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        tracing::debug!("Replaced tags of task {} ({} tags)", task_id, tag_ids.len());
        Ok(())
    }

    async fn list_tags_for_task(&self, task_id: &str) -> Result<Vec<Tag>> {
        let tags = sqlx::query_as::<_, Tag>(
            r#"
            SELECT t.* FROM task_tags tt
            JOIN tags t ON t.id = tt.tag_id
            WHERE tt.task_id = ?
            ORDER BY t.name_key ASC
            "#,
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(tags)
    }

    async fn insert_comment(&self, comment: &NewComment) -> Result<Comment> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let created = sqlx::query_as::<_, Comment>(
            r#"
            INSERT INTO comments (id, content, task_id, author_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(&comment.content)
        .bind(&comment.task_id)
        .bind(&comment.author_id)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Created comment: {} on task {}", id, comment.task_id);
        Ok(created)
    }

    async fn get_comment(&self, id: &str) -> Result<Option<Comment>> {
        let comment = sqlx::query_as::<_, Comment>("SELECT * FROM comments WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(comment)
    }

    async fn list_comments_for_task(&self, task_id: &str) -> Result<Vec<Comment>> {
        let comments = sqlx::query_as::<_, Comment>(
            "SELECT * FROM comments WHERE task_id = ? ORDER BY created_at ASC",
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(comments)
    }

    async fn update_comment(
        &self,
        id: &str,
        content: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<Comment> {
        let comment = sqlx::query_as::<_, Comment>(
            "UPDATE comments SET content = ?, updated_at = ? WHERE id = ? RETURNING *",
        )
        .bind(content)
        .bind(updated_at)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::not_found("Comment", id))?;

        tracing::debug!("Updated comment: {}", id);
        Ok(comment)
    }

    async fn delete_comment(&self, id: &str) -> Result<()> {
        let rows = sqlx::query("DELETE FROM comments WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::not_found("Comment", id));
        }

        tracing::debug!("Deleted comment: {}", id);
        Ok(())
    }
}
