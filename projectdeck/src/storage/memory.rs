//! In-memory persistence provider
//!
//! Keeps every collection in maps behind a single `tokio::sync::RwLock`, so
//! each store call (including cascades and replace-all association sets)
//! is atomic. Used by tests and demos; can be switched unavailable to
//! exercise provider failures.

use crate::database::models::*;
use crate::error::{AppError, Result};
use crate::storage::Store;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct AssigneeRow {
    user_id: String,
    assigned_by: String,
}

#[derive(Default)]
struct MemoryState {
    profiles: HashMap<String, Profile>,
    projects: HashMap<String, Project>,
    /// Keyed by (project_id, user_id)
    members: HashMap<(String, String), ProjectMember>,
    tasks: HashMap<String, Task>,
    /// Keyed by task_id, insertion order preserved
    assignees: HashMap<String, Vec<AssigneeRow>>,
    tags: HashMap<String, Tag>,
    /// (task_id, tag_id)
    task_tags: BTreeSet<(String, String)>,
    comments: HashMap<String, Comment>,
    last_stamp: Option<DateTime<Utc>>,
}

impl MemoryState {
    /// Creation time for a new row, strictly after the previous one so
    /// ordering by timestamp matches insertion order
    fn stamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamp = match self.last_stamp {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_stamp = Some(stamp);
        stamp
    }

    fn display_name(&self, user_id: &str) -> String {
        self.profiles
            .get(user_id)
            .map(|p| p.display_name.clone())
            .unwrap_or_else(|| "Unknown".to_string())
    }

    fn tag_name_taken(&self, project_id: Option<&str>, name: &str, except: Option<&str>) -> bool {
        let key = tag_name_key(name);
        self.tags.values().any(|t| {
            t.project_id.as_deref() == project_id
                && tag_name_key(&t.name) == key
                && Some(t.id.as_str()) != except
        })
    }

    fn remove_task(&mut self, task_id: &str) {
        self.tasks.remove(task_id);
        self.assignees.remove(task_id);
        self.task_tags.retain(|(task, _)| task != task_id);
        self.comments.retain(|_, c| c.task_id != task_id);
    }

    fn remove_tag(&mut self, tag_id: &str) {
        self.tags.remove(tag_id);
        self.task_tags.retain(|(_, tag)| tag != tag_id);
    }
}

/// In-process `Store` implementation
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    available: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate the backend becoming unreachable (`false`) or recovering.
    /// While unavailable every call fails with `AppError::Storage`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(AppError::Storage("memory store is unavailable".to_string()))
        }
    }
}

fn sort_by_name<T>(items: &mut [T], name: impl Fn(&T) -> &str) {
    items.sort_by_key(|item| name(item).to_lowercase());
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_profile(&self, profile: &NewProfile) -> Result<Profile> {
        self.check_available()?;
        let mut state = self.state.write().await;

        if state.profiles.contains_key(&profile.id) {
            return Err(AppError::Conflict(format!(
                "Profile {} already exists",
                profile.id
            )));
        }

        let now = state.stamp();
        let created = Profile {
            id: profile.id.clone(),
            display_name: profile.display_name.clone(),
            full_name: None,
            bio: None,
            phone: None,
            location: None,
            job_title: None,
            github_url: None,
            linkedin_url: None,
            preferences_json: "{}".to_string(),
            created_at: now,
            updated_at: now,
        };
        state.profiles.insert(created.id.clone(), created.clone());
        Ok(created)
    }

    async fn get_profile(&self, id: &str) -> Result<Option<Profile>> {
        self.check_available()?;
        Ok(self.state.read().await.profiles.get(id).cloned())
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>> {
        self.check_available()?;
        let mut profiles: Vec<Profile> =
            self.state.read().await.profiles.values().cloned().collect();
        sort_by_name(&mut profiles, |p| p.display_name.as_str());
        Ok(profiles)
    }

    async fn update_profile(
        &self,
        id: &str,
        patch: &ProfilePatch,
        updated_at: DateTime<Utc>,
    ) -> Result<Profile> {
        self.check_available()?;
        let preferences_json = patch
            .preferences
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let mut state = self.state.write().await;
        let profile = state
            .profiles
            .get_mut(id)
            .ok_or_else(|| AppError::not_found("Profile", id))?;

        if let Some(display_name) = &patch.display_name {
            profile.display_name = display_name.clone();
        }
        let optional_fields = [
            (&mut profile.full_name, &patch.full_name),
            (&mut profile.bio, &patch.bio),
            (&mut profile.phone, &patch.phone),
            (&mut profile.location, &patch.location),
            (&mut profile.job_title, &patch.job_title),
            (&mut profile.github_url, &patch.github_url),
            (&mut profile.linkedin_url, &patch.linkedin_url),
        ];
        for (field, value) in optional_fields {
            if let Some(value) = value {
                *field = value.clone();
            }
        }
        if let Some(preferences_json) = preferences_json {
            profile.preferences_json = preferences_json;
        }
        profile.updated_at = updated_at;

        Ok(profile.clone())
    }

    async fn delete_profile(&self, id: &str) -> Result<()> {
        self.check_available()?;
        let mut state = self.state.write().await;

        if !state.profiles.contains_key(id) {
            return Err(AppError::not_found("Profile", id));
        }
        let owned = state.projects.values().filter(|p| p.owner_id == id).count();
        if owned > 0 {
            return Err(AppError::Invariant(format!(
                "Profile {id} still owns {owned} project(s)"
            )));
        }

        state.comments.retain(|_, c| c.author_id != id);
        for rows in state.assignees.values_mut() {
            rows.retain(|r| r.user_id != id);
        }
        state.members.retain(|(_, user_id), _| user_id != id);
        state.profiles.remove(id);
        Ok(())
    }

    async fn insert_project(&self, project: &NewProject) -> Result<Project> {
        self.check_available()?;
        let mut state = self.state.write().await;

        if !state.profiles.contains_key(&project.owner_id) {
            return Err(AppError::not_found("Profile", project.owner_id.as_str()));
        }

        let now = state.stamp();
        let created = Project {
            id: Uuid::new_v4().to_string(),
            name: project.name.clone(),
            description: project.description.clone(),
            owner_id: project.owner_id.clone(),
            status: ProjectStatus::default(),
            created_at: now,
            updated_at: now,
        };

        state.members.insert(
            (created.id.clone(), project.owner_id.clone()),
            ProjectMember {
                project_id: created.id.clone(),
                user_id: project.owner_id.clone(),
                role: ProjectRole::Admin,
                joined_at: now,
            },
        );
        state.projects.insert(created.id.clone(), created.clone());
        Ok(created)
    }

    async fn get_project(&self, id: &str) -> Result<Option<Project>> {
        self.check_available()?;
        Ok(self.state.read().await.projects.get(id).cloned())
    }

    async fn list_projects_for_user(&self, user_id: &str) -> Result<Vec<Project>> {
        self.check_available()?;
        let state = self.state.read().await;

        let mut projects: Vec<Project> = state
            .projects
            .values()
            .filter(|p| {
                p.owner_id == user_id
                    || state
                        .members
                        .contains_key(&(p.id.clone(), user_id.to_string()))
            })
            .cloned()
            .collect();
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(projects)
    }

    async fn update_project(
        &self,
        id: &str,
        patch: &ProjectPatch,
        updated_at: DateTime<Utc>,
    ) -> Result<Project> {
        self.check_available()?;
        let mut state = self.state.write().await;
        let project = state
            .projects
            .get_mut(id)
            .ok_or_else(|| AppError::not_found("Project", id))?;

        if let Some(name) = &patch.name {
            project.name = name.clone();
        }
        if let Some(description) = &patch.description {
            project.description = description.clone();
        }
        if let Some(status) = patch.status {
            project.status = status;
        }
        project.updated_at = updated_at;

        Ok(project.clone())
    }

    async fn delete_project(&self, id: &str) -> Result<()> {
        self.check_available()?;
        let mut state = self.state.write().await;

        if state.projects.remove(id).is_none() {
            return Err(AppError::not_found("Project", id));
        }

        state.members.retain(|(project_id, _), _| project_id != id);

        let task_ids: Vec<String> = state
            .tasks
            .values()
            .filter(|t| t.project_id == id)
            .map(|t| t.id.clone())
            .collect();
        for task_id in &task_ids {
            state.remove_task(task_id);
        }

        let tag_ids: Vec<String> = state
            .tags
            .values()
            .filter(|t| t.project_id.as_deref() == Some(id))
            .map(|t| t.id.clone())
            .collect();
        for tag_id in &tag_ids {
            state.remove_tag(tag_id);
        }

        Ok(())
    }

    async fn get_membership(
        &self,
        project_id: &str,
        user_id: &str,
    ) -> Result<Option<ProjectMember>> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(state
            .members
            .get(&(project_id.to_string(), user_id.to_string()))
            .cloned())
    }

    async fn insert_membership(
        &self,
        project_id: &str,
        user_id: &str,
        role: ProjectRole,
    ) -> Result<ProjectMember> {
        self.check_available()?;
        let mut state = self.state.write().await;

        if !state.projects.contains_key(project_id) {
            return Err(AppError::not_found("Project", project_id));
        }

        let key = (project_id.to_string(), user_id.to_string());
        if state.members.contains_key(&key) {
            return Err(AppError::Conflict(format!(
                "User {user_id} is already a member of project {project_id}"
            )));
        }

        let member = ProjectMember {
            project_id: project_id.to_string(),
            user_id: user_id.to_string(),
            role,
            joined_at: state.stamp(),
        };
        state.members.insert(key, member.clone());
        Ok(member)
    }

    async fn delete_membership(&self, project_id: &str, user_id: &str) -> Result<()> {
        self.check_available()?;
        let mut state = self.state.write().await;

        state
            .members
            .remove(&(project_id.to_string(), user_id.to_string()))
            .map(|_| ())
            .ok_or_else(|| AppError::not_found("Membership", format!("{project_id}/{user_id}")))
    }

    async fn list_members(&self, project_id: &str) -> Result<Vec<MemberProfile>> {
        self.check_available()?;
        let state = self.state.read().await;

        let mut rows: Vec<&ProjectMember> = state
            .members
            .values()
            .filter(|m| m.project_id == project_id)
            .collect();
        rows.sort_by(|a, b| {
            a.joined_at
                .cmp(&b.joined_at)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });

        Ok(rows
            .into_iter()
            .map(|m| MemberProfile {
                user_id: m.user_id.clone(),
                display_name: state.display_name(&m.user_id),
                role: m.role,
            })
            .collect())
    }

    async fn insert_task(&self, task: &NewTask) -> Result<Task> {
        self.check_available()?;
        let mut state = self.state.write().await;

        if !state.projects.contains_key(&task.project_id) {
            return Err(AppError::not_found("Project", task.project_id.as_str()));
        }

        let now = state.stamp();
        let created = Task {
            id: Uuid::new_v4().to_string(),
            title: task.title.clone(),
            description: task.description.clone(),
            status: task.status.as_str().to_string(),
            priority: task.priority.as_str().to_string(),
            due_date: task.due_date,
            project_id: task.project_id.clone(),
            created_by: task.created_by.clone(),
            created_at: now,
            updated_at: now,
        };
        state.tasks.insert(created.id.clone(), created.clone());
        Ok(created)
    }

    async fn get_task(&self, id: &str) -> Result<Option<Task>> {
        self.check_available()?;
        Ok(self.state.read().await.tasks.get(id).cloned())
    }

    async fn list_tasks_by_project(&self, project_id: &str) -> Result<Vec<Task>> {
        self.check_available()?;
        let state = self.state.read().await;

        let mut tasks: Vec<Task> = state
            .tasks
            .values()
            .filter(|t| t.project_id == project_id)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(tasks)
    }

    async fn update_task(
        &self,
        id: &str,
        patch: &TaskPatch,
        updated_at: DateTime<Utc>,
    ) -> Result<Task> {
        self.check_available()?;
        let mut state = self.state.write().await;
        let task = state
            .tasks
            .get_mut(id)
            .ok_or_else(|| AppError::not_found("Task", id))?;

        if let Some(title) = &patch.title {
            task.title = title.clone();
        }
        if let Some(description) = &patch.description {
            task.description = description.clone();
        }
        if let Some(status) = patch.status {
            task.status = status.as_str().to_string();
        }
        if let Some(priority) = patch.priority {
            task.priority = priority.as_str().to_string();
        }
        if let Some(due_date) = patch.due_date {
            task.due_date = due_date;
        }
        task.updated_at = updated_at;

        Ok(task.clone())
    }

    async fn delete_task(&self, id: &str) -> Result<()> {
        self.check_available()?;
        let mut state = self.state.write().await;

        if !state.tasks.contains_key(id) {
            return Err(AppError::not_found("Task", id));
        }
        state.remove_task(id);
        Ok(())
    }

    async fn replace_task_assignees(
        &self,
        task_id: &str,
        user_ids: &[String],
        assigned_by: &str,
    ) -> Result<()> {
        self.check_available()?;
        let mut state = self.state.write().await;

        if !state.tasks.contains_key(task_id) {
            return Err(AppError::not_found("Task", task_id));
        }
        if let Some(missing) = user_ids.iter().find(|id| !state.profiles.contains_key(*id)) {
            return Err(AppError::not_found("Profile", missing.as_str()));
        }

        let mut rows: Vec<AssigneeRow> = Vec::with_capacity(user_ids.len());
        for user_id in user_ids {
            if !rows.iter().any(|r| &r.user_id == user_id) {
                rows.push(AssigneeRow {
                    user_id: user_id.clone(),
                    assigned_by: assigned_by.to_string(),
                });
            }
        }
        state.assignees.insert(task_id.to_string(), rows);
        Ok(())
    }

    async fn list_task_assignees(&self, task_id: &str) -> Result<Vec<Assignee>> {
        self.check_available()?;
        let state = self.state.read().await;

        let mut assignees: Vec<Assignee> = state
            .assignees
            .get(task_id)
            .map(|rows| {
                rows.iter()
                    .map(|r| Assignee {
                        user_id: r.user_id.clone(),
                        display_name: state.display_name(&r.user_id),
                        assigned_by: r.assigned_by.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        sort_by_name(&mut assignees, |a| a.display_name.as_str());
        Ok(assignees)
    }

    async fn insert_tag(&self, tag: &NewTag) -> Result<Tag> {
        self.check_available()?;
        let mut state = self.state.write().await;

        if let Some(project_id) = &tag.project_id {
            if !state.projects.contains_key(project_id) {
                return Err(AppError::not_found("Project", project_id.as_str()));
            }
        }
        if state.tag_name_taken(tag.project_id.as_deref(), &tag.name, None) {
            return Err(AppError::Conflict(format!("Tag '{}' already exists", tag.name)));
        }

        let created = Tag {
            id: Uuid::new_v4().to_string(),
            name: tag.name.clone(),
            color: tag.color.clone(),
            project_id: tag.project_id.clone(),
            created_at: state.stamp(),
        };
        state.tags.insert(created.id.clone(), created.clone());
        Ok(created)
    }

    async fn get_tag(&self, id: &str) -> Result<Option<Tag>> {
        self.check_available()?;
        Ok(self.state.read().await.tags.get(id).cloned())
    }

    async fn list_tags(&self, project_id: Option<&str>) -> Result<Vec<Tag>> {
        self.check_available()?;
        let state = self.state.read().await;

        let mut tags: Vec<Tag> = state
            .tags
            .values()
            .filter(|t| t.project_id.as_deref() == project_id)
            .cloned()
            .collect();
        sort_by_name(&mut tags, |t| t.name.as_str());
        Ok(tags)
    }

    async fn update_tag(&self, id: &str, patch: &TagPatch) -> Result<Tag> {
        self.check_available()?;
        let mut state = self.state.write().await;

        let scope = match state.tags.get(id) {
            Some(tag) => tag.project_id.clone(),
            None => return Err(AppError::not_found("Tag", id)),
        };
        if let Some(name) = &patch.name {
            if state.tag_name_taken(scope.as_deref(), name, Some(id)) {
                return Err(AppError::Conflict(format!("Tag '{name}' already exists")));
            }
        }

        let tag = state
            .tags
            .get_mut(id)
            .ok_or_else(|| AppError::not_found("Tag", id))?;
        if let Some(name) = &patch.name {
            tag.name = name.clone();
        }
        if let Some(color) = &patch.color {
            tag.color = Some(color.clone());
        }
        Ok(tag.clone())
    }

    async fn delete_tag(&self, id: &str) -> Result<()> {
        self.check_available()?;
        let mut state = self.state.write().await;

        if !state.tags.contains_key(id) {
            return Err(AppError::not_found("Tag", id));
        }
        state.remove_tag(id);
        Ok(())
    }

    async fn replace_task_tags(&self, task_id: &str, tag_ids: &[String]) -> Result<()> {
        self.check_available()?;
        let mut state = self.state.write().await;

        if !state.tasks.contains_key(task_id) {
            return Err(AppError::not_found("Task", task_id));
        }
        if let Some(missing) = tag_ids.iter().find(|id| !state.tags.contains_key(*id)) {
            return Err(AppError::not_found("Tag", missing.as_str()));
        }

        state.task_tags.retain(|(task, _)| task != task_id);
        for tag_id in tag_ids {
            state
                .task_tags
                .insert((task_id.to_string(), tag_id.clone()));
        }
        Ok(())
    }

    async fn list_tags_for_task(&self, task_id: &str) -> Result<Vec<Tag>> {
        self.check_available()?;
        let state = self.state.read().await;

        let mut tags: Vec<Tag> = state
            .task_tags
            .iter()
            .filter(|(task, _)| task == task_id)
            .filter_map(|(_, tag_id)| state.tags.get(tag_id).cloned())
            .collect();
        sort_by_name(&mut tags, |t| t.name.as_str());
        Ok(tags)
    }

    async fn insert_comment(&self, comment: &NewComment) -> Result<Comment> {
        self.check_available()?;
        let mut state = self.state.write().await;

        if !state.tasks.contains_key(&comment.task_id) {
            return Err(AppError::not_found("Task", comment.task_id.as_str()));
        }

        let now = state.stamp();
        let created = Comment {
            id: Uuid::new_v4().to_string(),
            content: comment.content.clone(),
            task_id: comment.task_id.clone(),
            author_id: comment.author_id.clone(),
            created_at: now,
            updated_at: now,
        };
        state.comments.insert(created.id.clone(), created.clone());
        Ok(created)
    }

    async fn get_comment(&self, id: &str) -> Result<Option<Comment>> {
        self.check_available()?;
        Ok(self.state.read().await.comments.get(id).cloned())
    }

    async fn list_comments_for_task(&self, task_id: &str) -> Result<Vec<Comment>> {
        self.check_available()?;
        let state = self.state.read().await;

        let mut comments: Vec<Comment> = state
            .comments
            .values()
            .filter(|c| c.task_id == task_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(comments)
    }

    async fn update_comment(
        &self,
        id: &str,
        content: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<Comment> {
        self.check_available()?;
        let mut state = self.state.write().await;
        let comment = state
            .comments
            .get_mut(id)
            .ok_or_else(|| AppError::not_found("Comment", id))?;

        comment.content = content.to_string();
        comment.updated_at = updated_at;
        Ok(comment.clone())
    }

    async fn delete_comment(&self, id: &str) -> Result<()> {
        self.check_available()?;
        let mut state = self.state.write().await;

        state
            .comments
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| AppError::not_found("Comment", id))
    }
}
