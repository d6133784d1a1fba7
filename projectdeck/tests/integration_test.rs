//! Integration tests for ProjectDeck
//!
//! These tests verify end-to-end functionality against a file-backed
//! SQLite database:
//! - Project, membership and task workflows across users
//! - Replace-all tag and assignee sets
//! - Default tag seeding
//! - Cascading deletes

use projectdeck::app::AppState;
use projectdeck::database::{create_pool, Repository};
use projectdeck::database::models::{
    CreateTaskRequest, Principal, ProjectInclude, ProjectRole, TaskPriority, TaskStatus,
    UpdateTaskRequest,
};
use projectdeck::error::AppError;
use projectdeck::storage::Store;
use std::sync::Arc;
use tempfile::TempDir;

/// Helper to create application state over a fresh database
async fn create_test_app() -> (AppState, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    let pool = create_pool(&db_path).await.unwrap();
    let state = AppState::with_store(Arc::new(Repository::new(pool)));

    (state, temp_dir)
}

async fn register(app: &AppState, id: &str, email: &str) {
    app.profiles
        .register(&Principal {
            id: id.to_string(),
            email: email.to_string(),
            display_name: None,
        })
        .await
        .unwrap();
}

fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_owner_member_task_workflow() {
    let (app, _temp) = create_test_app().await;
    register(&app, "user-a", "ann@example.com").await;
    register(&app, "user-b", "ben@example.com").await;

    // A creates P and adds B as a plain member
    let project = app
        .projects
        .create_project("Project P", None, "user-a")
        .await
        .unwrap();
    app.members
        .add_member(&project.id, "user-b", ProjectRole::Member, "user-a")
        .await
        .unwrap();

    // B creates T1 without status or priority
    let t1 = app
        .tasks
        .create_task(
            &project.id,
            CreateTaskRequest {
                title: "T1".to_string(),
                ..Default::default()
            },
            "user-b",
        )
        .await
        .unwrap();
    assert_eq!(t1.status, "open");
    assert_eq!(t1.priority, "Medium");

    // A completes T1
    let completed = app
        .tasks
        .update_task(
            &t1.id,
            UpdateTaskRequest {
                status: Some(TaskStatus::Completed),
                ..Default::default()
            },
            "user-a",
        )
        .await
        .unwrap();
    assert_eq!(completed.status(), Some(TaskStatus::Completed));
    assert!(completed.updated_at > t1.updated_at);

    // Back-to-back updates still move the timestamp forward
    let reprioritized = app
        .tasks
        .update_task(
            &t1.id,
            UpdateTaskRequest {
                priority: Some(TaskPriority::Urgent),
                ..Default::default()
            },
            "user-a",
        )
        .await
        .unwrap();
    assert!(reprioritized.updated_at > completed.updated_at);

    // B is not the owner
    let denied = app.projects.delete_project(&project.id, "user-b").await;
    assert!(matches!(denied, Err(AppError::Permission(_))));

    let details = app
        .projects
        .get_project(
            &project.id,
            ProjectInclude {
                members: true,
                tags: true,
            },
        )
        .await
        .unwrap();
    assert_eq!(details.task_count, 1);
    assert_eq!(details.owner.unwrap().display_name, "ann");
    assert_eq!(details.members.unwrap().len(), 2);
}

#[tokio::test]
async fn test_ensure_default_tag_set_inserts_only_missing() {
    let (app, _temp) = create_test_app().await;
    register(&app, "user-a", "ann@example.com").await;

    app.tags
        .create_tag("Bug", None, None, "user-a")
        .await
        .unwrap();

    let created = app
        .tags
        .ensure_default_tag_set(None, &ids(&["Bug", "Feature"]))
        .await
        .unwrap();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].name, "Feature");

    let again = app
        .tags
        .ensure_default_tag_set(None, &ids(&["Bug", "Feature"]))
        .await
        .unwrap();
    assert!(again.is_empty());
    assert_eq!(app.tags.list_tags(None).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_replace_all_tags_and_assignees() {
    let (app, _temp) = create_test_app().await;
    register(&app, "user-a", "ann@example.com").await;
    register(&app, "user-b", "ben@example.com").await;

    let project = app
        .projects
        .create_project("Project P", None, "user-a")
        .await
        .unwrap();
    app.members
        .add_member(&project.id, "user-b", ProjectRole::Member, "user-a")
        .await
        .unwrap();

    let bug = app.tags.create_tag("Bug", None, None, "user-a").await.unwrap();
    let sprint = app
        .tags
        .create_tag("Sprint 1", None, Some(project.id.as_str()), "user-a")
        .await
        .unwrap();

    let task = app
        .tasks
        .create_task(
            &project.id,
            CreateTaskRequest {
                title: "Ship it".to_string(),
                tag_ids: vec![bug.id.clone(), sprint.id.clone()],
                assignee_ids: ids(&["user-a", "user-b"]),
                ..Default::default()
            },
            "user-a",
        )
        .await
        .unwrap();

    let details = app.tasks.get_task_details(&task.id, "user-b").await.unwrap();
    assert_eq!(details.tags.len(), 2);
    assert_eq!(details.assignees.len(), 2);

    // Second set replaces the first
    app.tasks
        .set_task_tags(&task.id, &[sprint.id.clone()], "user-b")
        .await
        .unwrap();
    let tags = app.tags.get_tags_for_task(&task.id).await.unwrap();
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].id, sprint.id);

    // Unknown tag leaves the previous set in place
    let failed = app
        .tasks
        .set_task_tags(&task.id, &[bug.id.clone(), "missing".to_string()], "user-b")
        .await;
    assert!(matches!(failed, Err(AppError::NotFound { entity: "Tag", .. })));
    assert_eq!(app.tags.get_tags_for_task(&task.id).await.unwrap(), tags);

    // Empty input clears
    app.tasks.set_task_tags(&task.id, &[], "user-b").await.unwrap();
    assert!(app.tags.get_tags_for_task(&task.id).await.unwrap().is_empty());

    app.tasks
        .set_task_assignees(&task.id, &ids(&["user-b"]), "user-a")
        .await
        .unwrap();
    let details = app.tasks.get_task_details(&task.id, "user-a").await.unwrap();
    assert_eq!(details.assignees.len(), 1);
    assert_eq!(details.assignees[0].display_name, "ben");
    assert_eq!(details.assignees[0].assigned_by, "user-a");
}

#[tokio::test]
async fn test_delete_project_cascades_everything() {
    let (app, _temp) = create_test_app().await;
    register(&app, "user-a", "ann@example.com").await;

    let project = app
        .projects
        .create_project("Doomed", None, "user-a")
        .await
        .unwrap();
    let tag = app
        .tags
        .create_tag("Local", None, Some(project.id.as_str()), "user-a")
        .await
        .unwrap();
    let task = app
        .tasks
        .create_task(
            &project.id,
            CreateTaskRequest {
                title: "Orphan".to_string(),
                tag_ids: vec![tag.id.clone()],
                ..Default::default()
            },
            "user-a",
        )
        .await
        .unwrap();
    let comment = app
        .comments
        .create_comment(&task.id, "bye", "user-a")
        .await
        .unwrap();

    app.projects
        .delete_project(&project.id, "user-a")
        .await
        .unwrap();

    assert!(app.store.get_task(&task.id).await.unwrap().is_none());
    assert!(app.store.get_comment(&comment.id).await.unwrap().is_none());
    assert!(app.store.get_tag(&tag.id).await.unwrap().is_none());
    assert!(app
        .store
        .get_membership(&project.id, "user-a")
        .await
        .unwrap()
        .is_none());
    assert!(app.projects.list_projects("user-a").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_dashboard_over_visible_projects() {
    let (app, _temp) = create_test_app().await;
    register(&app, "user-a", "ann@example.com").await;
    register(&app, "user-b", "ben@example.com").await;

    let shared = app
        .projects
        .create_project("Shared", None, "user-a")
        .await
        .unwrap();
    let private = app
        .projects
        .create_project("Private", None, "user-a")
        .await
        .unwrap();
    app.members
        .add_member(&shared.id, "user-b", ProjectRole::Member, "user-a")
        .await
        .unwrap();

    for (project_id, title) in [(&shared.id, "one"), (&shared.id, "two"), (&private.id, "three")] {
        app.tasks
            .create_task(
                project_id,
                CreateTaskRequest {
                    title: title.to_string(),
                    ..Default::default()
                },
                "user-a",
            )
            .await
            .unwrap();
    }

    let owner_view = app
        .dashboard
        .summary_for("user-a", chrono::Utc::now())
        .await
        .unwrap();
    assert_eq!(owner_view.total_projects, 2);
    assert_eq!(owner_view.total_tasks, 3);
    assert_eq!(owner_view.tasks_by_status[&TaskStatus::Open], 3);

    let member_view = app
        .dashboard
        .summary_for("user-b", chrono::Utc::now())
        .await
        .unwrap();
    assert_eq!(member_view.total_projects, 1);
    assert_eq!(member_view.tasks_by_project[&shared.id], 2);
}

#[tokio::test]
async fn test_create_project_for_unknown_owner() {
    let (app, _temp) = create_test_app().await;

    let result = app.projects.create_project("Ghost", None, "nobody").await;
    assert!(matches!(
        result,
        Err(AppError::NotFound {
            entity: "Profile",
            ..
        })
    ));
}

#[tokio::test]
async fn test_assign_tags_checks_access_and_scope() {
    let (app, _temp) = create_test_app().await;
    register(&app, "user-a", "ann@example.com").await;
    register(&app, "user-e", "eve@example.com").await;

    let project = app
        .projects
        .create_project("Project P", None, "user-a")
        .await
        .unwrap();
    let other = app
        .projects
        .create_project("Project Q", None, "user-e")
        .await
        .unwrap();
    let global = app.tags.create_tag("Bug", None, None, "user-a").await.unwrap();
    let foreign = app
        .tags
        .create_tag("Secret", None, Some(other.id.as_str()), "user-e")
        .await
        .unwrap();
    let task = app
        .tasks
        .create_task(
            &project.id,
            CreateTaskRequest {
                title: "T1".to_string(),
                ..Default::default()
            },
            "user-a",
        )
        .await
        .unwrap();

    let denied = app
        .tags
        .assign_tags_to_task(&task.id, &[global.id.clone()], "user-e")
        .await;
    assert!(matches!(denied, Err(AppError::Permission(_))));

    let cross = app
        .tags
        .assign_tags_to_task(&task.id, &[foreign.id.clone()], "user-a")
        .await;
    assert!(matches!(cross, Err(AppError::Validation(_))));
    assert!(app.tags.get_tags_for_task(&task.id).await.unwrap().is_empty());

    app.tags
        .assign_tags_to_task(&task.id, &[global.id.clone()], "user-a")
        .await
        .unwrap();
    assert_eq!(app.tags.get_tags_for_task(&task.id).await.unwrap().len(), 1);
}
