//! Dashboard aggregation
//!
//! Pure counting over already loaded projects and tasks. Tasks whose stored
//! status or priority is not a recognized value are left out of the
//! corresponding buckets instead of being coerced into a default.

use crate::database::models::{Project, ProjectStatus, Task, TaskPriority, TaskStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Due date has passed and the task is not completed.
/// A due date of today is not overdue.
pub fn is_overdue(task: &Task, now: DateTime<Utc>) -> bool {
    match task.due_date {
        Some(due) => due < now.date_naive() && task.status() != Some(TaskStatus::Completed),
        None => false,
    }
}

pub fn count_by_status(tasks: &[Task]) -> BTreeMap<TaskStatus, usize> {
    let mut counts: BTreeMap<TaskStatus, usize> =
        TaskStatus::ALL.iter().map(|s| (*s, 0)).collect();

    for status in tasks.iter().filter_map(Task::status) {
        *counts.entry(status).or_default() += 1;
    }
    counts
}

pub fn count_by_priority(tasks: &[Task]) -> BTreeMap<TaskPriority, usize> {
    let mut counts: BTreeMap<TaskPriority, usize> =
        TaskPriority::ALL.iter().map(|p| (*p, 0)).collect();

    for priority in tasks.iter().filter_map(Task::priority) {
        *counts.entry(priority).or_default() += 1;
    }
    counts
}

/// Task count per project id. Every given project appears, tasks of
/// unknown projects are dropped.
pub fn count_by_project(projects: &[Project], tasks: &[Task]) -> BTreeMap<String, usize> {
    let mut counts: BTreeMap<String, usize> =
        projects.iter().map(|p| (p.id.clone(), 0)).collect();

    for task in tasks {
        if let Some(count) = counts.get_mut(&task.project_id) {
            *count += 1;
        }
    }
    counts
}

pub fn count_projects_by_status(projects: &[Project]) -> BTreeMap<ProjectStatus, usize> {
    let mut counts: BTreeMap<ProjectStatus, usize> =
        ProjectStatus::ALL.iter().map(|s| (*s, 0)).collect();

    for project in projects {
        *counts.entry(project.status).or_default() += 1;
    }
    counts
}

pub fn count_overdue(tasks: &[Task], now: DateTime<Utc>) -> usize {
    tasks.iter().filter(|t| is_overdue(t, now)).count()
}

/// Everything the dashboard charts need, computed in one pass over the input
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub total_projects: usize,
    pub total_tasks: usize,
    pub overdue_tasks: usize,
    pub projects_by_status: BTreeMap<ProjectStatus, usize>,
    pub tasks_by_status: BTreeMap<TaskStatus, usize>,
    pub tasks_by_priority: BTreeMap<TaskPriority, usize>,
    pub tasks_by_project: BTreeMap<String, usize>,
}

impl DashboardSummary {
    pub fn build(projects: &[Project], tasks: &[Task], now: DateTime<Utc>) -> Self {
        Self {
            total_projects: projects.len(),
            total_tasks: tasks.len(),
            overdue_tasks: count_overdue(tasks, now),
            projects_by_status: count_projects_by_status(projects),
            tasks_by_status: count_by_status(tasks),
            tasks_by_priority: count_by_priority(tasks),
            tasks_by_project: count_by_project(projects, tasks),
        }
    }
}
