//! Tasks and projects for the task screen.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{CoreError, CoreResult};

/// Task urgency.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn label(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    /// Parse a lowercase priority name.
    pub fn parse(value: &str) -> CoreResult<Self> {
        match value.trim().to_lowercase().as_str() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            other => Err(CoreError::Validation(format!("unknown priority: {other}"))),
        }
    }
}

/// A unit of work tracked on the task screen.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub project_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Create a pending task, rejecting empty or whitespace-only titles.
    pub fn new(
        title: impl Into<String>,
        priority: Priority,
        created_at: DateTime<Utc>,
    ) -> CoreResult<Self> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(CoreError::Validation("task title cannot be empty".into()));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            title,
            description: String::new(),
            completed: false,
            priority,
            due_date: None,
            project_id: None,
            created_at,
        })
    }

    /// A task is overdue when it is still open and its due date has passed.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.completed && self.due_date.is_some_and(|due| due < today)
    }

    pub fn is_due_today(&self, today: NaiveDate) -> bool {
        self.due_date == Some(today)
    }
}

/// A named group of tasks.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub task_count: usize,
}

impl Project {
    /// Create a project, rejecting empty or whitespace-only names.
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> CoreResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(CoreError::Validation("project name cannot be empty".into()));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            name,
            color: color.into(),
            task_count: 0,
        })
    }
}

/// Project selection on the task screen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProjectFilter {
    #[default]
    All,
    Only(Uuid),
}

/// Priority selection on the task screen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PriorityFilter {
    #[default]
    All,
    Only(Priority),
}

impl PriorityFilter {
    pub fn label(self) -> &'static str {
        match self {
            Self::All => "All Priorities",
            Self::Only(Priority::High) => "High Priority",
            Self::Only(Priority::Medium) => "Medium Priority",
            Self::Only(Priority::Low) => "Low Priority",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Self::All => Self::Only(Priority::High),
            Self::Only(Priority::High) => Self::Only(Priority::Medium),
            Self::Only(Priority::Medium) => Self::Only(Priority::Low),
            Self::Only(Priority::Low) => Self::All,
        }
    }
}

/// Completion-state selection on the task screen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Pending,
    Completed,
    Overdue,
}

impl StatusFilter {
    pub fn label(self) -> &'static str {
        match self {
            Self::All => "All Tasks",
            Self::Pending => "Pending",
            Self::Completed => "Completed",
            Self::Overdue => "Overdue",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Self::All => Self::Pending,
            Self::Pending => Self::Completed,
            Self::Completed => Self::Overdue,
            Self::Overdue => Self::All,
        }
    }
}

/// Combined task screen filters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub project: ProjectFilter,
    pub priority: PriorityFilter,
    pub status: StatusFilter,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task, today: NaiveDate) -> bool {
        let project = match self.project {
            ProjectFilter::All => true,
            ProjectFilter::Only(id) => task.project_id == Some(id),
        };
        let priority = match self.priority {
            PriorityFilter::All => true,
            PriorityFilter::Only(priority) => task.priority == priority,
        };
        let status = match self.status {
            StatusFilter::All => true,
            StatusFilter::Pending => !task.completed,
            StatusFilter::Completed => task.completed,
            StatusFilter::Overdue => task.is_overdue(today),
        };
        project && priority && status
    }
}

/// Tasks passing `filter`, in their stored order.
pub fn filter_tasks<'a>(tasks: &'a [Task], filter: &TaskFilter, today: NaiveDate) -> Vec<&'a Task> {
    tasks.iter().filter(|task| filter.matches(task, today)).collect()
}

/// Recompute each project's task count from `tasks`.
pub fn recount_projects(projects: &mut [Project], tasks: &[Task]) {
    for project in projects.iter_mut() {
        project.task_count = tasks
            .iter()
            .filter(|task| task.project_id == Some(project.id))
            .count();
    }
}

/// Relative description of a due date: `Today`, `Tomorrow`, `3 days ago`, `Mar 4`.
pub fn describe_due(due: NaiveDate, today: NaiveDate) -> String {
    let days = (due - today).num_days();
    match days {
        0 => "Today".into(),
        1 => "Tomorrow".into(),
        -1 => "Yesterday".into(),
        d if d < 0 => format!("{} days ago", d.abs()),
        d if d < 7 => format!("{d} days"),
        _ if due.year() == today.year() => due.format("%b %-d").to_string(),
        _ => due.format("%b %-d, %Y").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn task(title: &str, priority: Priority, due: Option<NaiveDate>, completed: bool) -> Task {
        let mut task = Task::new(title, priority, Utc::now()).unwrap();
        task.due_date = due;
        task.completed = completed;
        task
    }

    #[test]
    fn task_rejects_empty_title() {
        let result = Task::new("  ", Priority::Low, Utc::now());
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }

    #[test]
    fn overdue_requires_open_task_with_past_due_date() {
        let today = day(2026, 3, 10);
        assert!(task("a", Priority::High, Some(day(2026, 3, 9)), false).is_overdue(today));
        assert!(!task("b", Priority::High, Some(day(2026, 3, 9)), true).is_overdue(today));
        assert!(!task("c", Priority::High, Some(today), false).is_overdue(today));
        assert!(!task("d", Priority::High, None, false).is_overdue(today));
    }

    #[test]
    fn filters_combine() {
        let today = day(2026, 3, 10);
        let project = Project::new("Home", "#22c55e").unwrap();
        let mut chores = task("chores", Priority::High, Some(day(2026, 3, 1)), false);
        chores.project_id = Some(project.id);
        let tasks = vec![
            chores,
            task("read", Priority::Low, None, true),
            task("call", Priority::High, None, false),
        ];

        let filter = TaskFilter {
            project: ProjectFilter::Only(project.id),
            ..TaskFilter::default()
        };
        assert_eq!(filter_tasks(&tasks, &filter, today).len(), 1);

        let filter = TaskFilter {
            priority: PriorityFilter::Only(Priority::High),
            status: StatusFilter::Pending,
            ..TaskFilter::default()
        };
        assert_eq!(filter_tasks(&tasks, &filter, today).len(), 2);

        let filter = TaskFilter {
            status: StatusFilter::Overdue,
            ..TaskFilter::default()
        };
        let overdue = filter_tasks(&tasks, &filter, today);
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].title, "chores");
    }

    #[test]
    fn recount_tracks_project_membership() {
        let mut projects = vec![Project::new("Work", "").unwrap()];
        let mut assigned = task("ship", Priority::Medium, None, false);
        assigned.project_id = Some(projects[0].id);
        recount_projects(&mut projects, &[assigned, task("loose", Priority::Low, None, false)]);
        assert_eq!(projects[0].task_count, 1);
    }

    #[test]
    fn due_dates_read_relatively() {
        let today = day(2026, 3, 10);
        assert_eq!(describe_due(today, today), "Today");
        assert_eq!(describe_due(day(2026, 3, 11), today), "Tomorrow");
        assert_eq!(describe_due(day(2026, 3, 9), today), "Yesterday");
        assert_eq!(describe_due(day(2026, 3, 5), today), "5 days ago");
        assert_eq!(describe_due(day(2026, 3, 14), today), "4 days");
        assert_eq!(describe_due(day(2026, 4, 2), today), "Apr 2");
        assert_eq!(describe_due(day(2027, 1, 15), today), "Jan 15, 2027");
    }

    #[test]
    fn filter_labels_cycle() {
        assert_eq!(PriorityFilter::All.next().label(), "High Priority");
        assert_eq!(StatusFilter::Overdue.next(), StatusFilter::All);
        assert_eq!(Priority::parse("HIGH").unwrap(), Priority::High);
        assert!(Priority::parse("urgent").is_err());
    }

    #[test]
    fn task_serializes_with_camel_case_keys() {
        let mut item = task("water plants", Priority::Low, Some(day(2026, 3, 12)), false);
        item.project_id = None;
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["dueDate"], "2026-03-12");
        assert_eq!(json["priority"], "low");
        assert!(json.get("projectId").is_some());
    }
}
