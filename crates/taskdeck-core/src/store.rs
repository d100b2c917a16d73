use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::Subscriber;
use crate::filter::{SortKey, StatusFilter, TaskQuery, visible};
use crate::task::{Task, TaskDraft};
use crate::views::{self, TaskStats};

/// Labels offered before the user adds any of their own.
pub const DEFAULT_CATEGORIES: [&str; 4] = ["Work", "Personal", "Shopping", "Health"];

fn default_categories() -> Vec<String> {
    DEFAULT_CATEGORIES.iter().map(ToString::to_string).collect()
}

/// Durable layout of the task store, written whole under its storage key.
/// The filter/sort selection rides along so a reload restores the view.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub filter: StatusFilter,
    #[serde(default)]
    pub sort: SortKey,
    #[serde(default = "default_categories")]
    pub categories: Vec<String>,
}

impl Default for TaskRecord {
    fn default() -> Self {
        Self {
            tasks: Vec::new(),
            filter: StatusFilter::default(),
            sort: SortKey::default(),
            categories: default_categories(),
        }
    }
}

/// Canonical in-memory task state. All operations are synchronous and
/// visible to the next read; unknown-id mutations are no-ops so stale
/// identifiers (a double-click racing a delete) stay harmless.
pub struct TaskStore {
    tasks: Vec<Task>,
    filter: StatusFilter,
    sort: SortKey,
    categories: Vec<String>,
    subscribers: Vec<Subscriber<TaskRecord>>,
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::from_record(TaskRecord::default())
    }
}

impl TaskStore {
    pub fn from_record(record: TaskRecord) -> Self {
        debug!(
            tasks = record.tasks.len(),
            categories = record.categories.len(),
            "task store initialized"
        );
        Self {
            tasks: record.tasks,
            filter: record.filter,
            sort: record.sort,
            categories: record.categories,
            subscribers: Vec::new(),
        }
    }

    pub fn record(&self) -> TaskRecord {
        TaskRecord {
            tasks: self.tasks.clone(),
            filter: self.filter,
            sort: self.sort,
            categories: self.categories.clone(),
        }
    }

    /// Registers a callback invoked synchronously with the fresh record after
    /// each successful mutation.
    pub fn subscribe(&mut self, subscriber: Subscriber<TaskRecord>) {
        self.subscribers.push(subscriber);
    }

    fn notify(&self) {
        let record = self.record();
        for subscriber in &self.subscribers {
            subscriber(&record);
        }
    }

    /// Appends a new open task and returns its id. Callers are expected to
    /// have rejected blank titles already; a title that is empty after
    /// trimming is dropped without error. A category label not yet in the
    /// registry is stored as-is; registry growth is [`Self::add_category`]'s
    /// job alone.
    #[tracing::instrument(skip(self, draft), fields(title = %draft.title))]
    pub fn add_task(&mut self, draft: TaskDraft, now: DateTime<Utc>) -> Option<Uuid> {
        if draft.title.trim().is_empty() {
            debug!("ignoring task with blank title");
            return None;
        }

        let task = Task::new(draft, now);
        let id = task.id;
        self.tasks.push(task);
        info!(%id, count = self.tasks.len(), "task added");
        self.notify();
        Some(id)
    }

    /// Removes the matching task. Idempotent.
    #[tracing::instrument(skip(self))]
    pub fn delete_task(&mut self, id: Uuid) {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        if self.tasks.len() < before {
            info!(%id, "task deleted");
            self.notify();
        }
    }

    /// Replaces the mutable fields of the matching task; `id`, `created_at`
    /// and `completed` are untouched. No-op on an unknown id or a title that
    /// is empty after trimming.
    #[tracing::instrument(skip(self, draft))]
    pub fn update_task(&mut self, id: Uuid, draft: TaskDraft) {
        if draft.title.trim().is_empty() {
            debug!(%id, "ignoring update with blank title");
            return;
        }
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            return;
        };

        task.title = draft.title;
        task.description = draft.description;
        task.due_date = draft.due_date;
        task.priority = draft.priority;
        task.category = draft.category;
        info!(%id, "task updated");
        self.notify();
    }

    /// Flips `completed` on the matching task. No-op on an unknown id.
    #[tracing::instrument(skip(self))]
    pub fn toggle_task(&mut self, id: Uuid) {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            return;
        };
        task.completed = !task.completed;
        debug!(%id, completed = task.completed, "task toggled");
        self.notify();
    }

    /// Marks every task completed, unless every task already is, in which
    /// case all are reopened.
    #[tracing::instrument(skip(self))]
    pub fn toggle_all_tasks(&mut self) {
        if self.tasks.is_empty() {
            return;
        }
        let target = !self.tasks.iter().all(|t| t.completed);
        for task in &mut self.tasks {
            task.completed = target;
        }
        info!(completed = target, "toggled all tasks");
        self.notify();
    }

    /// Drops every completed task. Reapplying is a no-op.
    #[tracing::instrument(skip(self))]
    pub fn clear_completed(&mut self) {
        let before = self.tasks.len();
        self.tasks.retain(|t| !t.completed);
        if self.tasks.len() < before {
            info!(removed = before - self.tasks.len(), "cleared completed tasks");
            self.notify();
        }
    }

    /// Replaces the status filter. Always notifies, even when the value is
    /// unchanged.
    #[tracing::instrument(skip(self))]
    pub fn set_filter(&mut self, filter: StatusFilter) {
        self.filter = filter;
        self.notify();
    }

    /// Replaces the sort key. Always notifies, even when the value is
    /// unchanged.
    #[tracing::instrument(skip(self))]
    pub fn set_sort(&mut self, sort: SortKey) {
        self.sort = sort;
        self.notify();
    }

    /// Appends a label to the category registry unless an exact
    /// (case-sensitive) match is already present. Blank labels are ignored.
    #[tracing::instrument(skip(self))]
    pub fn add_category(&mut self, label: &str) {
        let label = label.trim();
        if label.is_empty() || self.categories.iter().any(|c| c == label) {
            return;
        }
        self.categories.push(label.to_string());
        info!(label, "category added");
        self.notify();
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn filter(&self) -> StatusFilter {
        self.filter
    }

    pub fn sort(&self) -> SortKey {
        self.sort
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Filtered-and-sorted snapshot for display. The caller layers its own
    /// search/category narrowing into `query`; the store contributes the
    /// current sort key.
    pub fn visible(&self, query: &TaskQuery) -> Vec<Task> {
        visible(&self.tasks, query, self.sort)
    }

    pub fn stats(&self, today: NaiveDate) -> TaskStats {
        views::stats(&self.tasks, today)
    }

    pub fn upcoming(&self, today: NaiveDate) -> Vec<Task> {
        views::upcoming(&self.tasks, today)
    }

    pub fn recent(&self) -> Vec<Task> {
        views::recent(&self.tasks)
    }
}
