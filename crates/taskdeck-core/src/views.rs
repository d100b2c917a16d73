use std::collections::HashSet;

use chrono::NaiveDate;
use tracing::trace;

use crate::task::Task;

/// How many tasks the recent/upcoming previews return.
pub const PREVIEW_LEN: usize = 5;

/// Aggregate counts shown on the dashboard. Recomputed on demand; the
/// collections are small enough that caching would only add staleness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
    pub active: usize,
    pub overdue: usize,
    pub categories: usize,
}

pub fn stats(tasks: &[Task], today: NaiveDate) -> TaskStats {
    let total = tasks.len();
    let completed = tasks.iter().filter(|t| t.completed).count();
    let overdue = tasks.iter().filter(|t| t.is_overdue(today)).count();
    let categories = tasks
        .iter()
        .filter_map(|t| t.category.as_deref())
        .filter(|c| !c.is_empty())
        .collect::<HashSet<_>>()
        .len();

    let out = TaskStats {
        total,
        completed,
        active: total - completed,
        overdue,
        categories,
    };
    trace!(?out, "computed task stats");
    out
}

/// Open tasks due today or later, soonest first, capped at [`PREVIEW_LEN`].
pub fn upcoming(tasks: &[Task], today: NaiveDate) -> Vec<Task> {
    let mut out: Vec<Task> = tasks
        .iter()
        .filter(|t| !t.completed && t.due_date.is_some_and(|due| due >= today))
        .cloned()
        .collect();
    out.sort_by_key(|t| t.due_date);
    out.truncate(PREVIEW_LEN);
    out
}

/// Most recently created tasks regardless of status, capped at [`PREVIEW_LEN`].
pub fn recent(tasks: &[Task]) -> Vec<Task> {
    let mut out: Vec<Task> = tasks.to_vec();
    out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    out.truncate(PREVIEW_LEN);
    out
}
