use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::task::Task;

/// Completion-status subset selected for display. Persisted with the task
/// record so a reload restores the last selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Completed,
}

impl StatusFilter {
    pub fn matches(self, task: &Task) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Active => !task.completed,
            StatusFilter::Completed => task.completed,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    #[default]
    CreatedAt,
    DueDate,
}

/// A composed read query: the store's status filter plus the ad-hoc
/// presentation-level narrowing (free-text search, category selection).
/// Search and category are caller state, layered on per read.
#[derive(Debug, Clone, Default)]
pub struct TaskQuery {
    pub status: StatusFilter,
    pub search: Option<String>,
    pub category: Option<String>,
}

impl TaskQuery {
    pub fn with_status(status: StatusFilter) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    pub fn matches(&self, task: &Task) -> bool {
        if !self.status.matches(task) {
            return false;
        }

        if let Some(needle) = &self.search {
            let needle = needle.to_lowercase();
            let in_title = task.title.to_lowercase().contains(&needle);
            let in_description = task
                .description
                .as_ref()
                .is_some_and(|d| d.to_lowercase().contains(&needle));
            if !in_title && !in_description {
                return false;
            }
        }

        if let Some(category) = &self.category {
            if task.category.as_deref() != Some(category.as_str()) {
                return false;
            }
        }

        true
    }
}

/// Filters and sorts a snapshot of the task collection without touching the
/// source. `createdAt` orders newest first; `dueDate` orders soonest first
/// with date-less tasks after all dated ones. Both sorts are stable.
pub fn visible(tasks: &[Task], query: &TaskQuery, sort: SortKey) -> Vec<Task> {
    let mut out: Vec<Task> = tasks
        .iter()
        .filter(|task| query.matches(task))
        .cloned()
        .collect();

    match sort {
        SortKey::CreatedAt => out.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        SortKey::DueDate => out.sort_by(|a, b| match (a.due_date, b.due_date) {
            (Some(a_due), Some(b_due)) => a_due.cmp(&b_due),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }),
    }

    trace!(
        matched = out.len(),
        total = tasks.len(),
        ?sort,
        "computed visible tasks"
    );
    out
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::task::TaskDraft;

    fn task(title: &str, completed: bool) -> Task {
        let mut t = Task::new(TaskDraft::titled(title), Utc::now());
        t.completed = completed;
        t
    }

    #[test]
    fn status_filter_partitions_by_completion() {
        let open = task("open", false);
        let done = task("done", true);

        assert!(StatusFilter::All.matches(&open));
        assert!(StatusFilter::All.matches(&done));
        assert!(StatusFilter::Active.matches(&open));
        assert!(!StatusFilter::Active.matches(&done));
        assert!(!StatusFilter::Completed.matches(&open));
        assert!(StatusFilter::Completed.matches(&done));
    }

    #[test]
    fn search_is_case_insensitive_over_title_and_description() {
        let mut t = task("Buy milk", false);
        t.description = Some("from the Corner Shop".to_string());

        let mut query = TaskQuery::default();
        query.search = Some("BUY".to_string());
        assert!(query.matches(&t));

        query.search = Some("corner".to_string());
        assert!(query.matches(&t));

        query.search = Some("bread".to_string());
        assert!(!query.matches(&t));
    }

    #[test]
    fn category_filter_is_exact() {
        let mut t = task("gym", false);
        t.category = Some("Health".to_string());

        let mut query = TaskQuery::default();
        query.category = Some("Health".to_string());
        assert!(query.matches(&t));

        query.category = Some("health".to_string());
        assert!(!query.matches(&t));

        query.category = Some("Work".to_string());
        assert!(!query.matches(&t));
    }

    #[test]
    fn filter_and_search_compose() {
        let milk = task("Buy milk", false);
        let bread = task("Buy bread", true);
        let tasks = vec![milk, bread];

        let mut query = TaskQuery::with_status(StatusFilter::Active);
        query.search = Some("buy".to_string());

        let got = visible(&tasks, &query, SortKey::CreatedAt);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].title, "Buy milk");
    }

    #[test]
    fn created_at_sort_is_newest_first() {
        let now = Utc::now();
        let mut older = task("older", false);
        older.created_at = now - Duration::hours(2);
        let mut newer = task("newer", false);
        newer.created_at = now;

        let got = visible(
            &[older, newer],
            &TaskQuery::default(),
            SortKey::CreatedAt,
        );
        assert_eq!(got[0].title, "newer");
        assert_eq!(got[1].title, "older");
    }

    #[test]
    fn due_date_sort_places_dateless_tasks_last() {
        let mut t1 = task("t1", false);
        t1.due_date = Some("2024-01-10".parse().expect("date"));
        let t2 = task("t2", false);
        let mut t3 = task("t3", false);
        t3.due_date = Some("2024-01-05".parse().expect("date"));

        let got = visible(&[t1, t2, t3], &TaskQuery::default(), SortKey::DueDate);
        let titles: Vec<&str> = got.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, ["t3", "t1", "t2"]);
    }

    #[test]
    fn sort_keys_round_trip_camel_case() {
        assert_eq!(
            serde_json::to_string(&SortKey::DueDate).expect("serialize"),
            "\"dueDate\""
        );
        let back: SortKey = serde_json::from_str("\"createdAt\"").expect("deserialize");
        assert_eq!(back, SortKey::CreatedAt);
    }
}
