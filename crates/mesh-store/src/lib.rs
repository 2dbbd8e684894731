// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! mesh-store
#![deny(unsafe_code)]
#![warn(missing_docs)]

use chrono::{DateTime, Utc};
use mesh_core::{Task, TaskState};
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;

/// Errors returned by [`TaskStore`] operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// A task with this id is already stored.
    #[error("task already exists: {0}")]
    AlreadyExists(String),

    /// No task with this id.
    #[error("task not found: {0}")]
    NotFound(String),

    /// The page token is not a known task id.
    #[error("invalid page token: {0}")]
    InvalidPageToken(String),
}

/// Filter and pagination options for [`TaskStore::list`].
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    /// Only tasks with this context id.
    pub context_id: Option<String>,
    /// Only tasks in this state.
    pub status: Option<TaskState>,
    /// Only tasks whose status timestamp is strictly later.
    pub status_timestamp_after: Option<DateTime<Utc>>,
    /// Page size; zero or negative returns the full matching set.
    pub page_size: i32,
    /// Id of the last task of the previous page; results start after it.
    pub page_token: Option<String>,
}

/// One page of [`TaskStore::list`] results.
#[derive(Debug, Clone, PartialEq)]
pub struct ListPage {
    /// The page's tasks, in insertion order (deep copies).
    pub tasks: Vec<Task>,
    /// Total number of matches across all pages.
    pub total_size: usize,
    /// Id of the last returned task when more matches remain; empty
    /// otherwise.
    pub next_page_token: String,
}

#[derive(Default)]
struct Inner {
    tasks: HashMap<String, Task>,
    // Insertion order, kept separately from the map for deterministic
    // listing.
    order: Vec<String>,
}

/// Concurrency-safe map of task id → task.
///
/// Readers run concurrently and always receive deep copies; callers
/// can never mutate stored state through a returned task. Writers are
/// exclusive. All operations are synchronous.
#[derive(Default)]
pub struct TaskStore {
    inner: RwLock<Inner>,
}

impl TaskStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new task.
    ///
    /// # Errors
    ///
    /// [`StoreError::AlreadyExists`] if the id is present.
    pub fn create(&self, task: Task) -> Result<(), StoreError> {
        let mut inner = self.inner.write().expect("store lock poisoned");
        if inner.tasks.contains_key(&task.id) {
            return Err(StoreError::AlreadyExists(task.id));
        }
        inner.order.push(task.id.clone());
        inner.tasks.insert(task.id.clone(), task);
        Ok(())
    }

    /// Fetch a deep copy of a task.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if the id is absent.
    pub fn get(&self, id: &str) -> Result<Task, StoreError> {
        let inner = self.inner.read().expect("store lock poisoned");
        inner
            .tasks
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Mutate a stored task in place under the write lock.
    ///
    /// Returns a deep copy of the task after mutation.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if the id is absent.
    pub fn update<F>(&self, id: &str, mutate: F) -> Result<Task, StoreError>
    where
        F: FnOnce(&mut Task),
    {
        let mut inner = self.inner.write().expect("store lock poisoned");
        let task = inner
            .tasks
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        mutate(task);
        Ok(task.clone())
    }

    /// Number of stored tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().expect("store lock poisoned").order.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// List tasks matching the filter, in insertion order.
    ///
    /// `total_size` counts every match regardless of pagination. The
    /// page starts strictly after the task named by `page_token`; the
    /// returned `next_page_token` is the id of the page's last task
    /// when more matches remain.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidPageToken`] if the token is not a known
    /// task id.
    pub fn list(&self, filter: &ListFilter) -> Result<ListPage, StoreError> {
        let inner = self.inner.read().expect("store lock poisoned");

        let start = match &filter.page_token {
            None => 0,
            Some(token) => {
                let pos = inner
                    .order
                    .iter()
                    .position(|id| id == token)
                    .ok_or_else(|| StoreError::InvalidPageToken(token.clone()))?;
                pos + 1
            }
        };

        let matches = |task: &Task| -> bool {
            if let Some(ctx) = &filter.context_id {
                if &task.context_id != ctx {
                    return false;
                }
            }
            if let Some(status) = filter.status {
                if task.status.state != status {
                    return false;
                }
            }
            if let Some(after) = filter.status_timestamp_after {
                match task.status.timestamp {
                    Some(ts) if ts > after => {}
                    _ => return false,
                }
            }
            true
        };

        let mut total_size = 0usize;
        let mut tasks: Vec<Task> = Vec::new();
        let mut more_after_page = false;

        for (idx, id) in inner.order.iter().enumerate() {
            let task = &inner.tasks[id];
            if !matches(task) {
                continue;
            }
            total_size += 1;
            if idx < start {
                continue;
            }
            if filter.page_size > 0 && tasks.len() >= filter.page_size as usize {
                more_after_page = true;
                continue;
            }
            tasks.push(task.clone());
        }

        let next_page_token = if more_after_page {
            tasks.last().map(|t| t.id.clone()).unwrap_or_default()
        } else {
            String::new()
        };

        Ok(ListPage {
            tasks,
            total_size,
            next_page_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mesh_core::{Artifact, Message, Part, TaskStatus};
    use std::sync::Arc;

    fn task(id: &str, ctx: &str) -> Task {
        Task::submitted(id, ctx)
    }

    #[test]
    fn create_then_get_returns_equal_task() {
        let store = TaskStore::new();
        store.create(task("t-1", "ctx")).unwrap();
        let got = store.get("t-1").unwrap();
        assert_eq!(got.id, "t-1");
        assert_eq!(got.context_id, "ctx");
        assert_eq!(got.status.state, TaskState::Submitted);
    }

    #[test]
    fn duplicate_create_fails() {
        let store = TaskStore::new();
        store.create(task("t-1", "ctx")).unwrap();
        assert_eq!(
            store.create(task("t-1", "ctx")),
            Err(StoreError::AlreadyExists("t-1".into()))
        );
    }

    #[test]
    fn get_missing_fails() {
        let store = TaskStore::new();
        assert_eq!(
            store.get("absent"),
            Err(StoreError::NotFound("absent".into()))
        );
    }

    #[test]
    fn mutating_a_read_copy_does_not_touch_the_store() {
        let store = TaskStore::new();
        let mut original = task("t-1", "ctx");
        original.artifacts = Some(vec![Artifact::text("out", "original")]);
        original.push_history(Message::user(vec![Part::text("hello")]));
        original.metadata = Some(serde_json::json!({"k": "v"}));
        original.status.message = Some(Message::agent(vec![Part::text("status")]));
        store.create(original).unwrap();

        let mut copy = store.get("t-1").unwrap();
        copy.artifacts.as_mut().unwrap()[0] = Artifact::text("out", "mutated");
        copy.history.as_mut().unwrap()[0].parts[0] = Part::text("mutated");
        copy.metadata = Some(serde_json::json!({"k": "mutated"}));
        copy.status.message = None;
        copy.status.state = TaskState::Failed;

        let fresh = store.get("t-1").unwrap();
        assert_eq!(fresh.artifacts.unwrap()[0].text_content(), "original");
        assert_eq!(
            fresh.history.unwrap()[0].parts[0].text_content(),
            Some("hello")
        );
        assert_eq!(fresh.metadata.unwrap()["k"], "v");
        assert!(fresh.status.message.is_some());
        assert_eq!(fresh.status.state, TaskState::Submitted);
    }

    #[test]
    fn update_mutates_in_place() {
        let store = TaskStore::new();
        store.create(task("t-1", "ctx")).unwrap();
        let updated = store
            .update("t-1", |t| t.status = TaskStatus::now(TaskState::Working))
            .unwrap();
        assert_eq!(updated.status.state, TaskState::Working);
        assert_eq!(store.get("t-1").unwrap().status.state, TaskState::Working);
    }

    #[test]
    fn update_missing_fails() {
        let store = TaskStore::new();
        let result = store.update("absent", |_| {});
        assert_eq!(result, Err(StoreError::NotFound("absent".into())));
    }

    #[test]
    fn list_returns_insertion_order() {
        let store = TaskStore::new();
        for id in ["b", "a", "c"] {
            store.create(task(id, "ctx")).unwrap();
        }
        let page = store.list(&ListFilter::default()).unwrap();
        let ids: Vec<_> = page.tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["b", "a", "c"]);
        assert_eq!(page.total_size, 3);
        assert!(page.next_page_token.is_empty());
    }

    #[test]
    fn list_filters_by_context_and_status() {
        let store = TaskStore::new();
        store.create(task("t-1", "alpha")).unwrap();
        store.create(task("t-2", "beta")).unwrap();
        store.create(task("t-3", "alpha")).unwrap();
        store
            .update("t-3", |t| t.status = TaskStatus::now(TaskState::Completed))
            .unwrap();

        let page = store
            .list(&ListFilter {
                context_id: Some("alpha".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(page.total_size, 2);

        let page = store
            .list(&ListFilter {
                context_id: Some("alpha".into()),
                status: Some(TaskState::Completed),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(page.total_size, 1);
        assert_eq!(page.tasks[0].id, "t-3");
    }

    #[test]
    fn pagination_walks_pages_with_stable_total() {
        let store = TaskStore::new();
        for i in 1..=5 {
            store.create(task(&format!("pg-{i}"), "ctx")).unwrap();
        }

        let page1 = store
            .list(&ListFilter {
                page_size: 2,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(
            page1.tasks.iter().map(|t| &t.id).collect::<Vec<_>>(),
            ["pg-1", "pg-2"]
        );
        assert_eq!(page1.total_size, 5);
        assert_eq!(page1.next_page_token, "pg-2");

        let page2 = store
            .list(&ListFilter {
                page_size: 2,
                page_token: Some(page1.next_page_token),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(
            page2.tasks.iter().map(|t| &t.id).collect::<Vec<_>>(),
            ["pg-3", "pg-4"]
        );
        assert_eq!(page2.total_size, 5);
        assert_eq!(page2.next_page_token, "pg-4");

        let page3 = store
            .list(&ListFilter {
                page_size: 2,
                page_token: Some(page2.next_page_token),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(
            page3.tasks.iter().map(|t| &t.id).collect::<Vec<_>>(),
            ["pg-5"]
        );
        assert_eq!(page3.total_size, 5);
        assert!(page3.next_page_token.is_empty());
    }

    #[test]
    fn zero_or_negative_page_size_returns_everything() {
        let store = TaskStore::new();
        for i in 0..10 {
            store.create(task(&format!("t-{i}"), "ctx")).unwrap();
        }
        for size in [0, -1] {
            let page = store
                .list(&ListFilter {
                    page_size: size,
                    ..Default::default()
                })
                .unwrap();
            assert_eq!(page.tasks.len(), 10);
            assert!(page.next_page_token.is_empty());
        }
    }

    #[test]
    fn unknown_page_token_is_rejected() {
        let store = TaskStore::new();
        store.create(task("t-1", "ctx")).unwrap();
        let result = store.list(&ListFilter {
            page_token: Some("never-created".into()),
            ..Default::default()
        });
        assert_eq!(
            result,
            Err(StoreError::InvalidPageToken("never-created".into()))
        );
    }

    #[test]
    fn page_token_may_name_a_filtered_out_task() {
        // The token is looked up against the full order, not the
        // filtered set.
        let store = TaskStore::new();
        store.create(task("t-1", "alpha")).unwrap();
        store.create(task("t-2", "beta")).unwrap();
        store.create(task("t-3", "alpha")).unwrap();
        let page = store
            .list(&ListFilter {
                context_id: Some("alpha".into()),
                page_token: Some("t-2".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(page.tasks.len(), 1);
        assert_eq!(page.tasks[0].id, "t-3");
        assert_eq!(page.total_size, 2);
    }

    #[test]
    fn concurrent_creates_with_disjoint_ids_all_land() {
        let store = Arc::new(TaskStore::new());
        let mut handles = Vec::new();
        for worker in 0..8 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                for i in 0..50 {
                    store
                        .create(Task::submitted(format!("w{worker}-t{i}"), "ctx"))
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        let page = store.list(&ListFilter::default()).unwrap();
        assert_eq!(page.total_size, 400);
        assert_eq!(page.tasks.len(), 400);
    }

    #[test]
    fn status_timestamp_filter() {
        let store = TaskStore::new();
        store.create(task("old", "ctx")).unwrap();
        let cutoff = Utc::now();
        let mut newer = task("new", "ctx");
        newer.status.timestamp = Some(cutoff + chrono::Duration::seconds(10));
        store.create(newer).unwrap();

        let page = store
            .list(&ListFilter {
                status_timestamp_after: Some(cutoff),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(page.tasks.len(), 1);
        assert_eq!(page.tasks[0].id, "new");
    }
}
