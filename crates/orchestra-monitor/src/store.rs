/*
[INPUT]:  Decoded stream events and snapshot records (single writer)
[OUTPUT]: Latest canonical collection via `watch` for any number of readers
[POS]:    State layer - explicit store for the task view
[UPDATE]: When changing how updates are applied or published
*/

use std::sync::Arc;

use orchestra_client::{StreamEvent, Task};
use tokio::sync::watch;
use tracing::debug;

use crate::reconciler::{TaskCollection, UpsertOutcome};

/// Owner of the canonical collection.
///
/// Not `Clone`: exactly one writer exists per session. Readers get a
/// [`TaskView`].
#[derive(Debug)]
pub struct TaskStore {
    state: watch::Sender<Arc<TaskCollection>>,
}

impl TaskStore {
    pub fn new() -> Self {
        let (state, _rx) = watch::channel(Arc::new(TaskCollection::new()));
        Self { state }
    }

    pub fn get_state(&self) -> Arc<TaskCollection> {
        self.state.borrow().clone()
    }

    /// Read handle for consumers.
    pub fn view(&self) -> TaskView {
        TaskView {
            rx: self.state.subscribe(),
        }
    }

    /// Apply one stream event. Returns true when the view changed; ignored
    /// kinds and identical records do not notify readers.
    pub fn apply_event(&self, event: StreamEvent) -> bool {
        match event {
            StreamEvent::TaskUpdate(task) => self.upsert(task),
            StreamEvent::Ignored { kind } => {
                debug!(%kind, "ignoring stream event");
                false
            }
        }
    }

    /// Merge snapshot records one by one. Existing entries for other ids are
    /// kept. Returns how many records changed the view.
    pub fn apply_snapshot(&self, tasks: Vec<Task>) -> usize {
        let mut changed = 0;
        self.state.send_if_modified(|current| {
            let collection = Arc::make_mut(current);
            for task in tasks {
                if collection.upsert(task) != UpsertOutcome::Unchanged {
                    changed += 1;
                }
            }
            changed > 0
        });
        changed
    }

    fn upsert(&self, task: Task) -> bool {
        let task_id = task.id;
        let status = task.status;
        let changed = self.state.send_if_modified(|current| {
            Arc::make_mut(current).upsert(task) != UpsertOutcome::Unchanged
        });
        if changed {
            debug!(task_id, %status, "task view updated");
        }
        changed
    }
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only handle on the canonical collection.
#[derive(Debug, Clone)]
pub struct TaskView {
    rx: watch::Receiver<Arc<TaskCollection>>,
}

impl TaskView {
    pub fn get_state(&self) -> Arc<TaskCollection> {
        self.rx.borrow().clone()
    }

    /// Wait for the next change and return the new state. `None` once the
    /// store is gone.
    pub async fn changed(&mut self) -> Option<Arc<TaskCollection>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Wait until `predicate` holds for the current state.
    pub async fn wait_for(
        &mut self,
        mut predicate: impl FnMut(&TaskCollection) -> bool,
    ) -> Option<Arc<TaskCollection>> {
        let state = self.rx.wait_for(|state| predicate(state)).await.ok()?;
        Some(state.clone())
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<TaskCollection>> {
        self.rx.clone()
    }
}
