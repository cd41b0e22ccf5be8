/*
[INPUT]:  Current canonical task collection + one incoming task record
[OUTPUT]: Deduplicated, id-descending task collection
[POS]:    State layer - reconciliation of snapshot and push updates
[UPDATE]: When ordering or replacement rules change
*/

use std::cmp::Reverse;
use std::collections::BTreeMap;

use orchestra_client::Task;

/// What an upsert did to the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Replaced,
    /// Incoming record was identical to the stored one.
    Unchanged,
}

/// The client's single authoritative view of all known tasks.
///
/// At most one entry per id; iteration is always by id descending (most
/// recently created first). Keys are reversed so the map's natural order is
/// the view order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskCollection {
    tasks: BTreeMap<Reverse<i64>, Task>,
}

impl TaskCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a collection from records in any order. A later record for the
    /// same id replaces an earlier one.
    pub fn from_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        let mut collection = Self::new();
        for task in tasks {
            collection.upsert(task);
        }
        collection
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: i64) -> Option<&Task> {
        self.tasks.get(&Reverse(id))
    }

    pub fn contains(&self, id: i64) -> bool {
        self.tasks.contains_key(&Reverse(id))
    }

    /// Insert or wholesale-replace the entry for `task.id`.
    ///
    /// The incoming record is taken as the complete current state of the
    /// task. There is no revision on the wire, so an older record arriving
    /// after a newer one for the same id will overwrite it.
    pub fn upsert(&mut self, task: Task) -> UpsertOutcome {
        match self.tasks.get_mut(&Reverse(task.id)) {
            Some(existing) if *existing == task => UpsertOutcome::Unchanged,
            Some(existing) => {
                *existing = task;
                UpsertOutcome::Replaced
            }
            None => {
                self.tasks.insert(Reverse(task.id), task);
                UpsertOutcome::Inserted
            }
        }
    }

    /// Tasks by id descending.
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn ids(&self) -> Vec<i64> {
        self.tasks.keys().map(|Reverse(id)| *id).collect()
    }

    pub fn to_vec(&self) -> Vec<Task> {
        self.tasks.values().cloned().collect()
    }
}

impl<'a> IntoIterator for &'a TaskCollection {
    type Item = &'a Task;
    type IntoIter = std::collections::btree_map::Values<'a, Reverse<i64>, Task>;

    fn into_iter(self) -> Self::IntoIter {
        self.tasks.values()
    }
}

/// Pure merge: `current` with `incoming` inserted or replaced.
pub fn merge(current: &TaskCollection, incoming: Task) -> TaskCollection {
    let mut next = current.clone();
    next.upsert(incoming);
    next
}
