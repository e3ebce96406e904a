//! FIFO admission with a concurrency cap.
//!
//! Plain data, no locking: the scheduler keeps one `AdmissionQueue` behind a
//! single mutex so the line and the active counter change together.

use std::collections::{HashSet, VecDeque};

use crate::registry::{QueueEntry, TaskId};

/// What happened to an entry handed to [`AdmissionQueue::admit`].
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Admitted {
    /// A slot was taken; the caller must dispatch the entry now.
    Run(QueueEntry),
    /// Appended to the line at this 1-based position.
    Queued { position: usize, size: usize },
    /// The task is already in line or running.
    Duplicate,
}

#[derive(Debug)]
pub(crate) struct AdmissionQueue {
    cap: usize,
    active: usize,
    line: VecDeque<QueueEntry>,
    /// Every task that is in line or holds a slot.
    members: HashSet<TaskId>,
}

impl AdmissionQueue {
    pub(crate) fn new(cap: usize) -> Self {
        Self {
            cap: cap.max(1),
            active: 0,
            line: VecDeque::new(),
            members: HashSet::new(),
        }
    }

    pub(crate) fn cap(&self) -> usize {
        self.cap
    }

    pub(crate) fn active(&self) -> usize {
        self.active
    }

    pub(crate) fn queued(&self) -> usize {
        self.line.len()
    }

    pub(crate) fn contains(&self, id: &TaskId) -> bool {
        self.members.contains(id)
    }

    /// Takes a slot if one is free and nobody is waiting ahead; otherwise
    /// joins the back of the line.
    pub(crate) fn admit(&mut self, entry: QueueEntry) -> Admitted {
        if !self.members.insert(entry.task_id) {
            return Admitted::Duplicate;
        }
        if self.active < self.cap && self.line.is_empty() {
            self.active += 1;
            return Admitted::Run(entry);
        }
        self.line.push_back(entry);
        Admitted::Queued {
            position: self.line.len(),
            size: self.line.len(),
        }
    }

    /// Front of the line, if a slot is free. The slot is taken.
    pub(crate) fn pop_ready(&mut self) -> Option<QueueEntry> {
        if self.active >= self.cap {
            return None;
        }
        let entry = self.line.pop_front()?;
        self.active += 1;
        Some(entry)
    }

    /// Drops a not-yet-started entry. False if it is not in line.
    pub(crate) fn remove(&mut self, id: &TaskId) -> bool {
        let Some(idx) = self.line.iter().position(|e| e.task_id == *id) else {
            return false;
        };
        self.line.remove(idx);
        self.members.remove(id);
        true
    }

    /// Gives back the slot held by a finished batch.
    pub(crate) fn release(&mut self, ids: &[TaskId]) {
        self.active = self.active.saturating_sub(1);
        for id in ids {
            self.members.remove(id);
        }
    }

    /// Ids still in line, front first.
    pub(crate) fn line_ids(&self) -> Vec<TaskId> {
        self.line.iter().map(|e| e.task_id).collect()
    }
}
