use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::RwLock;

use crate::ids::TaskId;
use crate::message::{CallbackTag, ResultPayload, TaskSpec};

/// One entry in the process table / previous-tasks history.
#[derive(Debug, Clone)]
pub struct ProcessEntry {
    pub task_id: TaskId,
    pub spec: TaskSpec,
    pub callback: CallbackTag,
    pub started: SystemTime,
    pub finished: Option<SystemTime>,
    pub result: Option<ResultPayload>,
}

impl ProcessEntry {
    pub fn new(task_id: TaskId, spec: TaskSpec, callback: CallbackTag) -> Self {
        Self {
            task_id,
            spec,
            callback,
            started: SystemTime::now(),
            finished: None,
            result: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished.is_some()
    }
}

struct Inner {
    running: HashMap<TaskId, ProcessEntry>,
    previous: VecDeque<ProcessEntry>,
    previous_capacity: usize,
}

/// The process table and previous-tasks history.
///
/// Only the Governor ever mutates this; every other reader (the HTTP
/// adapter) gets a clone through the `Arc<RwLock<_>>` snapshot cell, per
/// the "atomically-swappable snapshot" redesign flag — no request/response
/// channel is needed for a read this cheap.
#[derive(Clone)]
pub struct GovernorTables {
    inner: Arc<RwLock<Inner>>,
}

impl GovernorTables {
    pub fn new(previous_capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                running: HashMap::new(),
                previous: VecDeque::new(),
                previous_capacity,
            })),
        }
    }

    pub async fn insert_running(&self, entry: ProcessEntry) {
        let mut inner = self.inner.write().await;
        inner.running.insert(entry.task_id.clone(), entry);
    }

    pub async fn running_count(&self) -> usize {
        self.inner.read().await.running.len()
    }

    pub async fn contains_running(&self, task_id: &TaskId) -> bool {
        self.inner.read().await.running.contains_key(task_id)
    }

    /// Moves a running entry to `previous_tasks` with the given outcome.
    /// Returns `None` if `task_id` was not a known running entry (the
    /// caller must log-and-drop per invariant I2).
    pub async fn complete(
        &self,
        task_id: &TaskId,
        payload: ResultPayload,
    ) -> Option<ProcessEntry> {
        let mut inner = self.inner.write().await;
        let mut entry = inner.running.remove(task_id)?;
        entry.finished = Some(SystemTime::now());
        entry.result = Some(payload);
        let capacity = inner.previous_capacity;
        inner.previous.push_back(entry.clone());
        while inner.previous.len() > capacity {
            inner.previous.pop_front();
        }
        Some(entry)
    }

    pub async fn get(&self, task_id: &TaskId) -> Option<ProcessEntry> {
        let inner = self.inner.read().await;
        if let Some(entry) = inner.running.get(task_id) {
            return Some(entry.clone());
        }
        inner.previous.iter().rev().find(|e| &e.task_id == task_id).cloned()
    }

    pub async fn running_snapshot(&self) -> Vec<ProcessEntry> {
        self.inner.read().await.running.values().cloned().collect()
    }

    pub async fn previous_snapshot(&self) -> Vec<ProcessEntry> {
        self.inner.read().await.previous.iter().cloned().collect()
    }

    /// Running entries older than `timeout` with no result yet — the
    /// watchdog's dead-man-timeout candidates.
    pub async fn stale_running(&self, timeout: Duration) -> Vec<TaskId> {
        let now = SystemTime::now();
        self.inner
            .read()
            .await
            .running
            .values()
            .filter(|entry| {
                now.duration_since(entry.started)
                    .map(|age| age >= timeout)
                    .unwrap_or(false)
            })
            .map(|entry| entry.task_id.clone())
            .collect()
    }
}
