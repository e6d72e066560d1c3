//! Priority task queue
//!
//! Ordering: priority ascending (0 = most urgent), ties broken by
//! creation time ascending. The sort is stable, so tasks created in the
//! same millisecond keep FIFO order within their band.

use tokio::sync::{Mutex, Notify};
use tracing::info;

use crate::domain::Task;

/// Priority-ordered task queue with a wake signal for the consumer
pub struct TaskQueue {
    inner: Mutex<Vec<Task>>,
    notify: Notify,
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Vec::new()),
            notify: Notify::new(),
        }
    }

    /// Insert a task, re-sort, and wake the processing loop
    pub async fn enqueue(&self, task: Task) {
        {
            let mut queue = self.inner.lock().await;
            info!(
                priority = %task.priority,
                source = %task.source_id,
                "Task added: {}",
                truncate(&task.content, 50)
            );
            queue.push(task);
            queue.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.created_at.cmp(&b.created_at)));
        }
        self.notify.notify_one();
    }

    /// Remove and return the highest-priority task
    pub async fn dequeue(&self) -> Option<Task> {
        let mut queue = self.inner.lock().await;
        if queue.is_empty() { None } else { Some(queue.remove(0)) }
    }

    /// Number of queued tasks
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }

    /// Copy of the current queue contents, in dequeue order
    pub async fn snapshot(&self) -> Vec<Task> {
        self.inner.lock().await.clone()
    }

    /// Replace the queue contents (restart recovery)
    pub async fn restore(&self, mut tasks: Vec<Task>) {
        tasks.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.created_at.cmp(&b.created_at)));
        *self.inner.lock().await = tasks;
        self.notify.notify_one();
    }

    /// Wake the consumer without enqueueing (shutdown, external signal)
    pub fn wake(&self) {
        self.notify.notify_one();
    }

    /// The wake signal the consumer waits on when idle
    pub fn wake_signal(&self) -> &Notify {
        &self.notify
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
