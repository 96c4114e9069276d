//! Small runtime utilities: wall-clock seconds, averaging over optional
//! readings, and the task group used for session teardown.

use std::future::Future;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::task::JoinHandle;

use crate::error::{RuntimeError, RuntimeResult};

/// Wall-clock time as fractional UNIX seconds. All series timestamps use
/// this; pure math takes `now` as a parameter so tests can inject time.
pub fn unix_time() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Average over optional readings, dropping absent and NaN entries.
/// `None` when nothing remains.
pub fn avg_opt(values: impl IntoIterator<Item = Option<f64>>) -> Option<f64> {
    let mut sum = 0.0;
    let mut count = 0usize;
    for value in values.into_iter().flatten() {
        if value.is_nan() {
            continue;
        }
        sum += value;
        count += 1;
    }
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// A group of named background tasks owned by one session.
///
/// Tasks are `loop { body; sleep }` coroutines responding to cancellation at
/// their next suspension point. An error return is logged with the task's
/// role name; teardown aborts everything and verifies completion.
#[derive(Default)]
pub struct TaskGroup {
    tasks: Vec<(String, JoinHandle<()>)>,
}

impl TaskGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `fut` under `name`. Uncaught errors are logged; cancellation is
    /// silent.
    pub fn spawn<F>(&mut self, name: impl Into<String>, fut: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let name = name.into();
        let task_name = name.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = fut.await {
                tracing::error!(task = %task_name, error = format!("{e:#}"), "background task failed");
            }
        });
        self.tasks.push((name, handle));
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Cooperatively cancel every task and await completion. A task that
    /// still does not finish signals a bug and is fatal.
    pub async fn cancel_all(&mut self) -> RuntimeResult<()> {
        for (_, handle) in &self.tasks {
            handle.abort();
        }
        for (name, handle) in self.tasks.drain(..) {
            match handle.await {
                Ok(()) => {}
                Err(e) if e.is_cancelled() => {}
                Err(_) => return Err(RuntimeError::TaskIncomplete(name)),
            }
        }
        Ok(())
    }
}
