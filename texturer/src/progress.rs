use std::sync::atomic::{AtomicUsize, Ordering};

use log::info;

/// Counts completed units of work across worker threads.
///
/// The observed value is advisory, it only drives log output and
/// never any control flow.
pub struct ProgressCounter {
    task: String,
    total: usize,
    done: AtomicUsize,
}

impl ProgressCounter {
    pub fn new(task: &str, total: usize) -> ProgressCounter {
        info!("{} ({} items)", task, total);
        ProgressCounter {
            task: task.to_string(),
            total,
            done: AtomicUsize::new(0),
        }
    }

    pub fn inc(&self) {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        let step = (self.total / 10).max(1);
        if done % step == 0 || done == self.total {
            info!(
                "  {}: {}%",
                self.task,
                done * 100 / self.total.max(1)
            );
        }
    }

    pub fn done(&self) -> usize {
        self.done.load(Ordering::Relaxed)
    }
}
