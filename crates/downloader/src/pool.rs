use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Semaphore;
use tracing::debug;

use crate::{DownloadRequest, DownloadTask, DownloaderError, EventSink, Result, TaskSnapshot};

pub const DEFAULT_MAX_CONCURRENT: usize = 5;
pub const DEFAULT_RETAINED_FINISHED: usize = 100;

/// fixed-size worker pool and registry for [`DownloadTask`]s.
///
/// at most `max_concurrent` tasks run at once; the rest stay pending until a
/// slot frees up. finished tasks stay registered so their final state can be
/// polled, up to `retain_finished` of them; older ones are evicted first.
#[derive(Debug)]
pub struct DownloadPool {
    permits: Arc<Semaphore>,
    max_concurrent: usize,
    retain_finished: usize,
    registry: Mutex<Registry>,
}

#[derive(Debug, Default)]
struct Registry {
    next_seq: u64,
    tasks: HashMap<String, (u64, Arc<DownloadTask>)>,
}

impl Registry {
    /// the unfinished task writing to `output`, if any.
    fn writer_of(&self, output: &Path) -> Option<&Arc<DownloadTask>> {
        self.tasks
            .values()
            .map(|(_, task)| task)
            .find(|task| task.output() == output && !task.state().is_terminal())
    }

    fn insert(&mut self, task: Arc<DownloadTask>) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.tasks.insert(task.id().to_string(), (seq, task));
    }

    fn evict_finished(&mut self, keep: usize) {
        let mut finished: Vec<(u64, String)> = self
            .tasks
            .iter()
            .filter(|(_, (_, task))| task.state().is_terminal())
            .map(|(id, (seq, _))| (*seq, id.clone()))
            .collect();
        if finished.len() <= keep {
            return;
        }

        finished.sort_unstable();
        let excess = finished.len() - keep;
        for (_, id) in finished.into_iter().take(excess) {
            self.tasks.remove(&id);
        }
        debug!(evicted = excess, "finished downloads evicted");
    }
}

impl Default for DownloadPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENT)
    }
}

impl DownloadPool {
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            retain_finished: DEFAULT_RETAINED_FINISHED,
            registry: Mutex::new(Registry::default()),
        }
    }

    /// keeps at most `count` finished tasks registered.
    pub fn retain_finished(mut self, count: usize) -> Self {
        self.retain_finished = count;
        self
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// queues `request` and returns its task handle.
    ///
    /// fails with [`DownloaderError::OutputBusy`] while another unfinished
    /// task writes to the same output path.
    pub fn submit(
        &self,
        request: DownloadRequest,
        on_event: EventSink,
    ) -> Result<Arc<DownloadTask>> {
        self.submit_all([(request, on_event)])
            .map(|mut tasks| tasks.remove(0))
    }

    /// queues every request or none of them.
    ///
    /// the whole batch is rejected when two requests share an output path or
    /// one of them collides with an unfinished task.
    pub fn submit_all(
        &self,
        requests: impl IntoIterator<Item = (DownloadRequest, EventSink)>,
    ) -> Result<Vec<Arc<DownloadTask>>> {
        let requests: Vec<_> = requests.into_iter().collect();
        let mut registry = self.registry();

        let mut seen = HashSet::new();
        for (request, _) in &requests {
            if !seen.insert(request.output.as_path()) {
                return Err(DownloaderError::DuplicateOutput {
                    output: request.output.clone(),
                });
            }
            if let Some(task) = registry.writer_of(&request.output) {
                return Err(DownloaderError::OutputBusy {
                    output: request.output.clone(),
                    task: task.id().to_string(),
                });
            }
        }

        let tasks: Vec<_> = requests
            .into_iter()
            .map(|(request, on_event)| {
                let task = Arc::new(DownloadTask::spawn(
                    request,
                    Some(Arc::clone(&self.permits)),
                    on_event,
                ));
                debug!(task = task.id(), url = task.url(), "download queued");
                registry.insert(Arc::clone(&task));
                task
            })
            .collect();

        registry.evict_finished(self.retain_finished);
        Ok(tasks)
    }

    pub fn get(&self, id: &str) -> Option<Arc<DownloadTask>> {
        self.registry().tasks.get(id).map(|(_, task)| Arc::clone(task))
    }

    /// cancels the task with `id`; returns `false` when no such task exists.
    pub fn cancel(&self, id: &str) -> bool {
        match self.get(id) {
            Some(task) => {
                task.cancel();
                true
            }
            None => false,
        }
    }

    /// snapshots of every registered task, oldest submission first.
    pub fn snapshots(&self) -> Vec<TaskSnapshot> {
        let registry = self.registry();
        let mut tasks: Vec<_> = registry.tasks.values().collect();
        tasks.sort_unstable_by_key(|(seq, _)| *seq);
        tasks.into_iter().map(|(_, task)| task.snapshot()).collect()
    }
}
