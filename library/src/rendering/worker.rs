use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, Weak};
use std::thread::{self, JoinHandle};

use log::{debug, error, info};
use serde::{Deserialize, Serialize};

use crate::error::LibraryError;
use crate::model::ImageSize;
use crate::project::events::{ProjectEvent, SubscriptionId};
use crate::project::project::ProjectShared;
use crate::util::sync::lock;
use crate::util::timing::ScopedTimer;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WorkerState {
    Idle,
    Generating,
    Stopped,
}

/// Scheduling hint. Threads have no portable priority, so `Low` only yields
/// between node evaluations.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum WorkerPriority {
    Low,
    #[default]
    Normal,
    High,
}

/// Keeps every node of a project cached at one image size.
///
/// The worker wakes on node additions, removals and cache invalidations and
/// re-scans the node set until a pass caches nothing new.
pub struct RenderWorker {
    size: ImageSize,
    priority: WorkerPriority,
    context: Arc<WorkerContext>,
    project: Weak<ProjectShared>,
    subscription: SubscriptionId,
    handle: Option<JoinHandle<()>>,
}

struct WorkerContext {
    size: ImageSize,
    priority: WorkerPriority,
    project: Weak<ProjectShared>,
    abort: AtomicBool,
    state: Mutex<WorkerState>,
}

impl RenderWorker {
    pub(crate) fn start(
        project: &Arc<ProjectShared>,
        size: ImageSize,
        priority: WorkerPriority,
    ) -> Result<Self, LibraryError> {
        let (subscription, events) = project.subscribe().into_parts();
        let context = Arc::new(WorkerContext {
            size,
            priority,
            project: Arc::downgrade(project),
            abort: AtomicBool::new(false),
            state: Mutex::new(WorkerState::Idle),
        });

        let thread_context = Arc::clone(&context);
        let spawned = thread::Builder::new()
            .name(format!("render-{}", size))
            .spawn(move || thread_context.run(events));
        let handle = match spawned {
            Ok(handle) => handle,
            Err(err) => {
                project.unsubscribe(subscription);
                return Err(LibraryError::Runtime(format!(
                    "failed to spawn render worker {}: {}",
                    size, err
                )));
            }
        };

        Ok(Self {
            size,
            priority,
            context,
            project: Arc::downgrade(project),
            subscription,
            handle: Some(handle),
        })
    }

    pub fn size(&self) -> ImageSize {
        self.size
    }

    pub fn priority(&self) -> WorkerPriority {
        self.priority
    }

    pub fn state(&self) -> WorkerState {
        *lock(&self.context.state)
    }

    /// Stops scheduling new node evaluations. A node already being computed
    /// is allowed to finish.
    pub fn abort(&self) {
        self.context.abort.store(true, Ordering::Release);
    }

    /// Aborts, closes the event channel and waits for the thread to exit.
    pub fn stop(&mut self) {
        self.abort();
        if let Some(project) = self.project.upgrade() {
            project.unsubscribe(self.subscription);
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("render worker {} panicked", self.size);
            }
        }
        *lock(&self.context.state) = WorkerState::Stopped;
    }
}

impl Drop for RenderWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

impl WorkerContext {
    fn aborted(&self) -> bool {
        self.abort.load(Ordering::Acquire)
    }

    fn set_state(&self, state: WorkerState) {
        let mut current = lock(&self.state);
        if *current != WorkerState::Stopped {
            *current = state;
        }
    }

    fn run(&self, events: Receiver<ProjectEvent>) {
        info!("render worker {} running", self.size);
        self.generate();
        while let Ok(event) = events.recv() {
            if self.aborted() {
                break;
            }
            // Coalesce whatever queued up while the last pass was running.
            let mut dirty = event.is_dirty();
            for queued in events.try_iter() {
                dirty |= queued.is_dirty();
            }
            if dirty {
                self.generate();
            }
        }
        self.set_state(WorkerState::Stopped);
        info!("render worker {} exited", self.size);
    }

    /// Fixed-point evaluation: repeat passes over the current node set until
    /// one caches nothing new or the worker is aborted.
    fn generate(&self) {
        let Some(project) = self.project.upgrade() else {
            return;
        };
        self.set_state(WorkerState::Generating);
        let mut passes = 0;
        while !self.aborted() {
            passes += 1;
            let timer = ScopedTimer::debug_lazy(|| format!("render {} pass {}", self.size, passes));
            let mut cached = 0;
            for node in project.nodes() {
                if self.aborted() {
                    break;
                }
                if node.is_released()
                    || node.is_texture_in_cache(self.size)
                    || !node.is_ready(self.size)
                {
                    continue;
                }
                let rendered = panic::catch_unwind(AssertUnwindSafe(|| node.get_image(self.size)));
                if rendered.is_err() {
                    error!(
                        "render {}: node {} ({}) panicked, skipping it",
                        self.size,
                        node.id(),
                        node.generator_name()
                    );
                    continue;
                }
                if node.is_texture_in_cache(self.size) {
                    cached += 1;
                }
                if self.priority == WorkerPriority::Low {
                    thread::yield_now();
                }
            }
            debug!(
                "render {} pass {}: {} images cached in {} us",
                self.size,
                passes,
                cached,
                timer.elapsed_micros().unwrap_or_default()
            );
            if cached == 0 {
                break;
            }
        }
        self.set_state(WorkerState::Idle);
    }
}
