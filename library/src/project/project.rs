use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::builtin::generators::EmptyGenerator;
use crate::error::LibraryError;
use crate::generator::GeneratorRef;
use crate::model::ImageSize;
use crate::project::events::{EventBus, ProjectEvent, Subscription, SubscriptionId};
use crate::project::node::Node;
use crate::project::NodeId;
use crate::rendering::{RenderWorker, WorkerPriority, WorkerState};
use crate::settings::{EngineSettings, SettingsManager};
use crate::util::sync::{lock, read, write};

/// State shared between a [`Project`], its nodes and its render workers.
pub(crate) struct ProjectShared {
    name: RwLock<String>,
    nodes: RwLock<BTreeMap<NodeId, Arc<Node>>>,
    generators: RwLock<BTreeMap<String, GeneratorRef>>,
    empty_generator: GeneratorRef,
    next_id: Mutex<NodeId>,
    /// Serializes every wiring change, including the cycle check that guards it.
    pub(crate) wiring: Mutex<()>,
    events: EventBus,
    modified: AtomicBool,
    workers: Mutex<BTreeMap<ImageSize, RenderWorker>>,
    engine_settings: Mutex<EngineSettings>,
}

impl ProjectShared {
    pub(crate) fn node(&self, id: NodeId) -> Option<Arc<Node>> {
        read(&self.nodes).get(&id).cloned()
    }

    /// Nodes in id order.
    pub(crate) fn nodes(&self) -> Vec<Arc<Node>> {
        read(&self.nodes).values().cloned().collect()
    }

    pub(crate) fn empty_generator(&self) -> GeneratorRef {
        Arc::clone(&self.empty_generator)
    }

    pub(crate) fn generator(&self, name: &str) -> Option<GeneratorRef> {
        if let Some(generator) = read(&self.generators).get(name) {
            return Some(Arc::clone(generator));
        }
        (name == self.empty_generator.name()).then(|| self.empty_generator())
    }

    pub(crate) fn emit(&self, event: ProjectEvent) {
        if event.marks_modified() {
            self.modified.store(true, Ordering::Release);
        }
        self.events.emit(event);
    }

    pub(crate) fn subscribe(&self) -> Subscription {
        self.events.subscribe()
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Invalidates `start` and every node reachable from it through receivers.
    pub(crate) fn invalidate_from(&self, start: NodeId) {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([start]);
        while let Some(id) = queue.pop_front() {
            if !visited.insert(id) {
                continue;
            }
            let Some(node) = self.node(id) else {
                continue;
            };
            node.invalidate_cache();
            self.emit(ProjectEvent::ImageUpdated(id));
            queue.extend(node.receivers());
        }
    }

    /// True if any node can reach itself through receivers.
    pub(crate) fn find_loops(&self) -> bool {
        let mut done = HashSet::new();
        let ids: Vec<NodeId> = read(&self.nodes).keys().copied().collect();
        ids.into_iter().any(|id| self.cycle_from(id, &mut done))
    }

    /// Depth-first walk over receivers starting at `start`. Nodes in `done`
    /// are known to lead to no cycle and are skipped.
    pub(crate) fn cycle_from(&self, start: NodeId, done: &mut HashSet<NodeId>) -> bool {
        if done.contains(&start) {
            return false;
        }
        let receivers_of = |id: NodeId| -> Vec<NodeId> {
            self.node(id)
                .map(|node| node.receivers().into_iter().collect())
                .unwrap_or_default()
        };
        let mut on_path = HashSet::from([start]);
        let mut stack = vec![(start, receivers_of(start))];
        while let Some(frame) = stack.last_mut() {
            let id = frame.0;
            match frame.1.pop() {
                Some(next) => {
                    if on_path.contains(&next) {
                        return true;
                    }
                    if done.contains(&next) {
                        continue;
                    }
                    on_path.insert(next);
                    stack.push((next, receivers_of(next)));
                }
                None => {
                    on_path.remove(&id);
                    done.insert(id);
                    stack.pop();
                }
            }
        }
        false
    }

    /// Applies new engine settings. The thumbnail worker follows the thumbnail size.
    pub(crate) fn update_settings(self: &Arc<Self>, settings: EngineSettings) {
        // Held until the workers match, so concurrent updates apply in order.
        let mut current = lock(&self.engine_settings);
        let previous = std::mem::replace(&mut *current, settings.clone());
        if previous.thumbnail_size != settings.thumbnail_size {
            self.stop_render_worker(previous.thumbnail_size);
        }
        if let Err(err) = self.start_render_worker(settings.thumbnail_size, WorkerPriority::Low) {
            error!("failed to start thumbnail worker: {}", err);
        }
    }

    pub(crate) fn start_render_worker(
        self: &Arc<Self>,
        size: ImageSize,
        priority: WorkerPriority,
    ) -> Result<(), LibraryError> {
        let mut workers = lock(&self.workers);
        if workers.contains_key(&size) {
            return Ok(());
        }
        let worker = RenderWorker::start(self, size, priority)?;
        info!("started render worker {} ({:?})", size, priority);
        workers.insert(size, worker);
        Ok(())
    }

    pub(crate) fn stop_render_worker(&self, size: ImageSize) -> bool {
        let Some(mut worker) = lock(&self.workers).remove(&size) else {
            return false;
        };
        worker.stop();
        for node in self.nodes() {
            node.evict(size);
        }
        info!("stopped render worker {}", size);
        true
    }

    fn stop_all_workers(&self) {
        let workers = std::mem::take(&mut *lock(&self.workers));
        for (_, mut worker) in workers {
            worker.stop();
        }
    }
}

/// Applies settings pushed by a [`SettingsManager`] on a background thread.
struct SettingsListener {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

const LISTENER_POLL: Duration = Duration::from_millis(50);

impl SettingsListener {
    fn start(
        project: Weak<ProjectShared>,
        changes: Receiver<EngineSettings>,
    ) -> Result<Self, LibraryError> {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("settings-listener".to_string())
            .spawn(move || {
                while !thread_stop.load(Ordering::Acquire) {
                    let settings = match changes.recv_timeout(LISTENER_POLL) {
                        Ok(settings) => settings,
                        Err(RecvTimeoutError::Timeout) => continue,
                        Err(RecvTimeoutError::Disconnected) => break,
                    };
                    // Only the latest of a burst of changes matters.
                    let settings = changes.try_iter().last().unwrap_or(settings);
                    let Some(project) = project.upgrade() else {
                        break;
                    };
                    debug!("engine settings changed: {:?}", settings);
                    project.update_settings(settings);
                }
            })
            .map_err(|err| {
                LibraryError::Runtime(format!("failed to spawn settings listener: {}", err))
            })?;
        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    fn stop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("settings listener panicked");
            }
        }
    }
}

impl Drop for SettingsListener {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Owns the nodes of a texture graph, the generator registry and the render
/// workers that keep images of the subscribed sizes up to date.
pub struct Project {
    shared: Arc<ProjectShared>,
    settings_listener: Mutex<Option<SettingsListener>>,
}

impl Project {
    /// An empty project without render workers.
    pub fn new() -> Self {
        let shared = Arc::new(ProjectShared {
            name: RwLock::new(String::new()),
            nodes: RwLock::new(BTreeMap::new()),
            generators: RwLock::new(BTreeMap::new()),
            empty_generator: Arc::new(EmptyGenerator::new()),
            next_id: Mutex::new(1),
            wiring: Mutex::new(()),
            events: EventBus::new(),
            modified: AtomicBool::new(false),
            workers: Mutex::new(BTreeMap::new()),
            engine_settings: Mutex::new(EngineSettings::default()),
        });
        Self {
            shared,
            settings_listener: Mutex::new(None),
        }
    }

    /// A project that keeps thumbnails of the configured size rendered.
    pub fn with_settings(settings: EngineSettings) -> Self {
        let project = Self::new();
        project.update_settings(settings);
        project
    }

    pub fn engine_settings(&self) -> EngineSettings {
        lock(&self.shared.engine_settings).clone()
    }

    /// Applies new engine settings. The thumbnail worker follows the thumbnail size.
    pub fn update_settings(&self, settings: EngineSettings) {
        self.shared.update_settings(settings);
    }

    /// Applies the manager's current settings and follows its later changes
    /// until another manager is set or the project is dropped.
    pub fn set_settings_manager(&self, manager: &SettingsManager) -> Result<(), LibraryError> {
        let mut listener = lock(&self.settings_listener);
        if let Some(mut previous) = listener.take() {
            previous.stop();
        }
        let changes = manager.subscribe();
        self.shared.update_settings(manager.current());
        *listener = Some(SettingsListener::start(Arc::downgrade(&self.shared), changes)?);
        Ok(())
    }

    pub fn name(&self) -> String {
        read(&self.shared.name).clone()
    }

    pub fn set_name(&self, name: &str) {
        {
            let mut current = write(&self.shared.name);
            if *current == name {
                return;
            }
            *current = name.to_string();
        }
        self.shared.emit(ProjectEvent::NameUpdated(name.to_string()));
    }

    pub fn is_modified(&self) -> bool {
        self.shared.modified.load(Ordering::Acquire)
    }

    pub fn mark_saved(&self) {
        self.shared.modified.store(false, Ordering::Release);
    }

    pub fn subscribe(&self) -> Subscription {
        self.shared.subscribe()
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.unsubscribe(id)
    }

    /// Creates a node with a fresh id. `None` selects the empty generator.
    pub fn new_node(&self, generator: Option<GeneratorRef>) -> Arc<Node> {
        self.new_node_with_id(0, generator)
    }

    /// Creates a node with the given id, or a fresh one if `id` is 0.
    /// Returns the existing node if the id is already taken.
    pub fn new_node_with_id(&self, id: NodeId, generator: Option<GeneratorRef>) -> Arc<Node> {
        let generator = generator.unwrap_or_else(|| self.shared.empty_generator());
        let node = {
            let mut nodes = write(&self.shared.nodes);
            if let Some(existing) = nodes.get(&id) {
                return Arc::clone(existing);
            }
            let id = if id == 0 {
                let mut next = lock(&self.shared.next_id);
                while *next == 0 || nodes.contains_key(&*next) {
                    *next = next.wrapping_add(1);
                }
                let id = *next;
                *next = next.wrapping_add(1);
                id
            } else {
                id
            };
            let node = Arc::new(Node::new(id, Arc::downgrade(&self.shared), generator));
            nodes.insert(id, Arc::clone(&node));
            node
        };
        debug!("added node {} ({})", node.id(), node.generator_name());
        self.shared.emit(ProjectEvent::NodeAdded(node.id()));
        node
    }

    /// Disconnects and removes a node. Returns false if there is no such node.
    pub fn remove_node(&self, id: NodeId) -> bool {
        {
            let _wiring = lock(&self.shared.wiring);
            let Some(node) = self.shared.node(id) else {
                return false;
            };
            node.release_locked(&self.shared);
            write(&self.shared.nodes).remove(&id);
        }
        debug!("removed node {}", id);
        self.shared.emit(ProjectEvent::NodeRemoved(id));
        true
    }

    /// Removes every node and restarts id allocation at 1.
    pub fn clear(&self) {
        let removed: Vec<NodeId> = {
            let _wiring = lock(&self.shared.wiring);
            for node in self.shared.nodes() {
                node.release_locked(&self.shared);
            }
            let removed = std::mem::take(&mut *write(&self.shared.nodes));
            *lock(&self.shared.next_id) = 1;
            removed.into_keys().collect()
        };
        for id in removed {
            self.shared.emit(ProjectEvent::NodeRemoved(id));
        }
    }

    pub fn node(&self, id: NodeId) -> Option<Arc<Node>> {
        self.shared.node(id)
    }

    pub fn nodes(&self) -> Vec<Arc<Node>> {
        self.shared.nodes()
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        read(&self.shared.nodes).keys().copied().collect()
    }

    pub fn node_count(&self) -> usize {
        read(&self.shared.nodes).len()
    }

    pub fn find_loops(&self) -> bool {
        self.shared.find_loops()
    }

    /// Registers a generator. A name that is already taken leaves the
    /// registry unchanged and emits [`ProjectEvent::GeneratorNameCollision`].
    pub fn add_generator(&self, generator: GeneratorRef) -> bool {
        let name = generator.name().to_string();
        {
            let mut generators = write(&self.shared.generators);
            if generators.contains_key(&name) {
                drop(generators);
                warn!("generator name collision: '{}'", name);
                self.shared
                    .emit(ProjectEvent::GeneratorNameCollision { name });
                return false;
            }
            generators.insert(name.clone(), generator);
        }
        self.shared.emit(ProjectEvent::GeneratorAdded(name));
        true
    }

    /// Registers `generator` even if its name is taken and returns the entry it displaced.
    pub fn replace_generator(&self, generator: GeneratorRef) -> Option<GeneratorRef> {
        let name = generator.name().to_string();
        let old = write(&self.shared.generators).insert(name.clone(), generator);
        if old.is_some() {
            self.shared.emit(ProjectEvent::GeneratorRemoved(name.clone()));
        }
        self.shared.emit(ProjectEvent::GeneratorAdded(name));
        old
    }

    /// Removes `generator` only if this exact instance is registered.
    pub fn remove_generator(&self, generator: &GeneratorRef) -> bool {
        let name = generator.name().to_string();
        {
            let mut generators = write(&self.shared.generators);
            match generators.get(&name) {
                Some(registered) if Arc::ptr_eq(registered, generator) => {
                    generators.remove(&name);
                }
                _ => return false,
            }
        }
        self.shared.emit(ProjectEvent::GeneratorRemoved(name));
        true
    }

    /// Registered generator by name. The empty generator is always found.
    pub fn generator(&self, name: &str) -> Option<GeneratorRef> {
        self.shared.generator(name)
    }

    /// Registered generators ordered by name.
    pub fn generators(&self) -> Vec<GeneratorRef> {
        read(&self.shared.generators).values().cloned().collect()
    }

    pub fn empty_generator(&self) -> GeneratorRef {
        self.shared.empty_generator()
    }

    /// Starts a background worker for `size`. Does nothing if one is running.
    pub fn start_render_worker(
        &self,
        size: ImageSize,
        priority: WorkerPriority,
    ) -> Result<(), LibraryError> {
        self.shared.start_render_worker(size, priority)
    }

    /// Stops the worker for `size` and drops that size from every node cache.
    pub fn stop_render_worker(&self, size: ImageSize) -> bool {
        self.shared.stop_render_worker(size)
    }

    /// Sizes with a running worker.
    pub fn render_sizes(&self) -> Vec<ImageSize> {
        lock(&self.shared.workers).keys().copied().collect()
    }

    pub fn worker_state(&self, size: ImageSize) -> Option<WorkerState> {
        lock(&self.shared.workers).get(&size).map(RenderWorker::state)
    }
}

impl Default for Project {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Project {
    fn drop(&mut self) {
        if let Some(mut listener) = lock(&self.settings_listener).take() {
            listener.stop();
        }
        self.shared.stop_all_workers();
        let _wiring = lock(&self.shared.wiring);
        for node in self.shared.nodes() {
            node.release_locked(&self.shared);
        }
    }
}
