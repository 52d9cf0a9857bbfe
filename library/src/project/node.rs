//! Graph vertex: generator, settings, source slots and a per-size image cache.
//!
//! Nodes refer to each other only by [`NodeId`]; every lookup goes through
//! the owning project. A node never holds one of its locks while taking a
//! lock of another node.

use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, Weak};

use log::{debug, error, warn};

use crate::cache::ImageCache;
use crate::error::ConnectionError;
use crate::generator::{GeneratorRef, SourceImages, merge_with_defaults};
use crate::model::{Image, ImageSize, SettingValue, Settings};
use crate::project::events::ProjectEvent;
use crate::project::project::ProjectShared;
use crate::project::{NodeId, SlotIndex};
use crate::util::sync::{lock, read, write};
use crate::util::timing::measure_debug_lazy;

pub struct Node {
    id: NodeId,
    project: Weak<ProjectShared>,
    name: RwLock<String>,
    generator: RwLock<GeneratorRef>,
    sources: RwLock<Vec<Option<NodeId>>>,
    receivers: RwLock<BTreeSet<NodeId>>,
    settings: RwLock<Settings>,
    cache: RwLock<ImageCache>,
    released: AtomicBool,
}

impl Node {
    pub(crate) fn new(id: NodeId, project: Weak<ProjectShared>, generator: GeneratorRef) -> Self {
        let slots = generator.source_slot_count();
        let settings = generator.default_settings();
        Self {
            id,
            project,
            name: RwLock::new(format!("Node {}", id)),
            generator: RwLock::new(generator),
            sources: RwLock::new(vec![None; slots]),
            receivers: RwLock::new(BTreeSet::new()),
            settings: RwLock::new(settings),
            cache: RwLock::new(ImageCache::new()),
            released: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> String {
        read(&self.name).clone()
    }

    pub fn set_name(&self, name: &str) {
        {
            let mut current = write(&self.name);
            if *current == name {
                return;
            }
            *current = name.to_string();
        }
        self.emit(ProjectEvent::NodeRenamed(self.id));
    }

    pub fn generator(&self) -> GeneratorRef {
        Arc::clone(&read(&self.generator))
    }

    pub fn generator_name(&self) -> String {
        read(&self.generator).name().to_string()
    }

    pub fn source_slot_count(&self) -> usize {
        read(&self.sources).len()
    }

    /// Snapshot of the source slots. `None` marks an empty slot.
    pub fn sources(&self) -> Vec<Option<NodeId>> {
        read(&self.sources).clone()
    }

    pub fn source(&self, slot: usize) -> Option<NodeId> {
        read(&self.sources).get(slot).copied().flatten()
    }

    pub fn receivers(&self) -> BTreeSet<NodeId> {
        read(&self.receivers).clone()
    }

    /// True if `slot` exists and is empty.
    pub fn slot_available(&self, slot: usize) -> bool {
        matches!(read(&self.sources).get(slot), Some(None))
    }

    pub fn settings(&self) -> Settings {
        read(&self.settings).clone()
    }

    pub fn setting(&self, key: &str) -> Option<SettingValue> {
        read(&self.settings).get(key).cloned()
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Replaces all settings and invalidates this node and everything downstream.
    pub fn set_settings(&self, settings: Settings) {
        {
            let mut current = write(&self.settings);
            if *current == settings {
                return;
            }
            *current = settings;
        }
        self.emit(ProjectEvent::SettingsUpdated(self.id));
        self.set_updated();
    }

    /// Changes a single setting, keeping the others.
    pub fn set_setting(&self, key: &str, value: impl Into<SettingValue>) {
        let mut settings = self.settings();
        settings.insert(key.to_string(), value.into());
        self.set_settings(settings);
    }

    /// Swaps the generator. `None` selects the project's empty generator.
    ///
    /// Slots beyond the new generator's slot count are disconnected first and
    /// the settings are reset to the new generator's defaults.
    pub fn set_generator(&self, generator: Option<GeneratorRef>) {
        let Some(project) = self.project.upgrade() else {
            if let Some(generator) = generator {
                self.replace_generator_state(generator);
            }
            return;
        };
        let _wiring = lock(&project.wiring);
        let generator = generator.unwrap_or_else(|| project.empty_generator());
        if Arc::ptr_eq(&self.generator(), &generator) {
            return;
        }

        let new_count = generator.source_slot_count();
        let old_count = self.source_slot_count();
        for slot in new_count..old_count {
            if self.source(slot).is_some() {
                if let Err(err) = self.set_source_slot_locked(&project, SlotIndex::At(slot), None) {
                    warn!("node {}: failed to disconnect slot {}: {}", self.id, slot, err);
                }
            }
        }
        self.replace_generator_state(generator);

        project.emit(ProjectEvent::GeneratorUpdated(self.id));
        if new_count != old_count {
            project.emit(ProjectEvent::SlotsUpdated(self.id));
        }
        project.invalidate_from(self.id);
    }

    fn replace_generator_state(&self, generator: GeneratorRef) {
        write(&self.sources).resize(generator.source_slot_count(), None);
        *write(&self.settings) = generator.default_settings();
        *write(&self.generator) = generator;
    }

    /// Looks the generator up in the project registry. Unknown names fall
    /// back to the empty generator and return false.
    pub fn set_generator_by_name(&self, name: &str) -> bool {
        let found = self.project.upgrade().and_then(|p| p.generator(name));
        if found.is_none() {
            warn!("node {}: unknown generator '{}', using the empty generator", self.id, name);
        }
        let ok = found.is_some();
        self.set_generator(found);
        ok
    }

    /// Connects `source` to `slot`, or empties the slot when `source` is `None`.
    ///
    /// A rejected assignment leaves the graph untouched.
    pub fn set_source_slot(
        &self,
        slot: SlotIndex,
        source: Option<NodeId>,
    ) -> Result<(), ConnectionError> {
        let project = self
            .project
            .upgrade()
            .ok_or(ConnectionError::Detached(self.id))?;
        let _wiring = lock(&project.wiring);
        self.set_source_slot_locked(&project, slot, source)
    }

    /// Caller holds the project's wiring lock.
    pub(crate) fn set_source_slot_locked(
        &self,
        project: &ProjectShared,
        slot: SlotIndex,
        source: Option<NodeId>,
    ) -> Result<(), ConnectionError> {
        if self.is_released() {
            return Err(ConnectionError::Detached(self.id));
        }
        if source == Some(self.id) {
            warn!("node {}: rejected self connection", self.id);
            return Err(ConnectionError::SelfConnection(self.id));
        }

        let sources = self.sources();
        let slot = match slot {
            SlotIndex::At(slot) if slot < sources.len() => slot,
            SlotIndex::At(slot) => {
                return Err(ConnectionError::InvalidSlot {
                    node: self.id,
                    slot,
                    count: sources.len(),
                });
            }
            SlotIndex::Any if source.is_none() => return Ok(()),
            SlotIndex::Any => sources
                .iter()
                .position(Option::is_none)
                .ok_or(ConnectionError::NoFreeSlot(self.id))?,
        };

        let source_node = match source {
            Some(id) => Some(project.node(id).ok_or(ConnectionError::UnknownSource(id))?),
            None => None,
        };
        let old = sources[slot];
        if old == source {
            return Ok(());
        }

        let old_node = old.and_then(|id| project.node(id));
        let old_still_used = old.is_some_and(|id| {
            sources
                .iter()
                .enumerate()
                .any(|(i, s)| i != slot && *s == Some(id))
        });
        let old_unregistered = match &old_node {
            Some(node) if !old_still_used => write(&node.receivers).remove(&self.id),
            _ => false,
        };
        let new_registered = match &source_node {
            Some(node) => write(&node.receivers).insert(self.id),
            None => false,
        };

        if source_node.is_some() && project.find_loops() {
            if let (true, Some(node)) = (new_registered, &source_node) {
                write(&node.receivers).remove(&self.id);
            }
            if let (true, Some(node)) = (old_unregistered, &old_node) {
                write(&node.receivers).insert(self.id);
            }
            let upstream = source.unwrap_or_default();
            warn!("rejected connection {} -> {}: cycle", upstream, self.id);
            return Err(ConnectionError::WouldCreateCycle {
                upstream,
                receiver: self.id,
            });
        }

        write(&self.sources)[slot] = source;

        if let Some(old) = old {
            project.emit(ProjectEvent::NodesDisconnected {
                source: old,
                receiver: self.id,
                slot,
            });
        }
        if let Some(source) = source {
            project.emit(ProjectEvent::NodesConnected {
                source,
                receiver: self.id,
                slot,
            });
        }
        project.emit(ProjectEvent::SlotsUpdated(self.id));
        project.invalidate_from(self.id);
        Ok(())
    }

    /// Disconnects every edge of this node. Further wiring calls fail with
    /// [`ConnectionError::Detached`].
    pub fn release(&self) {
        match self.project.upgrade() {
            Some(project) => {
                let _wiring = lock(&project.wiring);
                self.release_locked(&project);
            }
            None => {
                self.released.store(true, Ordering::Release);
            }
        }
    }

    pub(crate) fn release_locked(&self, project: &ProjectShared) {
        if self.is_released() {
            return;
        }
        for (slot, source) in self.sources().into_iter().enumerate() {
            if source.is_some() {
                if let Err(err) = self.set_source_slot_locked(project, SlotIndex::At(slot), None) {
                    error!("node {}: failed to release slot {}: {}", self.id, slot, err);
                }
            }
        }
        for receiver_id in self.receivers() {
            let Some(receiver) = project.node(receiver_id) else {
                continue;
            };
            for (slot, source) in receiver.sources().into_iter().enumerate() {
                if source == Some(self.id) {
                    if let Err(err) =
                        receiver.set_source_slot_locked(project, SlotIndex::At(slot), None)
                    {
                        error!("node {}: failed to release slot {}: {}", receiver_id, slot, err);
                    }
                }
            }
        }
        // Receivers that vanished from the project cannot clean up after themselves.
        write(&self.receivers).clear();
        self.released.store(true, Ordering::Release);
        write(&self.cache).invalidate_all();
    }

    /// True if a cycle is reachable from this node by following receivers.
    pub fn find_loop(&self) -> bool {
        match self.project.upgrade() {
            Some(project) => project.cycle_from(self.id, &mut HashSet::new()),
            None => false,
        }
    }

    /// Drops every cached image of this node and of all transitive receivers.
    pub fn set_updated(&self) {
        match self.project.upgrade() {
            Some(project) => project.invalidate_from(self.id),
            None => write(&self.cache).invalidate_all(),
        }
    }

    pub(crate) fn invalidate_cache(&self) {
        write(&self.cache).invalidate_all();
    }

    /// Drops the cached image of one size without touching receivers.
    pub fn evict(&self, size: ImageSize) {
        write(&self.cache).evict(size);
    }

    pub fn is_texture_in_cache(&self, size: ImageSize) -> bool {
        read(&self.cache).contains(size)
    }

    pub fn cached_image(&self, size: ImageSize) -> Option<Arc<Image>> {
        read(&self.cache).get(size)
    }

    pub fn cached_sizes(&self) -> Vec<ImageSize> {
        read(&self.cache).cached_sizes()
    }

    /// Number of distinct uncached upstream nodes this node depends on for
    /// `size`. Ancestors of a cached node are not counted.
    /// Zero means the node can be computed without recursing.
    pub fn waiting_for(&self, size: ImageSize) -> usize {
        if self.is_texture_in_cache(size) {
            return 0;
        }
        let Some(project) = self.project.upgrade() else {
            return 0;
        };
        let mut visited = HashSet::new();
        let mut stack: Vec<NodeId> = self.sources().into_iter().flatten().collect();
        let mut waiting = 0;
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            let Some(source) = project.node(id) else {
                continue;
            };
            if source.is_texture_in_cache(size) {
                continue;
            }
            waiting += 1;
            stack.extend(source.sources().into_iter().flatten());
        }
        waiting
    }

    /// True if every source is cached at `size`, so computing this node
    /// runs only its own generator.
    pub(crate) fn is_ready(&self, size: ImageSize) -> bool {
        let Some(project) = self.project.upgrade() else {
            return true;
        };
        self.sources()
            .into_iter()
            .flatten()
            .filter_map(|id| project.node(id))
            .all(|source| source.is_texture_in_cache(size))
    }

    /// Returns the image for `size`, computing it and its sources if needed.
    ///
    /// The result is always returned. It is only cached if no invalidation
    /// reached this node while it was being computed.
    pub fn get_image(&self, size: ImageSize) -> Arc<Image> {
        if let Some(image) = read(&self.cache).get(size) {
            debug!("node {}: cache hit {}", self.id, size);
            return image;
        }
        debug!("node {}: cache miss {}", self.id, size);
        let claim = write(&self.cache).claim(size);

        let project = self.project.upgrade();
        let mut images = SourceImages::new();
        if let Some(project) = &project {
            for (slot, source) in self.sources().into_iter().enumerate() {
                if let Some(node) = source.and_then(|id| project.node(id)) {
                    images.insert(slot, node.get_image(size));
                }
            }
        }

        let generator = self.generator();
        let settings = merge_with_defaults(generator.as_ref(), &self.settings());
        let image = measure_debug_lazy(
            || format!("node {} '{}' at {}", self.id, generator.name(), size),
            || generator.generate(size, &images, &settings),
        );
        let image = if image.size() != size || image.pixels().len() != size.pixel_count() {
            error!(
                "generator '{}' returned {} pixels for {}, using a blank image",
                generator.name(),
                image.pixels().len(),
                size
            );
            Image::blank(size)
        } else {
            image
        };
        let image = Arc::new(image);

        if write(&self.cache).commit(claim, Arc::clone(&image)) {
            if let Some(project) = &project {
                project.emit(ProjectEvent::ImageAvailable {
                    node: self.id,
                    size,
                });
            }
        } else {
            debug!("node {}: discarded {} image invalidated during render", self.id, size);
        }
        image
    }

    fn emit(&self, event: ProjectEvent) {
        if let Some(project) = self.project.upgrade() {
            project.emit(event);
        }
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("generator", &self.generator_name())
            .field("sources", &self.sources())
            .field("receivers", &self.receivers())
            .finish()
    }
}
