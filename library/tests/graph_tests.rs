mod common;

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use common::{
    CountingGenerator, assert_acyclic, assert_symmetric, call_log, calls, chain, diamond_ladder,
    red, value_settings,
};
use texgen::{
    ConnectionError, Generator, GeneratorCategory, Image, ImageSize, Pixel, Project,
    ProjectEvent, SettingDefinition, Settings, SlotIndex, SourceImages, create_project,
};

const SIZE: ImageSize = ImageSize::new(64, 64);

#[test]
fn test_chain_renders_each_node_once_in_dependency_order() {
    let project = Project::new();
    let log = call_log();
    let nodes = chain(&project, 3, &log);
    let c = &nodes[2];

    let first = c.get_image(SIZE);
    assert_eq!(calls(&log), vec!["n0", "n1", "n2"]);
    assert_eq!(red(&first), 3);

    let second = c.get_image(SIZE);
    assert_eq!(calls(&log).len(), 3);
    assert_eq!(*first, *second);
    assert!(nodes.iter().all(|n| n.is_texture_in_cache(SIZE)));
}

#[test]
fn test_self_connection_is_rejected() {
    let project = Project::new();
    let log = call_log();
    let a = project.new_node(Some(CountingGenerator::new("a", 1, &log)));

    assert_eq!(
        a.set_source_slot(SlotIndex::At(0), Some(a.id())),
        Err(ConnectionError::SelfConnection(a.id()))
    );
    assert_eq!(a.sources(), vec![None]);
}

#[test]
fn test_two_node_cycle_is_rejected() {
    let project = Project::new();
    let log = call_log();
    let a = project.new_node(Some(CountingGenerator::new("a", 1, &log)));
    let b = project.new_node(Some(CountingGenerator::new("b", 1, &log)));

    a.set_source_slot(SlotIndex::At(0), Some(b.id())).unwrap();
    let err = b.set_source_slot(SlotIndex::At(0), Some(a.id())).unwrap_err();

    assert_eq!(
        err,
        ConnectionError::WouldCreateCycle {
            upstream: a.id(),
            receiver: b.id()
        }
    );
    assert_eq!(b.source(0), None);
    assert!(a.receivers().is_empty());
    assert_eq!(b.receivers().into_iter().collect::<Vec<_>>(), vec![a.id()]);
}

#[test]
fn test_rejected_connection_leaves_graph_unchanged() {
    let project = Project::new();
    let log = call_log();
    let nodes = chain(&project, 3, &log);
    let extra = project.new_node(Some(CountingGenerator::new("x", 0, &log)));
    // Slot 0 of the head currently points at `extra`; replacing it with the tail closes a loop.
    nodes[0].set_source_slot(SlotIndex::At(0), Some(extra.id())).unwrap();
    let before = project.to_document();
    let receivers_before: Vec<_> = project.nodes().iter().map(|n| n.receivers()).collect();

    assert!(
        nodes[0]
            .set_source_slot(SlotIndex::At(0), Some(nodes[2].id()))
            .is_err()
    );

    assert_eq!(project.to_document(), before);
    let receivers_after: Vec<_> = project.nodes().iter().map(|n| n.receivers()).collect();
    assert_eq!(receivers_after, receivers_before);
    assert!(!project.find_loops());
}

#[test]
fn test_random_wiring_stays_acyclic_and_symmetric() {
    let project = Project::new();
    let log = call_log();
    let nodes: Vec<_> = (0..8)
        .map(|i| project.new_node(Some(CountingGenerator::new(&format!("g{}", i), 2, &log))))
        .collect();
    let mut rng = StdRng::seed_from_u64(7);

    let mut rejected = 0;
    for _ in 0..400 {
        let node = &nodes[rng.random_range(0..nodes.len())];
        let slot = rng.random_range(0..2);
        let source = if rng.random_range(0..5) == 0 {
            None
        } else {
            Some(nodes[rng.random_range(0..nodes.len())].id())
        };
        if node.set_source_slot(SlotIndex::At(slot), source).is_err() {
            rejected += 1;
        }
        assert_symmetric(&project);
        assert_acyclic(&project);
    }
    assert!(rejected > 0);
}

#[test]
fn test_settings_change_invalidates_downstream_only() {
    let project = Project::new();
    let log = call_log();
    let nodes = chain(&project, 3, &log);
    nodes[2].get_image(SIZE);

    nodes[1].set_settings(value_settings(10));

    assert!(nodes[0].is_texture_in_cache(SIZE));
    assert!(!nodes[1].is_texture_in_cache(SIZE));
    assert!(!nodes[2].is_texture_in_cache(SIZE));

    let image = nodes[2].get_image(SIZE);
    assert_eq!(red(&image), 12);
    assert_eq!(calls(&log), vec!["n0", "n1", "n2", "n1", "n2"]);
}

#[test]
fn test_settings_replace_instead_of_merge() {
    let project = Project::new();
    let log = call_log();
    let node = project.new_node(Some(CountingGenerator::new("a", 0, &log)));
    node.set_settings(value_settings(5));
    node.set_settings(Settings::new());

    assert!(node.settings().is_empty());
    // Missing keys fall back to the generator default at render time.
    assert_eq!(red(&node.get_image(SIZE)), 1);
}

#[test]
fn test_invalidation_reaches_diamond_once() {
    let project = Project::new();
    let log = call_log();
    let top = project.new_node(Some(CountingGenerator::new("top", 0, &log)));
    let left = project.new_node(Some(CountingGenerator::new("left", 1, &log)));
    let right = project.new_node(Some(CountingGenerator::new("right", 1, &log)));
    let bottom = project.new_node(Some(CountingGenerator::new("bottom", 2, &log)));
    left.set_source_slot(SlotIndex::At(0), Some(top.id())).unwrap();
    right.set_source_slot(SlotIndex::At(0), Some(top.id())).unwrap();
    bottom.set_source_slot(SlotIndex::At(0), Some(left.id())).unwrap();
    bottom.set_source_slot(SlotIndex::At(1), Some(right.id())).unwrap();
    assert_eq!(red(&bottom.get_image(SIZE)), 5);

    let events = project.subscribe();
    top.set_settings(value_settings(2));

    let updated: Vec<_> = events
        .drain()
        .into_iter()
        .filter_map(|e| match e {
            ProjectEvent::ImageUpdated(id) => Some(id),
            _ => None,
        })
        .collect();
    assert_eq!(updated.len(), 4);
    assert_eq!(red(&bottom.get_image(SIZE)), 7);
}

#[test]
fn test_remove_node_cleans_up_references() {
    let project = Project::new();
    let log = call_log();
    let nodes = chain(&project, 3, &log);
    let middle = nodes[1].id();

    assert!(project.remove_node(middle));

    assert!(project.node(middle).is_none());
    assert!(nodes[1].is_released());
    for node in project.nodes() {
        assert!(!node.sources().contains(&Some(middle)));
        assert!(!node.receivers().contains(&middle));
    }
    assert_symmetric(&project);
    assert!(!project.remove_node(middle));
    assert_eq!(
        nodes[1].set_source_slot(SlotIndex::At(0), None),
        Err(ConnectionError::Detached(middle))
    );
}

#[test]
fn test_slot_validation() {
    let project = Project::new();
    let log = call_log();
    let a = project.new_node(Some(CountingGenerator::new("a", 0, &log)));
    let b = project.new_node(Some(CountingGenerator::new("b", 2, &log)));
    let c = project.new_node(Some(CountingGenerator::new("c", 0, &log)));

    assert_eq!(
        b.set_source_slot(SlotIndex::At(2), Some(a.id())),
        Err(ConnectionError::InvalidSlot {
            node: b.id(),
            slot: 2,
            count: 2
        })
    );
    assert_eq!(
        b.set_source_slot(SlotIndex::At(0), Some(99)),
        Err(ConnectionError::UnknownSource(99))
    );

    b.set_source_slot(SlotIndex::Any, Some(a.id())).unwrap();
    b.set_source_slot(SlotIndex::Any, Some(c.id())).unwrap();
    assert_eq!(b.sources(), vec![Some(a.id()), Some(c.id())]);
    assert_eq!(
        b.set_source_slot(SlotIndex::Any, Some(a.id())),
        Err(ConnectionError::NoFreeSlot(b.id()))
    );
    assert!(!b.slot_available(0));
    assert!(!b.slot_available(5));
}

#[test]
fn test_shared_source_keeps_receiver_until_last_slot_is_cleared() {
    let project = Project::new();
    let log = call_log();
    let a = project.new_node(Some(CountingGenerator::new("a", 0, &log)));
    let b = project.new_node(Some(CountingGenerator::new("b", 2, &log)));
    b.set_source_slot(SlotIndex::At(0), Some(a.id())).unwrap();
    b.set_source_slot(SlotIndex::At(1), Some(a.id())).unwrap();

    b.set_source_slot(SlotIndex::At(0), None).unwrap();
    assert!(a.receivers().contains(&b.id()));

    b.set_source_slot(SlotIndex::At(1), None).unwrap();
    assert!(a.receivers().is_empty());
}

#[test]
fn test_reassigning_same_source_is_a_no_op() {
    let project = Project::new();
    let log = call_log();
    let nodes = chain(&project, 2, &log);
    nodes[1].get_image(SIZE);
    let events = project.subscribe();

    nodes[1]
        .set_source_slot(SlotIndex::At(0), Some(nodes[0].id()))
        .unwrap();

    assert!(events.drain().is_empty());
    assert!(nodes[1].is_texture_in_cache(SIZE));
}

#[test]
fn test_connection_events() {
    let project = Project::new();
    let log = call_log();
    let a = project.new_node(Some(CountingGenerator::new("a", 0, &log)));
    let b = project.new_node(Some(CountingGenerator::new("b", 0, &log)));
    let c = project.new_node(Some(CountingGenerator::new("c", 1, &log)));
    c.set_source_slot(SlotIndex::At(0), Some(a.id())).unwrap();
    let events = project.subscribe();

    c.set_source_slot(SlotIndex::At(0), Some(b.id())).unwrap();

    let received = events.drain();
    assert_eq!(
        &received[..3],
        &[
            ProjectEvent::NodesDisconnected {
                source: a.id(),
                receiver: c.id(),
                slot: 0
            },
            ProjectEvent::NodesConnected {
                source: b.id(),
                receiver: c.id(),
                slot: 0
            },
            ProjectEvent::SlotsUpdated(c.id()),
        ]
    );
    assert!(received.contains(&ProjectEvent::ImageUpdated(c.id())));
}

#[test]
fn test_set_generator_drops_extra_slots_and_resets_settings() {
    let project = Project::new();
    let log = call_log();
    let a = project.new_node(Some(CountingGenerator::new("a", 0, &log)));
    let b = project.new_node(Some(CountingGenerator::new("b", 0, &log)));
    let c = project.new_node(Some(CountingGenerator::new("wide", 2, &log)));
    c.set_source_slot(SlotIndex::At(0), Some(a.id())).unwrap();
    c.set_source_slot(SlotIndex::At(1), Some(b.id())).unwrap();
    c.set_settings(value_settings(9));

    c.set_generator(Some(CountingGenerator::new("narrow", 1, &log)));

    assert_eq!(c.generator_name(), "narrow");
    assert_eq!(c.sources(), vec![Some(a.id())]);
    assert!(b.receivers().is_empty());
    assert_eq!(c.settings(), value_settings(1));
    assert_symmetric(&project);

    c.set_generator(None);
    assert_eq!(c.generator_name(), "Empty");
    assert_eq!(c.source_slot_count(), 3);
    assert_eq!(c.source(0), Some(a.id()));
}

#[test]
fn test_set_generator_by_name() {
    let project = create_project();
    let node = project.new_node(None);

    assert!(node.set_generator_by_name("Fill"));
    assert_eq!(node.generator_name(), "Fill");
    assert!(!node.set_generator_by_name("Missing"));
    assert_eq!(node.generator_name(), "Empty");
}

#[test]
fn test_waiting_for_counts_uncached_ancestors() {
    let project = Project::new();
    let log = call_log();
    let nodes = chain(&project, 3, &log);

    assert_eq!(nodes[0].waiting_for(SIZE), 0);
    assert_eq!(nodes[1].waiting_for(SIZE), 1);
    assert_eq!(nodes[2].waiting_for(SIZE), 2);

    nodes[0].get_image(SIZE);
    assert_eq!(nodes[1].waiting_for(SIZE), 0);
    assert_eq!(nodes[2].waiting_for(SIZE), 1);
    assert_eq!(calls(&log), vec!["n0"]);
}

#[test]
fn test_waiting_for_counts_shared_ancestors_once() {
    let project = Project::new();
    let log = call_log();
    let (root, joins) = diamond_ladder(&project, 22, &log);
    assert_eq!(project.node_count(), 67);
    let tail = &joins[21];

    let started = Instant::now();
    assert_eq!(tail.waiting_for(SIZE), 66);
    assert!(started.elapsed() < Duration::from_secs(2));

    root.get_image(SIZE);
    assert_eq!(tail.waiting_for(SIZE), 65);

    joins[20].get_image(SIZE);
    assert_eq!(tail.waiting_for(SIZE), 2);
    assert_eq!(joins[20].waiting_for(SIZE), 0);
}

#[test]
fn test_node_ids_and_lookup() {
    let project = Project::new();
    let a = project.new_node(None);
    let b = project.new_node(None);
    assert_eq!((a.id(), b.id()), (1, 2));

    let same = project.new_node_with_id(2, None);
    assert!(Arc::ptr_eq(&same, &b));
    let custom = project.new_node_with_id(7, None);
    assert_eq!(custom.id(), 7);
    assert_eq!(project.node_ids(), vec![1, 2, 7]);
    assert_eq!(a.name(), "Node 1");

    project.clear();
    assert_eq!(project.node_count(), 0);
    assert_eq!(project.new_node(None).id(), 1);
}

#[test]
fn test_generator_registry() {
    let project = create_project();
    let log = call_log();
    let events = project.subscribe();
    let fill = project.generator("Fill").unwrap();

    let impostor = CountingGenerator::new("Fill", 0, &log);
    assert!(!project.add_generator(impostor.clone()));
    assert!(events.drain().contains(&ProjectEvent::GeneratorNameCollision {
        name: "Fill".to_string()
    }));
    assert!(Arc::ptr_eq(&project.generator("Fill").unwrap(), &fill));

    let impostor: texgen::GeneratorRef = impostor;
    assert!(!project.remove_generator(&impostor));
    assert!(project.remove_generator(&fill));
    assert!(project.generator("Fill").is_none());
    assert!(project.generator("Empty").is_some());

    assert!(project.replace_generator(impostor.clone()).is_none());
    assert!(Arc::ptr_eq(&project.generator("Fill").unwrap(), &impostor));
}

struct WrongSize;

impl Generator for WrongSize {
    fn name(&self) -> &str {
        "WrongSize"
    }

    fn category(&self) -> GeneratorCategory {
        GeneratorCategory::Generator
    }

    fn source_slot_count(&self) -> usize {
        0
    }

    fn settings(&self) -> &[SettingDefinition] {
        &[]
    }

    fn generate(&self, _size: ImageSize, _sources: &SourceImages, _settings: &Settings) -> Image {
        Image::filled(ImageSize::new(1, 1), Pixel::opaque(255, 255, 255))
    }
}

#[test]
fn test_wrong_sized_output_is_replaced_by_blank() {
    let project = Project::new();
    let node = project.new_node(Some(Arc::new(WrongSize)));

    let image = node.get_image(SIZE);

    assert_eq!(image.size(), SIZE);
    assert_eq!(*image, Image::blank(SIZE));
}

/// Blocks inside `generate` until the test lets it continue.
struct GatedGenerator {
    started: Mutex<mpsc::Sender<()>>,
    release: Mutex<mpsc::Receiver<()>>,
    settings: Vec<SettingDefinition>,
}

impl Generator for GatedGenerator {
    fn name(&self) -> &str {
        "Gated"
    }

    fn category(&self) -> GeneratorCategory {
        GeneratorCategory::Generator
    }

    fn source_slot_count(&self) -> usize {
        0
    }

    fn settings(&self) -> &[SettingDefinition] {
        &self.settings
    }

    fn generate(&self, size: ImageSize, _sources: &SourceImages, settings: &Settings) -> Image {
        let value = settings
            .get("value")
            .and_then(|v| v.as_int())
            .unwrap_or(0) as u8;
        self.started.lock().unwrap().send(()).unwrap();
        self.release.lock().unwrap().recv().unwrap();
        Image::filled(size, Pixel::opaque(value, 0, 0))
    }
}

#[test]
fn test_render_invalidated_mid_flight_is_returned_but_not_cached() {
    let (started_tx, started_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let project = Project::new();
    let node = project.new_node(Some(Arc::new(GatedGenerator {
        started: Mutex::new(started_tx),
        release: Mutex::new(release_rx),
        settings: vec![SettingDefinition::new("value", "Value", 1i64)],
    })));

    let image = thread::scope(|scope| {
        let render = scope.spawn(|| node.get_image(SIZE));
        started_rx.recv().unwrap();
        node.set_settings(value_settings(2));
        release_tx.send(()).unwrap();
        render.join().unwrap()
    });

    assert_eq!(red(&image), 1);
    assert!(!node.is_texture_in_cache(SIZE));

    release_tx.send(()).unwrap();
    assert_eq!(red(&node.get_image(SIZE)), 2);
    assert!(node.is_texture_in_cache(SIZE));
}

#[test]
fn test_modified_flag() {
    let project = create_project();
    assert!(!project.is_modified());
    let node = project.new_node(None);
    assert!(project.is_modified());
    project.mark_saved();
    node.set_name("Base");
    assert!(project.is_modified());
}
