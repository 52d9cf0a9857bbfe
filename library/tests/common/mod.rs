#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use texgen::{
    Generator, GeneratorCategory, Image, ImageSize, Node, Pixel, Project, SettingDefinition,
    SettingValue, Settings, SourceImages,
};

pub type CallLog = Arc<Mutex<Vec<(String, ImageSize)>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn calls(log: &CallLog) -> Vec<String> {
    log.lock().unwrap().iter().map(|(name, _)| name.clone()).collect()
}

pub fn calls_for(log: &CallLog, size: ImageSize) -> usize {
    log.lock().unwrap().iter().filter(|(_, s)| *s == size).count()
}

/// Writes `value + sum of the sources' red channel` into every pixel and
/// records each invocation.
pub struct CountingGenerator {
    name: String,
    slots: usize,
    log: CallLog,
    settings: Vec<SettingDefinition>,
}

impl CountingGenerator {
    pub fn new(name: &str, slots: usize, log: &CallLog) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            slots,
            log: Arc::clone(log),
            settings: vec![SettingDefinition::new("value", "Value", 1i64)],
        })
    }
}

impl Generator for CountingGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> GeneratorCategory {
        if self.slots == 0 {
            GeneratorCategory::Generator
        } else {
            GeneratorCategory::Filter
        }
    }

    fn source_slot_count(&self) -> usize {
        self.slots
    }

    fn settings(&self) -> &[SettingDefinition] {
        &self.settings
    }

    fn generate(&self, size: ImageSize, sources: &SourceImages, settings: &Settings) -> Image {
        self.log.lock().unwrap().push((self.name.clone(), size));
        let value = settings.get("value").and_then(SettingValue::as_int).unwrap_or(0) as u8;
        let red = sources.values().fold(value, |acc, img| {
            acc.wrapping_add(img.pixel(0, 0).map(|px| px.r).unwrap_or(0))
        });
        Image::filled(size, Pixel::opaque(red, 0, 0))
    }
}

pub fn value_settings(value: i64) -> Settings {
    let mut settings = Settings::new();
    settings.insert("value".to_string(), SettingValue::Int(value));
    settings
}

pub fn red(image: &Image) -> u8 {
    image.pixel(0, 0).map(|px| px.r).unwrap_or_default()
}

/// Builds `count` nodes where node `i` reads node `i - 1` through slot 0.
pub fn chain(project: &Project, count: usize, log: &CallLog) -> Vec<Arc<Node>> {
    let mut nodes: Vec<Arc<Node>> = Vec::new();
    for i in 0..count {
        let generator = CountingGenerator::new(&format!("n{}", i), 1, log);
        let node = project.new_node(Some(generator));
        if let Some(previous) = nodes.last() {
            node.set_source_slot(texgen::SlotIndex::At(0), Some(previous.id()))
                .unwrap();
        }
        nodes.push(node);
    }
    nodes
}

/// `diamonds` diamonds stacked on a single root: each diamond has a left and
/// a right node reading the previous join (or the root) and a join reading
/// both. Nodes are created downstream first, so ids run against the data flow.
/// Returns the root and the joins in data-flow order.
pub fn diamond_ladder(
    project: &Project,
    diamonds: usize,
    log: &CallLog,
) -> (Arc<Node>, Vec<Arc<Node>>) {
    let mut levels: Vec<(Arc<Node>, Arc<Node>, Arc<Node>)> = (0..diamonds)
        .rev()
        .map(|k| {
            let join = project.new_node(Some(CountingGenerator::new(&format!("join{}", k), 2, log)));
            let left = project.new_node(Some(CountingGenerator::new(&format!("left{}", k), 1, log)));
            let right = project.new_node(Some(CountingGenerator::new(&format!("right{}", k), 1, log)));
            (left, right, join)
        })
        .collect();
    levels.reverse();
    let root = project.new_node(Some(CountingGenerator::new("root", 0, log)));

    let mut previous = root.id();
    for (left, right, join) in &levels {
        left.set_source_slot(texgen::SlotIndex::At(0), Some(previous)).unwrap();
        right.set_source_slot(texgen::SlotIndex::At(0), Some(previous)).unwrap();
        join.set_source_slot(texgen::SlotIndex::At(0), Some(left.id())).unwrap();
        join.set_source_slot(texgen::SlotIndex::At(1), Some(right.id())).unwrap();
        previous = join.id();
    }
    let joins = levels.into_iter().map(|(_, _, join)| join).collect();
    (root, joins)
}

/// Red value of the last join of a [`diamond_ladder`] with default settings.
pub fn diamond_ladder_red(diamonds: usize) -> u8 {
    (0..diamonds).fold(1u8, |previous, _| {
        let side = 1u8.wrapping_add(previous);
        1u8.wrapping_add(side).wrapping_add(side)
    })
}

/// Checks that sources and receivers are exact transposes of each other.
pub fn assert_symmetric(project: &Project) {
    for node in project.nodes() {
        for source in node.sources().into_iter().flatten() {
            let upstream = project.node(source).expect("source exists");
            assert!(
                upstream.receivers().contains(&node.id()),
                "{} -> {} missing receiver entry",
                source,
                node.id()
            );
        }
        for receiver in node.receivers() {
            let downstream = project.node(receiver).expect("receiver exists");
            assert!(
                downstream.sources().contains(&Some(node.id())),
                "{} lists receiver {} without a matching slot",
                node.id(),
                receiver
            );
        }
    }
}

/// Walks sources from every node and fails if a node reaches itself.
pub fn assert_acyclic(project: &Project) {
    for start in project.node_ids() {
        let mut stack: Vec<u32> = project.node(start).unwrap().sources().into_iter().flatten().collect();
        let mut seen = std::collections::HashSet::new();
        while let Some(id) = stack.pop() {
            assert_ne!(id, start, "node {} reaches itself", start);
            if seen.insert(id) {
                stack.extend(project.node(id).unwrap().sources().into_iter().flatten());
            }
        }
    }
}

pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
