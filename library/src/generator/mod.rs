//! Generator contract consumed by nodes.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::model::{Image, ImageSize, SettingDefinition, Settings};

/// Images of a node's populated source slots, keyed by slot index.
/// An unpopulated slot is simply absent.
pub type SourceImages = BTreeMap<usize, Arc<Image>>;

/// Shared handle to a generator. Generators are immutable after construction
/// and may be invoked concurrently by several render workers.
pub type GeneratorRef = Arc<dyn Generator>;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GeneratorCategory {
    /// Produces an image from settings alone.
    Generator,
    /// Transforms a single source image.
    Filter,
    /// Combines several source images.
    Combiner,
}

impl fmt::Display for GeneratorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            GeneratorCategory::Generator => "Generator",
            GeneratorCategory::Filter => "Filter",
            GeneratorCategory::Combiner => "Combiner",
        };
        f.write_str(label)
    }
}

/// A pure image computation.
///
/// `generate` must return an image of exactly `size`, must tolerate missing
/// source slots and must not fail: invalid input degrades to zero-filled output.
pub trait Generator: Send + Sync {
    /// Unique name, used as the registry key and in project documents.
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    fn category(&self) -> GeneratorCategory;

    fn source_slot_count(&self) -> usize;

    fn slot_name(&self, slot: usize) -> String {
        format!("Source {}", slot + 1)
    }

    fn settings(&self) -> &[SettingDefinition];

    fn generate(&self, size: ImageSize, sources: &SourceImages, settings: &Settings) -> Image;

    /// Every declared setting at its default value.
    fn default_settings(&self) -> Settings {
        self.settings()
            .iter()
            .map(|def| (def.key.clone(), def.default_value.clone()))
            .collect()
    }
}

/// Fills in generator defaults for keys the node never set and clamps
/// declared numeric settings into their range.
pub fn merge_with_defaults(generator: &dyn Generator, explicit: &Settings) -> Settings {
    let mut merged = explicit.clone();
    for def in generator.settings() {
        let value = match merged.get(&def.key) {
            Some(value) => def.clamp(value),
            None => def.default_value.clone(),
        };
        merged.insert(def.key.clone(), value);
    }
    merged
}
