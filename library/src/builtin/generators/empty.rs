use crate::generator::{Generator, GeneratorCategory, SourceImages};
use crate::model::{Image, ImageSize, SettingDefinition, Settings};

/// Fallback generator for nodes without one. Always produces a zero-filled image.
pub struct EmptyGenerator;

impl EmptyGenerator {
    pub const NAME: &'static str = "Empty";

    pub fn new() -> Self {
        Self
    }
}

impl Default for EmptyGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Generator for EmptyGenerator {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Empty generator."
    }

    fn category(&self) -> GeneratorCategory {
        GeneratorCategory::Generator
    }

    fn source_slot_count(&self) -> usize {
        3
    }

    fn settings(&self) -> &[SettingDefinition] {
        &[]
    }

    fn generate(&self, size: ImageSize, _sources: &SourceImages, _settings: &Settings) -> Image {
        Image::blank(size)
    }
}
