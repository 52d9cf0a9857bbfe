use crate::generator::{Generator, GeneratorCategory, SourceImages};
use crate::model::{Color, Image, ImageSize, Pixel, SettingDefinition, Settings};

use super::color_setting;

pub struct FillGenerator {
    settings: Vec<SettingDefinition>,
}

impl FillGenerator {
    pub fn new() -> Self {
        Self {
            settings: vec![
                SettingDefinition::new("color", "Color", Color::WHITE)
                    .with_description("Color to fill the texture with."),
            ],
        }
    }
}

impl Default for FillGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Generator for FillGenerator {
    fn name(&self) -> &str {
        "Fill"
    }

    fn description(&self) -> &str {
        "Fills the whole texture with a single color."
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
        let color = color_setting(settings, "color", Color::WHITE);
        Image::filled(size, Pixel::from(color))
    }
}
