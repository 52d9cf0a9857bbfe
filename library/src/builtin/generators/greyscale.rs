use crate::generator::{Generator, GeneratorCategory, SourceImages};
use crate::model::{Image, ImageSize, Pixel, SettingDefinition, Settings};

pub struct GreyscaleGenerator;

impl GreyscaleGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl Default for GreyscaleGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Generator for GreyscaleGenerator {
    fn name(&self) -> &str {
        "Greyscale"
    }

    fn description(&self) -> &str {
        "Converts the source to shades of grey, keeping alpha."
    }

    fn category(&self) -> GeneratorCategory {
        GeneratorCategory::Filter
    }

    fn source_slot_count(&self) -> usize {
        1
    }

    fn settings(&self) -> &[SettingDefinition] {
        &[]
    }

    fn generate(&self, size: ImageSize, sources: &SourceImages, _settings: &Settings) -> Image {
        let Some(source) = sources.get(&0).filter(|img| img.size() == size) else {
            return Image::blank(size);
        };
        Image::from_fn(size, |x, y| {
            let px = source.pixel(x, y).unwrap_or(Pixel::TRANSPARENT);
            let grey = (px.intensity() * 255.0).round() as u8;
            Pixel::new(grey, grey, grey, px.a)
        })
    }
}
