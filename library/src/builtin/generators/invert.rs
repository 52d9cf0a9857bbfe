use crate::generator::{Generator, GeneratorCategory, SourceImages};
use crate::model::{Image, ImageSize, Pixel, SettingDefinition, Settings};

use super::bool_setting;

pub struct InvertGenerator {
    settings: Vec<SettingDefinition>,
}

impl InvertGenerator {
    pub fn new() -> Self {
        Self {
            settings: vec![
                SettingDefinition::new("channelRed", "Invert red", true).with_order(0),
                SettingDefinition::new("channelGreen", "Invert green", true).with_order(1),
                SettingDefinition::new("channelBlue", "Invert blue", true).with_order(2),
                SettingDefinition::new("channelAlpha", "Invert alpha", false).with_order(3),
            ],
        }
    }
}

impl Default for InvertGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Generator for InvertGenerator {
    fn name(&self) -> &str {
        "Invert"
    }

    fn description(&self) -> &str {
        "Inverts the selected channels of the source."
    }

    fn category(&self) -> GeneratorCategory {
        GeneratorCategory::Filter
    }

    fn source_slot_count(&self) -> usize {
        1
    }

    fn settings(&self) -> &[SettingDefinition] {
        &self.settings
    }

    fn generate(&self, size: ImageSize, sources: &SourceImages, settings: &Settings) -> Image {
        let Some(source) = sources.get(&0).filter(|img| img.size() == size) else {
            return Image::blank(size);
        };
        let red = bool_setting(settings, "channelRed", true);
        let green = bool_setting(settings, "channelGreen", true);
        let blue = bool_setting(settings, "channelBlue", true);
        let alpha = bool_setting(settings, "channelAlpha", false);
        let flip = |on: bool, v: u8| if on { 255 - v } else { v };

        Image::from_fn(size, |x, y| {
            let px = source.pixel(x, y).unwrap_or(Pixel::TRANSPARENT);
            Pixel::new(
                flip(red, px.r),
                flip(green, px.g),
                flip(blue, px.b),
                flip(alpha, px.a),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn inverts_color_channels_by_default() {
        let size = ImageSize::new(2, 2);
        let mut sources = SourceImages::new();
        sources.insert(0, Arc::new(Image::filled(size, Pixel::new(0, 100, 255, 200))));
        let generator = InvertGenerator::new();
        let img = generator.generate(size, &sources, &generator.default_settings());
        assert_eq!(img.pixel(1, 1), Some(Pixel::new(255, 155, 0, 200)));
    }

    #[test]
    fn missing_source_is_zero_filled() {
        let size = ImageSize::new(2, 2);
        let img = InvertGenerator::new().generate(size, &SourceImages::new(), &Settings::new());
        assert_eq!(img, Image::blank(size));
    }
}
