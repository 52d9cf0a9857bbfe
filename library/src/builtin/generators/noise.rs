use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::generator::{Generator, GeneratorCategory, SourceImages};
use crate::model::{Color, Image, ImageSize, Pixel, SettingDefinition, Settings};

use super::{color_setting, int_setting};

/// Per-pixel random alpha over a single color. Deterministic for a given seed.
pub struct NoiseGenerator {
    settings: Vec<SettingDefinition>,
}

impl NoiseGenerator {
    pub fn new() -> Self {
        Self {
            settings: vec![
                SettingDefinition::new("color", "Color", Color::BLACK).with_order(1),
                SettingDefinition::new("alphamin", "Min alpha", 0i64)
                    .with_range(0i64, 255i64)
                    .with_order(2),
                SettingDefinition::new("alphamax", "Max alpha", 255i64)
                    .with_range(0i64, 255i64)
                    .with_order(3),
                SettingDefinition::new("randomizer", "Random seed", 500i64)
                    .with_range(0i64, 1000i64)
                    .with_order(4),
            ],
        }
    }
}

impl Default for NoiseGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Generator for NoiseGenerator {
    fn name(&self) -> &str {
        "Noise"
    }

    fn description(&self) -> &str {
        "Random noise with a configurable alpha range."
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
        let color = color_setting(settings, "color", Color::BLACK);
        let lo = int_setting(settings, "alphamin", 0).clamp(0, 255) as u8;
        let hi = int_setting(settings, "alphamax", 255).clamp(0, 255) as u8;
        let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
        let seed = int_setting(settings, "randomizer", 500) as u64;

        let mut rng = StdRng::seed_from_u64(seed);
        let pixels = (0..size.pixel_count())
            .map(|_| Pixel::new(color.r, color.g, color.b, rng.random_range(lo..=hi)))
            .collect();
        Image::from_pixels(size, pixels).unwrap_or_else(|_| Image::blank(size))
    }
}
