use crate::generator::{Generator, GeneratorCategory, SourceImages};
use crate::model::{Color, Image, ImageSize, Pixel, SettingDefinition, Settings};

use super::{color_setting, int_setting};

/// Alternating cells of two colors.
pub struct CheckerboardGenerator {
    settings: Vec<SettingDefinition>,
}

impl CheckerboardGenerator {
    pub fn new() -> Self {
        Self {
            settings: vec![
                SettingDefinition::new("color", "Color", Color::BLACK).with_order(0),
                SettingDefinition::new("background", "Background", Color::rgba(0, 0, 0, 0))
                    .with_order(1),
                SettingDefinition::new("brickwidth", "Brick width", 10i64)
                    .with_range(1i64, 500i64)
                    .with_group("size")
                    .with_order(2),
                SettingDefinition::new("brickheight", "Brick height", 10i64)
                    .with_range(1i64, 500i64)
                    .with_group("size")
                    .with_order(3),
                SettingDefinition::new("offsetx", "Offset left", 0i64)
                    .with_range(0i64, 500i64)
                    .with_group("offset")
                    .with_order(4),
                SettingDefinition::new("offsety", "Offset top", 0i64)
                    .with_range(0i64, 500i64)
                    .with_group("offset")
                    .with_order(5),
            ],
        }
    }
}

impl Default for CheckerboardGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Generator for CheckerboardGenerator {
    fn name(&self) -> &str {
        "Checkerboard"
    }

    fn description(&self) -> &str {
        "Draws a checkerboard pattern."
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
        let color = Pixel::from(color_setting(settings, "color", Color::BLACK));
        let background =
            Pixel::from(color_setting(settings, "background", Color::rgba(0, 0, 0, 0)));
        let cell_w = int_setting(settings, "brickwidth", 10).max(1);
        let cell_h = int_setting(settings, "brickheight", 10).max(1);
        let offset_x = int_setting(settings, "offsetx", 0);
        let offset_y = int_setting(settings, "offsety", 0);

        Image::from_fn(size, |x, y| {
            let cx = i64::from(x).saturating_add(offset_x).div_euclid(cell_w);
            let cy = i64::from(y).saturating_add(offset_y).div_euclid(cell_h);
            if (cx ^ cy) & 1 == 0 {
                color
            } else {
                background
            }
        })
    }
}
