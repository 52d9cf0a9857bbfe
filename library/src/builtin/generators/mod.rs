pub mod blend;
pub mod checkerboard;
pub mod empty;
pub mod fill;
pub mod greyscale;
pub mod invert;
pub mod noise;

pub use self::blend::BlendGenerator;
pub use self::checkerboard::CheckerboardGenerator;
pub use self::empty::EmptyGenerator;
pub use self::fill::FillGenerator;
pub use self::greyscale::GreyscaleGenerator;
pub use self::invert::InvertGenerator;
pub use self::noise::NoiseGenerator;

use crate::model::{Color, Settings};

fn int_setting(settings: &Settings, key: &str, fallback: i64) -> i64 {
    settings
        .get(key)
        .and_then(|v| v.as_int())
        .unwrap_or(fallback)
}

fn double_setting(settings: &Settings, key: &str, fallback: f64) -> f64 {
    settings
        .get(key)
        .and_then(|v| v.as_double())
        .unwrap_or(fallback)
}

fn bool_setting(settings: &Settings, key: &str, fallback: bool) -> bool {
    settings
        .get(key)
        .and_then(|v| v.as_bool())
        .unwrap_or(fallback)
}

fn color_setting(settings: &Settings, key: &str, fallback: Color) -> Color {
    settings
        .get(key)
        .and_then(|v| v.as_color())
        .unwrap_or(fallback)
}

fn string_setting<'a>(settings: &'a Settings, key: &str, fallback: &'a str) -> &'a str {
    settings
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or(fallback)
}
