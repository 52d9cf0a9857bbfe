//! Value types shared by nodes, generators and workers.

pub mod image;
pub mod pixel;
pub mod setting;

pub use self::image::{Image, ImageSize};
pub use self::pixel::{Color, Pixel};
pub use self::setting::{SettingDefinition, SettingValue, Settings};
