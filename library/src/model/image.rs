use std::fmt;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::LibraryError;
use crate::model::pixel::Pixel;

/// Output size of a rendered image. Also the key of node caches and render workers.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Parses `WxH`, e.g. `256x256`.
    pub fn parse(value: &str) -> Result<Self, LibraryError> {
        let invalid = || LibraryError::InvalidArgument(format!("invalid size '{}'", value));
        let (w, h) = value.trim().split_once(['x', 'X']).ok_or_else(invalid)?;
        let width = w.trim().parse().map_err(|_| invalid())?;
        let height = h.trim().parse().map_err(|_| invalid())?;
        Ok(Self::new(width, height))
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Immutable pixel buffer of `width * height` pixels, row-major.
///
/// Images are created once and shared as `Arc<Image>` between caches,
/// receivers and callers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Image {
    size: ImageSize,
    pixels: Vec<Pixel>,
}

impl Image {
    /// Zero-filled image.
    pub fn blank(size: ImageSize) -> Self {
        Self::filled(size, Pixel::TRANSPARENT)
    }

    pub fn filled(size: ImageSize, pixel: Pixel) -> Self {
        Self {
            size,
            pixels: vec![pixel; size.pixel_count()],
        }
    }

    pub fn from_pixels(size: ImageSize, pixels: Vec<Pixel>) -> Result<Self, LibraryError> {
        if pixels.len() != size.pixel_count() {
            return Err(LibraryError::InvalidArgument(format!(
                "image {} needs {} pixels, got {}",
                size,
                size.pixel_count(),
                pixels.len()
            )));
        }
        Ok(Self { size, pixels })
    }

    /// Builds an image by evaluating `f(x, y)` for every pixel. Rows are filled in parallel.
    pub fn from_fn<F>(size: ImageSize, f: F) -> Self
    where
        F: Fn(u32, u32) -> Pixel + Sync,
    {
        let width = size.width as usize;
        let mut pixels = vec![Pixel::TRANSPARENT; size.pixel_count()];
        if width > 0 {
            pixels
                .par_chunks_mut(width)
                .enumerate()
                .for_each(|(y, row)| {
                    for (x, px) in row.iter_mut().enumerate() {
                        *px = f(x as u32, y as u32);
                    }
                });
        }
        Self { size, pixels }
    }

    pub fn size(&self) -> ImageSize {
        self.size
    }

    pub fn width(&self) -> u32 {
        self.size.width
    }

    pub fn height(&self) -> u32 {
        self.size.height
    }

    pub fn pixels(&self) -> &[Pixel] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Pixel> {
        if x >= self.size.width || y >= self.size.height {
            return None;
        }
        self.pixels
            .get(y as usize * self.size.width as usize + x as usize)
            .copied()
    }

    /// Raw RGBA8 bytes, suitable for `image::save_buffer`.
    pub fn to_rgba_bytes(&self) -> Vec<u8> {
        self.pixels
            .iter()
            .flat_map(|px| [px.r, px.g, px.b, px.a])
            .collect()
    }
}
