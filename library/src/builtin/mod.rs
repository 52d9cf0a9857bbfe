//! Built-in generators shipped with the library.

pub mod generators;

use std::sync::Arc;

use crate::generator::GeneratorRef;

/// Every built-in generator except the empty fallback, which each project owns.
pub fn builtin_generators() -> Vec<GeneratorRef> {
    vec![
        Arc::new(generators::FillGenerator::new()),
        Arc::new(generators::CheckerboardGenerator::new()),
        Arc::new(generators::NoiseGenerator::new()),
        Arc::new(generators::InvertGenerator::new()),
        Arc::new(generators::GreyscaleGenerator::new()),
        Arc::new(generators::BlendGenerator::new()),
    ]
}
