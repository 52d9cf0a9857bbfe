//! Procedural texture graph engine.
//!
//! A [`Project`] owns [`Node`]s that wrap a [`Generator`], its settings and
//! source slots wired to other nodes. Images are cached per node and output
//! size, invalidated downstream on every change and kept up to date by
//! background [`RenderWorker`](rendering::RenderWorker)s.

pub mod builtin;
pub mod cache;
pub mod cli;
pub mod error;
pub mod generator;
pub mod model;
pub mod project;
pub mod rendering;
pub mod settings;
pub mod util;

pub use crate::error::{ConnectionError, LibraryError};
pub use crate::generator::{Generator, GeneratorCategory, GeneratorRef, SourceImages};
pub use crate::model::{Color, Image, ImageSize, Pixel, SettingDefinition, SettingValue, Settings};
pub use crate::project::{
    Node, NodeId, Project, ProjectDocument, ProjectEvent, SlotIndex, Subscription,
};
pub use crate::rendering::{WorkerPriority, WorkerState};
pub use crate::settings::{EngineSettings, SettingsManager};

/// A project with every built-in generator registered.
pub fn create_project() -> Project {
    let project = Project::new();
    register_builtins(&project);
    project
}

/// Like [`create_project`], with render workers following `settings`.
pub fn create_project_with_settings(settings: EngineSettings) -> Project {
    let project = Project::with_settings(settings);
    register_builtins(&project);
    project
}

fn register_builtins(project: &Project) {
    for generator in builtin::builtin_generators() {
        project.add_generator(generator);
    }
}
