//! Command line front end: list generators, write a demo project, render a node.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::info;

use crate::error::LibraryError;
use crate::model::{Color, ImageSize, SettingValue};
use crate::project::{NodeId, ProjectDocument, SlotIndex};
use crate::settings::SettingsManager;
use crate::create_project;

#[derive(Parser, Debug)]
#[command(name = "texgen", version, about = "Procedural texture graph renderer")]
pub struct Cli {
    /// Engine settings file (TOML). Defaults to the per-user config file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the registered generators.
    Generators,
    /// Write a small sample project.
    Demo {
        output: PathBuf,
    },
    /// Render one node of a project to a PNG file.
    Render {
        project: PathBuf,
        /// Node to render. Defaults to the node with the highest id.
        #[arg(short, long)]
        node: Option<NodeId>,
        /// Output size as WxH. Defaults to the configured preview size.
        #[arg(short, long, value_parser = parse_size)]
        size: Option<ImageSize>,
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn parse_size(value: &str) -> Result<ImageSize, String> {
    ImageSize::parse(value).map_err(|e| e.to_string())
}

pub fn run(cli: Cli) -> Result<(), LibraryError> {
    let settings = match cli.config.clone().or_else(SettingsManager::default_path) {
        Some(path) => SettingsManager::load_or_default(&path),
        None => SettingsManager::default(),
    };

    match cli.command {
        Command::Generators => {
            let project = create_project();
            for generator in project.generators() {
                println!(
                    "{:<14} {:<9} slots={} {}",
                    generator.name(),
                    generator.category(),
                    generator.source_slot_count(),
                    generator.description()
                );
            }
            Ok(())
        }
        Command::Demo { output } => {
            demo_document()?.write(&output)?;
            info!("wrote demo project to {}", output.display());
            Ok(())
        }
        Command::Render {
            project,
            node,
            size,
            output,
        } => {
            let document = ProjectDocument::read(&project)?;
            let project = create_project();
            let loaded = project.load_document(&document);
            let id = match node {
                Some(id) => id,
                None => *loaded
                    .iter()
                    .max()
                    .ok_or_else(|| LibraryError::Project("project has no nodes".to_string()))?,
            };
            let node = project
                .node(id)
                .ok_or_else(|| LibraryError::InvalidArgument(format!("no node with id {}", id)))?;
            let size = size.unwrap_or_else(|| settings.preview_size());
            if size.is_empty() {
                return Err(LibraryError::InvalidArgument(format!("invalid size {}", size)));
            }
            let image = node.get_image(size);
            image::save_buffer(
                &output,
                &image.to_rgba_bytes(),
                size.width,
                size.height,
                image::ExtendedColorType::Rgba8,
            )?;
            info!("rendered node {} at {} to {}", id, size, output.display());
            Ok(())
        }
    }
}

/// Checkerboard and noise blended, then inverted.
fn demo_document() -> Result<ProjectDocument, LibraryError> {
    let project = create_project();
    project.set_name("Demo");
    let generator = |name: &str| {
        project
            .generator(name)
            .ok_or_else(|| LibraryError::Runtime(format!("missing built-in generator {}", name)))
    };

    let checker = project.new_node(Some(generator("Checkerboard")?));
    checker.set_setting("color", Color::rgba(200, 60, 20, 255));
    checker.set_setting("brickwidth", SettingValue::Int(16));
    checker.set_setting("brickheight", SettingValue::Int(16));

    let noise = project.new_node(Some(generator("Noise")?));
    noise.set_setting("alphamax", SettingValue::Int(160));

    let blend = project.new_node(Some(generator("Blend")?));
    blend.set_setting("mode", "Multiply");
    let invert = project.new_node(Some(generator("Invert")?));

    blend.set_source_slot(SlotIndex::At(0), Some(checker.id()))?;
    blend.set_source_slot(SlotIndex::At(1), Some(noise.id()))?;
    invert.set_source_slot(SlotIndex::At(0), Some(blend.id()))?;

    Ok(project.to_document())
}
