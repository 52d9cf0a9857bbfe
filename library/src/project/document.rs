//! JSON project documents.
//!
//! Documents are built and applied through the public [`Project`] and
//! [`Node`](crate::project::Node) API only.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::LibraryError;
use crate::model::Settings;
use crate::project::{NodeId, Project, SlotIndex};

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ProjectDocument {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<NodeDocument>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NodeDocument {
    pub id: NodeId,
    #[serde(default)]
    pub name: String,
    pub generator: String,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub sources: Vec<SourceLink>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceLink {
    pub slot: usize,
    pub source: NodeId,
}

impl ProjectDocument {
    pub fn from_json(json: &str) -> Result<Self, LibraryError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, LibraryError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn read(path: &Path) -> Result<Self, LibraryError> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    pub fn write(&self, path: &Path) -> Result<(), LibraryError> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

impl Project {
    /// Snapshot of every node in id order.
    pub fn to_document(&self) -> ProjectDocument {
        ProjectDocument {
            name: self.name(),
            nodes: self
                .node_ids()
                .into_iter()
                .filter_map(|id| self.node_document(id))
                .collect(),
        }
    }

    fn node_document(&self, id: NodeId) -> Option<NodeDocument> {
        let node = self.node(id)?;
        let sources = node
            .sources()
            .into_iter()
            .enumerate()
            .filter_map(|(slot, source)| source.map(|source| SourceLink { slot, source }))
            .collect();
        Some(NodeDocument {
            id,
            name: node.name(),
            generator: node.generator_name(),
            settings: node.settings(),
            sources,
        })
    }

    /// Document holding a single node, for copy and paste through [`load_document`](Self::load_document).
    pub fn copy_node(&self, id: NodeId) -> Option<ProjectDocument> {
        Some(ProjectDocument {
            name: String::new(),
            nodes: vec![self.node_document(id)?],
        })
    }

    /// Copies a node into a document and removes it from the project.
    pub fn cut_node(&self, id: NodeId) -> Option<ProjectDocument> {
        let document = self.copy_node(id)?;
        self.remove_node(id);
        Some(document)
    }

    /// Adds the document's nodes to this project and returns their ids.
    ///
    /// Document ids that are already taken get fresh ids and links between
    /// document nodes follow them. Links to ids outside the document connect
    /// to existing project nodes. Unknown generators fall back to the empty
    /// generator.
    pub fn load_document(&self, document: &ProjectDocument) -> Vec<NodeId> {
        if !document.name.is_empty() && self.node_count() == 0 {
            self.set_name(&document.name);
        }

        let mut remap: BTreeMap<NodeId, NodeId> = BTreeMap::new();
        let mut loaded = Vec::with_capacity(document.nodes.len());

        for entry in &document.nodes {
            if entry.id != 0 && remap.contains_key(&entry.id) {
                warn!("document lists node {} twice, skipping the duplicate", entry.id);
                continue;
            }
            let requested = if entry.id == 0 || self.node(entry.id).is_some() {
                0
            } else {
                entry.id
            };
            let generator = self.generator(&entry.generator);
            if generator.is_none() {
                error!(
                    "node {}: generator '{}' not found, using the empty generator",
                    entry.id, entry.generator
                );
            }
            let node = self.new_node_with_id(requested, generator);
            if !entry.name.is_empty() {
                node.set_name(&entry.name);
            }
            node.set_settings(entry.settings.clone());
            remap.insert(entry.id, node.id());
            loaded.push((entry, node));
        }

        // Generators are in place, so slot counts are known before wiring.
        for (entry, node) in &loaded {
            for link in &entry.sources {
                let source = remap.get(&link.source).copied().unwrap_or(link.source);
                if let Err(err) = node.set_source_slot(SlotIndex::At(link.slot), Some(source)) {
                    error!("node {}: cannot restore slot {}: {}", node.id(), link.slot, err);
                }
            }
        }

        info!("loaded {} nodes", loaded.len());
        loaded.into_iter().map(|(_, node)| node.id()).collect()
    }
}
