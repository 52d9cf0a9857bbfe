use thiserror::Error;

use crate::project::NodeId;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("TOML parsing error: {0}")]
    TomlDe(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Project error: {0}")]
    Project(String),
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Runtime error: {0}")]
    Runtime(String),
}

/// Reasons a source slot assignment is refused.
///
/// Every variant leaves the graph exactly as it was before the call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("slot {slot} is out of range for node {node} ({count} slots)")]
    InvalidSlot {
        node: NodeId,
        slot: usize,
        count: usize,
    },
    #[error("node {0} cannot be its own source")]
    SelfConnection(NodeId),
    #[error("node {0} has no free source slot")]
    NoFreeSlot(NodeId),
    #[error("source node {0} does not exist")]
    UnknownSource(NodeId),
    #[error("connecting node {upstream} to node {receiver} would create a cycle")]
    WouldCreateCycle { upstream: NodeId, receiver: NodeId },
    #[error("node {0} no longer belongs to a project")]
    Detached(NodeId),
}
