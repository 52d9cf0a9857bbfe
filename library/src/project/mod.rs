pub mod document;
pub mod events;
pub mod node;
#[allow(clippy::module_inception)]
pub mod project;

pub use self::document::{NodeDocument, ProjectDocument, SourceLink};
pub use self::events::{EventBus, ProjectEvent, Subscription, SubscriptionId};
pub use self::node::Node;
pub use self::project::Project;

/// Stable node id, unique within a project. Ids start at 1.
pub type NodeId = u32;

/// Target of a source assignment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SlotIndex {
    /// The first slot that is currently empty.
    Any,
    At(usize),
}

impl From<usize> for SlotIndex {
    fn from(slot: usize) -> Self {
        SlotIndex::At(slot)
    }
}
