//! Project notifications.
//!
//! Observers (render workers, persistence, a UI) subscribe to an [`EventBus`]
//! and receive every [`ProjectEvent`] over their own channel.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};

use log::trace;

use crate::model::ImageSize;
use crate::project::NodeId;
use crate::util::sync::lock;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProjectEvent {
    NodeAdded(NodeId),
    NodeRemoved(NodeId),
    NodesConnected {
        source: NodeId,
        receiver: NodeId,
        slot: usize,
    },
    NodesDisconnected {
        source: NodeId,
        receiver: NodeId,
        slot: usize,
    },
    SlotsUpdated(NodeId),
    SettingsUpdated(NodeId),
    GeneratorUpdated(NodeId),
    NodeRenamed(NodeId),
    /// The node's cached images were invalidated.
    ImageUpdated(NodeId),
    ImageAvailable {
        node: NodeId,
        size: ImageSize,
    },
    GeneratorAdded(String),
    GeneratorRemoved(String),
    /// A generator with this name is already registered; the registry was left unchanged.
    GeneratorNameCollision {
        name: String,
    },
    NameUpdated(String),
}

impl ProjectEvent {
    /// Events after which a render worker has to look for work again.
    pub fn is_dirty(&self) -> bool {
        matches!(
            self,
            ProjectEvent::NodeAdded(_) | ProjectEvent::NodeRemoved(_) | ProjectEvent::ImageUpdated(_)
        )
    }

    /// Events that change persisted project state.
    pub fn marks_modified(&self) -> bool {
        !matches!(
            self,
            ProjectEvent::ImageAvailable { .. }
                | ProjectEvent::GeneratorAdded(_)
                | ProjectEvent::GeneratorRemoved(_)
                | ProjectEvent::GeneratorNameCollision { .. }
        )
    }
}

pub type SubscriptionId = u64;

/// Receiving end handed out by [`EventBus::subscribe`].
pub struct Subscription {
    id: SubscriptionId,
    receiver: Receiver<ProjectEvent>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn receiver(&self) -> &Receiver<ProjectEvent> {
        &self.receiver
    }

    pub fn into_parts(self) -> (SubscriptionId, Receiver<ProjectEvent>) {
        (self.id, self.receiver)
    }

    /// Everything queued so far, without blocking.
    pub fn drain(&self) -> Vec<ProjectEvent> {
        self.receiver.try_iter().collect()
    }
}

struct Subscriber {
    id: SubscriptionId,
    sender: Sender<ProjectEvent>,
}

#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel();
        lock(&self.subscribers).push(Subscriber { id, sender });
        Subscription { id, receiver }
    }

    /// Drops the sending side, which ends a blocking `recv` on the receiver.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = lock(&self.subscribers);
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).len()
    }

    pub fn emit(&self, event: ProjectEvent) {
        trace!("event {:?}", event);
        lock(&self.subscribers).retain(|s| s.sender.send(event.clone()).is_ok());
    }
}
