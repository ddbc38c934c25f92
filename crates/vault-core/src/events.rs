use crate::types::{EntityId, ExposureCode, Relationship, RelationshipId, RetentionTier};
use serde::Serialize;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, RwLock};

/// Mutations observable by collaborators
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum VaultEvent {
    #[serde(rename = "relationship.created")]
    RelationshipCreated { relationship: Relationship },

    #[serde(rename = "relationship.removed")]
    RelationshipRemoved {
        id: RelationshipId,
        source: EntityId,
        target: EntityId,
    },

    #[serde(rename = "tier.changed")]
    TierChanged {
        entity_id: EntityId,
        from: RetentionTier,
        to: RetentionTier,
        exposure: ExposureCode,
    },

    #[serde(rename = "entity.indexed")]
    EntityIndexed {
        entity_id: EntityId,
        exposure: ExposureCode,
    },

    #[serde(rename = "entity.removed")]
    EntityRemoved { entity_id: EntityId },
}

impl VaultEvent {
    pub fn name(&self) -> &'static str {
        match self {
            VaultEvent::RelationshipCreated { .. } => "relationship.created",
            VaultEvent::RelationshipRemoved { .. } => "relationship.removed",
            VaultEvent::TierChanged { .. } => "tier.changed",
            VaultEvent::EntityIndexed { .. } => "entity.indexed",
            VaultEvent::EntityRemoved { .. } => "entity.removed",
        }
    }

    pub(crate) fn relationship_removed(relationship: &Relationship) -> Self {
        VaultEvent::RelationshipRemoved {
            id: relationship.id,
            source: relationship.source.clone(),
            target: relationship.target.clone(),
        }
    }
}

/// Receives vault events. Called synchronously after the mutation has
/// been applied and its locks released, so an observer may call back
/// into the vault. Implementations should return quickly.
pub trait VaultObserver: Send + Sync {
    fn on_event(&self, event: &VaultEvent);
}

/// Forwards events into a channel.
pub struct ChannelObserver {
    tx: Sender<VaultEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, Receiver<VaultEvent>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }
}

impl VaultObserver for ChannelObserver {
    fn on_event(&self, event: &VaultEvent) {
        // Receiver gone: nobody is listening any more
        let _ = self.tx.send(event.clone());
    }
}

/// Fan-out to registered observers.
#[derive(Default)]
pub struct EventBus {
    observers: RwLock<Vec<Arc<dyn VaultObserver>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, observer: Box<dyn VaultObserver>) {
        match self.observers.write() {
            Ok(mut observers) => observers.push(Arc::from(observer)),
            Err(_) => log::warn!("Event bus lock poisoned, observer not registered"),
        }
    }

    /// Deliver to a snapshot of the observers, so one subscribing from
    /// inside a callback does not block on the registry.
    pub fn emit(&self, event: VaultEvent) {
        log::debug!("event {}", event.name());
        let observers: Vec<Arc<dyn VaultObserver>> = match self.observers.read() {
            Ok(observers) => observers.clone(),
            Err(_) => {
                log::warn!("Event bus lock poisoned, dropped {}", event.name());
                return;
            }
        };
        for observer in &observers {
            observer.on_event(&event);
        }
    }
}
