//! PresentationSlot - the occupant and the waiting set.
//!
//! Pure state holder. Only the arbiter mutates it, and only from the
//! serialization context.
//!
//! Invariants kept after every call:
//! - at most one occupant
//! - an id in `waiting` is never the occupant and appears there at most once
//! - `waiting` keeps arrival order; promotion picks by priority, not position

use std::sync::Arc;

use serde::Serialize;

use crate::presentable::{Presentable, PresentableId, Priority};
use crate::status::PresentationStatus;

/// Holds the occupant and the waiting entities, in arrival order.
#[derive(Debug, Default)]
pub struct PresentationSlot {
    occupant: Option<Arc<dyn Presentable>>,
    waiting: Vec<Arc<dyn Presentable>>,
}

impl PresentationSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn occupant(&self) -> Option<&Arc<dyn Presentable>> {
        self.occupant.as_ref()
    }

    pub fn is_occupant(&self, id: PresentableId) -> bool {
        self.occupant.as_ref().is_some_and(|o| o.id() == id)
    }

    /// Waiting entities in arrival order.
    pub fn waiting(&self) -> &[Arc<dyn Presentable>] {
        &self.waiting
    }

    pub fn is_waiting(&self, id: PresentableId) -> bool {
        self.waiting.iter().any(|w| w.id() == id)
    }

    pub fn is_empty(&self) -> bool {
        self.occupant.is_none() && self.waiting.is_empty()
    }

    /// Replace the occupant, returning the previous one.
    ///
    /// A new occupant is dropped from the waiting set so it is never in both.
    pub fn set_occupant(
        &mut self,
        entity: Option<Arc<dyn Presentable>>,
    ) -> Option<Arc<dyn Presentable>> {
        if let Some(ref entity) = entity
            && self.remove_from_waiting(entity.id()).is_some()
        {
            tracing::debug!(entity = %entity.id(), "Occupant taken from waiting set");
        }
        std::mem::replace(&mut self.occupant, entity)
    }

    /// Append to the waiting set.
    ///
    /// Returns `false` without changes if the entity is already waiting (it
    /// keeps its original arrival position) or is the occupant.
    pub fn add_to_waiting(&mut self, entity: Arc<dyn Presentable>) -> bool {
        let id = entity.id();
        if self.is_occupant(id) {
            debug_assert!(false, "occupant cannot also wait");
            tracing::error!(entity = %id, "Bug: attempted to enqueue the occupant");
            return false;
        }
        if self.is_waiting(id) {
            tracing::debug!(entity = %id, "Already waiting, keeping arrival position");
            return false;
        }
        self.waiting.push(entity);
        true
    }

    /// Remove from the waiting set. Missing ids are a no-op.
    pub fn remove_from_waiting(&mut self, id: PresentableId) -> Option<Arc<dyn Presentable>> {
        let index = self.waiting.iter().position(|w| w.id() == id)?;
        Some(self.waiting.remove(index))
    }

    /// Remove and return the waiting entity with the highest priority.
    ///
    /// Ties go to the entity that arrived first.
    pub fn pop_highest_priority_waiting(&mut self) -> Option<Arc<dyn Presentable>> {
        let mut best: Option<(usize, Priority)> = None;
        for (index, entity) in self.waiting.iter().enumerate() {
            let priority = entity.priority();
            let better = match best {
                None => true,
                Some((_, current)) => priority.total_cmp(&current).is_gt(),
            };
            if better {
                best = Some((index, priority));
            }
        }
        let (index, _) = best?;
        Some(self.waiting.remove(index))
    }

    pub fn status(&self, id: PresentableId) -> PresentationStatus {
        if self.is_occupant(id) {
            PresentationStatus::Presented
        } else if self.is_waiting(id) {
            PresentationStatus::Waiting
        } else {
            PresentationStatus::Detached
        }
    }

    pub fn snapshot(&self) -> SlotSnapshot {
        SlotSnapshot {
            occupant: self.occupant.as_deref().map(EntrySnapshot::of),
            waiting: self
                .waiting
                .iter()
                .map(|w| EntrySnapshot::of(w.as_ref()))
                .collect(),
        }
    }
}

/// Serializable view of one entity in the slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntrySnapshot {
    pub id: PresentableId,
    pub priority: Priority,
    pub dismissible: bool,
}

impl EntrySnapshot {
    fn of(entity: &dyn Presentable) -> Self {
        Self {
            id: entity.id(),
            priority: entity.priority(),
            dismissible: entity.dismissible(),
        }
    }
}

/// Point-in-time view of the slot for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SlotSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occupant: Option<EntrySnapshot>,
    pub waiting: Vec<EntrySnapshot>,
}

impl SlotSnapshot {
    pub fn occupant_id(&self) -> Option<PresentableId> {
        self.occupant.as_ref().map(|o| o.id)
    }

    pub fn waiting_ids(&self) -> Vec<PresentableId> {
        self.waiting.iter().map(|w| w.id).collect()
    }
}
