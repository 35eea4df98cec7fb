//! Presentation status of an entity relative to the slot.

use serde::{Deserialize, Serialize};

/// Where an entity currently stands. Derived from the slot, never stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentationStatus {
    /// Currently the occupant.
    Presented,
    /// Queued in the waiting set.
    Waiting,
    /// Neither presented nor queued.
    #[default]
    Detached,
}

impl PresentationStatus {
    pub fn is_presented(&self) -> bool {
        matches!(self, Self::Presented)
    }

    pub fn is_waiting(&self) -> bool {
        matches!(self, Self::Waiting)
    }

    /// Presented or waiting: the arbiter holds a reference to the entity.
    pub fn is_attached(&self) -> bool {
        !matches!(self, Self::Detached)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Presented => "presented",
            Self::Waiting => "waiting",
            Self::Detached => "detached",
        }
    }
}

impl std::fmt::Display for PresentationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
