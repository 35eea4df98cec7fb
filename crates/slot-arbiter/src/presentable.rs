//! Capability contract for entities competing for the presentation slot.
//!
//! Only `id()` is required. Every other capability has a default so simple
//! entities implement one method; `Modal` is a ready-made configurable entity.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Animation duration used when an entity does not override it.
pub const DEFAULT_ANIMATION_DURATION: Duration = Duration::from_millis(200);

/// Unique identifier for a presentable entity.
///
/// Identity is decoupled from where the entity lives: two handles to the same
/// entity compare equal, two entities with equal fields do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PresentableId(uuid::Uuid);

impl PresentableId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }

    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        let uuid = uuid::Uuid::parse_str(s)?;
        Ok(Self(uuid))
    }
}

impl Default for PresentableId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PresentableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Presentation priority. Higher is more important.
///
/// Any value is legal; the named levels are conventions. Comparison uses the
/// IEEE-754 total order so NaN values still sort deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Priority(f32);

impl Priority {
    pub const LOW: Priority = Priority(250.0);
    pub const REQUIRED: Priority = Priority(500.0);
    pub const HIGH: Priority = Priority(750.0);

    pub const fn new(value: f32) -> Self {
        Self(value)
    }

    pub const fn value(self) -> f32 {
        self.0
    }

    pub fn total_cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::REQUIRED
    }
}

impl From<f32> for Priority {
    fn from(value: f32) -> Self {
        Self(value)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An entity that wants temporary exclusive occupancy of the slot.
///
/// The arbiter only reads these properties; it never owns the entity.
pub trait Presentable: Send + Sync + fmt::Debug {
    fn id(&self) -> PresentableId;

    fn priority(&self) -> Priority {
        Priority::REQUIRED
    }

    /// Whether a newcomer may force this entity out while it is the occupant.
    fn dismissible(&self) -> bool {
        false
    }

    fn animation_duration(&self) -> Duration {
        DEFAULT_ANIMATION_DURATION
    }

    /// Whether becoming occupant should also claim input focus.
    fn requests_focus(&self) -> bool {
        false
    }
}

/// Configurable presentable with builder-style setters.
///
/// `dismissible` can be toggled while the modal is presented.
#[derive(Debug)]
pub struct Modal {
    id: PresentableId,
    name: String,
    priority: Priority,
    dismissible: AtomicBool,
    animation_duration: Duration,
    requests_focus: bool,
}

impl Modal {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: PresentableId::new(),
            name: name.into(),
            priority: Priority::REQUIRED,
            dismissible: AtomicBool::new(false),
            animation_duration: DEFAULT_ANIMATION_DURATION,
            requests_focus: false,
        }
    }

    pub fn with_id(mut self, id: PresentableId) -> Self {
        self.id = id;
        self
    }

    pub fn with_priority(mut self, priority: impl Into<Priority>) -> Self {
        self.priority = priority.into();
        self
    }

    pub fn with_dismissible(self, dismissible: bool) -> Self {
        self.dismissible.store(dismissible, Ordering::Release);
        self
    }

    pub fn with_animation_duration(mut self, duration: Duration) -> Self {
        self.animation_duration = duration;
        self
    }

    pub fn requesting_focus(mut self) -> Self {
        self.requests_focus = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_dismissible(&self, dismissible: bool) {
        self.dismissible.store(dismissible, Ordering::Release);
    }
}

impl Presentable for Modal {
    fn id(&self) -> PresentableId {
        self.id
    }

    fn priority(&self) -> Priority {
        self.priority
    }

    fn dismissible(&self) -> bool {
        self.dismissible.load(Ordering::Acquire)
    }

    fn animation_duration(&self) -> Duration {
        self.animation_duration
    }

    fn requests_focus(&self) -> bool {
        self.requests_focus
    }
}
