//! slot-arbiter: priority arbitration of a single exclusive presentation slot.

mod status;

pub mod animation;
pub mod arbiter;
pub mod config;
pub mod presentable;
pub mod slot;
pub mod surface;
pub mod worker;

pub use animation::{Animator, Fade, InstantAnimator, TimedAnimator};
pub use arbiter::Arbiter;
pub use config::ArbiterConfig;
pub use presentable::{DEFAULT_ANIMATION_DURATION, Modal, Presentable, PresentableId, Priority};
pub use slot::{EntrySnapshot, PresentationSlot, SlotSnapshot};
pub use status::PresentationStatus;
pub use surface::{HeadlessSurface, Surface, SurfaceEvent};
pub use worker::{ArbiterError, ArbiterHandle, ArbiterWorker, Completion};
