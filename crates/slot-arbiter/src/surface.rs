//! Surface adapter - the visual container that shows the occupant.
//!
//! Rendering lives outside this crate. The arbiter drives a `Surface` and
//! never inspects what it draws. `HeadlessSurface` records what it was told,
//! for tests and for running without a display.

use std::sync::{Arc, Mutex};

use crate::presentable::{Presentable, PresentableId};

/// Visual container driven by the arbiter.
///
/// All calls happen on the serialization context, one at a time.
pub trait Surface: Send {
    /// Assign `entity` as the content and make the surface visible.
    fn show(&mut self, entity: &Arc<dyn Presentable>);

    /// Hide the surface and drop its content.
    fn hide(&mut self);

    fn is_showing(&self) -> bool;

    /// Visual weight from 0.0 (transparent) to 1.0 (opaque).
    fn set_opacity(&mut self, opacity: f32);

    fn claim_focus(&mut self) {}

    fn release_focus(&mut self) {}
}

/// Something the headless surface was told to do.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SurfaceEvent {
    Shown(PresentableId),
    Hidden,
    FocusClaimed,
    FocusReleased,
}

#[derive(Debug, Default)]
struct SurfaceState {
    content: Option<PresentableId>,
    showing: bool,
    opacity: f32,
    focused: bool,
    opacity_updates: usize,
    events: Vec<SurfaceEvent>,
}

/// Surface without a display that records its state.
///
/// Clones share state, so a test can hand one clone to the arbiter and keep
/// another to inspect.
#[derive(Debug, Clone, Default)]
pub struct HeadlessSurface {
    state: Arc<Mutex<SurfaceState>>,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut SurfaceState) -> T) -> T {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("Headless surface mutex poisoned - recovering state");
                poisoned.into_inner()
            }
        };
        f(&mut guard)
    }

    pub fn content(&self) -> Option<PresentableId> {
        self.with_state(|s| s.content)
    }

    pub fn opacity(&self) -> f32 {
        self.with_state(|s| s.opacity)
    }

    pub fn is_focused(&self) -> bool {
        self.with_state(|s| s.focused)
    }

    /// Number of `set_opacity` calls so far, frames included.
    pub fn opacity_updates(&self) -> usize {
        self.with_state(|s| s.opacity_updates)
    }

    pub fn events(&self) -> Vec<SurfaceEvent> {
        self.with_state(|s| s.events.clone())
    }
}

impl Surface for HeadlessSurface {
    fn show(&mut self, entity: &Arc<dyn Presentable>) {
        let id = entity.id();
        self.with_state(|s| {
            s.content = Some(id);
            s.showing = true;
            s.events.push(SurfaceEvent::Shown(id));
        });
    }

    fn hide(&mut self) {
        self.with_state(|s| {
            s.content = None;
            s.showing = false;
            s.events.push(SurfaceEvent::Hidden);
        });
    }

    fn is_showing(&self) -> bool {
        self.with_state(|s| s.showing)
    }

    fn set_opacity(&mut self, opacity: f32) {
        self.with_state(|s| {
            s.opacity = opacity.clamp(0.0, 1.0);
            s.opacity_updates += 1;
        });
    }

    fn claim_focus(&mut self) {
        self.with_state(|s| {
            if !s.focused {
                s.focused = true;
                s.events.push(SurfaceEvent::FocusClaimed);
            }
        });
    }

    fn release_focus(&mut self) {
        self.with_state(|s| {
            if s.focused {
                s.focused = false;
                s.events.push(SurfaceEvent::FocusReleased);
            }
        });
    }
}
