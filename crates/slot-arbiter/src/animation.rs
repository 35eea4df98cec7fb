//! Animation runner - timed opacity transitions on the surface.
//!
//! `animate` returns once the transition has finished. Because the arbiter
//! awaits it on the serialization context, the continuation after the await
//! is the completion callback, and nothing else touches the slot meanwhile.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::ArbiterConfig;
use crate::surface::Surface;

/// Opacity transition from one visual weight to another.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fade {
    pub from: f32,
    pub to: f32,
}

impl Fade {
    pub const IN: Fade = Fade { from: 0.0, to: 1.0 };
    pub const OUT: Fade = Fade { from: 1.0, to: 0.0 };

    pub fn new(from: f32, to: f32) -> Self {
        Self { from, to }
    }

    /// Linear interpolation at `progress` in [0, 1].
    pub fn at(&self, progress: f32) -> f32 {
        let t = progress.clamp(0.0, 1.0);
        self.from + (self.to - self.from) * t
    }
}

/// Runs a timed transition on a surface.
#[async_trait]
pub trait Animator: Send + Sync {
    /// Drive `surface` through `fade` over `duration`. The surface must end at
    /// `fade.to` when this returns.
    async fn animate(&self, surface: &mut dyn Surface, fade: Fade, duration: Duration);
}

/// Steps opacity on a fixed frame interval using the tokio clock.
#[derive(Debug, Clone)]
pub struct TimedAnimator {
    frame_interval: Duration,
}

impl TimedAnimator {
    pub fn new(frame_interval: Duration) -> Self {
        Self {
            frame_interval: frame_interval.max(Duration::from_millis(1)),
        }
    }

    pub fn from_config(config: &ArbiterConfig) -> Self {
        Self::new(config.frame_interval())
    }
}

impl Default for TimedAnimator {
    fn default() -> Self {
        Self::from_config(&ArbiterConfig::default())
    }
}

#[async_trait]
impl Animator for TimedAnimator {
    async fn animate(&self, surface: &mut dyn Surface, fade: Fade, duration: Duration) {
        if duration.is_zero() {
            surface.set_opacity(fade.to);
            return;
        }

        tracing::trace!(?fade, ?duration, "Animation started");
        surface.set_opacity(fade.from);

        let start = Instant::now();
        let mut frames = tokio::time::interval(self.frame_interval);
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // First tick completes immediately.
        frames.tick().await;
        loop {
            frames.tick().await;
            let elapsed = start.elapsed();
            if elapsed >= duration {
                break;
            }
            surface.set_opacity(fade.at(elapsed.as_secs_f32() / duration.as_secs_f32()));
        }

        surface.set_opacity(fade.to);
        tracing::trace!(elapsed = ?start.elapsed(), "Animation finished");
    }
}

/// Jumps straight to the end state.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstantAnimator;

#[async_trait]
impl Animator for InstantAnimator {
    async fn animate(&self, surface: &mut dyn Surface, fade: Fade, _duration: Duration) {
        surface.set_opacity(fade.to);
    }
}
