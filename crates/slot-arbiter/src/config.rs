//! Runtime configuration for the arbiter and its animation runner.

use std::time::Duration;

const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(16);
const MIN_FRAME_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, PartialEq)]
pub struct ArbiterConfig {
    /// Multiplier applied to every animation duration. 0 makes animated
    /// transitions complete immediately. Always finite and non-negative.
    animation_scale: f64,
    /// Step between animation frames for `TimedAnimator`.
    frame_interval: Duration,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            animation_scale: parse_animation_scale(
                std::env::var("ARBITER_ANIMATION_SCALE").ok().as_deref(),
            ),
            frame_interval: parse_frame_interval(
                std::env::var("ARBITER_FRAME_INTERVAL_MS").ok().as_deref(),
            ),
        }
    }
}

impl ArbiterConfig {
    pub fn with_animation_scale(mut self, scale: f64) -> Self {
        self.animation_scale = sanitize_scale(scale);
        self
    }

    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval.max(MIN_FRAME_INTERVAL);
        self
    }

    pub fn animation_scale(&self) -> f64 {
        self.animation_scale
    }

    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    /// Apply `animation_scale` to an entity's animation duration.
    ///
    /// Saturates at `Duration::MAX` when the product does not fit.
    pub fn scaled(&self, duration: Duration) -> Duration {
        Duration::try_from_secs_f64(duration.as_secs_f64() * self.animation_scale)
            .unwrap_or(Duration::MAX)
    }
}

fn sanitize_scale(scale: f64) -> f64 {
    if scale.is_finite() && scale >= 0.0 {
        scale
    } else {
        tracing::warn!(scale, "Invalid animation scale, using 1.0");
        1.0
    }
}

fn parse_animation_scale(raw: Option<&str>) -> f64 {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .map(sanitize_scale)
        .unwrap_or(1.0)
}

fn parse_frame_interval(raw: Option<&str>) -> Duration {
    raw.and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
        .map(|d| d.max(MIN_FRAME_INTERVAL))
        .unwrap_or(DEFAULT_FRAME_INTERVAL)
}
