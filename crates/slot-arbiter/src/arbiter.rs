//! Arbiter - the scheduling policy over a `PresentationSlot`.
//!
//! Operations take `&mut self`: holding the arbiter means running on the
//! serialization context, so every call here executes in place. Use
//! `ArbiterWorker` to share one arbiter across tasks.
//!
//! Flow:
//! 1. `present` into an empty slot occupies it directly
//! 2. `present` into an occupied slot enqueues, then preempts a dismissible occupant
//! 3. `withdraw` of the occupant hides it and promotes the best waiting entity
//! 4. `replace` swaps the occupant without consulting `dismissible`
//!
//! Each operation resolves with the target entity's status once its
//! transitions, including any promotion it triggered, have finished.

use std::sync::Arc;

use crate::animation::{Animator, Fade};
use crate::config::ArbiterConfig;
use crate::presentable::{Presentable, PresentableId};
use crate::slot::{PresentationSlot, SlotSnapshot};
use crate::status::PresentationStatus;
use crate::surface::Surface;

pub struct Arbiter {
    slot: PresentationSlot,
    surface: Box<dyn Surface>,
    animator: Arc<dyn Animator>,
    config: ArbiterConfig,
}

impl Arbiter {
    pub fn new(surface: impl Surface + 'static, animator: impl Animator + 'static) -> Self {
        Self {
            slot: PresentationSlot::new(),
            surface: Box::new(surface),
            animator: Arc::new(animator),
            config: ArbiterConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ArbiterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ArbiterConfig {
        &self.config
    }

    pub fn slot(&self) -> &PresentationSlot {
        &self.slot
    }

    pub fn status(&self, id: PresentableId) -> PresentationStatus {
        self.slot.status(id)
    }

    pub fn snapshot(&self) -> SlotSnapshot {
        self.slot.snapshot()
    }

    /// Request that `entity` become the occupant.
    ///
    /// Resolves with `Presented` or `Waiting`, never `Detached`.
    pub async fn present(
        &mut self,
        entity: Arc<dyn Presentable>,
        animated: bool,
    ) -> PresentationStatus {
        let id = entity.id();
        let Some(current) = self.slot.occupant().cloned() else {
            self.occupy(entity, animated).await;
            return self.slot.status(id);
        };

        if current.id() == id {
            tracing::debug!(entity = %id, "Already presented");
            return PresentationStatus::Presented;
        }

        let priority = entity.priority();
        if self.slot.add_to_waiting(entity) {
            tracing::debug!(entity = %id, %priority, occupant = %current.id(), "Queued behind occupant");
        }

        if current.dismissible() {
            tracing::info!(
                entity = %id,
                occupant = %current.id(),
                "Occupant is dismissible, withdrawing it"
            );
            self.withdraw_occupant(animated).await;
        }

        self.slot.status(id)
    }

    /// Request that `id` stop being the occupant or leave the waiting set.
    ///
    /// Withdrawing the occupant promotes the highest-priority waiting entity
    /// and resolves after it has transitioned in. Withdrawing a waiting or
    /// unknown entity resolves immediately. Always resolves `Detached`.
    pub async fn withdraw(&mut self, id: PresentableId, animated: bool) -> PresentationStatus {
        if self.slot.is_occupant(id) {
            self.withdraw_occupant(animated).await;
        } else if self.slot.remove_from_waiting(id).is_some() {
            tracing::debug!(entity = %id, "Removed from waiting set");
        } else {
            tracing::debug!(entity = %id, "Withdraw of detached entity ignored");
        }
        self.slot.status(id)
    }

    /// Swap the occupant for `with`, ignoring `dismissible`.
    ///
    /// The caller has already agreed with `occupant` that it steps aside.
    /// Waiting entities other than `with` are left untouched.
    pub async fn replace(
        &mut self,
        occupant: PresentableId,
        with: Arc<dyn Presentable>,
        animated: bool,
    ) -> PresentationStatus {
        let id = with.id();
        let previous = self.slot.set_occupant(Some(Arc::clone(&with)));

        match previous {
            Some(ref p) if p.id() != occupant => tracing::warn!(
                expected = %occupant,
                actual = %p.id(),
                "Replacing an occupant other than the one named"
            ),
            None => tracing::warn!(expected = %occupant, "Replacing into an empty slot"),
            _ => {}
        }

        if let Some(previous) = previous
            && previous.id() != id
            && previous.requests_focus()
        {
            self.surface.release_focus();
        }

        tracing::info!(entity = %id, replaced = %occupant, animated, "Replacing occupant");
        let from = if self.surface.is_showing() { 1.0 } else { 0.0 };
        self.surface.show(&with);
        if animated {
            let duration = self.config.scaled(with.animation_duration());
            self.animator
                .animate(self.surface.as_mut(), Fade::new(from, 1.0), duration)
                .await;
        } else {
            self.surface.set_opacity(1.0);
        }
        if with.requests_focus() {
            self.surface.claim_focus();
        }

        self.slot.status(id)
    }

    /// Occupy an empty slot with `entity`.
    async fn occupy(&mut self, entity: Arc<dyn Presentable>, animated: bool) {
        debug_assert!(self.slot.occupant().is_none(), "occupy requires an empty slot");
        let id = entity.id();
        tracing::info!(entity = %id, priority = %entity.priority(), animated, "Presenting");

        self.slot.set_occupant(Some(Arc::clone(&entity)));
        if animated {
            self.surface.set_opacity(0.0);
            self.surface.show(&entity);
            let duration = self.config.scaled(entity.animation_duration());
            self.animator
                .animate(self.surface.as_mut(), Fade::IN, duration)
                .await;
        } else {
            self.surface.set_opacity(1.0);
            self.surface.show(&entity);
        }

        if entity.requests_focus() {
            self.surface.claim_focus();
        }
    }

    /// Hide the occupant, then promote the best waiting entity if any.
    async fn withdraw_occupant(&mut self, animated: bool) {
        let Some(occupant) = self.slot.occupant().cloned() else {
            return;
        };
        let id = occupant.id();
        tracing::info!(entity = %id, animated, "Withdrawing occupant");

        if animated {
            let duration = self.config.scaled(occupant.animation_duration());
            self.animator
                .animate(self.surface.as_mut(), Fade::OUT, duration)
                .await;
        } else {
            self.surface.set_opacity(0.0);
        }
        self.surface.hide();
        if occupant.requests_focus() {
            self.surface.release_focus();
        }
        self.slot.set_occupant(None);

        match self.slot.pop_highest_priority_waiting() {
            Some(next) => {
                tracing::debug!(entity = %next.id(), priority = %next.priority(), "Promoting waiting entity");
                self.occupy(next, animated).await;
            }
            None => tracing::debug!("Nothing waiting, slot left empty"),
        }
    }
}

impl std::fmt::Debug for Arbiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arbiter")
            .field("slot", &self.slot)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::{InstantAnimator, TimedAnimator};
    use crate::presentable::{Modal, Priority};
    use crate::surface::{HeadlessSurface, SurfaceEvent};
    use std::time::Duration;
    use tokio::time::Instant;

    fn arbiter() -> (Arbiter, HeadlessSurface) {
        let probe = HeadlessSurface::new();
        let config = ArbiterConfig::default().with_animation_scale(1.0);
        let arbiter = Arbiter::new(probe.clone(), InstantAnimator).with_config(config);
        (arbiter, probe)
    }

    fn timed_arbiter() -> (Arbiter, HeadlessSurface) {
        let probe = HeadlessSurface::new();
        let config = ArbiterConfig::default()
            .with_animation_scale(1.0)
            .with_frame_interval(Duration::from_millis(10));
        let animator = TimedAnimator::from_config(&config);
        let arbiter = Arbiter::new(probe.clone(), animator).with_config(config);
        (arbiter, probe)
    }

    fn modal(name: &str, priority: Priority) -> Arc<Modal> {
        Arc::new(Modal::new(name).with_priority(priority))
    }

    fn waiting_ids(arbiter: &Arbiter) -> Vec<PresentableId> {
        arbiter.slot().waiting().iter().map(|w| w.id()).collect()
    }

    #[tokio::test]
    async fn present_into_empty_slot_occupies() {
        let (mut arbiter, probe) = arbiter();
        let a = modal("a", Priority::REQUIRED);

        let status = arbiter.present(a.clone(), false).await;

        assert_eq!(status, PresentationStatus::Presented);
        assert_eq!(arbiter.status(a.id()), PresentationStatus::Presented);
        assert!(probe.is_showing());
        assert_eq!(probe.content(), Some(a.id()));
        assert_eq!(probe.opacity(), 1.0);
    }

    #[tokio::test]
    async fn present_behind_non_dismissible_occupant_waits() {
        let (mut arbiter, probe) = arbiter();
        let a = modal("a", Priority::LOW);
        let b = modal("b", Priority::HIGH);

        arbiter.present(a.clone(), false).await;
        let status = arbiter.present(b.clone(), false).await;

        assert_eq!(status, PresentationStatus::Waiting);
        assert_eq!(arbiter.status(a.id()), PresentationStatus::Presented);
        assert_eq!(probe.content(), Some(a.id()));
    }

    #[tokio::test]
    async fn present_preempts_dismissible_occupant() {
        let (mut arbiter, probe) = arbiter();
        let a = Arc::new(Modal::new("a").with_dismissible(true));
        let b = modal("b", Priority::REQUIRED);

        arbiter.present(a.clone(), false).await;
        let status = arbiter.present(b.clone(), false).await;

        assert_eq!(status, PresentationStatus::Presented);
        assert_eq!(arbiter.status(a.id()), PresentationStatus::Detached);
        assert_eq!(probe.content(), Some(b.id()));
        assert!(arbiter.slot().waiting().is_empty());
    }

    #[tokio::test]
    async fn preemption_promotes_best_waiting_not_newcomer() {
        let (mut arbiter, probe) = arbiter();
        let occupant = modal("occupant", Priority::REQUIRED);
        let urgent = modal("urgent", Priority::HIGH);
        let newcomer = modal("newcomer", Priority::LOW);

        arbiter.present(occupant.clone(), false).await;
        arbiter.present(urgent.clone(), false).await;
        occupant.set_dismissible(true);

        let status = arbiter.present(newcomer.clone(), false).await;

        assert_eq!(status, PresentationStatus::Waiting);
        assert_eq!(arbiter.status(urgent.id()), PresentationStatus::Presented);
        assert_eq!(arbiter.status(occupant.id()), PresentationStatus::Detached);
        assert_eq!(probe.content(), Some(urgent.id()));
        assert_eq!(waiting_ids(&arbiter), vec![newcomer.id()]);
    }

    #[tokio::test]
    async fn present_of_current_occupant_is_noop() {
        let (mut arbiter, probe) = arbiter();
        let a = Arc::new(Modal::new("a").with_dismissible(true));

        arbiter.present(a.clone(), false).await;
        let status = arbiter.present(a.clone(), false).await;

        assert_eq!(status, PresentationStatus::Presented);
        assert!(arbiter.slot().waiting().is_empty());
        assert_eq!(probe.events(), vec![SurfaceEvent::Shown(a.id())]);
    }

    #[tokio::test]
    async fn present_twice_while_waiting_keeps_single_entry() {
        let (mut arbiter, _probe) = arbiter();
        let a = modal("a", Priority::REQUIRED);
        let b = modal("b", Priority::LOW);
        let c = modal("c", Priority::LOW);

        arbiter.present(a.clone(), false).await;
        arbiter.present(b.clone(), false).await;
        arbiter.present(c.clone(), false).await;
        arbiter.present(b.clone(), false).await;

        assert_eq!(waiting_ids(&arbiter), vec![b.id(), c.id()]);
    }

    #[tokio::test]
    async fn withdraw_occupant_promotes_highest_priority() {
        let (mut arbiter, probe) = arbiter();
        let a = modal("a", Priority::REQUIRED);
        let low = modal("low", Priority::LOW);
        let high = modal("high", Priority::HIGH);
        let mid = modal("mid", Priority::REQUIRED);

        arbiter.present(a.clone(), false).await;
        arbiter.present(low.clone(), false).await;
        arbiter.present(high.clone(), false).await;
        arbiter.present(mid.clone(), false).await;

        let status = arbiter.withdraw(a.id(), false).await;

        assert_eq!(status, PresentationStatus::Detached);
        assert_eq!(arbiter.status(high.id()), PresentationStatus::Presented);
        assert_eq!(arbiter.status(low.id()), PresentationStatus::Waiting);
        assert_eq!(arbiter.status(mid.id()), PresentationStatus::Waiting);
        assert_eq!(probe.content(), Some(high.id()));
    }

    #[tokio::test]
    async fn withdraw_with_equal_priorities_promotes_earliest() {
        let (mut arbiter, _probe) = arbiter();
        let a = modal("a", Priority::REQUIRED);
        let first = modal("first", Priority::REQUIRED);
        let second = modal("second", Priority::REQUIRED);

        arbiter.present(a.clone(), false).await;
        arbiter.present(first.clone(), false).await;
        arbiter.present(second.clone(), false).await;
        arbiter.withdraw(a.id(), false).await;

        assert_eq!(arbiter.status(first.id()), PresentationStatus::Presented);
        assert_eq!(arbiter.status(second.id()), PresentationStatus::Waiting);
    }

    #[tokio::test]
    async fn withdraw_last_occupant_empties_slot() {
        let (mut arbiter, probe) = arbiter();
        let a = modal("a", Priority::REQUIRED);

        arbiter.present(a.clone(), false).await;
        let status = arbiter.withdraw(a.id(), false).await;

        assert_eq!(status, PresentationStatus::Detached);
        assert!(arbiter.slot().is_empty());
        assert!(!probe.is_showing());
        assert_eq!(probe.opacity(), 0.0);
    }

    #[tokio::test]
    async fn withdraw_waiting_entity_leaves_occupant() {
        let (mut arbiter, probe) = arbiter();
        let a = modal("a", Priority::REQUIRED);
        let b = modal("b", Priority::HIGH);

        arbiter.present(a.clone(), false).await;
        arbiter.present(b.clone(), false).await;
        let status = arbiter.withdraw(b.id(), false).await;

        assert_eq!(status, PresentationStatus::Detached);
        assert_eq!(arbiter.status(a.id()), PresentationStatus::Presented);
        assert!(arbiter.slot().waiting().is_empty());
        assert_eq!(probe.events(), vec![SurfaceEvent::Shown(a.id())]);
    }

    #[tokio::test]
    async fn withdraw_detached_entity_is_noop() {
        let (mut arbiter, probe) = arbiter();
        let a = modal("a", Priority::REQUIRED);
        let stranger = modal("stranger", Priority::HIGH);

        arbiter.present(a.clone(), false).await;
        let status = arbiter.withdraw(stranger.id(), true).await;

        assert_eq!(status, PresentationStatus::Detached);
        assert_eq!(arbiter.status(a.id()), PresentationStatus::Presented);
        assert!(probe.is_showing());
    }

    #[tokio::test]
    async fn replace_ignores_dismissible_and_waiting() {
        let (mut arbiter, probe) = arbiter();
        let a = modal("a", Priority::REQUIRED);
        let queued = modal("queued", Priority::HIGH);
        let b = modal("b", Priority::LOW);

        arbiter.present(a.clone(), false).await;
        arbiter.present(queued.clone(), false).await;
        assert!(!a.dismissible());

        let status = arbiter.replace(a.id(), b.clone(), false).await;

        assert_eq!(status, PresentationStatus::Presented);
        assert_eq!(arbiter.status(a.id()), PresentationStatus::Detached);
        assert_eq!(arbiter.status(queued.id()), PresentationStatus::Waiting);
        assert_eq!(probe.content(), Some(b.id()));
        assert_eq!(probe.opacity(), 1.0);
    }

    #[tokio::test]
    async fn replace_with_waiting_entity_removes_it_from_waiting() {
        let (mut arbiter, _probe) = arbiter();
        let a = modal("a", Priority::REQUIRED);
        let b = modal("b", Priority::LOW);

        arbiter.present(a.clone(), false).await;
        arbiter.present(b.clone(), false).await;
        arbiter.replace(a.id(), b.clone(), false).await;

        assert_eq!(arbiter.status(b.id()), PresentationStatus::Presented);
        assert!(arbiter.slot().waiting().is_empty());
    }

    #[tokio::test]
    async fn focus_claimed_and_released() {
        let (mut arbiter, probe) = arbiter();
        let focused = Arc::new(Modal::new("focused").requesting_focus());
        let plain = modal("plain", Priority::LOW);

        arbiter.present(focused.clone(), false).await;
        assert!(probe.is_focused());

        arbiter.present(plain.clone(), false).await;
        arbiter.withdraw(focused.id(), false).await;

        assert!(!probe.is_focused());
        assert_eq!(arbiter.status(plain.id()), PresentationStatus::Presented);
        assert_eq!(
            probe.events(),
            vec![
                SurfaceEvent::Shown(focused.id()),
                SurfaceEvent::FocusClaimed,
                SurfaceEvent::Hidden,
                SurfaceEvent::FocusReleased,
                SurfaceEvent::Shown(plain.id()),
            ]
        );
    }

    #[tokio::test]
    async fn replace_moves_focus() {
        let (mut arbiter, probe) = arbiter();
        let focused = Arc::new(Modal::new("focused").requesting_focus());
        let plain = modal("plain", Priority::LOW);

        arbiter.present(focused.clone(), false).await;
        arbiter.replace(focused.id(), plain.clone(), false).await;

        assert!(!probe.is_focused());
    }

    #[tokio::test(start_paused = true)]
    async fn animated_present_fades_in_over_duration() {
        let (mut arbiter, probe) = timed_arbiter();
        let a = Arc::new(
            Modal::new("a").with_animation_duration(Duration::from_millis(300)),
        );

        let start = Instant::now();
        let status = arbiter.present(a.clone(), true).await;

        assert_eq!(status, PresentationStatus::Presented);
        assert!(start.elapsed() >= Duration::from_millis(300));
        assert_eq!(probe.opacity(), 1.0);
        assert!(probe.opacity_updates() > 2);
    }

    #[tokio::test(start_paused = true)]
    async fn animated_withdraw_completes_after_promotion() {
        let (mut arbiter, probe) = timed_arbiter();
        let a = Arc::new(
            Modal::new("a").with_animation_duration(Duration::from_millis(100)),
        );
        let b = Arc::new(
            Modal::new("b").with_animation_duration(Duration::from_millis(250)),
        );

        arbiter.present(a.clone(), false).await;
        arbiter.present(b.clone(), false).await;

        let start = Instant::now();
        arbiter.withdraw(a.id(), true).await;

        // Fade out of `a` then fade in of `b`.
        assert!(start.elapsed() >= Duration::from_millis(350));
        assert_eq!(arbiter.status(b.id()), PresentationStatus::Presented);
        assert_eq!(probe.content(), Some(b.id()));
        assert_eq!(probe.opacity(), 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn animated_preemption_resolves_after_both_fades() {
        let (mut arbiter, probe) = timed_arbiter();
        let a = Arc::new(
            Modal::new("a")
                .with_dismissible(true)
                .with_animation_duration(Duration::from_millis(100)),
        );
        let c = Arc::new(
            Modal::new("c")
                .with_priority(Priority::HIGH)
                .with_animation_duration(Duration::from_millis(250)),
        );

        arbiter.present(a.clone(), false).await;

        let start = Instant::now();
        let status = arbiter.present(c.clone(), true).await;

        // Fade out of `a` then fade in of `c`.
        assert_eq!(status, PresentationStatus::Presented);
        assert!(start.elapsed() >= Duration::from_millis(350));
        assert_eq!(arbiter.status(a.id()), PresentationStatus::Detached);
        assert_eq!(probe.content(), Some(c.id()));
        assert_eq!(probe.opacity(), 1.0);
        assert_eq!(
            probe.events(),
            vec![
                SurfaceEvent::Shown(a.id()),
                SurfaceEvent::Hidden,
                SurfaceEvent::Shown(c.id()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn animated_replace_fades_over_incoming_duration() {
        let (mut arbiter, probe) = timed_arbiter();
        let a = Arc::new(
            Modal::new("a").with_animation_duration(Duration::from_millis(1000)),
        );
        let b = Arc::new(
            Modal::new("b").with_animation_duration(Duration::from_millis(300)),
        );

        arbiter.present(a.clone(), false).await;

        let start = Instant::now();
        let status = arbiter.replace(a.id(), b.clone(), true).await;

        assert_eq!(status, PresentationStatus::Presented);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(300));
        assert!(elapsed < Duration::from_millis(1000));
        assert_eq!(probe.content(), Some(b.id()));
        assert_eq!(probe.opacity(), 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn animated_replace_into_empty_slot_fades_in() {
        let (mut arbiter, probe) = timed_arbiter();
        let a = modal("a", Priority::REQUIRED);
        let b = Arc::new(
            Modal::new("b").with_animation_duration(Duration::from_millis(200)),
        );

        let start = Instant::now();
        arbiter.replace(a.id(), b.clone(), true).await;

        assert!(start.elapsed() >= Duration::from_millis(200));
        assert_eq!(probe.content(), Some(b.id()));
        assert_eq!(probe.opacity(), 1.0);
        assert!(probe.opacity_updates() > 2);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_animation_scale_skips_waiting() {
        let probe = HeadlessSurface::new();
        let config = ArbiterConfig::default()
            .with_animation_scale(0.0)
            .with_frame_interval(Duration::from_millis(10));
        let mut arbiter =
            Arbiter::new(probe.clone(), TimedAnimator::from_config(&config)).with_config(config);
        let a = modal("a", Priority::REQUIRED);

        let start = Instant::now();
        arbiter.present(a.clone(), true).await;

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(probe.opacity(), 1.0);
    }

    #[tokio::test]
    async fn reference_scenario() {
        let (mut arbiter, probe) = arbiter();
        let a = modal("a", Priority::REQUIRED);
        let b = modal("b", Priority::LOW);
        let c = modal("c", Priority::HIGH);

        assert_eq!(arbiter.present(a.clone(), false).await, PresentationStatus::Presented);
        assert_eq!(arbiter.present(b.clone(), false).await, PresentationStatus::Waiting);
        assert_eq!(arbiter.status(a.id()), PresentationStatus::Presented);

        a.set_dismissible(true);
        assert_eq!(arbiter.present(c.clone(), false).await, PresentationStatus::Presented);
        assert_eq!(arbiter.status(a.id()), PresentationStatus::Detached);
        assert_eq!(arbiter.status(b.id()), PresentationStatus::Waiting);

        arbiter.withdraw(c.id(), false).await;
        assert_eq!(arbiter.status(b.id()), PresentationStatus::Presented);
        assert!(arbiter.slot().waiting().is_empty());

        arbiter.withdraw(b.id(), false).await;
        assert!(arbiter.slot().is_empty());
        assert!(!probe.is_showing());
    }
}
