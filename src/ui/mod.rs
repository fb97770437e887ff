mod animation;

pub use animation::{Animation, AnimationKind, Bounds, Canvas, PULSE_DECAY, Pulse, Shape, Sweep};

use std::collections::BTreeMap;

use crossbeam::channel::Receiver;
use tracing::debug;

use crate::engine::{Metronome, MetronomeError};
use crate::events::PlayerUpdate;

struct Slot {
    animation: Animation,
    updates: Receiver<PlayerUpdate>,
    bounds: Bounds,
}

/// Draws one animation per player, each in its own region of a shared canvas.
///
/// Player updates are buffered in channels and applied on the next
/// `animate` call, so drawing never runs inside a scheduling pass.
#[derive(Default)]
pub struct MetronomeAnimator {
    slots: BTreeMap<String, Slot>,
}

impl MetronomeAnimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches an animation to player `id`, replacing any previous one.
    pub fn setup_animation(
        &mut self,
        metronome: &Metronome,
        id: &str,
        kind: AnimationKind,
    ) -> Result<(), MetronomeError> {
        let player = metronome.player(id)?;
        let updates = player.subscribe();
        let mut animation = Animation::new(kind, player.beat_snapshot());
        if player.is_running() {
            animation.handle(&PlayerUpdate::Started {
                reference: player.reference(),
            });
        }

        let bounds = self
            .slots
            .get(id)
            .map_or_else(Bounds::default, |slot| slot.bounds);
        self.slots.insert(
            id.to_string(),
            Slot {
                animation,
                updates,
                bounds,
            },
        );
        debug!(%id, ?kind, "animation attached");
        Ok(())
    }

    pub fn configure_animation(&mut self, id: &str, bounds: Bounds) -> Result<(), MetronomeError> {
        let slot = self
            .slots
            .get_mut(id)
            .ok_or_else(|| MetronomeError::UnknownPlayer(id.to_string()))?;
        slot.bounds = bounds;
        Ok(())
    }

    pub fn remove_animation(&mut self, id: &str) -> bool {
        self.slots.remove(id).is_some()
    }

    pub fn kind(&self, id: &str) -> Option<AnimationKind> {
        self.slots.get(id).map(|slot| slot.animation.kind())
    }

    /// Applies pending player updates and redraws every region for sink
    /// time `now`.
    pub fn animate(&mut self, now: f64, canvas: &mut impl Canvas) {
        for slot in self.slots.values_mut() {
            for update in slot.updates.try_iter() {
                slot.animation.handle(&update);
            }
            canvas.clear(slot.bounds);
            slot.animation.draw(now, slot.bounds, canvas);
        }
    }
}
