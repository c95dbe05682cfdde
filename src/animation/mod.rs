//! Animation instances and their registry.
//!
//! An [`Animation`] binds a boxed [`AnimationBehavior`] to a [`LedSet`].
//! The [`AnimationRegistry`] owns all live animations behind
//! `Arc<Mutex<...>>` entries so the compositor, the animator pool and
//! transient blend animations can share them across threads; every other
//! cross-owner reference is an [`AnimKey`] resolved through the registry,
//! so a stale key cleanly yields not-found.
//!
//! Usage counting mirrors the compositor's handle references: an entry
//! starts at 1 when registered and each compositor handle grabs one more.
//! When a drop brings an entry back to its baseline it is reaped by the
//! next pool flush.

pub mod pool;

pub use pool::{Animator, AnimatorPool, SubAnimation};

use std::sync::Arc;

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

use crate::color::Led;
use crate::ledset::LedSet;

new_key_type! {
    /// Handle for animations in the [`AnimationRegistry`].
    pub struct AnimKey;
}

/// A per-frame pixel painter bound to a LED subset.
///
/// `frame` is the full-length animation buffer; implementations write
/// only at the indices in `leds`. `dt` is the rendering animator's delta
/// since its previous frame, `t` the shared time since the pool epoch,
/// both in seconds.
pub trait AnimationBehavior: Send {
    fn iterate(&mut self, frame: &mut [Led], leds: &[u32], dt: f32, t: f32);

    /// Set by blend animations once their mix completes: the animation id
    /// that should take over this behavior's pixels at the next
    /// compositor flush.
    fn staged_replacement(&self) -> Option<AnimKey> {
        None
    }
}

pub struct Animation {
    ident: String,
    behavior: Box<dyn AnimationBehavior>,
    leds: LedSet,
}

impl Animation {
    #[must_use]
    pub fn new(ident: impl Into<String>, behavior: Box<dyn AnimationBehavior>, leds: LedSet) -> Self {
        Self { ident: ident.into(), behavior, leds }
    }

    #[must_use]
    pub fn ident(&self) -> &str {
        &self.ident
    }

    #[must_use]
    pub fn leds(&self) -> &LedSet {
        &self.leds
    }

    /// Intersects the bound LED set with `envelope`. The only permitted
    /// LED change after construction.
    pub fn restrict(&mut self, envelope: &LedSet) {
        self.leds.intersect(envelope);
    }

    /// Renders at an explicit LED subset (the pool passes each
    /// sub-animation's assignment, blends pass their overlap).
    pub fn render(&mut self, frame: &mut [Led], leds: &[u32], dt: f32, t: f32) {
        self.behavior.iterate(frame, leds, dt, t);
    }

    pub fn adjust_removed(&mut self, offset: u32, count: u32) {
        self.leds.adjust_removed(offset, count);
    }

    fn staged_replacement(&self) -> Option<AnimKey> {
        self.behavior.staged_replacement()
    }
}

pub struct AnimEntry {
    pub ident: String,
    pub usage: u32,
    pub shared: Arc<Mutex<Animation>>,
    /// Animations this entry renders through (blend operands); each one
    /// is grabbed for this entry's lifetime and released when it reaps.
    pub operands: Vec<AnimKey>,
}

/// Owner of all live animations.
#[derive(Default)]
pub struct AnimationRegistry {
    entries: SlotMap<AnimKey, AnimEntry>,
    dropped: bool,
}

impl AnimationRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a freshly constructed animation with usage 1.
    pub fn register(&mut self, animation: Animation) -> AnimKey {
        self.register_with_operands(animation, Vec::new())
    }

    /// Registers an animation that renders other animations (a blend);
    /// the operands stay alive as long as this entry does.
    pub fn register_with_operands(
        &mut self,
        animation: Animation,
        operands: Vec<AnimKey>,
    ) -> AnimKey {
        for &operand in &operands {
            self.grab(operand);
        }
        let ident = animation.ident().to_string();
        self.entries.insert(AnimEntry {
            ident,
            usage: 1,
            shared: Arc::new(Mutex::new(animation)),
            operands,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn contains(&self, key: AnimKey) -> bool {
        self.entries.contains_key(key)
    }

    #[must_use]
    pub fn get(&self, key: AnimKey) -> Option<&AnimEntry> {
        self.entries.get(key)
    }

    /// Shared handle for pool installation and blend operands.
    #[must_use]
    pub fn shared(&self, key: AnimKey) -> Option<Arc<Mutex<Animation>>> {
        self.entries.get(key).map(|e| e.shared.clone())
    }

    pub fn iter(&self) -> impl Iterator<Item = (AnimKey, &AnimEntry)> {
        self.entries.iter()
    }

    pub fn grab(&mut self, key: AnimKey) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.usage += 1;
        } else {
            log::warn!("attempted to grab non-existing animation {key:?}");
        }
    }

    pub fn drop_ref(&mut self, key: AnimKey) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.usage = entry.usage.saturating_sub(1);
            self.dropped = true;
        } else {
            log::warn!("attempted to drop non-existing animation {key:?}");
        }
    }

    pub fn restrict(&mut self, key: AnimKey, envelope: &LedSet) {
        if let Some(entry) = self.entries.get(key) {
            entry.shared.lock().restrict(envelope);
        }
    }

    /// Polls whether the animation (a completed blend) wants its pixels
    /// handed over to another animation.
    #[must_use]
    pub fn staged_replacement(&self, key: AnimKey) -> Option<AnimKey> {
        self.entries.get(key)?.shared.lock().staged_replacement()
    }

    /// Shifts every animation's bound LEDs after a physical removal.
    pub fn leds_removed(&mut self, offset: u32, count: u32) {
        for entry in self.entries.values() {
            entry.shared.lock().adjust_removed(offset, count);
        }
    }

    /// Removes entries no compositor handle holds any more, releasing
    /// their operand references in cascade. Runs only when a drop
    /// happened since the last reap.
    pub fn reap(&mut self) {
        if !self.dropped {
            return;
        }
        self.dropped = false;
        loop {
            let dead: Vec<AnimKey> = self
                .entries
                .iter()
                .filter(|(_, entry)| entry.usage < 2)
                .map(|(key, _)| key)
                .collect();
            if dead.is_empty() {
                return;
            }
            for key in dead {
                if let Some(entry) = self.entries.remove(key) {
                    for operand in entry.operands {
                        if let Some(op) = self.entries.get_mut(operand) {
                            op.usage = op.usage.saturating_sub(1);
                        }
                    }
                }
            }
        }
    }
}
