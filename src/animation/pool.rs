//! Animator worker units and their pool.
//!
//! Each [`Animator`] renders a queue of sub-animations - an animation
//! plus the LED subset it is assigned here - into the `anim` buffer.
//! Mutations target the staged `next` queue; [`AnimatorPool::flush`]
//! promotes `next` to `active` atomically with respect to rendering and
//! reaps dropped animations from the registry.
//!
//! In multi-thread mode every animator lives behind `Arc<Mutex<...>>` and
//! renders into its own scratch copy of the `anim` snapshot; the
//! orchestrator scatters the snapshot before releasing the barrier and
//! gathers each animator's assigned pixels afterwards, so no two threads
//! ever alias the shared buffer.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use super::{AnimKey, Animation, AnimationRegistry};
use crate::color::Led;
use crate::ledset::LedSet;

#[derive(Clone)]
pub struct SubAnimation {
    pub key: AnimKey,
    pub shared: Arc<Mutex<Animation>>,
    pub leds: LedSet,
}

pub struct Animator {
    pub(crate) active: Vec<SubAnimation>,
    pub(crate) next: Vec<SubAnimation>,
    t_last: Instant,
    pub(crate) scratch: Vec<Led>,
}

impl Animator {
    fn new(epoch: Instant) -> Self {
        Self { active: Vec::new(), next: Vec::new(), t_last: epoch, scratch: Vec::new() }
    }

    /// Renders every active sub-animation into `target`.
    pub fn render(&mut self, target: &mut [Led], epoch: Instant, now: Instant) {
        let t = now.duration_since(epoch).as_secs_f32();
        let dt = now.duration_since(self.t_last).as_secs_f32();
        self.t_last = now;
        for sub in &self.active {
            sub.shared.lock().render(target, sub.leds.as_slice(), dt, t);
        }
    }

    /// Renders into the animator's own scratch buffer (worker threads).
    pub fn render_scratch(&mut self, epoch: Instant, now: Instant) {
        let mut scratch = std::mem::take(&mut self.scratch);
        self.render(&mut scratch, epoch, now);
        self.scratch = scratch;
    }
}

pub struct AnimatorPool {
    animators: Vec<Arc<Mutex<Animator>>>,
    epoch: Instant,
    dirty: bool,
}

impl Default for AnimatorPool {
    fn default() -> Self {
        Self::new()
    }
}

impl AnimatorPool {
    #[must_use]
    pub fn new() -> Self {
        let mut pool = Self { animators: Vec::new(), epoch: Instant::now(), dirty: false };
        pool.setup(1);
        pool
    }

    #[must_use]
    pub fn epoch(&self) -> Instant {
        self.epoch
    }

    #[must_use]
    pub fn animator_count(&self) -> usize {
        self.animators.len()
    }

    /// Worker handles for animator threads.
    #[must_use]
    pub fn animator_cells(&self) -> Vec<Arc<Mutex<Animator>>> {
        self.animators.clone()
    }

    /// Rebuilds the animator list, carrying staged sub-animations over
    /// into the last new animator.
    pub fn setup(&mut self, count: usize) {
        let mut staged = Vec::new();
        for animator in &self.animators {
            staged.append(&mut animator.lock().next);
        }
        self.animators = (0..count.max(1))
            .map(|_| Arc::new(Mutex::new(Animator::new(self.epoch))))
            .collect();
        if let Some(last) = self.animators.last() {
            last.lock().next = staged;
        }
        self.dirty = true;
    }

    /// Installs a sub-animation: its LEDs are cleared from every animator
    /// first, so a new installation preempts existing assignments.
    pub fn install(&mut self, sub: SubAnimation) {
        self.clear(&sub.leds);
        if let Some(last) = self.animators.last() {
            last.lock().next.push(sub);
        }
        self.dirty = true;
    }

    /// Subtracts `leds` from every staged sub-animation, dropping the
    /// empty ones.
    pub fn clear(&mut self, leds: &LedSet) {
        for animator in &self.animators {
            let mut animator = animator.lock();
            for sub in &mut animator.next {
                sub.leds.subtract(leds);
            }
            animator.next.retain(|sub| !sub.leds.is_empty());
        }
        self.dirty = true;
    }

    pub fn clear_all(&mut self) {
        for animator in &self.animators {
            let mut animator = animator.lock();
            if animator.next.is_empty() {
                continue;
            }
            animator.next.clear();
            self.dirty = true;
        }
    }

    /// Shifts staged assignments after a physical LED removal.
    pub fn leds_removed(&mut self, offset: u32, count: u32) {
        for animator in &self.animators {
            let mut animator = animator.lock();
            for sub in &mut animator.next {
                sub.leds.adjust_removed(offset, count);
            }
            animator.next.retain(|sub| !sub.leds.is_empty());
        }
        self.dirty = true;
    }

    /// Promotes staged assignments and reaps dropped animations.
    pub fn flush(&mut self, registry: &mut AnimationRegistry) {
        registry.reap();
        if self.dirty {
            for animator in &self.animators {
                let mut animator = animator.lock();
                animator.active = animator.next.clone();
            }
            self.dirty = false;
        }
    }

    /// Single-threaded render path: animator 0 renders straight into the
    /// `anim` buffer.
    pub fn render_single(&mut self, target: &mut [Led], now: Instant) {
        if let Some(first) = self.animators.first() {
            first.lock().render(target, self.epoch, now);
        }
    }

    /// Copies the `anim` snapshot into every animator's scratch buffer.
    pub fn scatter(&self, anim: &[Led]) {
        for animator in &self.animators {
            let mut animator = animator.lock();
            animator.scratch.clear();
            animator.scratch.extend_from_slice(anim);
        }
    }

    /// Copies each animator's assigned pixels from its scratch buffer back
    /// into the `anim` buffer.
    pub fn gather(&self, anim: &mut [Led]) {
        for animator in &self.animators {
            let animator = animator.lock();
            for sub in &animator.active {
                for &i in sub.leds.as_slice() {
                    let i = i as usize;
                    if i < anim.len() && i < animator.scratch.len() {
                        anim[i] = animator.scratch[i];
                    }
                }
            }
        }
    }

    /// Count of staged sub-animations across all animators.
    #[must_use]
    pub fn staged_len(&self) -> usize {
        self.animators.iter().map(|a| a.lock().next.len()).sum()
    }
}
