//! The triple-buffered pixel frame.
//!
//! Three equally-sized buffers rotate in lockstep each frame:
//!
//! - `preanim` - the stable snapshot animations observe as input
//! - `anim` - the buffer animations render into
//! - `egress` - the published frame that filters rewrite and egresses encode
//!
//! [`Frame::flush_egress`] publishes `anim` to `egress` and restores
//! `preanim` to the rendered image, so filters reading `preanim` next
//! frame observe what was actually blended. [`Frame::flush_anim`]
//! snapshots `preanim` into `anim` before rendering starts. Sizes change
//! only through [`Frame::leds_added`] / [`Frame::leds_removed`]; the copy
//! operations propagate the new length.

use crate::color::Led;

#[derive(Default)]
pub struct Frame {
    pub preanim: Vec<Led>,
    pub anim: Vec<Led>,
    pub egress: Vec<Led>,
}

impl Frame {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.preanim.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.preanim.is_empty()
    }

    /// Appends `count` black pixels to `preanim`.
    pub fn leds_added(&mut self, count: u32) {
        let target = self.preanim.len() + count as usize;
        self.preanim.resize(target, Led::BLACK);
    }

    /// Splices `[offset, offset + count)` out of `preanim`, clamped to the
    /// current length.
    pub fn leds_removed(&mut self, offset: u32, count: u32) {
        let offset = offset as usize;
        if offset >= self.preanim.len() {
            return;
        }
        let end = (offset + count as usize).min(self.preanim.len());
        self.preanim.drain(offset..end);
    }

    /// `preanim → anim`
    pub fn flush_anim(&mut self) {
        self.anim.clone_from(&self.preanim);
    }

    /// `anim → egress` and `anim → preanim`
    pub fn flush_egress(&mut self) {
        self.egress.clone_from(&self.anim);
        self.preanim.clone_from(&self.anim);
    }
}
