//! Linear cross-fade.
//!
//! `speed S` scales the transition; the fade completes after `1/S`
//! seconds of wall-clock time.

use super::{BlendBehavior, BlendState};
use crate::color::{Led, clamp01};
use crate::engine::Engine;
use crate::errors::CommandError;
use crate::idl::IdlNode;
use crate::scan::LineScanner;

struct FadeBlend {
    t_anim: f32,
    speed: f32,
}

pub fn create(
    _engine: &Engine,
    args: &mut LineScanner<'_>,
) -> Result<Box<dyn BlendBehavior>, CommandError> {
    let mut speed = 1.0f32;
    while let Some(token) = args.next_token() {
        if token == "speed" {
            if let Some(v) = args.get::<f32>() {
                speed = v;
            }
        }
    }
    Ok(Box::new(FadeBlend { t_anim: 0.0, speed }))
}

#[must_use]
pub fn describe() -> IdlNode {
    let mut node = IdlNode::keyword();
    node.set("speed", Some(IdlNode::float()));
    node
}

impl BlendBehavior for FadeBlend {
    fn mix(
        &mut self,
        leds: &[u32],
        accum: &mut [Led],
        previous: &[Led],
        dt: f32,
        _t: f32,
    ) -> BlendState {
        self.t_anim += dt * self.speed;

        let f = clamp01(1.0 - self.t_anim);
        let g = clamp01(self.t_anim);

        for (i, &led) in leds.iter().enumerate() {
            let Some(pixel) = accum.get_mut(led as usize) else {
                continue;
            };
            pixel.r = previous[i].r * f + pixel.r * g;
            pixel.g = previous[i].g * f + pixel.g * g;
            pixel.b = previous[i].b * f + pixel.b * g;
        }

        if self.t_anim < 1.0 { BlendState::Active } else { BlendState::Done }
    }
}
