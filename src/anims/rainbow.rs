//! Hue-cycling rainbow.
//!
//! `d` sets the hue step per pixel, `k` the hue velocity in degrees per
//! second, `phase` a constant hue offset.

use crate::animation::AnimationBehavior;
use crate::color::{Led, hsv};
use crate::engine::Engine;
use crate::errors::CommandError;
use crate::idl::IdlNode;
use crate::scan::LineScanner;

struct Rainbow {
    d: f32,
    k: f32,
    phase: f32,
}

pub fn create(
    _engine: &Engine,
    _leds: &[u32],
    args: &mut LineScanner<'_>,
) -> Result<Box<dyn AnimationBehavior>, CommandError> {
    let mut anim = Rainbow { d: 12.0, k: 120.0, phase: 0.0 };
    while let Some(token) = args.next_token() {
        match token {
            "d" => {
                if let Some(v) = args.get::<f32>() {
                    anim.d = v;
                }
            }
            "k" => {
                if let Some(v) = args.get::<f32>() {
                    anim.k = v;
                }
            }
            "phase" => {
                if let Some(v) = args.get::<f32>() {
                    anim.phase = v;
                }
            }
            _ => {}
        }
    }
    Ok(Box::new(anim))
}

#[must_use]
pub fn describe() -> IdlNode {
    let mut node = IdlNode::keyword();
    node.set("d", Some(IdlNode::float()));
    node.set("k", Some(IdlNode::float()));
    node.set("phase", Some(IdlNode::float()));
    node
}

impl AnimationBehavior for Rainbow {
    fn iterate(&mut self, frame: &mut [Led], leds: &[u32], _dt: f32, t: f32) {
        for (i, &led) in leds.iter().enumerate() {
            if let Some(pixel) = frame.get_mut(led as usize) {
                let phi = t * self.k + i as f32 * self.d + self.phase;
                *pixel = hsv(phi, 1.0, 1.0);
            }
        }
    }
}
