//! Constant color fill.

use crate::animation::AnimationBehavior;
use crate::color::Led;
use crate::engine::Engine;
use crate::errors::CommandError;
use crate::idl::IdlNode;
use crate::scan::LineScanner;

struct Solid {
    color: Led,
}

pub fn create(
    _engine: &Engine,
    _leds: &[u32],
    args: &mut LineScanner<'_>,
) -> Result<Box<dyn AnimationBehavior>, CommandError> {
    let mut color = Led::new(1.0, 1.0, 1.0);
    while let Some(token) = args.next_token() {
        match token {
            "r" => {
                if let Some(v) = args.get::<f32>() {
                    color.r = v;
                }
            }
            "g" => {
                if let Some(v) = args.get::<f32>() {
                    color.g = v;
                }
            }
            "b" => {
                if let Some(v) = args.get::<f32>() {
                    color.b = v;
                }
            }
            _ => {}
        }
    }
    Ok(Box::new(Solid { color }))
}

#[must_use]
pub fn describe() -> IdlNode {
    let mut node = IdlNode::keyword();
    node.set("r", Some(IdlNode::float()));
    node.set("g", Some(IdlNode::float()));
    node.set("b", Some(IdlNode::float()));
    node
}

impl AnimationBehavior for Solid {
    fn iterate(&mut self, frame: &mut [Led], leds: &[u32], _dt: f32, _t: f32) {
        for &led in leds {
            if let Some(pixel) = frame.get_mut(led as usize) {
                *pixel = self.color;
            }
        }
    }
}
