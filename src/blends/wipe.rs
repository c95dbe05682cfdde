//! Positional wipe.
//!
//! Sweeps a transition front along a direction through the installation,
//! using the coordinate table to project each pixel onto the wipe axis.
//! The front moves from `d0` to `d1` (derived from the coordinate span
//! when not given), softened over `window` units.

use std::sync::Arc;

use glam::Vec3;
use parking_lot::RwLock;
use rand::RngExt;

use super::{BlendBehavior, BlendState};
use crate::color::{Led, clamp01};
use crate::engine::Engine;
use crate::errors::CommandError;
use crate::idl::IdlNode;
use crate::modules::coordinates::CoordData;
use crate::scan::LineScanner;

struct WipeBlend {
    t_anim: f32,
    speed: f32,
    direction: Vec3,
    d0: f32,
    d1: f32,
    window: f32,
    coords: Arc<RwLock<Vec<CoordData>>>,
}

pub fn create(
    engine: &Engine,
    args: &mut LineScanner<'_>,
) -> Result<Box<dyn BlendBehavior>, CommandError> {
    let mut rng = rand::rng();
    let mut speed = 0.2f32;
    let mut direction = Vec3::new(
        rng.random::<f32>() - 0.5,
        rng.random::<f32>() - 0.5,
        rng.random::<f32>() - 0.5,
    );
    let mut d0 = -100.0f32;
    let mut d1 = 100.0f32;
    let mut window = 4.0f32;
    let mut d0_set = false;
    let mut d1_set = false;

    while let Some(token) = args.next_token() {
        match token {
            "speed" => {
                if let Some(v) = args.get::<f32>() {
                    speed = v;
                }
            }
            "d" => {
                let (Some(x), Some(y), Some(z)) =
                    (args.get::<f32>(), args.get::<f32>(), args.get::<f32>())
                else {
                    return Err(CommandError::usage("wipe blend: 'd' expects three components"));
                };
                direction = Vec3::new(x, y, z);
            }
            "dx" => {
                if let Some(v) = args.get::<f32>() {
                    direction.x = v;
                }
            }
            "dy" => {
                if let Some(v) = args.get::<f32>() {
                    direction.y = v;
                }
            }
            "dz" => {
                if let Some(v) = args.get::<f32>() {
                    direction.z = v;
                }
            }
            "d0" => {
                if let Some(v) = args.get::<f32>() {
                    d0 = v;
                    d0_set = true;
                }
            }
            "d1" => {
                if let Some(v) = args.get::<f32>() {
                    d1 = v;
                    d1_set = true;
                }
            }
            "window" => {
                if let Some(v) = args.get::<f32>() {
                    window = v;
                }
            }
            _ => {}
        }
    }

    direction = direction.normalize_or_zero();
    if direction == Vec3::ZERO {
        direction = Vec3::X;
    }

    if !d0_set || !d1_set {
        let coords = engine.coords.preanim();
        if !coords.is_empty() {
            let mut dmin = coords[0].pos.dot(direction);
            let mut dmax = dmin;
            for data in &coords[1..] {
                let d = data.pos.dot(direction);
                dmin = dmin.min(d);
                dmax = dmax.max(d);
            }
            dmin -= window;
            if !d0_set {
                d0 = dmin;
            }
            if !d1_set {
                d1 = dmax;
            }
        }
    }

    Ok(Box::new(WipeBlend {
        t_anim: 0.0,
        speed,
        direction,
        d0,
        d1,
        window,
        coords: engine.coords.render_handle(),
    }))
}

#[must_use]
pub fn describe() -> IdlNode {
    let mut node = IdlNode::keyword();
    node.set("speed", Some(IdlNode::float()));
    node.set(
        "d",
        Some(IdlNode::sequence(vec![IdlNode::float(), IdlNode::float(), IdlNode::float()])),
    );
    node.set("dx", Some(IdlNode::float()));
    node.set("dy", Some(IdlNode::float()));
    node.set("dz", Some(IdlNode::float()));
    node.set("d0", Some(IdlNode::float()));
    node.set("d1", Some(IdlNode::float()));
    node.set("window", Some(IdlNode::float()));
    node
}

impl BlendBehavior for WipeBlend {
    fn mix(
        &mut self,
        leds: &[u32],
        accum: &mut [Led],
        previous: &[Led],
        dt: f32,
        _t: f32,
    ) -> BlendState {
        let coords = self.coords.read();
        self.t_anim += dt * self.speed;

        let front = self.d0 * clamp01(1.0 - self.t_anim) + self.d1 * clamp01(self.t_anim);
        let window_inv = 1.0 / self.window;
        for (i, &led) in leds.iter().enumerate() {
            let Some(pixel) = accum.get_mut(led as usize) else {
                continue;
            };
            let d = coords
                .get(led as usize)
                .map_or(0.0, |c| c.pos.dot(self.direction));

            let f = clamp01((d - front) * window_inv);
            let g = 1.0 - f;

            pixel.r = previous[i].r * f + pixel.r * g;
            pixel.g = previous[i].g * f + pixel.g * g;
            pixel.b = previous[i].b * f + pixel.b * g;
        }

        if self.t_anim < 1.0 { BlendState::Active } else { BlendState::Done }
    }
}
