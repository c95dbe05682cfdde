//! Random sparkle.
//!
//! Each frame every pixel rolls against `threshold`; winners light up
//! according to the selected mode, losers fall back to the base color or
//! black. `cycle 1` drifts the base hue at `frequency` degrees per
//! second.

use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};

use crate::animation::AnimationBehavior;
use crate::color::{Led, hsv};
use crate::engine::Engine;
use crate::errors::CommandError;
use crate::idl::IdlNode;
use crate::scan::LineScanner;

#[derive(Clone, Copy, PartialEq, Eq)]
enum SparkleMode {
    Full,
    LimitedHue,
    LimitedIntensity,
    LimitedSaturation,
    Hue,
    Intensity,
    Saturation,
}

struct Sparkle {
    hue: f32,
    saturation: f32,
    intensity: f32,
    frequency: f32,
    threshold: f32,
    deviation: f32,
    mode: SparkleMode,
    cycle_hue: bool,
    base_color: bool,
    rng: StdRng,
}

pub fn create(
    _engine: &Engine,
    _leds: &[u32],
    args: &mut LineScanner<'_>,
) -> Result<Box<dyn AnimationBehavior>, CommandError> {
    let mut anim = Sparkle {
        hue: 0.0,
        saturation: 1.0,
        intensity: 1.0,
        frequency: 10.0,
        threshold: 0.95,
        deviation: 0.1,
        mode: SparkleMode::Full,
        cycle_hue: false,
        base_color: false,
        rng: StdRng::from_rng(&mut rand::rng()),
    };

    while let Some(token) = args.next_token() {
        match token {
            "hue" => {
                if let Some(v) = args.get::<f32>() {
                    anim.hue = v;
                }
            }
            "saturation" => {
                if let Some(v) = args.get::<f32>() {
                    anim.saturation = v;
                }
            }
            "intensity" => {
                if let Some(v) = args.get::<f32>() {
                    anim.intensity = v;
                }
            }
            "frequency" => {
                if let Some(v) = args.get::<f32>() {
                    anim.frequency = v;
                }
            }
            "threshold" => {
                if let Some(v) = args.get::<f32>() {
                    anim.threshold = v;
                }
            }
            "deviation" => {
                if let Some(v) = args.get::<f32>() {
                    anim.deviation = v;
                }
            }
            "cycle" => {
                if let Some(v) = args.get::<i32>() {
                    anim.cycle_hue = v != 0;
                }
            }
            "base" => {
                if let Some(v) = args.get::<i32>() {
                    anim.base_color = v != 0;
                }
            }
            "full" => anim.mode = SparkleMode::Full,
            "limhue" => {
                anim.mode = SparkleMode::LimitedHue;
                anim.deviation = 30.0;
            }
            "limint" => anim.mode = SparkleMode::LimitedIntensity,
            "limsat" => anim.mode = SparkleMode::LimitedSaturation,
            "huemode" => anim.mode = SparkleMode::Hue,
            "int" => anim.mode = SparkleMode::Intensity,
            "sat" => anim.mode = SparkleMode::Saturation,
            _ => {}
        }
    }
    Ok(Box::new(anim))
}

#[must_use]
pub fn describe() -> IdlNode {
    let mut node = IdlNode::keyword();
    for scalar in ["hue", "saturation", "intensity", "frequency", "threshold", "deviation"] {
        node.set(scalar, Some(IdlNode::float()));
    }
    for flag in ["full", "limhue", "limint", "limsat", "huemode", "int", "sat"] {
        node.set(flag, None);
    }
    node
}

impl AnimationBehavior for Sparkle {
    fn iterate(&mut self, frame: &mut [Led], leds: &[u32], _dt: f32, t: f32) {
        let hue = if self.cycle_hue { self.hue + self.frequency * t } else { self.hue };

        for &led in leds {
            let Some(pixel) = frame.get_mut(led as usize) else {
                continue;
            };
            if self.rng.random::<f32>() > self.threshold {
                let jitter = (self.rng.random::<f32>() - 0.5) * 2.0 * self.deviation;
                *pixel = match self.mode {
                    SparkleMode::Full => hsv(self.rng.random::<f32>() * 360.0, 1.0, 1.0),
                    SparkleMode::LimitedHue => hsv(hue + jitter, self.saturation, self.intensity),
                    SparkleMode::LimitedIntensity => {
                        hsv(hue, self.saturation, self.intensity + jitter)
                    }
                    SparkleMode::LimitedSaturation => {
                        hsv(hue, self.saturation + jitter, self.intensity)
                    }
                    SparkleMode::Hue => {
                        hsv(self.rng.random::<f32>() * 360.0, self.saturation, self.intensity)
                    }
                    SparkleMode::Intensity => {
                        hsv(hue, self.saturation, self.rng.random::<f32>())
                    }
                    SparkleMode::Saturation => {
                        hsv(hue, self.rng.random::<f32>(), self.intensity)
                    }
                };
            } else if self.base_color {
                *pixel = hsv(hue, self.saturation, self.intensity);
            } else {
                *pixel = Led::BLACK;
            }
        }
    }
}
