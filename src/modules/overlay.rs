//! Per-pixel composite overlay filter.
//!
//! `overlay <selector> <entries...>` assigns an overlay color per pixel;
//! the `applyFilter` hook computes `pixel * a + overlay`. Entries walk
//! the selector's pixels in order:
//!
//! - `rrggbb` / `rgb` - opaque additive color
//! - `rrggbbaa` / `rgba` - alpha-weighted color replacing the pixel
//! - `xN <entry>` - repeat the entry for N pixels
//! - `skip N` - leave N pixels untouched
//! - `clear` - reset the remaining pixels to pass-through

use crate::color::{Led, clamp01};
use crate::engine::Engine;
use crate::errors::CommandError;
use crate::idl::IdlNode;
use crate::ledset::LedSet;
use crate::module::{EngineModule, HookEvent, ModKey};
use crate::scan::LineScanner;
use crate::selector;

#[derive(Clone, Copy)]
struct OverlayEntry {
    color: Led,
    a: f32,
}

const PASSTHROUGH: OverlayEntry = OverlayEntry { color: Led::BLACK, a: 1.0 };

#[derive(Default)]
pub struct OverlayModule {
    overlay: Vec<OverlayEntry>,
}

#[must_use]
pub fn create() -> Box<dyn EngineModule> {
    Box::new(OverlayModule::default())
}

fn parse_color(raw: &str) -> Option<OverlayEntry> {
    let bits = u32::from_str_radix(raw, 16).ok()?;
    match raw.len() {
        8 => {
            let a = clamp01((bits & 0xff) as f32 / 255.0);
            Some(OverlayEntry {
                color: Led::new(
                    ((bits >> 24) & 0xff) as f32 / 255.0 * a,
                    ((bits >> 16) & 0xff) as f32 / 255.0 * a,
                    ((bits >> 8) & 0xff) as f32 / 255.0 * a,
                ),
                a: 1.0 - a,
            })
        }
        6 => Some(OverlayEntry {
            color: Led::new(
                ((bits >> 16) & 0xff) as f32 / 255.0,
                ((bits >> 8) & 0xff) as f32 / 255.0,
                (bits & 0xff) as f32 / 255.0,
            ),
            a: 0.0,
        }),
        4 => {
            let a = clamp01((bits & 0xf) as f32 / 15.0);
            Some(OverlayEntry {
                color: Led::new(
                    ((bits >> 12) & 0xf) as f32 / 15.0 * a,
                    ((bits >> 8) & 0xf) as f32 / 15.0 * a,
                    ((bits >> 4) & 0xf) as f32 / 15.0 * a,
                ),
                a: 1.0 - a,
            })
        }
        3 => Some(OverlayEntry {
            color: Led::new(
                ((bits >> 8) & 0xf) as f32 / 15.0,
                ((bits >> 4) & 0xf) as f32 / 15.0,
                (bits & 0xf) as f32 / 15.0,
            ),
            a: 0.0,
        }),
        _ => None,
    }
}

impl EngineModule for OverlayModule {
    fn init(&mut self, engine: &mut Engine, modno: ModKey, _args: &mut LineScanner<'_>) {
        engine.modules.register_command("overlay", modno);
        let added = engine.modules.hook_resolve("ledsAdded");
        let removed = engine.modules.hook_resolve("ledsRemoved");
        let filter = engine.modules.hook_resolve("applyFilter");
        engine.modules.subscribe(modno, added);
        engine.modules.subscribe(modno, removed);
        engine.modules.subscribe(modno, filter);
    }

    fn hook(&mut self, engine: &mut Engine, _modno: ModKey, event: &HookEvent) {
        match *event {
            HookEvent::LedsAdded { count } => {
                let target = self.overlay.len() + count as usize;
                self.overlay.resize(target, PASSTHROUGH);
            }
            HookEvent::LedsRemoved { offset, count } => {
                let offset = offset as usize;
                if offset >= self.overlay.len() {
                    return;
                }
                let end = (offset + count as usize).min(self.overlay.len());
                self.overlay.drain(offset..end);
            }
            HookEvent::ApplyFilter => {
                for (pixel, entry) in engine.frame.egress.iter_mut().zip(&self.overlay) {
                    pixel.r = pixel.r * entry.a + entry.color.r;
                    pixel.g = pixel.g * entry.a + entry.color.g;
                    pixel.b = pixel.b * entry.a + entry.color.b;
                }
            }
            HookEvent::IdlChanged => {}
        }
    }

    fn command(
        &mut self,
        engine: &mut Engine,
        _modno: ModKey,
        _verb: &str,
        args: &mut LineScanner<'_>,
    ) -> Result<(), CommandError> {
        while !args.is_empty() {
            let mut leds = LedSet::new();
            selector::parse_selector(engine, &mut leds, args)?;

            let mut cursor = leds.iter();
            let mut pending = cursor.next();
            while pending.is_some() {
                let Some(raw) = args.next_token() else {
                    return Ok(());
                };
                let mut repeat = 1usize;
                let raw = if raw == "clear" {
                    while let Some(&i) = pending {
                        if let Some(slot) = self.overlay.get_mut(i as usize) {
                            *slot = PASSTHROUGH;
                        }
                        pending = cursor.next();
                    }
                    break;
                } else if raw == "skip" {
                    let Some(count) = args.get::<usize>() else {
                        return Ok(());
                    };
                    for _ in 0..count {
                        if pending.is_none() {
                            break;
                        }
                        pending = cursor.next();
                    }
                    continue;
                } else if let Some(count) = raw.strip_prefix('x') {
                    repeat = count.parse().unwrap_or(1);
                    let Some(next) = args.next_token() else {
                        return Ok(());
                    };
                    next
                } else {
                    raw
                };

                let Some(entry) = parse_color(raw) else {
                    return Err(CommandError::usage(format!("invalid overlay color '{raw}'")));
                };
                for _ in 0..repeat {
                    let Some(&i) = pending else {
                        break;
                    };
                    if let Some(slot) = self.overlay.get_mut(i as usize) {
                        *slot = entry;
                    }
                    pending = cursor.next();
                }
            }
        }
        Ok(())
    }

    fn describe(&self, engine: &Engine, _verb: &str) -> Option<IdlNode> {
        Some(IdlNode::repeat(IdlNode::sequence(vec![
            selector::describe_selector(engine, None),
            IdlNode::repeat(IdlNode::Str),
        ])))
    }
}
