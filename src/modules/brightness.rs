//! Per-pixel gain filter.
//!
//! `brightness (<selector> <gain>)+` stores a gain per pixel; the
//! `applyFilter` hook multiplies the outgoing `egress` buffer by it.

use crate::engine::Engine;
use crate::errors::CommandError;
use crate::idl::IdlNode;
use crate::ledset::LedSet;
use crate::module::{EngineModule, HookEvent, ModKey};
use crate::scan::LineScanner;
use crate::selector;

#[derive(Default)]
pub struct BrightnessModule {
    gain: Vec<f32>,
}

#[must_use]
pub fn create() -> Box<dyn EngineModule> {
    Box::new(BrightnessModule::default())
}

impl EngineModule for BrightnessModule {
    fn init(&mut self, engine: &mut Engine, modno: ModKey, _args: &mut LineScanner<'_>) {
        engine.modules.register_command("brightness", modno);
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
                let target = self.gain.len() + count as usize;
                self.gain.resize(target, 1.0);
            }
            HookEvent::LedsRemoved { offset, count } => {
                let offset = offset as usize;
                if offset >= self.gain.len() {
                    return;
                }
                let end = (offset + count as usize).min(self.gain.len());
                self.gain.drain(offset..end);
            }
            HookEvent::ApplyFilter => {
                for (pixel, &gain) in engine.frame.egress.iter_mut().zip(&self.gain) {
                    pixel.r *= gain;
                    pixel.g *= gain;
                    pixel.b *= gain;
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
            let Some(gain) = args.get::<f32>() else {
                return Err(CommandError::usage("brightness: gain value expected"));
            };
            for &i in leds.as_slice() {
                if let Some(slot) = self.gain.get_mut(i as usize) {
                    *slot = gain;
                }
            }
        }
        Ok(())
    }

    fn describe(&self, engine: &Engine, _verb: &str) -> Option<IdlNode> {
        Some(IdlNode::repeat(IdlNode::sequence(vec![
            selector::describe_selector(engine, None),
            IdlNode::float(),
        ])))
    }
}
