//! Pixel coordinate table.
//!
//! Maps every pixel to a 3D position and surface normal. The `preanim`
//! table is what commands write and selectors read; the render copy is
//! promoted at module flush and shared with animation behaviors (the
//! wipe blend) behind a read lock, so worker threads observe a stable
//! table within a frame.

use std::sync::Arc;

use glam::Vec3;
use parking_lot::RwLock;

use crate::engine::Engine;
use crate::errors::CommandError;
use crate::idl::IdlNode;
use crate::module::{EngineModule, HookEvent, ModKey};
use crate::scan::LineScanner;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CoordData {
    pub pos: Vec3,
    pub normal: Vec3,
}

pub struct CoordinateStore {
    preanim: Vec<CoordData>,
    render: Arc<RwLock<Vec<CoordData>>>,
    dirty: bool,
}

impl Default for CoordinateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CoordinateStore {
    #[must_use]
    pub fn new() -> Self {
        Self { preanim: Vec::new(), render: Arc::new(RwLock::new(Vec::new())), dirty: false }
    }

    #[must_use]
    pub fn preanim(&self) -> &[CoordData] {
        &self.preanim
    }

    /// Shared handle onto the render-visible copy.
    #[must_use]
    pub fn render_handle(&self) -> Arc<RwLock<Vec<CoordData>>> {
        self.render.clone()
    }

    pub fn set(&mut self, index: usize, data: CoordData) {
        if let Some(slot) = self.preanim.get_mut(index) {
            *slot = data;
            self.dirty = true;
        }
    }

    pub fn leds_added(&mut self, count: u32) {
        let target = self.preanim.len() + count as usize;
        self.preanim.resize(target, CoordData::default());
        self.dirty = true;
    }

    pub fn leds_removed(&mut self, offset: u32, count: u32) {
        let offset = offset as usize;
        if offset >= self.preanim.len() {
            return;
        }
        let end = (offset + count as usize).min(self.preanim.len());
        self.preanim.drain(offset..end);
        self.dirty = true;
    }

    /// Publishes the preanim table to the render copy.
    pub fn promote(&mut self) {
        if self.dirty {
            self.render.write().clone_from(&self.preanim);
            self.dirty = false;
        }
    }
}

/// The `coordinates` module: owns the `coordinates_set` command and keeps
/// the table sized with the frame.
#[derive(Default)]
pub struct CoordinatesModule;

#[must_use]
pub fn create() -> Box<dyn EngineModule> {
    Box::new(CoordinatesModule)
}

impl EngineModule for CoordinatesModule {
    fn init(&mut self, engine: &mut Engine, modno: ModKey, _args: &mut LineScanner<'_>) {
        engine.modules.register_command("coordinates_set", modno);
        let added = engine.modules.hook_resolve("ledsAdded");
        let removed = engine.modules.hook_resolve("ledsRemoved");
        engine.modules.subscribe(modno, added);
        engine.modules.subscribe(modno, removed);
    }

    fn flush(&mut self, engine: &mut Engine, _modno: ModKey) {
        engine.coords.promote();
    }

    fn hook(&mut self, engine: &mut Engine, _modno: ModKey, event: &HookEvent) {
        match *event {
            HookEvent::LedsAdded { count } => engine.coords.leds_added(count),
            HookEvent::LedsRemoved { offset, count } => engine.coords.leds_removed(offset, count),
            _ => {}
        }
    }

    fn command(
        &mut self,
        engine: &mut Engine,
        _modno: ModKey,
        _verb: &str,
        args: &mut LineScanner<'_>,
    ) -> Result<(), CommandError> {
        let (Some(egress_name), Some(offset)) = (args.next_token(), args.get::<u32>()) else {
            return Err(CommandError::usage(
                "incomplete coordinates_set command - missing egress module name or offset",
            ));
        };

        let mut base = offset;
        if !egress_name.is_empty() {
            let Some(key) = engine.egresses.find(egress_name) else {
                return Err(CommandError::not_found(format!(
                    "egress instance '{egress_name}' does not exist"
                )));
            };
            base += engine.egresses.offset_of(key);
        }

        let end = engine.frame.len();
        for i in (base as usize)..end {
            let Some(x) = args.get::<f32>() else {
                break;
            };
            let (Some(y), Some(z), Some(nx), Some(ny), Some(nz)) = (
                args.get::<f32>(),
                args.get::<f32>(),
                args.get::<f32>(),
                args.get::<f32>(),
                args.get::<f32>(),
            ) else {
                return Err(CommandError::usage(
                    "error decoding pos / normal - incomplete command?",
                ));
            };
            engine.coords.set(i, CoordData {
                pos: Vec3::new(x, y, z),
                normal: Vec3::new(nx, ny, nz),
            });
        }
        Ok(())
    }

    fn describe(&self, engine: &Engine, _verb: &str) -> Option<IdlNode> {
        let mut idents = IdlNode::keyword();
        for name in engine.egresses.instance_names() {
            idents.set(name, None);
        }
        Some(IdlNode::sequence(vec![
            idents,
            IdlNode::integer_min(0),
            IdlNode::repeat(IdlNode::sequence(vec![
                IdlNode::float(),
                IdlNode::float(),
                IdlNode::float(),
                IdlNode::float(),
                IdlNode::float(),
                IdlNode::float(),
            ])),
        ]))
    }
}
