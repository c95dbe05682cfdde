//! Engine Core
//!
//! [`Engine`] is the single owner of every registry in the system: the
//! triple-buffered [`Frame`], the animation registry and animator pool,
//! the egress list, the module registry with its command bus and hook
//! channels, the module library, the pixel coordinate table and the
//! named LED groups.
//!
//! All mutation happens on the orchestrator thread. Transports feed the
//! engine through a command channel ([`Engine::command_sender`]); the
//! orchestrator drains it once per frame, so command handlers never race
//! with rendering.
//!
//! # Frame sequencing
//!
//! [`Engine::begin_frame`] performs the in-frame steps in strict order:
//! publish the rendered frame (`flush_egress`), run the `applyFilter`
//! hook, flush every active egress, drain pending commands, flush all
//! modules, promote the animator pool, and snapshot `preanim` into
//! `anim`. The orchestrator then paces the clock and renders.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::animation::{AnimKey, Animation, AnimationBehavior, AnimationRegistry, AnimatorPool};
use crate::egress::{EgressFlush, EgressInstance, EgressKey, EgressList};
use crate::frame::Frame;
use crate::idl::IdlNode;
use crate::ledset::LedSet;
use crate::library::ModuleLibrary;
use crate::module::{
    EngineModule, HookEvent, HookId, ModKey, ModuleRegistry, ModuleSlot, ResponseKind,
};
use crate::modules::coordinates::CoordinateStore;
use crate::modules::grouping::GroupTable;
use crate::scan::LineScanner;

/// A command line queued by a transport thread.
#[derive(Clone, Debug)]
pub struct PendingCommand {
    pub line: String,
    pub source: String,
}

struct BuiltinHooks {
    leds_added: HookId,
    leds_removed: HookId,
    apply_filter: HookId,
    idl_changed: HookId,
}

pub struct Engine {
    pub frame: Frame,
    pub animations: AnimationRegistry,
    pub pool: AnimatorPool,
    pub egresses: EgressList,
    pub modules: ModuleRegistry,
    pub library: ModuleLibrary,
    pub coords: CoordinateStore,
    pub groups: GroupTable,
    hooks: BuiltinHooks,
    pending_tx: flume::Sender<PendingCommand>,
    pending_rx: flume::Receiver<PendingCommand>,
    running: Arc<AtomicBool>,
    cmd_source: String,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Builds an engine with the built-in library and the standard
    /// singleton modules instantiated.
    #[must_use]
    pub fn new() -> Self {
        let (pending_tx, pending_rx) = flume::unbounded();
        let mut modules = ModuleRegistry::new();
        let hooks = BuiltinHooks {
            leds_added: modules.hook_resolve("ledsAdded"),
            leds_removed: modules.hook_resolve("ledsRemoved"),
            apply_filter: modules.hook_resolve("applyFilter"),
            idl_changed: modules.hook_resolve("idlChanged"),
        };
        let mut engine = Self {
            frame: Frame::new(),
            animations: AnimationRegistry::new(),
            pool: AnimatorPool::new(),
            egresses: EgressList::new(),
            modules,
            library: ModuleLibrary::builtin(),
            coords: CoordinateStore::new(),
            groups: GroupTable::new(),
            hooks,
            pending_tx,
            pending_rx,
            running: Arc::new(AtomicBool::new(false)),
            cmd_source: String::new(),
        };
        for ident in [
            "bootstrap",
            "display",
            "coordinates",
            "grouping",
            "streams",
            "filter_brightness",
            "filter_overlay",
        ] {
            engine.module_instantiate(ident, None, "");
        }
        engine
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    pub fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Shared running flag for animator threads and signal handlers.
    #[must_use]
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    /// Producer handle for transport threads.
    #[must_use]
    pub fn command_sender(&self) -> flume::Sender<PendingCommand> {
        self.pending_tx.clone()
    }

    // ========================================================================
    // Command bus
    // ========================================================================

    /// Parses and dispatches one command line. Returns whether a handler
    /// ran successfully.
    pub fn run_command(&mut self, line: &str, source: &str) -> bool {
        let mut scanner = LineScanner::new(line);
        let Some(verb) = scanner.next_token() else {
            return false;
        };

        let previous = std::mem::replace(&mut self.cmd_source, source.to_string());
        let ok = match self.modules.command_owner(verb) {
            Some(key) => {
                match self.with_module(key, |m, e| m.command(e, key, verb, &mut scanner)) {
                    Some(Ok(())) => true,
                    Some(Err(err)) => {
                        self.respond(ResponseKind::Error, &err.to_string());
                        false
                    }
                    None => false,
                }
            }
            None => {
                let mut message = format!("unknown command: '{verb}'");
                if !source.is_empty() {
                    message.push_str(&format!(" in {source}"));
                }
                self.respond(ResponseKind::Error, &message);
                false
            }
        };
        self.cmd_source = previous;
        ok
    }

    /// Writes a response through the sink stack, tagged with the source
    /// of the command currently executing.
    pub fn respond(&mut self, kind: ResponseKind, text: &str) {
        let source = std::mem::take(&mut self.cmd_source);
        self.modules.respond(kind, &source, text);
        self.cmd_source = source;
    }

    /// Assembles the IDL tree over every registered command.
    pub fn commands_describe(&mut self) -> IdlNode {
        let mut root = IdlNode::keyword();
        for verb in self.modules.command_names() {
            let Some(key) = self.modules.command_owner(&verb) else {
                continue;
            };
            let child = self.with_module(key, |m, e| m.describe(e, &verb)).flatten();
            root.set(verb, child);
        }
        root
    }

    // ========================================================================
    // Modules and hooks
    // ========================================================================

    /// Returns an existing singleton or named instance, or constructs a
    /// new module from `mod_<ident>`.
    pub fn module_instantiate(
        &mut self,
        ident: &str,
        instance_name: Option<&str>,
        args: &str,
    ) -> Option<ModKey> {
        let instance_name = instance_name.filter(|n| !n.is_empty());
        if let Some(&key) = self.modules.singletons.get(ident) {
            return Some(key);
        }
        if let Some(name) = instance_name {
            if let Some(&key) = self.modules.names.get(name) {
                return Some(key);
            }
        }

        let full = format!("mod_{ident}");
        let Some((create, singleton)) = self.library.module(&full) else {
            self.respond(ResponseKind::Warning, &format!("unable to find module {ident}"));
            return None;
        };

        let key = self.modules.slots.insert(ModuleSlot {
            ident: ident.to_string(),
            instance: instance_name.map(str::to_string),
            module: None,
        });
        if singleton {
            self.modules.singletons.insert(ident.to_string(), key);
        }
        if let Some(name) = instance_name {
            self.modules.names.insert(name.to_string(), key);
        }
        log::info!("instantiating module {ident} with argstring: {args}");
        if let Some(slot) = self.modules.slots.get_mut(key) {
            slot.module = Some(create());
        }
        self.with_module(key, |m, e| {
            let mut scanner = LineScanner::new(args);
            m.init(e, key, &mut scanner);
        });
        Some(key)
    }

    /// Removes a module, its command registrations and hook
    /// subscriptions.
    pub fn module_remove(&mut self, key: ModKey) {
        self.with_module(key, |m, e| m.shutdown(e, key));
        if self.modules.remove_module(key).is_none() {
            self.respond(
                ResponseKind::Warning,
                "attempted to remove non-existing module",
            );
        }
    }

    /// Runs `f` with the module taken out of its slot, so the module may
    /// mutate the engine reentrantly.
    pub(crate) fn with_module<R>(
        &mut self,
        key: ModKey,
        f: impl FnOnce(&mut dyn EngineModule, &mut Engine) -> R,
    ) -> Option<R> {
        let mut module = self.modules.slots.get_mut(key)?.module.take()?;
        let out = f(module.as_mut(), self);
        // the module may have removed itself during the call
        if let Some(slot) = self.modules.slots.get_mut(key) {
            slot.module = Some(module);
        }
        Some(out)
    }

    /// Fires a hook channel; subscribers run in subscription order, dead
    /// modules are skipped.
    pub fn trigger_hook(&mut self, hook: HookId, event: HookEvent) {
        for key in self.modules.subscribers(hook) {
            self.with_module(key, |m, e| m.hook(e, key, &event));
        }
    }

    /// Fires `idlChanged` - the command surface or one of its referenced
    /// enumerations changed.
    pub fn idl_changed(&mut self) {
        self.trigger_hook(self.hooks.idl_changed, HookEvent::IdlChanged);
    }

    // ========================================================================
    // Animations
    // ========================================================================

    /// Instantiates an `anim_<ident>` behavior on the given LEDs and
    /// registers it. A library miss or factory failure yields `None`;
    /// the caller surfaces the error.
    pub fn anim_init(&mut self, ident: &str, leds: &LedSet, args: &str) -> Option<AnimKey> {
        let full = format!("anim_{ident}");
        let Some(create) = self.library.animation(&full) else {
            log::debug!("unable to find animation {ident}");
            return None;
        };
        let mut scanner = LineScanner::new(args);
        match create(self, leds.as_slice(), &mut scanner) {
            Ok(behavior) => {
                Some(self.animations.register(Animation::new(ident, behavior, leds.clone())))
            }
            Err(err) => {
                self.respond(ResponseKind::Warning, &err.to_string());
                None
            }
        }
    }

    /// Registers a behavior constructed in-process (blend animations).
    pub fn anim_define(
        &mut self,
        ident: &str,
        behavior: Box<dyn AnimationBehavior>,
        leds: LedSet,
    ) -> AnimKey {
        self.animations.register(Animation::new(ident, behavior, leds))
    }

    // ========================================================================
    // Egresses
    // ========================================================================

    /// Appends an egress instance, grows the frame and fires `ledsAdded`.
    /// An existing instance name returns the existing key.
    pub fn egress_init(
        &mut self,
        ident: &str,
        instance_name: &str,
        count: u32,
        args: &str,
    ) -> Option<EgressKey> {
        if let Some(key) = self.egresses.find(instance_name) {
            return Some(key);
        }
        let full = format!("egress_{ident}");
        let Some(create) = self.library.egress(&full) else {
            self.respond(
                ResponseKind::Warning,
                &format!("unable to find egress module {ident}"),
            );
            return None;
        };
        let mut scanner = LineScanner::new(args);
        let behavior = match create(self, &mut scanner) {
            Ok(behavior) => behavior,
            Err(err) => {
                self.respond(ResponseKind::Warning, &err.to_string());
                return None;
            }
        };
        let key = self.egresses.push(ident, instance_name, count, behavior);
        self.trigger_hook(self.hooks.leds_added, HookEvent::LedsAdded { count });
        self.frame.leds_added(count);
        Some(key)
    }

    /// Removes an egress and cascades the index shift through the frame,
    /// the pool, every animation and every subscribed module.
    pub fn egress_remove(&mut self, key: EgressKey) {
        let offset = self.egresses.offset_of(key);
        let Some(count) = self.egresses.get(key).map(|inst| inst.count) else {
            return;
        };
        self.trigger_hook(self.hooks.leds_removed, HookEvent::LedsRemoved { offset, count });
        self.frame.leds_removed(offset, count);
        self.pool.leds_removed(offset, count);
        self.animations.leds_removed(offset, count);
        self.egresses.remove(key);
    }

    // ========================================================================
    // Frame sequencing
    // ========================================================================

    /// Steps 1–7 of the frame loop, in strict order.
    pub fn begin_frame(&mut self) {
        self.frame.flush_egress();
        self.trigger_hook(self.hooks.apply_filter, HookEvent::ApplyFilter);
        self.flush_egresses();
        self.drain_commands();
        self.flush_modules();
        self.pool.flush(&mut self.animations);
        self.frame.flush_anim();
    }

    /// Single-threaded render: animator 0 paints straight into `anim`.
    pub fn render_frame(&mut self, now: Instant) {
        self.pool.render_single(&mut self.frame.anim, now);
    }

    /// Multi-thread support: refresh every animator's scratch snapshot.
    pub fn scatter(&mut self) {
        self.pool.scatter(&self.frame.anim);
    }

    /// Multi-thread support: merge rendered scratch pixels into `anim`.
    pub fn gather(&mut self) {
        self.pool.gather(&mut self.frame.anim);
    }

    /// Flushes every active egress with its offset, count and schema.
    pub fn flush_egresses(&mut self) {
        let mut offset = 0u32;
        let order = self.egresses.order.clone();
        for key in order {
            let frame = &self.frame.egress;
            let Some(inst) = self.egresses.map.get_mut(key) else {
                continue;
            };
            let count = inst.count;
            if inst.active {
                let EgressInstance { behavior, streams, .. } = inst;
                behavior.flush(&EgressFlush {
                    leds: frame,
                    offset,
                    count,
                    streams: streams.as_slice(),
                });
            }
            offset += count;
        }
    }

    /// Runs queued transport commands on the orchestrator thread.
    pub fn drain_commands(&mut self) {
        let pending: Vec<PendingCommand> = self.pending_rx.try_iter().collect();
        for command in pending {
            self.run_command(&command.line, &command.source);
        }
    }

    /// Calls every module's `flush` and promotes staged egress schemas.
    pub fn flush_modules(&mut self) {
        let keys: Vec<ModKey> = self.modules.slots.keys().collect();
        for key in keys {
            self.with_module(key, |m, e| m.flush(e, key));
        }
        self.egresses.promote_streams();
    }
}
