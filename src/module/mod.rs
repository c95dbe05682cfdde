//! Runtime modules, the command bus and hook channels.
//!
//! A module is a named runtime singleton or instance constructed from a
//! `mod_*` library entry. Modules register commands during `init`,
//! subscribe to named hook channels, and promote staged state when the
//! orchestrator calls their `flush` each frame.
//!
//! # Dispatch
//!
//! The command registry maps each verb to the owning module's [`ModKey`];
//! dispatch routes the verb back through [`EngineModule::command`].
//! Handlers return `Result<(), CommandError>` and the dispatcher is the
//! only place errors become response-sink writes.
//!
//! # Response sinks
//!
//! Transports running a command push a custom sink, dispatch, then pop;
//! with the stack empty, responses route to the logger.
//!
//! # Hooks
//!
//! [`HookEvent`] carries the payload with the trigger. Subscribers fire
//! in subscription order; subscriptions of removed modules are skipped.

use rustc_hash::FxHashMap;
use slotmap::{SlotMap, new_key_type};

use crate::engine::Engine;
use crate::errors::CommandError;
use crate::idl::IdlNode;
use crate::scan::LineScanner;

new_key_type! {
    /// Handle for modules in the [`ModuleRegistry`].
    pub struct ModKey;
}

/// Stable id of a named hook channel.
pub type HookId = usize;

/// Severity of a command response. `letter()` gives the wire tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseKind {
    Error,
    Warning,
    Info,
    Debug,
    Trace,
}

impl ResponseKind {
    #[must_use]
    pub fn letter(self) -> char {
        match self {
            ResponseKind::Error => 'E',
            ResponseKind::Warning => 'W',
            ResponseKind::Info => 'I',
            ResponseKind::Debug => 'D',
            ResponseKind::Trace => 'T',
        }
    }
}

/// Payload of a hook trigger.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HookEvent {
    LedsAdded { count: u32 },
    LedsRemoved { offset: u32, count: u32 },
    ApplyFilter,
    IdlChanged,
}

/// Behavior of one runtime module.
///
/// Modules are taken out of their registry slot for the duration of each
/// call, so every method may freely mutate the engine - including
/// instantiating further modules or registering more commands. Modules
/// are `Send` so the whole engine value can move between threads.
pub trait EngineModule: Send {
    /// Construction-time setup: command registration, hook subscription.
    fn init(&mut self, engine: &mut Engine, modno: ModKey, args: &mut LineScanner<'_>);

    /// Per-frame staged-state promotion.
    fn flush(&mut self, _engine: &mut Engine, _modno: ModKey) {}

    /// Handles one of the verbs this module registered.
    fn command(
        &mut self,
        engine: &mut Engine,
        modno: ModKey,
        verb: &str,
        args: &mut LineScanner<'_>,
    ) -> Result<(), CommandError> {
        let _ = (engine, modno, args);
        Err(CommandError::usage(format!("unhandled command '{verb}'")))
    }

    /// Argument grammar of one of this module's verbs.
    fn describe(&self, _engine: &Engine, _verb: &str) -> Option<IdlNode> {
        None
    }

    /// Reacts to a hook this module subscribed to.
    fn hook(&mut self, _engine: &mut Engine, _modno: ModKey, _event: &HookEvent) {}

    /// Human-readable state dump for the `status` command.
    fn status(&self, _engine: &Engine) -> Option<String> {
        None
    }

    /// Teardown before removal.
    fn shutdown(&mut self, _engine: &mut Engine, _modno: ModKey) {}
}

pub(crate) struct ModuleSlot {
    pub ident: String,
    pub instance: Option<String>,
    pub module: Option<Box<dyn EngineModule>>,
}

pub type ResponseSink = Box<dyn FnMut(ResponseKind, &str, &str) + Send>;

/// Owner of module slots, the command map, hook channels and the
/// response-sink stack.
#[derive(Default)]
pub struct ModuleRegistry {
    pub(crate) slots: SlotMap<ModKey, ModuleSlot>,
    pub(crate) names: FxHashMap<String, ModKey>,
    pub(crate) singletons: FxHashMap<String, ModKey>,
    pub(crate) commands: FxHashMap<String, ModKey>,
    hooks: Vec<Vec<ModKey>>,
    hook_names: FxHashMap<String, HookId>,
    responders: Vec<ResponseSink>,
}

impl ModuleRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[must_use]
    pub fn find(&self, instance_name: &str) -> Option<ModKey> {
        self.names.get(instance_name).copied()
    }

    #[must_use]
    pub fn command_owner(&self, verb: &str) -> Option<ModKey> {
        self.commands.get(verb).copied()
    }

    /// Registered verbs in sorted order.
    #[must_use]
    pub fn command_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.commands.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Binds a verb to the owning module. Later registrations replace
    /// earlier ones.
    pub fn register_command(&mut self, verb: impl Into<String>, owner: ModKey) {
        self.commands.insert(verb.into(), owner);
    }

    /// Resolves a hook name to its stable id, allocating on first use.
    pub fn hook_resolve(&mut self, name: &str) -> HookId {
        if let Some(&id) = self.hook_names.get(name) {
            return id;
        }
        let id = self.hooks.len();
        self.hook_names.insert(name.to_string(), id);
        self.hooks.push(Vec::new());
        id
    }

    /// Subscribes a module to a hook channel.
    pub fn subscribe(&mut self, modno: ModKey, hook: HookId) {
        if let Some(subscribers) = self.hooks.get_mut(hook) {
            subscribers.push(modno);
        }
    }

    #[must_use]
    pub(crate) fn subscribers(&self, hook: HookId) -> Vec<ModKey> {
        self.hooks.get(hook).cloned().unwrap_or_default()
    }

    pub(crate) fn remove_module(&mut self, key: ModKey) -> Option<ModuleSlot> {
        let slot = self.slots.remove(key)?;
        if let Some(name) = &slot.instance {
            self.names.remove(name);
        }
        if self.singletons.get(&slot.ident) == Some(&key) {
            self.singletons.remove(&slot.ident);
        }
        self.commands.retain(|_, owner| *owner != key);
        for subscribers in &mut self.hooks {
            subscribers.retain(|&k| k != key);
        }
        Some(slot)
    }

    pub fn push_responder(&mut self, sink: ResponseSink) {
        self.responders.push(sink);
    }

    pub fn pop_responder(&mut self) {
        self.responders.pop();
    }

    /// Routes a response through the top-of-stack sink, or the default
    /// log-backed sink when the stack is empty.
    pub fn respond(&mut self, kind: ResponseKind, source: &str, text: &str) {
        if let Some(sink) = self.responders.last_mut() {
            sink(kind, source, text);
            return;
        }
        respond_default(kind, source, text);
    }
}

fn respond_default(kind: ResponseKind, source: &str, text: &str) {
    let prefix = if source.is_empty() { String::new() } else { format!("{source}: ") };
    match kind {
        ResponseKind::Error => log::error!("{prefix}{text}"),
        ResponseKind::Warning => log::warn!("{prefix}{text}"),
        ResponseKind::Info => log::info!("{prefix}{text}"),
        ResponseKind::Debug => log::debug!("{prefix}{text}"),
        ResponseKind::Trace => log::trace!("{prefix}{text}"),
    }
}
