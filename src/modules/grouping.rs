//! Named LED groups.
//!
//! Groups collect egress-relative pixel ranges under a name so selectors
//! can reuse them. Group contents live in global frame indices and shift
//! with physical LED removal.

use rustc_hash::FxHashMap;

use crate::engine::Engine;
use crate::errors::CommandError;
use crate::ledset::LedSet;
use crate::module::{EngineModule, HookEvent, ModKey};
use crate::scan::LineScanner;

#[derive(Default)]
pub struct GroupTable {
    groups: FxHashMap<String, LedSet>,
}

impl GroupTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&LedSet> {
        self.groups.get(name)
    }

    /// Group names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.groups.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    pub fn add(&mut self, name: &str, first: u32, count: u32) {
        self.groups.entry(name.to_string()).or_default().append_range(first, count);
    }

    /// Removes a pixel range from every group without shifting indices.
    pub fn remove_range(&mut self, first: u32, count: u32) {
        let range = LedSet::from_range(first, count);
        self.groups.retain(|_, set| {
            set.subtract(&range);
            !set.is_empty()
        });
    }

    pub fn clear(&mut self, name: &str) {
        self.groups.remove(name);
    }

    /// Shifts group contents after a physical LED removal.
    pub fn adjust_removed(&mut self, offset: u32, count: u32) {
        self.groups.retain(|_, set| {
            set.adjust_removed(offset, count);
            !set.is_empty()
        });
    }
}

/// The `grouping` module: `group_add`, `group_remove`, `group_clear`.
#[derive(Default)]
pub struct GroupingModule;

#[must_use]
pub fn create() -> Box<dyn EngineModule> {
    Box::new(GroupingModule)
}

impl EngineModule for GroupingModule {
    fn init(&mut self, engine: &mut Engine, modno: ModKey, _args: &mut LineScanner<'_>) {
        engine.modules.register_command("group_add", modno);
        engine.modules.register_command("group_remove", modno);
        engine.modules.register_command("group_clear", modno);
        let removed = engine.modules.hook_resolve("ledsRemoved");
        engine.modules.subscribe(modno, removed);
    }

    fn hook(&mut self, engine: &mut Engine, _modno: ModKey, event: &HookEvent) {
        if let HookEvent::LedsRemoved { offset, count } = *event {
            engine.groups.adjust_removed(offset, count);
        }
    }

    fn command(
        &mut self,
        engine: &mut Engine,
        _modno: ModKey,
        verb: &str,
        args: &mut LineScanner<'_>,
    ) -> Result<(), CommandError> {
        match verb {
            "group_add" => {
                let (Some(group), Some(egress), Some(first), Some(count)) = (
                    args.next_token(),
                    args.next_token(),
                    args.get::<u32>(),
                    args.get::<u32>(),
                ) else {
                    return Err(CommandError::usage(
                        "usage: group_add <group> <egress> <first> <count>",
                    ));
                };
                let first = first + egress_base(engine, egress)?;
                engine.groups.add(group, first, count);
                Ok(())
            }
            "group_remove" => {
                let (Some(egress), Some(first), Some(count)) =
                    (args.next_token(), args.get::<u32>(), args.get::<u32>())
                else {
                    return Err(CommandError::usage(
                        "usage: group_remove <egress> <first> <count>",
                    ));
                };
                let first = first + egress_base(engine, egress)?;
                engine.groups.remove_range(first, count);
                Ok(())
            }
            "group_clear" => {
                let Some(group) = args.next_token() else {
                    return Err(CommandError::usage("usage: group_clear <group>"));
                };
                engine.groups.clear(group);
                Ok(())
            }
            other => Err(CommandError::usage(format!("unhandled command '{other}'"))),
        }
    }
}

fn egress_base(engine: &Engine, name: &str) -> Result<u32, CommandError> {
    let Some(key) = engine.egresses.find(name) else {
        return Err(CommandError::not_found(format!(
            "cannot group LEDs - egress '{name}' not found"
        )));
    };
    Ok(engine.egresses.offset_of(key))
}
