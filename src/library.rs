//! The module library - compile-time registry of loadable behaviors.
//!
//! Maps full module names (`anim_rainbow`, `blend_fade`, `egress_console`,
//! `mod_display`) to typed factories. This is the static backend of the
//! classic symbol-resolver design: trait objects stand in for per-symbol
//! function pointers, so a module that "forgot its iterate function"
//! cannot exist. [`ModuleLibrary::register`] lets embedders and tests add
//! entries at runtime.

use rustc_hash::FxHashMap;

use crate::animation::AnimationBehavior;
use crate::blends::BlendBehavior;
use crate::egress::EgressBehavior;
use crate::engine::Engine;
use crate::errors::CommandError;
use crate::idl::IdlNode;
use crate::module::EngineModule;
use crate::scan::LineScanner;

pub type AnimationFactory =
    fn(&Engine, &[u32], &mut LineScanner<'_>) -> Result<Box<dyn AnimationBehavior>, CommandError>;
pub type BlendFactory =
    fn(&Engine, &mut LineScanner<'_>) -> Result<Box<dyn BlendBehavior>, CommandError>;
pub type EgressFactory =
    fn(&Engine, &mut LineScanner<'_>) -> Result<Box<dyn EgressBehavior>, CommandError>;
pub type ModuleFactory = fn() -> Box<dyn EngineModule>;
pub type DescribeFn = fn() -> IdlNode;

pub enum Descriptor {
    Animation { create: AnimationFactory, describe: Option<DescribeFn> },
    Blend { create: BlendFactory, describe: Option<DescribeFn> },
    Egress { create: EgressFactory, describe: Option<DescribeFn> },
    Module { create: ModuleFactory, singleton: bool },
}

#[derive(Default)]
pub struct ModuleLibrary {
    entries: FxHashMap<String, Descriptor>,
}

impl ModuleLibrary {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The library with every built-in behavior installed.
    #[must_use]
    pub fn builtin() -> Self {
        let mut lib = Self::new();

        lib.register("anim_rainbow", Descriptor::Animation {
            create: crate::anims::rainbow::create,
            describe: Some(crate::anims::rainbow::describe),
        });
        lib.register("anim_solid", Descriptor::Animation {
            create: crate::anims::solid::create,
            describe: Some(crate::anims::solid::describe),
        });
        lib.register("anim_sparkle", Descriptor::Animation {
            create: crate::anims::sparkle::create,
            describe: Some(crate::anims::sparkle::describe),
        });

        lib.register("blend_fade", Descriptor::Blend {
            create: crate::blends::fade::create,
            describe: Some(crate::blends::fade::describe),
        });
        lib.register("blend_wipe", Descriptor::Blend {
            create: crate::blends::wipe::create,
            describe: Some(crate::blends::wipe::describe),
        });

        lib.register("egress_console", Descriptor::Egress {
            create: crate::egresses::console::create,
            describe: Some(crate::egresses::console::describe),
        });
        lib.register("egress_dummy", Descriptor::Egress {
            create: crate::egresses::dummy::create,
            describe: None,
        });
        lib.register("egress_upsilon-striped", Descriptor::Egress {
            create: crate::egresses::upsilon::create,
            describe: Some(crate::egresses::upsilon::describe),
        });

        lib.register("mod_bootstrap", Descriptor::Module {
            create: crate::modules::bootstrap::create,
            singleton: true,
        });
        lib.register("mod_display", Descriptor::Module {
            create: crate::modules::display::create,
            singleton: true,
        });
        lib.register("mod_coordinates", Descriptor::Module {
            create: crate::modules::coordinates::create,
            singleton: true,
        });
        lib.register("mod_grouping", Descriptor::Module {
            create: crate::modules::grouping::create,
            singleton: true,
        });
        lib.register("mod_streams", Descriptor::Module {
            create: crate::modules::streams::create,
            singleton: true,
        });
        lib.register("mod_filter_brightness", Descriptor::Module {
            create: crate::modules::brightness::create,
            singleton: true,
        });
        lib.register("mod_filter_overlay", Descriptor::Module {
            create: crate::modules::overlay::create,
            singleton: true,
        });
        lib.register("mod_input_stdin", Descriptor::Module {
            create: crate::modules::stdin_input::create,
            singleton: true,
        });

        lib
    }

    pub fn register(&mut self, name: impl Into<String>, descriptor: Descriptor) {
        self.entries.insert(name.into(), descriptor);
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    #[must_use]
    pub fn animation(&self, name: &str) -> Option<AnimationFactory> {
        match self.entries.get(name) {
            Some(Descriptor::Animation { create, .. }) => Some(*create),
            _ => None,
        }
    }

    #[must_use]
    pub fn blend(&self, name: &str) -> Option<BlendFactory> {
        match self.entries.get(name) {
            Some(Descriptor::Blend { create, .. }) => Some(*create),
            _ => None,
        }
    }

    #[must_use]
    pub fn egress(&self, name: &str) -> Option<EgressFactory> {
        match self.entries.get(name) {
            Some(Descriptor::Egress { create, .. }) => Some(*create),
            _ => None,
        }
    }

    #[must_use]
    pub fn module(&self, name: &str) -> Option<(ModuleFactory, bool)> {
        match self.entries.get(name) {
            Some(Descriptor::Module { create, singleton }) => Some((*create, *singleton)),
            _ => None,
        }
    }

    /// Parameter grammar of a named animation/blend/egress, if declared.
    #[must_use]
    pub fn describe(&self, name: &str) -> Option<IdlNode> {
        match self.entries.get(name) {
            Some(
                Descriptor::Animation { describe, .. }
                | Descriptor::Blend { describe, .. }
                | Descriptor::Egress { describe, .. },
            ) => describe.map(|f| f()),
            _ => None,
        }
    }

    /// All entry names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Entry names with the given role prefix, stripped of the prefix.
    #[must_use]
    pub fn names_with_prefix(&self, prefix: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .keys()
            .filter_map(|n| n.strip_prefix(prefix).map(str::to_string))
            .collect();
        names.sort_unstable();
        names
    }
}
