//! Bootstrap module - the core command surface.
//!
//! Registers the module and egress lifecycle verbs plus the
//! introspection commands (`status`, `idl`) and `quit`.

use crate::engine::Engine;
use crate::errors::CommandError;
use crate::idl::IdlNode;
use crate::module::{EngineModule, ModKey, ResponseKind};
use crate::scan::LineScanner;

#[derive(Default)]
pub struct BootstrapModule;

#[must_use]
pub fn create() -> Box<dyn EngineModule> {
    Box::new(BootstrapModule)
}

impl EngineModule for BootstrapModule {
    fn init(&mut self, engine: &mut Engine, modno: ModKey, _args: &mut LineScanner<'_>) {
        for verb in [
            "module_instantiate",
            "module_remove",
            "egress_init",
            "egress_remove",
            "egress_set_active",
            "status",
            "idl",
            "quit",
        ] {
            engine.modules.register_command(verb, modno);
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
            "module_instantiate" => {
                let (Some(ident), instance) = (args.next_token(), args.next_token()) else {
                    return Err(CommandError::usage(
                        "usage: module_instantiate <ident> [instance-name] [args...]",
                    ));
                };
                let ident = ident.to_string();
                let instance = instance.map(str::to_string);
                let rest = args.rest().to_string();
                match engine.module_instantiate(&ident, instance.as_deref(), &rest) {
                    Some(_) => {
                        engine.respond(
                            ResponseKind::Info,
                            &format!("instantiated module '{ident}'"),
                        );
                    }
                    None => {
                        engine.respond(
                            ResponseKind::Warning,
                            &format!("initialization failed for module {ident}"),
                        );
                    }
                }
                engine.idl_changed();
                Ok(())
            }
            "module_remove" => {
                let Some(name) = args.next_token() else {
                    return Err(CommandError::usage("usage: module_remove <instance-name>"));
                };
                let Some(key) = engine.modules.find(name) else {
                    engine.respond(
                        ResponseKind::Warning,
                        &format!("module instance {name} not found - cannot delete"),
                    );
                    return Ok(());
                };
                engine.module_remove(key);
                engine.idl_changed();
                Ok(())
            }
            "egress_init" => {
                let (Some(ident), Some(instance), Some(count)) =
                    (args.next_token(), args.next_token(), args.get::<u32>())
                else {
                    return Err(CommandError::usage(
                        "usage: egress_init <ident> <instance-name> <count> [args...]",
                    ));
                };
                let ident = ident.to_string();
                let instance = instance.to_string();
                let rest = args.rest().to_string();
                match engine.egress_init(&ident, &instance, count, &rest) {
                    Some(_) => {
                        engine.respond(
                            ResponseKind::Info,
                            &format!("instantiated egress '{instance}' ({ident})"),
                        );
                    }
                    None => {
                        engine.respond(
                            ResponseKind::Warning,
                            &format!("initialization failed for egress module {ident}"),
                        );
                    }
                }
                engine.idl_changed();
                Ok(())
            }
            "egress_remove" => {
                let Some(name) = args.next_token() else {
                    return Err(CommandError::usage("usage: egress_remove <instance-name>"));
                };
                let Some(key) = engine.egresses.find(name) else {
                    engine.respond(
                        ResponseKind::Warning,
                        &format!("egress module instance {name} not found - cannot delete"),
                    );
                    return Ok(());
                };
                engine.egress_remove(key);
                engine.idl_changed();
                Ok(())
            }
            "egress_set_active" => {
                let (Some(name), Some(active)) = (args.next_token(), args.get::<i32>()) else {
                    return Err(CommandError::usage(
                        "usage: egress_set_active <instance-name> <0|1>",
                    ));
                };
                let Some(key) = engine.egresses.find(name) else {
                    engine.respond(
                        ResponseKind::Warning,
                        &format!("egress module instance {name} not found - cannot set active"),
                    );
                    return Ok(());
                };
                engine.egresses.set_active(key, active != 0);
                Ok(())
            }
            "status" => {
                let mut out = String::new();
                out.push_str(&format!("library modules: {}\n", engine.library.names().len()));
                for name in engine.library.names() {
                    out.push_str(&format!("  {name}\n"));
                }
                out.push_str(&format!("modules: {}\n", engine.modules.len()));
                out.push_str(&format!("egress modules: {}\n", engine.egresses.len()));
                for (_, inst) in engine.egresses.iter() {
                    out.push_str(&format!(
                        "  {} ({}) count:{} active:{}\n",
                        inst.instance_name, inst.ident, inst.count, inst.active
                    ));
                }
                out.push_str(&format!("animations: {}\n", engine.animations.len()));
                for (_, entry) in engine.animations.iter() {
                    out.push_str(&format!(
                        "  {} uc:{} leds:{}\n",
                        entry.ident,
                        entry.usage,
                        entry.shared.lock().leds().len()
                    ));
                }
                engine.respond(ResponseKind::Info, &out);

                let keys: Vec<ModKey> = engine.modules.slots.keys().collect();
                for key in keys {
                    if let Some(Some(status)) = engine.with_module(key, |m, e| m.status(e)) {
                        engine.respond(ResponseKind::Info, &status);
                    }
                }
                Ok(())
            }
            "idl" => {
                let tree = engine.commands_describe();
                let json = serde_json::to_string_pretty(&tree.to_json())
                    .unwrap_or_else(|_| String::from("{}"));
                engine.respond(ResponseKind::Info, &format!("idl:\n{json}"));
                Ok(())
            }
            "quit" => {
                engine.stop();
                Ok(())
            }
            other => Err(CommandError::usage(format!("unhandled command '{other}'"))),
        }
    }

    fn describe(&self, engine: &Engine, verb: &str) -> Option<IdlNode> {
        match verb {
            "module_instantiate" => {
                let mut root = IdlNode::keyword();
                for ident in engine.library.names_with_prefix("mod_") {
                    root.set(ident, Some(IdlNode::sequence(vec![IdlNode::Str])));
                }
                Some(root)
            }
            "module_remove" => {
                let mut root = IdlNode::keyword();
                for (_, slot) in &engine.modules.slots {
                    if let Some(name) = &slot.instance {
                        root.set(name.clone(), None);
                    }
                }
                Some(root)
            }
            "egress_init" => {
                let mut root = IdlNode::keyword();
                for ident in engine.library.names_with_prefix("egress_") {
                    let params = engine.library.describe(&format!("egress_{ident}"));
                    let mut seq = vec![IdlNode::Str, IdlNode::integer_min(0)];
                    if let Some(params) = params {
                        seq.push(params);
                    }
                    root.set(ident, Some(IdlNode::sequence(seq)));
                }
                Some(root)
            }
            "egress_remove" => {
                let mut root = IdlNode::keyword();
                for name in engine.egresses.instance_names() {
                    root.set(name, None);
                }
                Some(root)
            }
            "egress_set_active" => {
                let mut names = IdlNode::keyword();
                for name in engine.egresses.instance_names() {
                    names.set(name, None);
                }
                Some(IdlNode::sequence(vec![names, IdlNode::integer_range(0, 1)]))
            }
            _ => None,
        }
    }
}
