//! Stream schema definition.
//!
//! `streams_define <egress> (<encoding> <count>)+` declares the typed
//! segments partitioning an egress's pixel range. The schema is staged
//! on the instance and promoted to the transport-visible copy at module
//! flush, so a transport never observes a half-written schema.

use smallvec::SmallVec;

use crate::engine::Engine;
use crate::errors::CommandError;
use crate::idl::IdlNode;
use crate::module::{EngineModule, ModKey, ResponseKind};
use crate::scan::LineScanner;
use crate::stream::{Encoding, StreamSegment};

#[derive(Default)]
pub struct StreamsModule;

#[must_use]
pub fn create() -> Box<dyn EngineModule> {
    Box::new(StreamsModule)
}

impl EngineModule for StreamsModule {
    fn init(&mut self, engine: &mut Engine, modno: ModKey, _args: &mut LineScanner<'_>) {
        engine.modules.register_command("streams_define", modno);
    }

    fn command(
        &mut self,
        engine: &mut Engine,
        _modno: ModKey,
        _verb: &str,
        args: &mut LineScanner<'_>,
    ) -> Result<(), CommandError> {
        let Some(egress_name) = args.next_token() else {
            return Err(CommandError::usage(
                "incomplete streams_define command - missing egress module name",
            ));
        };
        let egress_name = egress_name.to_string();
        let Some(key) = engine.egresses.find(&egress_name) else {
            return Err(CommandError::not_found(format!(
                "egress instance '{egress_name}' does not exist"
            )));
        };
        let total = engine.egresses.get(key).map_or(0, |inst| inst.count);

        let mut schema: SmallVec<[StreamSegment; 4]> = SmallVec::new();
        let mut remain = total;
        while remain > 0 {
            let Some(tag) = args.next_token() else {
                break;
            };
            let Some(encoding) = Encoding::parse(tag) else {
                return Err(CommandError::usage(format!(
                    "invalid type for led stream: '{tag}'"
                )));
            };
            let Some(count) = args.get::<u32>() else {
                return Err(CommandError::usage("missing count for led streams_define"));
            };
            if count < 1 {
                continue;
            }
            if count > remain {
                engine.respond(
                    ResponseKind::Warning,
                    &format!(
                        "too many LEDs in stream for egress module '{egress_name}' - max: {total}"
                    ),
                );
                remain = 0;
            } else {
                remain -= count;
            }
            schema.push(StreamSegment { encoding, count });
        }

        if let Some(inst) = engine.egresses.get_mut(key) {
            inst.streams_staged = Some(schema);
        }
        Ok(())
    }

    fn describe(&self, engine: &Engine, _verb: &str) -> Option<IdlNode> {
        let mut idents = IdlNode::keyword();
        for name in engine.egresses.instance_names() {
            idents.set(name, None);
        }
        let mut encodings = IdlNode::keyword();
        for encoding in Encoding::all() {
            encodings.set(encoding.name(), None);
        }
        Some(IdlNode::sequence(vec![
            idents,
            IdlNode::repeat(IdlNode::sequence(vec![encodings, IdlNode::integer_min(0)])),
        ]))
    }
}
