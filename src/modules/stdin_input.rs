//! Stdin command transport.
//!
//! Spawns a reader thread that feeds complete logical lines (comments
//! stripped, `\` continuations joined) into the engine's pending command
//! queue, tagged with source `stdin`. The thread ends with the input
//! stream; it never touches engine state directly.

use std::io::BufRead;

use crate::engine::{Engine, PendingCommand};
use crate::module::{EngineModule, ModKey};
use crate::scan::{MultilineScanner, strip_comment};

#[derive(Default)]
pub struct StdinModule;

#[must_use]
pub fn create() -> Box<dyn EngineModule> {
    Box::new(StdinModule)
}

impl EngineModule for StdinModule {
    fn init(&mut self, engine: &mut Engine, _modno: ModKey, _args: &mut crate::scan::LineScanner<'_>) {
        let sender = engine.command_sender();
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            let mut scanner = MultilineScanner::new();
            let mut emit = |line: &str| {
                let line = strip_comment(line);
                if line.is_empty() {
                    return;
                }
                let _ = sender.send(PendingCommand {
                    line: line.to_string(),
                    source: String::from("stdin"),
                });
            };
            for line in stdin.lock().lines() {
                let Ok(line) = line else {
                    break;
                };
                scanner.process_line(&line, &mut emit);
            }
            scanner.flush(&mut emit);
        });
    }
}
