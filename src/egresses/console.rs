//! Terminal egress - renders the frame as ANSI truecolor blocks.
//!
//! `width N` wraps the output every N pixels; `path P` appends to a file
//! instead of stdout.

use std::fs::OpenOptions;
use std::io::Write;

use crate::color::clamp01;
use crate::egress::{EgressBehavior, EgressFlush};
use crate::engine::Engine;
use crate::errors::CommandError;
use crate::idl::IdlNode;
use crate::scan::LineScanner;

struct ConsoleEgress {
    width: u32,
    out: Box<dyn Write + Send>,
}

pub fn create(
    _engine: &Engine,
    args: &mut LineScanner<'_>,
) -> Result<Box<dyn EgressBehavior>, CommandError> {
    let mut width = 32u32;
    let mut out: Box<dyn Write + Send> = Box::new(std::io::stdout());

    while let Some(token) = args.next_token() {
        match token {
            "width" => {
                if let Some(v) = args.get::<u32>() {
                    width = v.max(1);
                }
            }
            "path" => {
                let Some(path) = args.next_token() else {
                    return Err(CommandError::usage("console egress: path expected"));
                };
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|e| {
                        CommandError::usage(format!("console egress: cannot open '{path}': {e}"))
                    })?;
                out = Box::new(file);
            }
            _ => {}
        }
    }

    let mut egress = ConsoleEgress { width, out };
    let _ = write!(egress.out, "\x1b[2J\x1b[H\x1b[3J");
    Ok(Box::new(egress))
}

#[must_use]
pub fn describe() -> IdlNode {
    let mut node = IdlNode::keyword();
    node.set("width", Some(IdlNode::integer_min(1)));
    node.set("path", Some(IdlNode::Str));
    node
}

impl EgressBehavior for ConsoleEgress {
    fn flush(&mut self, ctx: &EgressFlush<'_>) {
        let _ = write!(self.out, "\x1b[H");
        let start = (ctx.offset as usize).min(ctx.leds.len());
        let end = (start + ctx.count as usize).min(ctx.leds.len());
        for (i, led) in ctx.leds[start..end].iter().enumerate() {
            let _ = write!(
                self.out,
                "\x1b[48;2;{};{};{}m ",
                (255.0 * clamp01(led.r)) as u8,
                (255.0 * clamp01(led.g)) as u8,
                (255.0 * clamp01(led.b)) as u8,
            );
            if (i as u32 + 1) % self.width == 0 {
                let _ = write!(self.out, "\x1b[40;0m\r\n");
            }
        }
        let _ = self.out.flush();
    }
}
