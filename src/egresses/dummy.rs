//! Null egress - accepts frames and discards them.

use crate::egress::{EgressBehavior, EgressFlush};
use crate::engine::Engine;
use crate::errors::CommandError;
use crate::scan::LineScanner;

struct DummyEgress;

pub fn create(
    _engine: &Engine,
    _args: &mut LineScanner<'_>,
) -> Result<Box<dyn EgressBehavior>, CommandError> {
    Ok(Box::new(DummyEgress))
}

impl EgressBehavior for DummyEgress {
    fn flush(&mut self, _ctx: &EgressFlush<'_>) {}
}
