//! LED selector parsing.
//!
//! Compositor-facing commands describe pixel subsets with selectors:
//!
//! - `all` - every pixel in the current frame
//! - `voxel cx cy cz ex [ey ez]` - pixels whose coordinate falls inside
//!   the axis-aligned box of half-extents `(ex, ey, ez)` centered at
//!   `(cx, cy, cz)`, consulted from the preanim coordinate table
//! - `<group-name>` - a named group
//!
//! Repeated selectors in one command union their pixels.

use glam::Vec3;

use crate::engine::Engine;
use crate::errors::CommandError;
use crate::idl::IdlNode;
use crate::ledset::LedSet;
use crate::scan::LineScanner;

/// Parses one selector and appends its pixels to `leds`.
pub fn parse_selector(
    engine: &Engine,
    leds: &mut LedSet,
    scanner: &mut LineScanner<'_>,
) -> Result<(), CommandError> {
    let Some(selector) = scanner.next_token() else {
        return Err(CommandError::usage("incomplete led selector - expected expression"));
    };

    let mut modification = leds.modify();
    match selector {
        "all" => {
            modification.append_range(0, engine.frame.len() as u32);
        }
        "voxel" => {
            let (Some(cx), Some(cy), Some(cz), Some(ex)) = (
                scanner.get::<f32>(),
                scanner.get::<f32>(),
                scanner.get::<f32>(),
                scanner.get::<f32>(),
            ) else {
                return Err(CommandError::usage("missing center / extent for voxel selector"));
            };
            let extent = match scanner.get::<f32>() {
                Some(ey) => {
                    let Some(ez) = scanner.get::<f32>() else {
                        return Err(CommandError::usage("incomplete extent for voxel selector"));
                    };
                    Vec3::new(ex, ey, ez)
                }
                None => Vec3::splat(ex),
            };
            let center = Vec3::new(cx, cy, cz);
            let coords = engine.coords.preanim();
            for i in 0..engine.frame.len() {
                let Some(data) = coords.get(i) else {
                    break;
                };
                if ((data.pos - center).abs() - extent).max_element() <= 0.0 {
                    modification.push(i as u32);
                }
            }
        }
        group => {
            let Some(set) = engine.groups.get(group) else {
                return Err(CommandError::not_found(format!("group '{group}' does not exist")));
            };
            modification.append_slice(set.as_slice());
        }
    }
    Ok(())
}

/// IDL grammar of a selector, including current group names.
#[must_use]
pub fn describe_selector(engine: &Engine, ident: Option<&str>) -> IdlNode {
    let mut node = match ident {
        Some(id) => IdlNode::keyword_named(id),
        None => IdlNode::keyword(),
    };
    node.set("all", None);
    node.set(
        "voxel",
        Some(IdlNode::sequence(vec![
            IdlNode::float(),
            IdlNode::float(),
            IdlNode::float(),
            IdlNode::float(),
            IdlNode::float(),
            IdlNode::float(),
        ])),
    );
    for group in engine.groups.names() {
        node.set(group, None);
    }
    node
}
