//! Built-in animations.

pub mod rainbow;
pub mod solid;
pub mod sparkle;
