//! Freyr - a realtime animation engine for addressable-LED installations.
//!
//! Freyr drives many physically distinct LED strands as one logical pixel
//! array. Animations run on arbitrary subsets of pixels, a tiered compositor
//! resolves which animation paints which pixel, cross-fades blend between
//! animations, post-processing filters rewrite the outgoing frame, and
//! per-egress stream encoders produce the on-the-wire byte streams for
//! heterogeneous output backends at a fixed refresh rate.
//!
//! # Architecture
//!
//! - [`Engine`]: the central value owning every registry - frame buffers,
//!   animations, animators, egresses, modules, hooks and commands
//! - [`Frame`]: the `preanim` / `anim` / `egress` triple buffer rotation
//! - [`LedSet`]: sorted-unique pixel index sets with batch modification
//! - [`orchestrator`]: the frame loop, cooperative or with animator threads
//! - [`modules::display`]: the tiered compositor and blending engine
//! - [`stream`]: the 90-layout color encoding taxonomy
//!
//! # Example
//!
//! ```rust,ignore
//! use freyr::{Engine, orchestrator::{self, RunOptions}};
//!
//! let mut engine = Engine::new();
//! engine.run_command("egress_init console main 64 width 32", "setup");
//! engine.run_command("display rainbow on all", "setup");
//! orchestrator::run(&mut engine, &RunOptions::default())?;
//! ```

pub mod animation;
pub mod anims;
pub mod blends;
pub mod color;
pub mod egress;
pub mod egresses;
pub mod engine;
pub mod errors;
pub mod frame;
pub mod idl;
pub mod ledset;
pub mod library;
pub mod module;
pub mod modules;
pub mod orchestrator;
pub mod scan;
pub mod selector;
pub mod stream;
pub mod sync;

pub use color::{Led, hsv};
pub use engine::Engine;
pub use errors::{CommandError, FreyrError, Result};
pub use frame::Frame;
pub use ledset::LedSet;
pub use module::{HookEvent, ResponseKind};
pub use orchestrator::RunOptions;
pub use stream::{Encoding, StreamSegment};
