//! The display compositor.
//!
//! The module users talk to: `display` installs an animation on a
//! selector, `float` releases pixels, `tier` manages priority layers.
//!
//! # Model
//!
//! Every installed animation is tracked by an anim-handle carrying the
//! pixels the user asked for (`desired`) and the subset it actually owns
//! after tier resolution (`actual`). Handles live in named tiers ordered
//! by `(major, minor, name)`; at any pixel the highest tier containing
//! it wins, and within a tier installation order decides. Handles are
//! shared between the compositor's flat list and their tier; a handle
//! whose tier membership lapses is dropped - and its animation
//! reference released - at the next flush.
//!
//! # Blending
//!
//! `display ... blend <module> [args...]` splits the incoming animation's
//! pixels against every overlapped handle in the tier: each overlap gets
//! a transient blend animation rendering both operands into scratch
//! storage and delegating to the blend module's `mix`. When the mix
//! reports done, the blend animation stages the incoming animation's id
//! as its replacement; the compositor's flush promotes the handle and
//! the blend animation is reaped by the following pool flush.

use std::sync::Arc;

use bitflags::bitflags;
use parking_lot::Mutex;

use crate::animation::pool::SubAnimation;
use crate::animation::{AnimKey, Animation, AnimationBehavior};
use crate::blends::{BlendBehavior, BlendState};
use crate::color::Led;
use crate::engine::Engine;
use crate::errors::CommandError;
use crate::idl::IdlNode;
use crate::ledset::LedSet;
use crate::module::{EngineModule, HookEvent, ModKey, ResponseKind};
use crate::scan::LineScanner;
use crate::selector;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    struct Dirty: u32 {
        /// Handle bookkeeping changed: restrict, promote, drop.
        const ANIMS = 1 << 0;
        /// Tier resolution changed: rebuild the pixel→tier index.
        const TIERS = 1 << 1;
    }
}

struct Handle {
    animno: AnimKey,
    desired: LedSet,
    actual: LedSet,
    leds_dirty: bool,
}

type HandleRef = Arc<Mutex<Handle>>;

fn new_handle(animno: AnimKey, desired: LedSet) -> HandleRef {
    Arc::new(Mutex::new(Handle {
        animno,
        desired,
        actual: LedSet::new(),
        leds_dirty: false,
    }))
}

struct Tier {
    name: String,
    major: u32,
    minor: u32,
    anims: Vec<HandleRef>,
}

impl Tier {
    /// Subtracts `leds` from every handle, dropping emptied handles from
    /// the tier.
    fn clear_leds(&mut self, leds: &LedSet, dirty: &mut Dirty) {
        self.anims.retain(|handle| {
            let mut h = handle.lock();
            let before = h.desired.len();
            h.desired.subtract(leds);
            if h.desired.len() != before {
                h.leds_dirty = true;
                *dirty |= Dirty::ANIMS | Dirty::TIERS;
            }
            !h.desired.is_empty()
        });
    }
}

/// Transient animation mixing two operands during a cross-fade.
struct BlendAnimation {
    first: Arc<Mutex<Animation>>,
    second: Arc<Mutex<Animation>>,
    second_key: AnimKey,
    blender: Arc<Mutex<Box<dyn BlendBehavior>>>,
    scratch: Vec<Led>,
    done: bool,
}

impl AnimationBehavior for BlendAnimation {
    fn iterate(&mut self, frame: &mut [Led], leds: &[u32], dt: f32, t: f32) {
        self.first.lock().render(frame, leds, dt, t);

        // save the outgoing operand's pixels
        self.scratch.clear();
        self.scratch.extend(
            leds.iter().map(|&i| frame.get(i as usize).copied().unwrap_or(Led::BLACK)),
        );

        self.second.lock().render(frame, leds, dt, t);

        if self.blender.lock().mix(leds, frame, &self.scratch, dt, t) == BlendState::Done {
            self.done = true;
        }
    }

    fn staged_replacement(&self) -> Option<AnimKey> {
        self.done.then_some(self.second_key)
    }
}

impl Default for Dirty {
    fn default() -> Self {
        Dirty::empty()
    }
}

/// The compositor module.
#[derive(Default)]
pub struct DisplayModule {
    handles: Vec<HandleRef>,
    tiers: Vec<Tier>,
    dirty: Dirty,
}

#[must_use]
pub fn create() -> Box<dyn EngineModule> {
    Box::new(DisplayModule::default())
}

impl DisplayModule {
    fn tier_index(&mut self, engine: &mut Engine, name: &str) -> usize {
        if let Some(i) = self.tiers.iter().position(|t| t.name == name) {
            return i;
        }
        self.tiers.push(Tier {
            name: name.to_string(),
            major: 0,
            minor: 0,
            anims: Vec::new(),
        });
        self.dirty |= Dirty::TIERS;
        let idx = self.tiers.len() - 1;
        self.elevate(idx);
        engine.idl_changed();
        idx
    }

    /// Bumps the tier's minor priority above every same-major sibling.
    fn elevate(&mut self, idx: usize) {
        let major = self.tiers[idx].major;
        let mut minor = self.tiers[idx].minor;
        let mut changed = false;
        for (i, tier) in self.tiers.iter().enumerate() {
            if i == idx || tier.major != major {
                continue;
            }
            if tier.minor >= minor {
                minor = tier.minor + 1;
                changed = true;
            }
        }
        if changed {
            self.tiers[idx].minor = minor;
            self.dirty |= Dirty::TIERS;
        }
    }

    /// Plain installation: the tier's existing handles lose the new
    /// handle's pixels, then the handle joins the tier.
    fn install(&mut self, tier_idx: usize, handle: &HandleRef) {
        let leds = handle.lock().desired.clone();
        let mut dirty = self.dirty;
        self.tiers[tier_idx].clear_leds(&leds, &mut dirty);
        self.dirty = dirty | Dirty::TIERS;
        self.tiers[tier_idx].anims.push(handle.clone());
    }

    /// Blend installation: every overlapped handle keeps its remainder,
    /// the overlap gets a transient blend animation, and whatever is left
    /// of the target installs directly.
    fn blend_to(
        &mut self,
        engine: &mut Engine,
        tier_idx: usize,
        target: &HandleRef,
        blender: Arc<Mutex<Box<dyn BlendBehavior>>>,
    ) {
        let target_key = target.lock().animno;
        let mut remaining = target.lock().desired.clone();
        let mut kept: Vec<HandleRef> = Vec::new();
        let mut added: Vec<HandleRef> = Vec::new();

        let existing = std::mem::take(&mut self.tiers[tier_idx].anims);
        for handle in existing {
            let (old_key, overlap) = {
                let mut h = handle.lock();
                let before = h.desired.len();
                let mut overlap = h.desired.clone();
                overlap.intersect(&remaining);
                h.desired.subtract(&remaining);
                if h.desired.len() == before {
                    drop(h);
                    kept.push(handle);
                    continue;
                }
                h.leds_dirty = true;
                self.dirty |= Dirty::ANIMS;
                (h.animno, overlap)
            };
            remaining.subtract(&overlap);

            let operands = (engine.animations.shared(old_key), engine.animations.shared(target_key));
            if let (Some(first), Some(second)) = operands {
                let behavior = Box::new(BlendAnimation {
                    first,
                    second,
                    second_key: target_key,
                    blender: blender.clone(),
                    scratch: Vec::new(),
                    done: false,
                });
                let key = engine.animations.register_with_operands(
                    Animation::new("blend", behavior, overlap.clone()),
                    vec![old_key, target_key],
                );
                engine.animations.grab(key);
                let blend_handle = new_handle(key, overlap);
                self.handles.push(blend_handle.clone());
                added.push(blend_handle);
                self.dirty |= Dirty::TIERS;
            } else {
                engine.respond(ResponseKind::Error, "unable to define blending animation");
            }

            if !handle.lock().desired.is_empty() {
                kept.push(handle);
            }
        }

        if !remaining.is_empty() {
            engine.animations.grab(target_key);
            let rest = new_handle(target_key, remaining);
            self.handles.push(rest.clone());
            added.push(rest);
            self.dirty |= Dirty::TIERS;
        }

        let tier = &mut self.tiers[tier_idx];
        tier.anims = kept;
        tier.anims.extend(added);
    }

    fn cmd_display(
        &mut self,
        engine: &mut Engine,
        args: &mut LineScanner<'_>,
    ) -> Result<(), CommandError> {
        let Some(anim_name) = args.next_token() else {
            return Err(CommandError::usage(
                "incomplete display command - animation name expected",
            ));
        };
        let anim_name = anim_name.to_string();

        let mut anim_args = String::new();
        let mut blend_args = String::new();
        let mut blend_name: Option<String> = None;
        let mut tier_name = String::from("default");
        let mut priority: Option<u32> = None;
        let mut leds = LedSet::new();

        while let Some(token) = args.next_token() {
            match token {
                "on" => selector::parse_selector(engine, &mut leds, args)?,
                "tier" => {
                    tier_name = args
                        .next_token()
                        .ok_or_else(|| {
                            CommandError::usage(
                                "incomplete display command - tier name expected after 'tier'",
                            )
                        })?
                        .to_string();
                }
                "priority" => {
                    priority = Some(args.get::<u32>().ok_or_else(|| {
                        CommandError::usage(
                            "incomplete display command - priority value expected after 'priority'",
                        )
                    })?);
                }
                "blend" => {
                    blend_name = Some(
                        args.next_token()
                            .ok_or_else(|| {
                                CommandError::usage(
                                    "incomplete display command - blend module name expected",
                                )
                            })?
                            .to_string(),
                    );
                }
                other => {
                    let sink =
                        if blend_name.is_some() { &mut blend_args } else { &mut anim_args };
                    if !sink.is_empty() {
                        sink.push(' ');
                    }
                    sink.push_str(other);
                }
            }
        }

        let Some(animno) = engine.anim_init(&anim_name, &leds, &anim_args) else {
            engine.respond(
                ResponseKind::Error,
                &format!("unable to init animation '{anim_name}'"),
            );
            return Ok(());
        };

        let tier_idx = self.tier_index(engine, &tier_name);
        let handle = new_handle(animno, leds);
        self.handles.push(handle.clone());
        engine.animations.grab(animno);

        match blend_name {
            Some(name) => match engine.library.blend(&format!("blend_{name}")) {
                Some(factory) => {
                    let mut scanner = LineScanner::new(&blend_args);
                    match factory(engine, &mut scanner) {
                        Ok(behavior) => {
                            let blender = Arc::new(Mutex::new(behavior));
                            self.blend_to(engine, tier_idx, &handle, blender);
                        }
                        Err(err) => {
                            engine.respond(ResponseKind::Error, &err.to_string());
                            self.install(tier_idx, &handle);
                        }
                    }
                }
                None => {
                    engine.respond(
                        ResponseKind::Error,
                        &format!("unable to find blend module {name}"),
                    );
                    self.install(tier_idx, &handle);
                }
            },
            None => self.install(tier_idx, &handle),
        }

        if let Some(major) = priority {
            if self.tiers[tier_idx].major != major {
                self.tiers[tier_idx].major = major;
                self.dirty |= Dirty::TIERS;
            }
        }
        Ok(())
    }

    fn cmd_float(
        &mut self,
        engine: &mut Engine,
        args: &mut LineScanner<'_>,
    ) -> Result<(), CommandError> {
        let mut leds = LedSet::new();
        selector::parse_selector(engine, &mut leds, args)?;
        if leds.is_empty() {
            return Ok(());
        }

        let mut tier_name: Option<String> = None;
        while let Some(token) = args.next_token() {
            if token == "tier" {
                tier_name = Some(
                    args.next_token()
                        .ok_or_else(|| {
                            CommandError::usage(
                                "incomplete float command - tier name expected after 'tier'",
                            )
                        })?
                        .to_string(),
                );
            }
        }

        let mut dirty = self.dirty;
        for tier in &mut self.tiers {
            if let Some(name) = &tier_name {
                if tier.name != *name {
                    continue;
                }
            }
            tier.clear_leds(&leds, &mut dirty);
        }
        self.dirty = dirty;
        Ok(())
    }

    fn cmd_tier(
        &mut self,
        engine: &mut Engine,
        args: &mut LineScanner<'_>,
    ) -> Result<(), CommandError> {
        let Some(name) = args.next_token() else {
            return Err(CommandError::usage("incomplete tier command - tier name expected"));
        };
        let Some(idx) = self.tiers.iter().position(|t| t.name == name) else {
            return Err(CommandError::not_found(format!("tier '{name}' not found")));
        };

        while let Some(token) = args.next_token() {
            match token {
                "elevate" => self.elevate(idx),
                "priority" => {
                    let major = args.get::<u32>().ok_or_else(|| {
                        CommandError::usage(
                            "incomplete tier command - priority number expected after 'priority'",
                        )
                    })?;
                    if self.tiers[idx].major != major {
                        self.tiers[idx].major = major;
                        self.dirty |= Dirty::TIERS;
                    }
                    self.elevate(idx);
                }
                "remove" => {
                    self.tiers.remove(idx);
                    self.dirty |= Dirty::TIERS;
                    engine.idl_changed();
                    return Ok(());
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn describe_tiers(&self, ident: Option<&str>) -> IdlNode {
        let mut node = match ident {
            Some(id) => IdlNode::keyword_named(id),
            None => IdlNode::keyword(),
        };
        node.set("default", None);
        for tier in &self.tiers {
            node.set(tier.name.clone(), None);
        }
        node
    }
}

impl EngineModule for DisplayModule {
    fn init(&mut self, engine: &mut Engine, modno: ModKey, _args: &mut LineScanner<'_>) {
        engine.modules.register_command("display", modno);
        engine.modules.register_command("float", modno);
        engine.modules.register_command("tier", modno);
        let removed = engine.modules.hook_resolve("ledsRemoved");
        engine.modules.subscribe(modno, removed);
    }

    fn command(
        &mut self,
        engine: &mut Engine,
        _modno: ModKey,
        verb: &str,
        args: &mut LineScanner<'_>,
    ) -> Result<(), CommandError> {
        match verb {
            "display" => self.cmd_display(engine, args),
            "float" => self.cmd_float(engine, args),
            "tier" => self.cmd_tier(engine, args),
            other => Err(CommandError::usage(format!("unhandled command '{other}'"))),
        }
    }

    fn hook(&mut self, _engine: &mut Engine, _modno: ModKey, event: &HookEvent) {
        if let HookEvent::LedsRemoved { offset, count } = *event {
            for handle in &self.handles {
                let mut h = handle.lock();
                h.desired.adjust_removed(offset, count);
                h.actual.adjust_removed(offset, count);
                h.leds_dirty = true;
            }
            self.dirty |= Dirty::ANIMS | Dirty::TIERS;
        }
    }

    fn flush(&mut self, engine: &mut Engine, _modno: ModKey) {
        // pass 1: compact handles, re-restrict LED sets, promote staged
        // replacement ids
        let mut i = 0;
        while i < self.handles.len() {
            if Arc::strong_count(&self.handles[i]) == 1 {
                let handle = self.handles.remove(i);
                engine.animations.drop_ref(handle.lock().animno);
                continue;
            }
            {
                let mut h = self.handles[i].lock();
                if h.leds_dirty {
                    engine.animations.restrict(h.animno, &h.desired);
                    h.leds_dirty = false;
                }
                if let Some(replacement) = engine.animations.staged_replacement(h.animno) {
                    engine.animations.grab(replacement);
                    engine.animations.drop_ref(h.animno);
                    h.animno = replacement;
                    self.dirty |= Dirty::ANIMS | Dirty::TIERS;
                }
            }
            i += 1;
        }
        self.dirty.remove(Dirty::ANIMS);

        // pass 2: re-resolve tiers and reinstall into the pool
        if !self.dirty.contains(Dirty::TIERS) {
            return;
        }
        engine.pool.clear_all();
        self.tiers.sort_by(|a, b| {
            (a.major, a.minor, a.name.as_str()).cmp(&(b.major, b.minor, b.name.as_str()))
        });

        let mut winner = vec![usize::MAX; engine.frame.len()];
        for (ti, tier) in self.tiers.iter().enumerate() {
            for handle in &tier.anims {
                for &i in handle.lock().desired.as_slice() {
                    if let Some(slot) = winner.get_mut(i as usize) {
                        *slot = ti;
                    }
                }
            }
        }

        for (ti, tier) in self.tiers.iter().enumerate() {
            for handle in &tier.anims {
                let mut h = handle.lock();
                let Handle { animno, desired, actual, .. } = &mut *h;
                actual.clear();
                {
                    let mut m = actual.modify();
                    for &i in desired.as_slice() {
                        if winner.get(i as usize) == Some(&ti) {
                            m.push(i);
                        }
                    }
                }
                if actual.is_empty() {
                    continue;
                }
                if let Some(shared) = engine.animations.shared(*animno) {
                    engine.pool.install(SubAnimation {
                        key: *animno,
                        shared,
                        leds: actual.clone(),
                    });
                }
            }
        }
        self.dirty = Dirty::empty();
    }

    fn status(&self, _engine: &Engine) -> Option<String> {
        let mut out = format!("anims: {}\n", self.handles.len());
        for handle in &self.handles {
            let h = handle.lock();
            out.push_str(&format!(
                "  anim {:?} ({}/{} leds)\n",
                h.animno,
                h.actual.len(),
                h.desired.len()
            ));
        }
        for tier in &self.tiers {
            out.push_str(&format!("tier {} ({}.{})\n", tier.name, tier.major, tier.minor));
            for handle in &tier.anims {
                let h = handle.lock();
                out.push_str(&format!(
                    "  anim {:?} ({}/{} leds)\n",
                    h.animno,
                    h.actual.len(),
                    h.desired.len()
                ));
            }
        }
        Some(out)
    }

    fn describe(&self, engine: &Engine, verb: &str) -> Option<IdlNode> {
        match verb {
            "display" => {
                let selector_node = selector::describe_selector(engine, Some("display.selector"));
                let tier_node = self.describe_tiers(Some("display.tier"));
                let mut blend_node = IdlNode::keyword_named("display.blend");
                for name in engine.library.names_with_prefix("blend_") {
                    let params = engine.library.describe(&format!("blend_{name}"));
                    blend_node.set(name, params.map(IdlNode::repeat));
                }

                let mut root = IdlNode::keyword();
                let mut first = true;
                for ident in engine.library.names_with_prefix("anim_") {
                    let mut sub = engine
                        .library
                        .describe(&format!("anim_{ident}"))
                        .unwrap_or_else(IdlNode::keyword);
                    if first {
                        sub.set("on", Some(selector_node.clone()));
                        sub.set("tier", Some(tier_node.clone()));
                        sub.set("priority", Some(IdlNode::integer_min(0)));
                        sub.set("blend", Some(blend_node.clone()));
                        first = false;
                    } else {
                        sub.set("on", Some(IdlNode::reference("display.selector")));
                        sub.set("tier", Some(IdlNode::reference("display.tier")));
                        sub.set("priority", Some(IdlNode::integer_min(0)));
                        sub.set("blend", Some(IdlNode::reference("display.blend")));
                    }
                    root.set(ident, Some(IdlNode::repeat(sub)));
                }
                Some(root)
            }
            "float" => Some(IdlNode::sequence(vec![
                selector::describe_selector(engine, None),
                IdlNode::repeat({
                    let mut kw = IdlNode::keyword();
                    kw.set("tier", Some(self.describe_tiers(None)));
                    kw
                }),
            ])),
            "tier" => Some(IdlNode::sequence(vec![
                self.describe_tiers(None),
                IdlNode::repeat({
                    let mut kw = IdlNode::keyword();
                    kw.set("elevate", None);
                    kw.set("priority", Some(IdlNode::integer()));
                    kw.set("remove", None);
                    kw
                }),
            ])),
            _ => None,
        }
    }
}
