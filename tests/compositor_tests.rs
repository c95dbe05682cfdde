//! Compositor Tests
//!
//! Tests for tier resolution, installation preemption, float, elevation
//! and animation lifetime, observed through rendered pixel colors.
//!
//! Frame-resizing commands go through the pending queue so they run in
//! the drain phase of the frame, exactly as transport commands do.

use std::time::Instant;

use freyr::engine::PendingCommand;
use freyr::{Engine, Led};

fn cmd(engine: &Engine, line: &str) {
    engine
        .command_sender()
        .send(PendingCommand { line: line.to_string(), source: String::from("test") })
        .expect("queue");
}

fn step(engine: &mut Engine) {
    engine.begin_frame();
    engine.render_frame(Instant::now());
}

fn approx(a: Led, b: Led) -> bool {
    (a.r - b.r).abs() < 0.02 && (a.g - b.g).abs() < 0.02 && (a.b - b.b).abs() < 0.02
}

const RED: Led = Led { r: 1.0, g: 0.0, b: 0.0 };
const GREEN: Led = Led { r: 0.0, g: 1.0, b: 0.0 };
const BLUE: Led = Led { r: 0.0, g: 0.0, b: 1.0 };

fn engine_with_strip(count: u32) -> Engine {
    let mut engine = Engine::new();
    cmd(&engine, &format!("egress_init dummy main {count}"));
    step(&mut engine);
    engine
}

// ============================================================================
// Installation
// ============================================================================

#[test]
fn display_paints_selected_pixels() {
    let mut engine = engine_with_strip(16);
    assert!(engine.run_command("display solid r 1 g 0 b 0 on all", "test"));
    step(&mut engine);
    assert_eq!(engine.frame.anim.len(), 16);
    assert!(engine.frame.anim.iter().all(|&p| approx(p, RED)));
}

#[test]
fn reinstall_on_same_tier_preempts() {
    let mut engine = engine_with_strip(8);
    engine.run_command("display solid r 1 g 0 b 0 on all", "test");
    step(&mut engine);
    engine.run_command("display solid r 0 g 1 b 0 on all", "test");
    step(&mut engine);

    assert!(engine.frame.anim.iter().all(|&p| approx(p, GREEN)));
    // the preempted animation is released and reaped
    assert_eq!(engine.animations.len(), 1);
}

#[test]
fn zero_pixel_install_succeeds_silently() {
    let mut engine = engine_with_strip(8);
    assert!(engine.run_command("display solid r 1", "test"));
    step(&mut engine);
    assert!(engine.frame.anim.iter().all(|&p| approx(p, Led::BLACK)));
    // the animation reference is held by its handle until floated
    assert_eq!(engine.animations.len(), 1);
}

// ============================================================================
// Tiers
// ============================================================================

#[test]
fn higher_tier_wins_overlapping_pixels() {
    let mut engine = engine_with_strip(32);
    engine.run_command("group_add left main 0 16", "test");
    engine.run_command("display solid r 1 g 0 b 0 on all", "test");
    engine.run_command("display solid r 0 g 0 b 1 on left tier top priority 1", "test");
    step(&mut engine);

    for (i, &pixel) in engine.frame.anim.iter().enumerate() {
        let expected = if i < 16 { BLUE } else { RED };
        assert!(approx(pixel, expected), "pixel {i} wrong");
    }
}

#[test]
fn float_releases_pixels_to_lower_tier() {
    let mut engine = engine_with_strip(32);
    engine.run_command("group_add left main 0 16", "test");
    engine.run_command("display solid r 1 g 0 b 0 on all", "test");
    engine.run_command("display solid r 0 g 0 b 1 on left tier top priority 1", "test");
    step(&mut engine);

    engine.run_command("float left tier top", "test");
    step(&mut engine);

    assert!(engine.frame.anim.iter().all(|&p| approx(p, RED)));
    // the floated animation object is released at flush
    assert_eq!(engine.animations.len(), 1);
}

#[test]
fn elevation_reorders_equal_major_tiers() {
    let mut engine = engine_with_strip(8);
    engine.run_command("display solid r 1 g 0 b 0 on all tier first", "test");
    engine.run_command("display solid r 0 g 0 b 1 on all tier second", "test");
    step(&mut engine);
    // the newer tier was elevated above its sibling
    assert!(engine.frame.anim.iter().all(|&p| approx(p, BLUE)));

    engine.run_command("tier first elevate", "test");
    step(&mut engine);
    assert!(engine.frame.anim.iter().all(|&p| approx(p, RED)));
}

#[test]
fn tier_priority_outranks_elevation() {
    let mut engine = engine_with_strip(8);
    engine.run_command("display solid r 1 g 0 b 0 on all tier low", "test");
    engine.run_command("display solid r 0 g 0 b 1 on all tier high priority 2", "test");
    engine.run_command("tier low elevate", "test");
    step(&mut engine);
    assert!(engine.frame.anim.iter().all(|&p| approx(p, BLUE)));
}

#[test]
fn unknown_tier_command_reports_not_found() {
    let mut engine = engine_with_strip(4);
    assert!(!engine.run_command("tier nosuch elevate", "test"));
}

// ============================================================================
// Blending
// ============================================================================

#[test]
fn blend_hands_pixels_over_when_done() {
    let mut engine = engine_with_strip(8);
    engine.run_command("display solid r 1 g 0 b 0 on all", "test");
    step(&mut engine);

    // a blend fast enough to complete within a frame or two
    engine.run_command("display solid r 0 g 0 b 1 on all blend fade speed 1000000000", "test");
    for _ in 0..5 {
        step(&mut engine); // render until done, promote, reap
    }

    assert!(engine.frame.anim.iter().all(|&p| approx(p, BLUE)));
    let idents: Vec<&str> =
        engine.animations.iter().map(|(_, e)| e.ident.as_str()).collect();
    assert_eq!(idents, vec!["solid"], "only the incoming animation survives");
}

#[test]
fn blend_to_unknown_module_installs_directly() {
    let mut engine = engine_with_strip(8);
    engine.run_command("display solid r 1 g 0 b 0 on all", "test");
    step(&mut engine);
    engine.run_command("display solid r 0 g 1 b 0 on all blend nosuch", "test");
    step(&mut engine);
    assert!(engine.frame.anim.iter().all(|&p| approx(p, GREEN)));
}

#[test]
fn partial_overlap_blend_splits_the_tier() {
    let mut engine = engine_with_strip(32);
    engine.run_command("group_add left main 0 16", "test");
    engine.run_command("display solid r 1 g 0 b 0 on left", "test");
    step(&mut engine);

    // blend over the whole strip: left half cross-fades, right half
    // installs directly
    engine.run_command("display solid r 0 g 0 b 1 on all blend fade speed 1000000000", "test");
    for _ in 0..5 {
        step(&mut engine);
    }

    assert!(engine.frame.anim.iter().all(|&p| approx(p, BLUE)));
    assert_eq!(engine.animations.len(), 1);
}
