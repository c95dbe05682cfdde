//! Engine Integration Tests
//!
//! End-to-end scenarios over the public command surface: egress
//! lifecycle and index shifting, selectors and coordinates, stream
//! schemas, filters, the response sink, and the threaded frame loop.
//!
//! Frame-resizing commands go through the pending queue so they run in
//! the drain phase of the frame, exactly as transport commands do.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use freyr::engine::PendingCommand;
use freyr::orchestrator::{self, RunOptions};
use freyr::{Engine, Led, ResponseKind, hsv};

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
    (a.r - b.r).abs() < 0.05 && (a.g - b.g).abs() < 0.05 && (a.b - b.b).abs() < 0.05
}

/// Captures responses routed through the sink stack.
fn capture(engine: &mut Engine) -> Arc<Mutex<Vec<(ResponseKind, String)>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink_log = log.clone();
    engine.modules.push_responder(Box::new(move |kind, _source, text| {
        sink_log.lock().push((kind, text.to_string()));
    }));
    log
}

// ============================================================================
// Egress lifecycle
// ============================================================================

#[test]
fn egress_counts_always_cover_the_frame() {
    let mut engine = Engine::new();
    cmd(&engine, "egress_init dummy a 10");
    step(&mut engine);
    assert_eq!(engine.egresses.total() as usize, engine.frame.len());

    cmd(&engine, "egress_init dummy b 22");
    step(&mut engine);
    assert_eq!(engine.egresses.total() as usize, engine.frame.len());
    assert_eq!(engine.frame.len(), 32);

    cmd(&engine, "egress_remove a");
    step(&mut engine);
    assert_eq!(engine.egresses.total() as usize, engine.frame.len());
    assert_eq!(engine.frame.len(), 22);
}

#[test]
fn egress_add_remove_round_trips_frame_length() {
    let mut engine = Engine::new();
    cmd(&engine, "egress_init dummy a 16");
    step(&mut engine);
    let before = engine.frame.len();

    cmd(&engine, "egress_init dummy extra 8");
    cmd(&engine, "egress_remove extra");
    step(&mut engine);
    assert_eq!(engine.frame.len(), before);
}

#[test]
fn zero_count_egress_is_addressable() {
    let mut engine = Engine::new();
    cmd(&engine, "egress_init dummy empty 0");
    step(&mut engine);
    assert_eq!(engine.frame.len(), 0);
    assert!(engine.egresses.find("empty").is_some());
    assert!(engine.run_command("egress_set_active empty 0", "test"));
}

#[test]
fn egress_removal_shifts_animation_indices() {
    let mut engine = Engine::new();
    cmd(&engine, "egress_init dummy a 10");
    cmd(&engine, "egress_init dummy b 10");
    step(&mut engine);
    engine.run_command("group_add bgroup b 0 10", "test");
    engine.run_command("display solid r 1 g 0 b 0 on bgroup", "test");
    step(&mut engine);
    for (i, &p) in engine.frame.anim.iter().enumerate() {
        let expected = if i >= 10 { Led::new(1.0, 0.0, 0.0) } else { Led::BLACK };
        assert!(approx(p, expected), "pixel {i} before removal");
    }

    cmd(&engine, "egress_remove a");
    step(&mut engine);
    assert_eq!(engine.frame.len(), 10);
    assert!(engine.frame.anim.iter().all(|&p| approx(p, Led::new(1.0, 0.0, 0.0))));
}

// ============================================================================
// Selectors and coordinates
// ============================================================================

#[test]
fn voxel_selector_wins_over_base_layer() {
    let mut engine = Engine::new();
    cmd(&engine, "egress_init dummy strip0 32");
    step(&mut engine);

    let mut line = String::from("coordinates_set strip0 0");
    for i in 0..32 {
        line.push_str(&format!(" {} 0 0 0 0 1", i as f32 / 32.0));
    }
    assert!(engine.run_command(&line, "test"));

    // k 0 freezes the hue cycle so expectations stay exact
    engine.run_command("display rainbow on all d 12 k 0", "test");
    engine.run_command("display rainbow on voxel 0.25 0 0 0.5 k 0 phase 180 priority 1", "test");
    step(&mut engine);

    // |x - 0.25| <= 0.5 selects pixels 0..=24; they render at phase 180
    let inside = engine.frame.anim[0];
    assert!(approx(inside, hsv(180.0, 1.0, 1.0)), "pixel 0 should be phase-shifted");
    // outside pixels show the base rainbow from its own led order
    let outside = engine.frame.anim[25];
    assert!(approx(outside, hsv(0.0, 1.0, 1.0)), "pixel 25 should be base rainbow");
}

#[test]
fn coordinates_set_requires_existing_egress() {
    let mut engine = Engine::new();
    assert!(!engine.run_command("coordinates_set nosuch 0 0 0 0 0 0 1", "test"));
}

#[test]
fn unknown_group_selector_fails_the_command() {
    let mut engine = Engine::new();
    cmd(&engine, "egress_init dummy a 8");
    step(&mut engine);

    let log = capture(&mut engine);
    assert!(!engine.run_command("display solid on nosuch", "test"));
    engine.modules.pop_responder();

    let responses = log.lock();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].0, ResponseKind::Error);
    assert!(engine.animations.is_empty());
}

#[test]
fn group_membership_shifts_with_egress_removal() {
    let mut engine = Engine::new();
    cmd(&engine, "egress_init dummy a 10");
    cmd(&engine, "egress_init dummy b 10");
    step(&mut engine);
    engine.run_command("group_add g b 2 4", "test");
    assert_eq!(
        engine.groups.get("g").map(freyr::LedSet::as_slice),
        Some(&[12u32, 13, 14, 15][..])
    );

    cmd(&engine, "egress_remove a");
    step(&mut engine);
    assert_eq!(
        engine.groups.get("g").map(freyr::LedSet::as_slice),
        Some(&[2u32, 3, 4, 5][..])
    );

    engine.run_command("group_clear g", "test");
    assert!(engine.groups.get("g").is_none());
}

// ============================================================================
// Command surface
// ============================================================================

#[test]
fn unknown_animation_yields_single_error_response() {
    let mut engine = Engine::new();
    cmd(&engine, "egress_init dummy a 8");
    step(&mut engine);

    let log = capture(&mut engine);
    engine.run_command("display nosuch on all", "test");
    engine.modules.pop_responder();

    let responses = log.lock();
    assert_eq!(responses.len(), 1, "expected exactly one response: {responses:?}");
    assert_eq!(responses[0].0, ResponseKind::Error);
    assert!(engine.animations.is_empty());
    assert_eq!(engine.pool.staged_len(), 0);
}

#[test]
fn unknown_verb_reports_source() {
    let mut engine = Engine::new();
    let log = capture(&mut engine);
    assert!(!engine.run_command("frobnicate now", "conf:3"));
    engine.modules.pop_responder();

    let responses = log.lock();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].0, ResponseKind::Error);
    assert!(responses[0].1.contains("frobnicate"));
    assert!(responses[0].1.contains("conf:3"));
}

#[test]
fn idl_describes_registered_commands() {
    let mut engine = Engine::new();
    cmd(&engine, "egress_init dummy a 4");
    step(&mut engine);
    let tree = engine.commands_describe();
    let json = tree.to_json().to_string();
    for verb in ["display", "float", "tier", "egress_init", "streams_define", "brightness"] {
        assert!(json.contains(verb), "idl misses {verb}");
    }
}

#[test]
fn status_reports_through_the_sink() {
    let mut engine = Engine::new();
    cmd(&engine, "egress_init dummy a 4");
    step(&mut engine);
    engine.run_command("display solid r 1 on all", "test");

    let log = capture(&mut engine);
    assert!(engine.run_command("status", "test"));
    engine.modules.pop_responder();

    let responses = log.lock();
    assert!(responses.iter().any(|(k, text)| {
        *k == ResponseKind::Info && text.contains("egress modules: 1")
    }));
}

// ============================================================================
// Stream schemas
// ============================================================================

#[test]
fn streams_define_stages_and_promotes() {
    let mut engine = Engine::new();
    cmd(&engine, "egress_init dummy a 8");
    step(&mut engine);
    engine.run_command("streams_define a rgb8 4 grbw16 4", "test");

    let key = engine.egresses.find("a").expect("egress");
    assert!(engine.egresses.get(key).expect("instance").streams.is_empty());

    step(&mut engine); // module flush promotes the schema
    let inst = engine.egresses.get(key).expect("instance");
    assert_eq!(inst.streams.len(), 2);
    assert_eq!(inst.streams[0].encoding.name(), "rgb8");
    assert_eq!(inst.streams[0].count, 4);
    assert_eq!(inst.streams[1].encoding.name(), "grbw16");
}

#[test]
fn streams_define_rejects_bad_tags_and_warns_on_overflow() {
    let mut engine = Engine::new();
    cmd(&engine, "egress_init dummy a 8");
    step(&mut engine);
    assert!(!engine.run_command("streams_define a rgz8 8", "test"));

    let log = capture(&mut engine);
    engine.run_command("streams_define a rgb8 100", "test");
    engine.modules.pop_responder();
    let responses = log.lock();
    assert!(responses.iter().any(|(k, _)| *k == ResponseKind::Warning));
}

// ============================================================================
// Filters
// ============================================================================

#[test]
fn brightness_scales_the_egress_buffer_only() {
    let mut engine = Engine::new();
    cmd(&engine, "egress_init dummy a 8");
    step(&mut engine);
    engine.run_command("display solid r 1 g 1 b 1 on all", "test");
    engine.run_command("brightness all 0.5", "test");
    step(&mut engine); // renders white into anim
    step(&mut engine); // publishes and filters

    assert!(engine.frame.egress.iter().all(|&p| approx(p, Led::new(0.5, 0.5, 0.5))));
    assert!(engine.frame.anim.iter().all(|&p| approx(p, Led::new(1.0, 1.0, 1.0))));
}

#[test]
fn overlay_composites_over_the_egress_buffer() {
    let mut engine = Engine::new();
    cmd(&engine, "egress_init dummy a 4");
    step(&mut engine);
    engine.run_command("display solid r 1 g 0 b 0 on all", "test");
    // opaque green overlay on every pixel
    engine.run_command("overlay all x4 00ff00", "test");
    step(&mut engine);
    step(&mut engine);

    assert!(engine.frame.egress.iter().all(|&p| p.g > 0.9));
}

// ============================================================================
// Threaded frame loop
// ============================================================================

#[test]
fn threaded_orchestrator_renders_and_joins_cleanly() {
    let mut engine = Engine::new();
    cmd(&engine, "egress_init dummy a 64");
    cmd(&engine, "display solid r 0 g 1 b 0 on all");

    let running = engine.running_flag();
    let stopper = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(400));
        running.store(false, Ordering::SeqCst);
    });

    let result = orchestrator::run(&mut engine, &RunOptions { fps: 240.0, threads: 3 });
    assert!(result.is_ok());
    stopper.join().expect("stopper");

    // the last published frame carries the rendered animation
    assert_eq!(engine.frame.egress.len(), 64);
    assert!(engine.frame.egress.iter().all(|&p| approx(p, Led::new(0.0, 1.0, 0.0))));
}

#[test]
fn quit_command_stops_the_threaded_orchestrator() {
    let mut engine = Engine::new();
    cmd(&engine, "egress_init dummy a 32");
    cmd(&engine, "display solid r 1 g 0 b 0 on all");

    let sender = engine.command_sender();
    let quitter = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(150));
        let _ = sender.send(PendingCommand {
            line: String::from("quit"),
            source: String::from("test"),
        });
    });

    // run on a watched thread so a stuck shutdown fails instead of
    // hanging the suite
    let (done_tx, done_rx) = flume::bounded(1);
    let runner = std::thread::spawn(move || {
        let result = orchestrator::run(&mut engine, &RunOptions { fps: 240.0, threads: 3 });
        let _ = done_tx.send(result.is_ok());
    });

    match done_rx.recv_timeout(Duration::from_secs(10)) {
        Ok(ok) => assert!(ok, "orchestrator returned an error"),
        Err(_) => panic!("threaded orchestrator did not shut down after quit"),
    }
    runner.join().expect("runner");
    quitter.join().expect("quitter");
}
