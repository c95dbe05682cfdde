//! Cadence and Barrier Tests
//!
//! Tests for:
//! - Drummer steady state and overrun quantization
//! - AnimBarrier rendezvous with multiple workers
//! - Collector guards delaying the frame start

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use freyr::sync::{AnimBarrier, Drummer};

// ============================================================================
// Drummer
// ============================================================================

#[test]
fn drummer_steady_state_advances_once() {
    let mut drummer = Drummer::new(Duration::from_millis(40));
    for _ in 0..3 {
        let advances = drummer.sync();
        assert_eq!(advances, 1, "steady loop should advance one interval");
    }
}

#[test]
fn drummer_overrun_reports_skipped_intervals() {
    let mut drummer = Drummer::new(Duration::from_millis(30));
    drummer.sync();
    // a slow frame: sleep 2.5 intervals past the deadline
    std::thread::sleep(Duration::from_millis(75));
    let advances = drummer.sync();
    assert!(advances >= 2, "expected overrun signal, got {advances}");
    // the deadline is quantized forward: the next tick is ordinary again
    assert_eq!(drummer.sync(), 1);
}

// ============================================================================
// AnimBarrier
// ============================================================================

#[test]
fn barrier_runs_workers_in_lockstep() {
    const WORKERS: usize = 3;
    const FRAMES: usize = 200;

    let barrier = Arc::new(AnimBarrier::new(WORKERS));
    let running = Arc::new(AtomicBool::new(true));
    let rendered = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for i in 0..WORKERS {
        let barrier = barrier.clone();
        let running = running.clone();
        let rendered = rendered.clone();
        handles.push(std::thread::spawn(move || {
            loop {
                barrier.wait_for_frame(i);
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                rendered.fetch_add(1, Ordering::SeqCst);
            }
        }));
    }

    for frame in 0..FRAMES {
        barrier.wait_for_animators(WORKERS);
        // all workers are parked: the counter must be exactly frame * WORKERS
        assert_eq!(rendered.load(Ordering::SeqCst), frame * WORKERS);
        barrier.start_frame();
    }

    barrier.wait_for_animators(WORKERS);
    running.store(false, Ordering::SeqCst);
    barrier.start_frame();
    for handle in handles {
        handle.join().expect("worker panicked");
    }
    assert_eq!(rendered.load(Ordering::SeqCst), FRAMES * WORKERS);
}

#[test]
fn collector_guard_delays_frame_start() {
    const WORKERS: usize = 2;
    let barrier = Arc::new(AnimBarrier::new(WORKERS));
    let running = Arc::new(AtomicBool::new(true));

    let mut handles = Vec::new();
    for i in 0..WORKERS {
        let barrier = barrier.clone();
        let running = running.clone();
        handles.push(std::thread::spawn(move || {
            loop {
                barrier.wait_for_frame(i);
                if !running.load(Ordering::SeqCst) {
                    break;
                }
            }
        }));
    }

    // take a collector while the frame is between barriers
    let observed = Arc::new(AtomicBool::new(false));
    let collector_done = Arc::new(AtomicBool::new(false));
    let collector = {
        let barrier = barrier.clone();
        let observed = observed.clone();
        let collector_done = collector_done.clone();
        std::thread::spawn(move || {
            let _guard = barrier.lock_collector();
            observed.store(true, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(50));
            collector_done.store(true, Ordering::SeqCst);
        })
    };

    while !observed.load(Ordering::SeqCst) {
        std::thread::yield_now();
    }

    // the orchestrator must not pass the barrier before the collector drops
    barrier.wait_for_animators(WORKERS);
    assert!(
        collector_done.load(Ordering::SeqCst),
        "wait_for_animators returned while a collector was active"
    );

    running.store(false, Ordering::SeqCst);
    barrier.start_frame();
    for handle in handles {
        handle.join().expect("worker panicked");
    }
    let _ = collector.join();
}
