//! The frame loop.
//!
//! Drives the engine at the target frame rate, either cooperatively
//! (animations render inline on the orchestrator thread) or with a pool
//! of animator threads rendezvousing on the [`AnimBarrier`] every frame.
//!
//! Per frame, in strict order: publish the previous frame and run the
//! output side ([`Engine::begin_frame`] steps 1–7), pace the clock, then
//! render. In threaded mode the orchestrator scatters the `anim`
//! snapshot to the animator scratch buffers before releasing the
//! barrier and gathers the rendered pixels after the workers park again;
//! pixel buffers are only ever touched in mutually exclusive barrier
//! phases.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::engine::Engine;
use crate::errors::Result;
use crate::sync::{AnimBarrier, Drummer, FpsCounter};

#[derive(Clone, Copy, Debug)]
pub struct RunOptions {
    /// Target frame rate in Hz.
    pub fps: f64,
    /// Animator thread count; 0 renders inline on the orchestrator.
    pub threads: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self { fps: 60.0, threads: 0 }
    }
}

/// Runs the frame loop until [`Engine::stop`] is observed at a frame
/// boundary.
pub fn run(engine: &mut Engine, options: &RunOptions) -> Result<()> {
    let mut drummer = Drummer::new(Duration::from_secs_f64(1.0 / options.fps));
    let mut fps = FpsCounter::new();

    if options.threads > 0 {
        engine.pool.setup(options.threads);
    }

    // make installs from setup commands visible before the first frame
    engine.flush_modules();
    engine.pool.flush(&mut engine.animations);
    engine.frame.flush_anim();

    engine.start();

    if options.threads == 0 {
        while engine.is_running() {
            engine.begin_frame();
            let advances = drummer.sync();
            if advances >= 2 {
                log::debug!("frame overrun: {} intervals skipped", advances - 1);
            }
            if let Some(estimate) = fps.update() {
                log::debug!("fps: {estimate:.1}");
            }
            engine.render_frame(Instant::now());
        }
        return Ok(());
    }

    let barrier = Arc::new(AnimBarrier::new(options.threads));
    let epoch = engine.pool.epoch();
    let mut workers = Vec::with_capacity(options.threads);

    // Worker shutdown is driven by its own flag, written only by the
    // orchestrator between the final animator wait and the final frame
    // start. Workers therefore always park again after rendering, no
    // matter when the engine running flag gets cleared, and the release
    // below is observed deterministically.
    let workers_running = Arc::new(AtomicBool::new(true));

    for (i, cell) in engine.pool.animator_cells().into_iter().enumerate() {
        let barrier = barrier.clone();
        let workers_running = workers_running.clone();
        let worker = std::thread::Builder::new()
            .name(format!("animator-{i}"))
            .spawn(move || {
                loop {
                    barrier.wait_for_frame(i);
                    if !workers_running.load(Ordering::SeqCst) {
                        break;
                    }
                    cell.lock().render_scratch(epoch, Instant::now());
                }
            })?;
        workers.push(worker);
    }

    while engine.is_running() {
        barrier.wait_for_animators(options.threads);
        engine.gather();
        engine.begin_frame();
        if !engine.is_running() {
            // a queued quit landed in the command drain; the workers are
            // still parked, so skip straight to the shutdown release
            break;
        }
        engine.scatter();
        let advances = drummer.sync();
        if advances >= 2 {
            log::debug!("frame overrun: {} intervals skipped", advances - 1);
        }
        if let Some(estimate) = fps.update() {
            log::debug!("fps: {estimate:.1}");
        }
        barrier.start_frame();
    }

    // wait for the workers to park, tell them to exit, release them once
    // more and join
    barrier.wait_for_animators(options.threads);
    workers_running.store(false, Ordering::SeqCst);
    barrier.start_frame();
    for worker in workers {
        let _ = worker.join();
    }
    Ok(())
}
