//! Frame cadence and animator rendezvous.
//!
//! [`Drummer`] paces the frame loop on a monotonic clock. [`AnimBarrier`]
//! is the rendezvous between the orchestrator and the animator threads:
//! workers park in [`AnimBarrier::wait_for_frame`] until the orchestrator
//! releases them with [`AnimBarrier::start_frame`], and the orchestrator
//! blocks in [`AnimBarrier::wait_for_animators`] until every worker has
//! parked. Collector guards delay the next frame start so subsystems can
//! take an atomic view of cross-thread state while everything is parked.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

#[derive(Clone, Copy, PartialEq, Eq)]
enum WorkerState {
    Animating,
    Ready,
    Pending,
}

struct BarrierState {
    animator_count: usize,
    active_collectors: usize,
    locked: bool,
    workers: Vec<WorkerState>,
}

impl BarrierState {
    fn waiting(&self) -> usize {
        self.workers.iter().filter(|&&s| s == WorkerState::Ready).count()
    }
}

pub struct AnimBarrier {
    state: Mutex<BarrierState>,
    cond_activate: Condvar,
    cond_ready: Condvar,
}

impl AnimBarrier {
    #[must_use]
    pub fn new(worker_count: usize) -> Self {
        Self {
            state: Mutex::new(BarrierState {
                animator_count: worker_count,
                active_collectors: 0,
                locked: false,
                workers: vec![WorkerState::Animating; worker_count],
            }),
            cond_activate: Condvar::new(),
            cond_ready: Condvar::new(),
        }
    }

    /// Worker side: park until the orchestrator starts the next frame.
    pub fn wait_for_frame(&self, worker: usize) {
        let mut state = self.state.lock();
        if worker >= state.workers.len() {
            return;
        }
        state.workers[worker] = WorkerState::Ready;
        if state.locked && state.active_collectors == 0 && state.waiting() >= state.animator_count
        {
            self.cond_ready.notify_all();
        }
        while state.workers[worker] != WorkerState::Pending {
            self.cond_activate.wait(&mut state);
        }
        state.workers[worker] = WorkerState::Animating;
    }

    /// Takes a collector guard; blocks while a frame start is imminent.
    pub fn lock_collector(&self) -> CollectorGuard<'_> {
        let mut state = self.state.lock();
        while state.locked {
            self.cond_activate.wait(&mut state);
        }
        state.active_collectors += 1;
        CollectorGuard { barrier: self }
    }

    /// Orchestrator side: block until `count` workers are parked and no
    /// collector is active.
    pub fn wait_for_animators(&self, count: usize) {
        let mut state = self.state.lock();
        state.animator_count = count;
        state.locked = true;
        while state.waiting() < state.animator_count || state.active_collectors > 0 {
            self.cond_ready.wait(&mut state);
        }
    }

    /// Orchestrator side: release every parked worker into the next frame.
    pub fn start_frame(&self) {
        {
            let mut state = self.state.lock();
            while state.waiting() < state.animator_count || state.active_collectors > 0 {
                self.cond_ready.wait(&mut state);
            }
            for worker in &mut state.workers {
                *worker = WorkerState::Pending;
            }
            state.locked = false;
        }
        self.cond_activate.notify_all();
    }
}

/// Held while a subsystem needs all threads parked; releases on drop.
pub struct CollectorGuard<'a> {
    barrier: &'a AnimBarrier,
}

impl Drop for CollectorGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.barrier.state.lock();
        state.active_collectors -= 1;
        if state.locked && state.active_collectors == 0 && state.waiting() >= state.animator_count
        {
            self.barrier.cond_ready.notify_all();
        }
    }
}

/// Fixed-interval frame clock.
///
/// [`Drummer::sync`] sleeps until the next deadline, then advances the
/// deadline by whole intervals until it is strictly in the future. The
/// returned advance count is 1 in steady state; 2 or more signals an
/// overrun, and the forward quantization prevents drift accumulation.
pub struct Drummer {
    t_next: Instant,
    interval: Duration,
}

impl Drummer {
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self { t_next: Instant::now() + interval, interval }
    }

    pub fn sync(&mut self) -> usize {
        let now = Instant::now();
        if now < self.t_next {
            std::thread::sleep(self.t_next - now);
        }
        let now = Instant::now();
        let mut advances = 0;
        while self.t_next <= now {
            self.t_next += self.interval;
            advances += 1;
        }
        advances
    }
}

/// Frame-rate estimator accumulating over one-second windows.
pub struct FpsCounter {
    last_update: Instant,
    frame_count: u32,
    accumulated: Duration,
    pub current_fps: f32,
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl FpsCounter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            last_update: Instant::now(),
            frame_count: 0,
            accumulated: Duration::ZERO,
            current_fps: 0.0,
        }
    }

    /// Counts one frame; returns a fresh estimate once per second.
    pub fn update(&mut self) -> Option<f32> {
        self.frame_count += 1;
        let now = Instant::now();
        self.accumulated += now - self.last_update;
        self.last_update = now;

        if self.accumulated.as_secs_f32() >= 1.0 {
            self.current_fps = self.frame_count as f32 / self.accumulated.as_secs_f32();
            self.accumulated = Duration::ZERO;
            self.frame_count = 0;
            return Some(self.current_fps);
        }
        None
    }
}
