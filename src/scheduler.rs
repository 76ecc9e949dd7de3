use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Timing handed to the per-frame callback.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameTick {
    pub index: u64,
    /// Seconds since the first tick.
    pub t: f32,
    /// Seconds since the previous tick.
    pub dt: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickControl {
    Continue,
    Stop,
}

/// Drives a frame callback until it asks to stop or the loop is cancelled.
pub trait Scheduler {
    fn run(
        &mut self,
        tick: &mut dyn FnMut(&FrameTick) -> anyhow::Result<TickControl>,
    ) -> anyhow::Result<()>;
}

/// Shared flag that cancels the next scheduled tick.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Real-time pacing: one tick per `1/fps` seconds, sleeping off the remainder.
pub struct FixedRateScheduler {
    fps: u32,
    cancel: CancelToken,
}

impl FixedRateScheduler {
    pub fn new(fps: u32, cancel: CancelToken) -> Self {
        Self {
            fps: fps.max(1),
            cancel,
        }
    }

    pub fn frame_budget(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps as f64)
    }
}

impl Scheduler for FixedRateScheduler {
    fn run(
        &mut self,
        tick: &mut dyn FnMut(&FrameTick) -> anyhow::Result<TickControl>,
    ) -> anyhow::Result<()> {
        let target = self.frame_budget();
        let start = Instant::now();
        let mut last = start;
        let mut index = 0u64;

        while !self.cancel.is_cancelled() {
            let now = Instant::now();
            let ft = FrameTick {
                index,
                t: now.duration_since(start).as_secs_f32(),
                dt: now.duration_since(last).as_secs_f32().max(1e-6),
            };
            last = now;
            index += 1;

            if tick(&ft)? == TickControl::Stop {
                break;
            }

            let elapsed = now.elapsed();
            if elapsed < target {
                thread::sleep(target - elapsed);
            }
        }
        Ok(())
    }
}

/// Deterministic ticking with a fixed `dt` and no sleeping.
pub struct ManualScheduler {
    frames: u64,
    dt: f32,
    cancel: CancelToken,
}

impl ManualScheduler {
    pub fn new(frames: u64, dt: f32) -> Self {
        Self {
            frames,
            dt,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }
}

impl Scheduler for ManualScheduler {
    fn run(
        &mut self,
        tick: &mut dyn FnMut(&FrameTick) -> anyhow::Result<TickControl>,
    ) -> anyhow::Result<()> {
        for index in 0..self.frames {
            if self.cancel.is_cancelled() {
                break;
            }
            let ft = FrameTick {
                index,
                t: index as f32 * self.dt,
                dt: self.dt,
            };
            if tick(&ft)? == TickControl::Stop {
                break;
            }
        }
        Ok(())
    }
}
