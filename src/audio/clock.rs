use std::cell::Cell;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::error::EngineResult;

// Ground truth for all timing math. The scheduler only ever asks "what time is
// it on the audio side", never the wall clock.
pub trait AudioClock {
    fn now(&self) -> f64;

    fn is_running(&self) -> bool {
        true
    }

    fn resume(&self) -> EngineResult<()> {
        Ok(())
    }
}

// Frame counter advanced by the render callback and read by the control thread.
#[derive(Debug)]
pub struct SharedClock {
    frames: AtomicU64,
    suspended: AtomicBool,
    sample_rate: u32,
}

impl SharedClock {
    // Starts suspended, like a freshly created audio context
    pub fn new(sample_rate: u32) -> Arc<Self> {
        Arc::new(Self {
            frames: AtomicU64::new(0),
            suspended: AtomicBool::new(true),
            sample_rate,
        })
    }

    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::Acquire)
    }

    // only the render thread calls this
    pub(crate) fn publish(&self, frames: u64) {
        self.frames.store(frames, Ordering::Release);
    }
}

impl AudioClock for SharedClock {
    fn now(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    fn is_running(&self) -> bool {
        !self.is_suspended()
    }

    fn resume(&self) -> EngineResult<()> {
        self.suspended.store(false, Ordering::Release);
        Ok(())
    }
}

// Hand-cranked clock for tests and offline rendering.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<f64>,
    running: Cell<bool>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            now: Cell::new(start),
            running: Cell::new(true),
        }
    }

    pub fn suspended(start: f64) -> Self {
        Self {
            now: Cell::new(start),
            running: Cell::new(false),
        }
    }

    pub fn set(&self, t: f64) {
        self.now.set(t);
    }

    pub fn advance(&self, dt: f64) {
        self.now.set(self.now.get() + dt);
    }
}

impl AudioClock for ManualClock {
    fn now(&self) -> f64 {
        self.now.get()
    }

    fn is_running(&self) -> bool {
        self.running.get()
    }

    fn resume(&self) -> EngineResult<()> {
        self.running.set(true);
        Ok(())
    }
}
