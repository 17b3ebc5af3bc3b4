use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use super::effect::{self, Effect};
use super::frame::StereoFrame;
use crate::error::{EngineError, EngineResult};

pub const MASTER: usize = 0;

// f32 stored as raw bits so the UI thread and the render thread can share it
#[derive(Debug)]
struct AtomicF32(AtomicU32);

impl AtomicF32 {
    fn new(v: f32) -> Self {
        Self(AtomicU32::new(v.to_bits()))
    }

    fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    fn store(&self, v: f32) {
        self.0.store(v.to_bits(), Ordering::Relaxed);
    }
}

// Fader/knob state of one track plus its meter reading. Written by the control
// side, read once per block by the render side; the meter goes the other way.
#[derive(Debug)]
pub struct TrackParams {
    volume: AtomicF32,
    pan: AtomicF32,
    level: AtomicF32,
}

impl TrackParams {
    pub fn new(volume: f32, pan: f32) -> Arc<Self> {
        Arc::new(Self {
            volume: AtomicF32::new(volume.clamp(0.0, 1.0)),
            pan: AtomicF32::new(pan.clamp(-1.0, 1.0)),
            level: AtomicF32::new(0.0),
        })
    }

    pub fn volume(&self) -> f32 {
        self.volume.load()
    }

    pub fn set_volume(&self, v: f32) {
        self.volume.store(v.clamp(0.0, 1.0));
    }

    pub fn pan(&self) -> f32 {
        self.pan.load()
    }

    pub fn set_pan(&self, p: f32) {
        self.pan.store(p.clamp(-1.0, 1.0));
    }

    // Latest per-block level, telemetry only
    pub fn level(&self) -> f32 {
        self.level.load()
    }

    fn publish_level(&self, v: f32) {
        self.level.store(v);
    }
}

// Where each track sends its output. Index 0 is master and goes to the device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoutingTable {
    targets: Vec<usize>,
}

impl RoutingTable {
    // Every track straight into master
    pub fn new(track_count: usize) -> Self {
        Self {
            targets: vec![MASTER; track_count + 1],
        }
    }

    pub fn from_targets(targets: Vec<usize>) -> EngineResult<Self> {
        let table = Self { targets };
        table.validate()?;
        Ok(table)
    }

    // tracks excluding master
    pub fn track_count(&self) -> usize {
        self.targets.len().saturating_sub(1)
    }

    pub fn targets(&self) -> &[usize] {
        &self.targets
    }

    pub fn target(&self, track: usize) -> Option<usize> {
        if track == MASTER {
            return None;
        }
        self.targets.get(track).copied()
    }

    pub fn check_track(&self, track: usize) -> EngineResult<()> {
        if track == MASTER || track > self.track_count() {
            return Err(EngineError::TrackOutOfRange {
                track,
                track_count: self.track_count(),
            });
        }
        Ok(())
    }

    pub fn set_target(&mut self, track: usize, target: usize) -> EngineResult<()> {
        self.check_track(track)?;
        if target != MASTER {
            self.check_track(target)?;
        }
        let previous = self.targets[track];
        self.targets[track] = target;
        if let Err(e) = self.validate() {
            self.targets[track] = previous;
            return Err(e);
        }
        Ok(())
    }

    // Hops from `track` to master, or the cycle/range error that prevents it.
    pub fn depth(&self, track: usize) -> EngineResult<usize> {
        let mut current = track;
        let mut hops = 0;
        while current != MASTER {
            if hops > self.track_count() {
                return Err(EngineError::RoutingCycle { track });
            }
            current = match self.targets.get(current) {
                Some(&next) if next <= self.track_count() => next,
                _ => {
                    return Err(EngineError::TrackOutOfRange {
                        track: current,
                        track_count: self.track_count(),
                    });
                }
            };
            hops += 1;
        }
        Ok(hops)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.targets.is_empty() {
            return Err(EngineError::TrackOutOfRange { track: MASTER, track_count: 0 });
        }
        for track in 1..self.targets.len() {
            self.depth(track)?;
        }
        Ok(())
    }

    // Upstream tracks first, master last, so every bus has all of its inputs
    // summed before it is processed.
    pub fn render_order(&self) -> EngineResult<Vec<usize>> {
        let mut order = Vec::with_capacity(self.targets.len());
        for track in 0..self.targets.len() {
            order.push((self.depth(track)?, track));
        }
        order.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        Ok(order.into_iter().map(|(_, track)| track).collect())
    }
}

// Render-side state of one mixer track.
pub struct MixBus {
    pub params: Arc<TrackParams>,
    pub effects: Vec<Box<dyn Effect>>,
    pub buffer: Vec<StereoFrame>,
    gain: f32, // value reached at the end of the last block
    pan: f32,
}

impl MixBus {
    pub fn new(params: Arc<TrackParams>, max_block: usize) -> Self {
        let gain = params.volume();
        let pan = params.pan();
        Self {
            params,
            effects: Vec::new(),
            buffer: vec![StereoFrame::zero(); max_block],
            gain,
            pan,
        }
    }

    pub fn prepare(&mut self, frames: usize) {
        if self.buffer.len() < frames {
            self.buffer.resize(frames, StereoFrame::zero());
        }
        self.buffer[..frames].fill(StereoFrame::zero());
    }

    // effects -> gain -> pan -> meter, over the first `frames` frames
    pub fn process(&mut self, frames: usize) {
        let buf = &mut self.buffer[..frames];
        effect::run_chain(&mut self.effects, buf);

        // ramp toward the new fader positions across the block instead of jumping
        let target_gain = self.params.volume();
        let target_pan = self.params.pan();
        let n = frames.max(1) as f32;
        let mut sum = 0.0f32;
        for (i, frame) in buf.iter_mut().enumerate() {
            let x = (i + 1) as f32 / n;
            let gain = self.gain + (target_gain - self.gain) * x;
            let pan = self.pan + (target_pan - self.pan) * x;
            let f = StereoFrame {
                left: frame.left * gain,
                right: frame.right * gain,
            }
            .balance(pan);
            *frame = f;
            sum += 0.5 * (f.left.abs() + f.right.abs());
        }
        self.gain = target_gain;
        self.pan = target_pan;
        if frames > 0 {
            self.params.publish_level(sum / frames as f32);
        }
    }
}
