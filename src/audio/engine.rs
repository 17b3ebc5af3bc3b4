use std::sync::Arc;

use crate::audio_api::AudioCommand;

use super::clock::SharedClock;
use super::frame::StereoFrame;
use super::mixer::{MASTER, MixBus, RoutingTable, TrackParams};
use super::voice::Voice;

const MAX_VOICES: usize = 256; // hard cap so we don't grow the pool in the audio callback
const MAX_BLOCK: usize = 4096;

// Render side of the session: voices in flight plus the mixer graph. Lives on
// the audio thread (or inside an offline export) and is driven block by block.
pub struct Engine {
    sample_rate: f64,
    clock: Option<Arc<SharedClock>>, // None when rendering offline
    frames: u64,
    voices: Vec<Voice>,
    buses: Vec<MixBus>,
    routing: RoutingTable,
    order: Vec<usize>,
    scratch: Vec<StereoFrame>,
}

impl Engine {
    // `tracks[0]` is master
    pub fn new(sample_rate: u32, tracks: Vec<Arc<TrackParams>>, routing: RoutingTable) -> Self {
        let order = routing
            .render_order()
            .unwrap_or_else(|_| (0..tracks.len()).rev().collect());
        Self {
            sample_rate: sample_rate as f64,
            clock: None,
            frames: 0,
            voices: Vec::with_capacity(MAX_VOICES),
            buses: tracks.into_iter().map(|p| MixBus::new(p, MAX_BLOCK)).collect(),
            routing,
            order,
            scratch: vec![StereoFrame::zero(); MAX_BLOCK],
        }
    }

    pub fn with_clock(mut self, clock: Arc<SharedClock>) -> Self {
        self.frames = clock.frames();
        self.clock = Some(clock);
        self
    }

    pub fn now(&self) -> f64 {
        self.frames as f64 / self.sample_rate
    }

    pub fn handle_cmd(&mut self, cmd: AudioCommand) {
        match cmd {
            AudioCommand::StartVoice(voice) => self.start_voice(voice),
            AudioCommand::SetRouting(targets) => {
                if targets.len() != self.buses.len() {
                    return;
                }
                // the control side validated this already; a bad table just keeps the old one
                if let Ok(table) = RoutingTable::from_targets(targets) {
                    if let Ok(order) = table.render_order() {
                        self.routing = table;
                        self.order = order;
                    }
                }
            }
            AudioCommand::SetEffects { track, effects } => {
                if let Some(bus) = self.buses.get_mut(track) {
                    bus.effects = effects.iter().map(|spec| spec.to_effect()).collect();
                }
            }
        }
    }

    fn start_voice(&mut self, mut voice: Voice) {
        if voice.track == MASTER || voice.track >= self.buses.len() {
            return;
        }
        // late arrivals play now rather than getting dropped
        let now = self.now();
        if voice.start < now {
            voice.rebase(now);
        }
        if self.voices.len() >= MAX_VOICES {
            // steal the voice closest to finishing
            if let Some(idx) = self
                .voices
                .iter()
                .enumerate()
                .min_by(|a, b| a.1.stop.total_cmp(&b.1.stop))
                .map(|(i, _)| i)
            {
                self.voices.swap_remove(idx);
            }
        }
        self.voices.push(voice);
    }

    pub fn render_block(&mut self, out: &mut [StereoFrame]) {
        if self.clock.as_ref().is_some_and(|c| c.is_suspended()) {
            out.fill(StereoFrame::zero());
            return;
        }
        let n = out.len();
        for bus in &mut self.buses {
            bus.prepare(n);
        }

        // voices into their track's input
        let buses = &mut self.buses;
        let block_start = self.frames;
        let sample_rate = self.sample_rate;
        self.voices.retain(|voice| match buses.get_mut(voice.track) {
            Some(bus) => voice.render_into(&mut bus.buffer[..n], block_start, sample_rate),
            None => false,
        });

        // tracks, upstream first
        for i in 0..self.order.len() {
            let track = self.order[i];
            self.buses[track].process(n);
            if track == MASTER {
                out.copy_from_slice(&self.buses[MASTER].buffer[..n]);
                continue;
            }
            let target = self.routing.target(track).unwrap_or(MASTER);
            let src = std::mem::take(&mut self.buses[track].buffer);
            for (dst, s) in self.buses[target].buffer[..n].iter_mut().zip(&src[..n]) {
                dst.left += s.left;
                dst.right += s.right;
            }
            self.buses[track].buffer = src;
        }

        self.frames += n as u64;
        if let Some(clock) = &self.clock {
            clock.publish(self.frames);
        }
    }

    // Fills an interleaved device buffer of any channel count.
    pub fn render_interleaved(&mut self, data: &mut [f32], channels: usize) {
        if channels == 0 {
            return;
        }
        let n_frames = data.len() / channels;
        let mut scratch = std::mem::take(&mut self.scratch);
        if scratch.len() < n_frames {
            scratch.resize(n_frames, StereoFrame::zero());
        }
        self.render_block(&mut scratch[..n_frames]);

        for (frame, out) in scratch[..n_frames].iter().zip(data.chunks_exact_mut(channels)) {
            match out {
                [mono] => *mono = frame.mono(),
                [l, r, rest @ ..] => {
                    *l = frame.left;
                    *r = frame.right;
                    rest.fill(0.0);
                }
                [] => {}
            }
        }
        self.scratch = scratch;
    }
}
