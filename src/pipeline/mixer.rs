use std::sync::Arc;

use crate::audio::{EffectSpec, MASTER, RoutingTable, TrackParams};
use crate::audio_api::AudioCommand;
use crate::error::EngineResult;

// Control-side view of one mixer track. The fader values live in the shared
// `TrackParams` so the render thread sees writes without a command round trip.
#[derive(Clone, Debug)]
pub struct MixerTrack {
    pub index: usize,
    pub params: Arc<TrackParams>,
    pub effects: Vec<EffectSpec>,
}

impl MixerTrack {
    fn new(index: usize) -> Self {
        Self {
            index,
            params: TrackParams::new(if index == MASTER { 1.0 } else { 0.8 }, 0.0),
            effects: Vec::new(),
        }
    }

    pub fn is_master(&self) -> bool {
        self.index == MASTER
    }

    pub fn volume(&self) -> f32 {
        self.params.volume()
    }

    pub fn pan(&self) -> f32 {
        self.params.pan()
    }

    pub fn level(&self) -> f32 {
        self.params.level()
    }

    pub fn label(&self) -> String {
        if self.is_master() {
            "M".to_string()
        } else {
            self.index.to_string()
        }
    }
}

#[derive(Clone, Debug)]
pub struct Mixer {
    tracks: Vec<MixerTrack>, // [0] is master
    routing: RoutingTable,
}

impl Mixer {
    pub fn new(track_count: usize) -> Self {
        Self {
            tracks: (0..=track_count).map(MixerTrack::new).collect(),
            routing: RoutingTable::new(track_count),
        }
    }

    pub fn track_count(&self) -> usize {
        self.routing.track_count()
    }

    pub fn tracks(&self) -> &[MixerTrack] {
        &self.tracks
    }

    pub fn routing(&self) -> &RoutingTable {
        &self.routing
    }

    pub fn track(&self, index: usize) -> Option<&MixerTrack> {
        self.tracks.get(index)
    }

    // Master is addressable for faders, just not as a channel target
    fn fader(&self, index: usize) -> EngineResult<&MixerTrack> {
        if index != MASTER {
            self.routing.check_track(index)?;
        }
        Ok(&self.tracks[index])
    }

    pub fn set_volume(&self, index: usize, volume: f32) -> EngineResult<()> {
        self.fader(index)?.params.set_volume(volume);
        Ok(())
    }

    pub fn set_pan(&self, index: usize, pan: f32) -> EngineResult<()> {
        self.fader(index)?.params.set_pan(pan);
        Ok(())
    }

    pub fn set_target(&mut self, index: usize, target: usize) -> EngineResult<AudioCommand> {
        self.routing.set_target(index, target)?;
        Ok(AudioCommand::SetRouting(self.routing.targets().to_vec()))
    }

    pub fn set_effects(&mut self, index: usize, effects: Vec<EffectSpec>) -> EngineResult<AudioCommand> {
        let track = self.fader(index)?.index;
        self.tracks[track].effects = effects.clone();
        Ok(AudioCommand::SetEffects { track, effects })
    }

    // Handles the render side shares with this mixer
    pub fn shared_params(&self) -> Vec<Arc<TrackParams>> {
        self.tracks.iter().map(|t| t.params.clone()).collect()
    }
}
