// Everything one editing session owns: channels, the pattern, the mixer and
// transport settings. Owned by the caller and passed by reference; nothing in
// here is global.
use rand::SeedableRng;
use rand::rngs::StdRng;

use super::channel::{Channel, ChannelId, Instrument, SynthParams};
use super::mixer::Mixer;
use super::pattern::{Note, Pattern};
use crate::audio::{EffectSpec, MASTER, Preset, SampleBuffer};
use crate::audio_api::AudioCommand;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::loader::sample_loader;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstrumentKind {
    Synth,
    Sampler,
}

pub struct Session {
    config: EngineConfig,
    channels: Vec<Channel>,
    pattern: Pattern,
    mixer: Mixer,
    tempo: f64,
    selected: Option<ChannelId>,
    next_id: u32,
    rng: StdRng, // drives preset noise so a given seed always sounds the same
}

impl Session {
    pub fn empty(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self {
            pattern: Pattern::new(config.step_count)?,
            mixer: Mixer::new(config.track_count),
            tempo: config.tempo,
            channels: Vec::new(),
            selected: None,
            next_id: 1,
            rng: StdRng::seed_from_u64(config.preset_seed),
            config,
        })
    }

    // The starter kit: three procedural drums and a saw lead
    pub fn with_defaults(config: EngineConfig) -> EngineResult<Self> {
        let mut session = Self::empty(config)?;
        for preset in Preset::ALL {
            session.add_preset_channel(preset)?;
        }
        session.add_channel("Lead", InstrumentKind::Synth)?;
        if let Some(first) = session.channels.first() {
            session.selected = Some(first.id);
        }
        Ok(session)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    pub fn tempo(&self) -> f64 {
        self.tempo
    }

    pub fn step_count(&self) -> usize {
        self.pattern.step_count()
    }

    pub fn drum_hit_duration(&self) -> f64 {
        self.config.drum_hit_duration
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn channel(&self, id: ChannelId) -> EngineResult<&Channel> {
        self.channels
            .iter()
            .find(|c| c.id == id)
            .ok_or(EngineError::UnknownChannel(id))
    }

    fn channel_mut(&mut self, id: ChannelId) -> EngineResult<&mut Channel> {
        self.channels
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(EngineError::UnknownChannel(id))
    }

    pub fn selected_channel(&self) -> Option<&Channel> {
        self.selected.and_then(|id| self.channel(id).ok())
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn mixer(&self) -> &Mixer {
        &self.mixer
    }

    // -- channels --

    // Builds a channel with a fresh id and the next track in rotation, so new
    // channels spread across the mixer instead of piling onto track 1.
    pub fn add_channel_with(
        &mut self,
        build: impl FnOnce(ChannelId, usize) -> Channel,
    ) -> EngineResult<ChannelId> {
        let id = ChannelId(self.next_id);
        let target = self.channels.len() % self.mixer.track_count() + 1;
        let channel = build(id, target);
        self.check_channel_target(id, channel.target_track)?;
        self.next_id += 1;
        self.pattern.add_channel(id);
        log::info!("added channel {} '{}' -> track {}", id, channel.name, channel.target_track);
        self.channels.push(channel);
        if self.selected.is_none() {
            self.selected = Some(id);
        }
        Ok(id)
    }

    pub fn add_channel(&mut self, name: &str, kind: InstrumentKind) -> EngineResult<ChannelId> {
        self.add_channel_with(|id, target| match kind {
            InstrumentKind::Synth => Channel::synth(id, name, target),
            InstrumentKind::Sampler => Channel::sampler(id, name, None, target),
        })
    }

    // Preset buffers are rendered once, here, and owned by the channel
    pub fn add_preset_channel(&mut self, preset: Preset) -> EngineResult<ChannelId> {
        let buffer = preset.generate(self.config.sample_rate, &mut self.rng);
        self.add_channel_with(|id, target| Channel::sampler(id, preset.name(), Some(buffer), target))
    }

    pub fn remove_channel(&mut self, id: ChannelId) -> EngineResult<()> {
        let idx = self
            .channels
            .iter()
            .position(|c| c.id == id)
            .ok_or(EngineError::UnknownChannel(id))?;
        self.channels.remove(idx);
        self.pattern.remove_channel(id);
        if self.selected == Some(id) {
            self.selected = self.channels.first().map(|c| c.id);
        }
        Ok(())
    }

    // Decodes first and only then touches the session, so a bad file leaves
    // everything as it was. `into` = None makes a new sampler channel.
    pub fn import_sample(
        &mut self,
        into: Option<ChannelId>,
        name: &str,
        bytes: &[u8],
    ) -> EngineResult<ChannelId> {
        if let Some(id) = into {
            self.channel(id)?;
        }
        let buffer = sample_loader::decode(bytes, self.config.sample_rate)?;
        match into {
            Some(id) => {
                self.assign_sample(id, buffer)?;
                Ok(id)
            }
            None => self.add_channel_with(|id, target| Channel::sampler(id, name, Some(buffer), target)),
        }
    }

    // Turns the channel into a sampler playing `buffer`
    pub fn assign_sample(&mut self, id: ChannelId, buffer: SampleBuffer) -> EngineResult<()> {
        let buffer = buffer.resampled(self.config.sample_rate);
        let channel = self.channel_mut(id)?;
        channel.instrument = Instrument::Sampler {
            buffer: Some(std::sync::Arc::new(buffer)),
        };
        log::info!("channel {id} now plays a {:.2}s sample", channel_buffer_secs(channel));
        Ok(())
    }

    pub fn select_channel(&mut self, id: ChannelId) -> EngineResult<()> {
        self.channel(id)?;
        self.selected = Some(id);
        Ok(())
    }

    pub fn set_channel_volume(&mut self, id: ChannelId, volume: f32) -> EngineResult<()> {
        self.channel_mut(id)?.volume = volume.clamp(0.0, 1.0);
        Ok(())
    }

    pub fn set_channel_pan(&mut self, id: ChannelId, pan: f32) -> EngineResult<()> {
        self.channel_mut(id)?.pan = pan.clamp(-1.0, 1.0);
        Ok(())
    }

    pub fn set_channel_pitch_offset(&mut self, id: ChannelId, semitones: i32) -> EngineResult<()> {
        self.channel_mut(id)?.pitch_offset = semitones.clamp(-48, 48);
        Ok(())
    }

    pub fn set_synth_params(&mut self, id: ChannelId, params: SynthParams) -> EngineResult<()> {
        self.channel_mut(id)?.instrument = Instrument::Synth(params);
        Ok(())
    }

    fn check_channel_target(&self, channel: ChannelId, track: usize) -> EngineResult<()> {
        if track == MASTER {
            return Err(EngineError::MasterTarget { channel });
        }
        self.mixer.routing().check_track(track)
    }

    pub fn set_channel_target(&mut self, id: ChannelId, track: usize) -> EngineResult<()> {
        self.check_channel_target(id, track)?;
        self.channel_mut(id)?.target_track = track;
        Ok(())
    }

    // -- pattern --

    pub fn toggle_step(&mut self, id: ChannelId, step: usize) -> EngineResult<bool> {
        self.pattern.toggle_step(id, step)
    }

    pub fn add_or_remove_note(&mut self, id: ChannelId, pitch: u8, step: usize) -> EngineResult<bool> {
        self.pattern.add_or_remove_note(id, pitch, step)
    }

    pub fn put_note(&mut self, id: ChannelId, note: Note) -> EngineResult<()> {
        self.pattern.put_note(id, note)
    }

    pub fn clear_channel(&mut self, id: ChannelId) -> EngineResult<()> {
        self.pattern.clear_channel(id)
    }

    pub fn set_step_count(&mut self, step_count: usize) -> EngineResult<()> {
        self.pattern.set_step_count(step_count)
    }

    pub fn set_tempo(&mut self, tempo: f64) -> EngineResult<()> {
        if !(tempo.is_finite() && tempo > 0.0) {
            return Err(EngineError::InvalidTempo(tempo));
        }
        self.tempo = tempo;
        Ok(())
    }

    // -- mixer --

    pub fn set_track_volume(&self, track: usize, volume: f32) -> EngineResult<()> {
        self.mixer.set_volume(track, volume)
    }

    pub fn set_track_pan(&self, track: usize, pan: f32) -> EngineResult<()> {
        self.mixer.set_pan(track, pan)
    }

    pub fn set_track_target(&mut self, track: usize, target: usize) -> EngineResult<AudioCommand> {
        self.mixer.set_target(track, target)
    }

    pub fn set_track_effects(&mut self, track: usize, effects: Vec<EffectSpec>) -> EngineResult<AudioCommand> {
        self.mixer.set_effects(track, effects)
    }
}

fn channel_buffer_secs(channel: &Channel) -> f64 {
    match &channel.instrument {
        Instrument::Sampler { buffer: Some(b) } => b.duration(),
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::VoiceSource;
    use crate::error::ErrorKind;

    fn session() -> Session {
        Session::with_defaults(EngineConfig::default()).unwrap()
    }

    fn wav_bytes(samples: &[i16], rate: u32) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for &s in samples {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn default_kit_has_four_channels_on_separate_tracks() {
        let s = session();
        let names: Vec<&str> = s.channels().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Kick", "Snare", "Hat", "Lead"]);
        let targets: Vec<usize> = s.channels().iter().map(|c| c.target_track).collect();
        assert_eq!(targets, vec![1, 2, 3, 4]);
        assert_eq!(s.selected_channel().unwrap().name, "Kick");
        assert!(s.channels()[..3].iter().all(|c| c.is_sampler()));
    }

    #[test]
    fn same_seed_same_kit() {
        let a = session();
        let b = session();
        let buf = |s: &Session| match &s.channels()[1].instrument {
            Instrument::Sampler { buffer: Some(b) } => b.data.clone(),
            _ => unreachable!(),
        };
        assert_eq!(buf(&a), buf(&b));
    }

    #[test]
    fn tempo_must_be_positive() {
        let mut s = session();
        assert_eq!(s.set_tempo(0.0), Err(EngineError::InvalidTempo(0.0)));
        assert!(s.set_tempo(-10.0).is_err());
        assert_eq!(s.tempo(), 120.0);
        s.set_tempo(90.0).unwrap();
        assert_eq!(s.tempo(), 90.0);
    }

    #[test]
    fn channels_never_target_master() {
        let mut s = session();
        let id = s.channels()[0].id;
        let err = s.set_channel_target(id, MASTER).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Routing);
        assert!(s.set_channel_target(id, 99).is_err());
        s.set_channel_target(id, 8).unwrap();
        assert_eq!(s.channel(id).unwrap().target_track, 8);
    }

    #[test]
    fn failed_import_leaves_the_channel_alone() {
        let mut s = session();
        let id = s.channels()[0].id;
        let before = match &s.channel(id).unwrap().instrument {
            Instrument::Sampler { buffer } => buffer.clone(),
            _ => unreachable!(),
        };
        let err = s.import_sample(Some(id), "junk", b"definitely not audio").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Resource);
        match &s.channel(id).unwrap().instrument {
            Instrument::Sampler { buffer } => assert_eq!(buffer, &before),
            _ => unreachable!(),
        }
        assert_eq!(s.channels().len(), 4);
    }

    #[test]
    fn import_creates_a_sampler_channel() {
        let mut s = session();
        let bytes = wav_bytes(&[0, 16384, -16384, 0], 44100);
        let id = s.import_sample(None, "clap", &bytes).unwrap();
        let channel = s.channel(id).unwrap();
        assert_eq!(channel.name, "clap");
        assert_eq!(channel.target_track, 5);
        assert!(channel.play_note(0.0, 0.1, 60, 1.0).is_ok());
        assert!(s.pattern().track(id).is_some());
    }

    #[test]
    fn empty_sampler_then_import_makes_it_playable() {
        let mut s = session();
        let id = s.add_channel("pad", InstrumentKind::Sampler).unwrap();
        assert!(s.channel(id).unwrap().play_note(0.0, 0.1, 60, 1.0).is_err());
        s.import_sample(Some(id), "pad", &wav_bytes(&[100; 64], 22050)).unwrap();
        assert!(s.channel(id).unwrap().play_note(0.0, 0.1, 60, 1.0).is_ok());
    }

    #[test]
    fn assigned_buffers_are_brought_to_the_session_rate() {
        let mut s = session();
        let id = s.add_channel("pad", InstrumentKind::Sampler).unwrap();
        s.assign_sample(id, SampleBuffer::new(vec![1.0; 22050], 22050)).unwrap();
        let voice = s.channel(id).unwrap().play_note(0.0, 0.1, 60, 1.0).unwrap();
        assert!((voice.stop - 1.0).abs() < 1e-9);
        match &voice.source {
            VoiceSource::Sample { buffer, .. } => assert_eq!(buffer.sample_rate, s.sample_rate()),
            _ => panic!("expected a sample voice"),
        }
        assert!(voice.sample_at(0.6) > 0.0);
    }

    #[test]
    fn removing_the_selected_channel_moves_selection() {
        let mut s = session();
        let kick = s.channels()[0].id;
        s.remove_channel(kick).unwrap();
        assert_eq!(s.selected_channel().unwrap().name, "Snare");
        assert!(s.pattern().track(kick).is_none());
        assert!(s.select_channel(kick).is_err());
    }

    #[test]
    fn channel_knobs_clamp() {
        let mut s = session();
        let id = s.channels()[3].id;
        s.set_channel_volume(id, 3.0).unwrap();
        s.set_channel_pan(id, -4.0).unwrap();
        let c = s.channel(id).unwrap();
        assert_eq!(c.volume, 1.0);
        assert_eq!(c.pan, -1.0);
    }
}
