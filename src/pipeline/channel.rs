use std::fmt;
use std::sync::Arc;

use crate::audio::{Envelope, EnvelopeShape, SampleBuffer, Voice, VoiceSource, Waveform};
use crate::error::{EngineError, EngineResult};

pub const ROOT_PITCH: u8 = 60; // pitch at which a sample plays at its recorded speed
pub const MAX_PITCH: u8 = 127;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub u32);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SynthParams {
    pub waveform: Waveform,
    pub envelope: EnvelopeShape,
}

// What actually makes the sound
#[derive(Clone, Debug)]
pub enum Instrument {
    Synth(SynthParams),
    Sampler { buffer: Option<Arc<SampleBuffer>> },
}

impl Instrument {
    pub fn label(&self) -> &'static str {
        match self {
            Instrument::Synth(params) => params.waveform.label(),
            Instrument::Sampler { buffer: Some(_) } => "sampler",
            Instrument::Sampler { buffer: None } => "empty",
        }
    }
}

#[derive(Clone, Debug)]
pub struct Channel {
    pub id: ChannelId,
    pub name: String,
    pub instrument: Instrument,
    pub volume: f32,       // 0..1
    pub pan: f32,          // -1..1
    pub pitch_offset: i32, // semitones
    pub target_track: usize, // never master
}

impl Channel {
    pub fn synth(id: ChannelId, name: impl Into<String>, target_track: usize) -> Self {
        Self::new(id, name, Instrument::Synth(SynthParams::default()), target_track)
    }

    pub fn sampler(
        id: ChannelId,
        name: impl Into<String>,
        buffer: Option<SampleBuffer>,
        target_track: usize,
    ) -> Self {
        let instrument = Instrument::Sampler {
            buffer: buffer.map(Arc::new),
        };
        Self::new(id, name, instrument, target_track)
    }

    fn new(id: ChannelId, name: impl Into<String>, instrument: Instrument, target_track: usize) -> Self {
        Self {
            id,
            name: name.into(),
            instrument,
            volume: 0.8,
            pan: 0.0,
            pitch_offset: 0,
            target_track,
        }
    }

    pub fn is_sampler(&self) -> bool {
        matches!(self.instrument, Instrument::Sampler { .. })
    }

    // Build the voice for one note-on. `duration` is how long the note is held
    // in seconds; samplers ignore it and play their buffer out.
    pub fn play_note(&self, time: f64, duration: f64, pitch: u8, velocity: f32) -> EngineResult<Voice> {
        if !(time.is_finite() && time >= 0.0) {
            return Err(EngineError::NegativeTime(time));
        }
        if !(duration.is_finite() && duration >= 0.0) {
            return Err(EngineError::NegativeDuration(duration));
        }
        if pitch > MAX_PITCH {
            return Err(EngineError::InvalidPitch(pitch));
        }
        let velocity = velocity.clamp(0.0, 1.0);
        let semitone = pitch as i32 + self.pitch_offset;

        match &self.instrument {
            Instrument::Sampler { buffer: None } => Err(EngineError::MissingSample { channel: self.id }),
            Instrument::Sampler { buffer: Some(buffer) } => {
                let rate = playback_rate(self.pitch_offset, pitch);
                Ok(Voice {
                    track: self.target_track,
                    start: time,
                    // no release tail, the buffer just runs out
                    stop: time + buffer.duration() / rate,
                    pan: self.pan,
                    source: VoiceSource::Sample {
                        buffer: buffer.clone(),
                        rate,
                        gain: self.volume * velocity,
                    },
                })
            }
            Instrument::Synth(params) => {
                let envelope = Envelope::new(params.envelope, self.volume * velocity, duration);
                Ok(Voice {
                    track: self.target_track,
                    start: time,
                    stop: time + params.envelope.voice_length(duration),
                    pan: self.pan,
                    source: VoiceSource::Synth {
                        waveform: params.waveform,
                        frequency: semitone_to_freq(semitone),
                        envelope,
                    },
                })
            }
        }
    }
}

// 2^((offset + pitch - 60) / 12)
pub fn playback_rate(pitch_offset: i32, pitch: u8) -> f64 {
    let semis = pitch_offset + pitch as i32 - ROOT_PITCH as i32;
    2f64.powf(semis as f64 / 12.0)
}

// Equal temperament, A4 (69) = 440 Hz
pub fn semitone_to_freq(semitone: i32) -> f64 {
    440.0 * 2f64.powf((semitone - 69) as f64 / 12.0)
}
