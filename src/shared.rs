// The current input plan:
//
// Grid:
//   arrows        //  move the cursor (channel rows x steps)
//   Enter         //  ToggleStep at the cursor
//   n             //  AddOrRemoveNote at the cursor, pitch from the note cursor
//   , / .         //  note cursor pitch down / up
//   Tab           //  SelectChannel (next row)
//
// Transport:
//   Space         //  TogglePlay
//   - / =         //  SetTempo(-1 / +1 BPM)
//   [ / ]         //  SetStepCount(-1 / +1)
//
// Channel / mixer:
//   v / V         //  SetChannelVolume on the selected channel
//   p / P         //  SetChannelPan on the selected channel
//   o / O         //  SetChannelPitch (semitones)
//   t             //  SetChannelTarget (next mixer track)
//   m / M         //  SetTrackVolume on the channel's track
//   b / B         //  SetTrackPan on the channel's track
//   r             //  SetTrackTarget (route the channel's track onward)
//   f             //  SetTrackEffects (next insert rack on the channel's track)
//   w             //  SetSynthWaveform (next waveform, synth channels only)
//   k             //  AuditionSelected (plays the selected channel now)
//   s / i         //  AddChannel(Synth / Sampler)
//   x             //  ClearChannel
//   e             //  Export
//
// Quit:
//   Esc / q       //  Quit
//
// The middle layer owns the session and transport; the TUI only renders the
// `DisplayState` it hands back each frame and turns keys into `Intent`s.

use crate::audio::{EffectSpec, Waveform};
use crate::pipeline::{ChannelId, InstrumentKind, Position};

pub const DEFAULT_STEP_COUNT: usize = 16;
pub const DEFAULT_TEMPO: f64 = 120.0;
pub const DEFAULT_TRACK_COUNT: usize = 8;

pub const MIN_TEMPO: f64 = 20.0;
pub const MAX_TEMPO: f64 = 300.0;
pub const MAX_STEP_COUNT: usize = 64;

#[derive(Clone, Debug, PartialEq)]
pub enum Intent {
    // transport
    TogglePlay,
    Start,
    Stop,
    SetTempo(f64),
    SetStepCount(usize),

    // pattern
    ToggleStep { channel: ChannelId, step: usize },
    AddOrRemoveNote { channel: ChannelId, pitch: u8, step: usize },
    ClearChannel(ChannelId),

    // channels
    SelectChannel(ChannelId),
    AddChannel(InstrumentKind),
    SetChannelVolume { channel: ChannelId, volume: f32 },
    SetChannelPan { channel: ChannelId, pan: f32 },
    SetChannelPitch { channel: ChannelId, semitones: i32 },
    SetChannelTarget { channel: ChannelId, track: usize },
    SetSynthWaveform { channel: ChannelId, waveform: Waveform },
    AuditionSelected { pitch: u8 },

    // mixer
    SetTrackVolume { track: usize, volume: f32 },
    SetTrackPan { track: usize, pan: f32 },
    SetTrackTarget { track: usize, target: usize },
    SetTrackEffects { track: usize, effects: Vec<EffectSpec> },

    Export,
    Quit,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChannelRow {
    pub id: ChannelId,
    pub name: String,
    pub kind: &'static str, // waveform name, "sampler" or "empty"
    pub waveform: Option<Waveform>, // None for samplers
    pub steps: Vec<bool>,
    pub note_steps: Vec<bool>, // true where a piano-roll note starts
    pub volume: f32,
    pub pan: f32,
    pub pitch_offset: i32,
    pub target_track: usize,
    pub selected: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TrackRow {
    pub label: String,
    pub volume: f32,
    pub pan: f32,
    pub level: f32, // meter, mean absolute level of the last block
    pub target: Option<usize>,
    pub effects: Vec<EffectSpec>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DisplayState {
    pub playing: bool,
    pub tempo: f64,
    pub step_count: usize,
    pub position: Position,
    pub playhead: Option<usize>, // step sounding right now, if playing
    pub channels: Vec<ChannelRow>,
    pub tracks: Vec<TrackRow>, // [0] is master
    pub status: String,        // last thing worth telling the user
    pub last_error: Option<String>,
}
