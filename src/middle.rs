// The controller between the TUI and the engine. It owns the session and the
// transport, applies intents through the session's mutators, and turns
// everything the audio thread needs to hear about into `AudioCommand`s.
use std::path::PathBuf;

use crate::audio::AudioClock;
use crate::audio_api::AudioCommand;
use crate::error::{EngineError, EngineResult};
use crate::export;
use crate::midi::MidiMessage;
use crate::pipeline::{ChannelId, Instrument, InstrumentKind, Session, SynthParams, Transport};
use crate::shared::{
    ChannelRow, DisplayState, Intent, MAX_STEP_COUNT, MAX_TEMPO, MIN_TEMPO, TrackRow,
};

pub const EXPORT_FILE: &str = "beatgrid-export.wav";

pub struct Middle {
    pub session: Session,
    transport: Transport,
    project_dir: PathBuf,
    status: String,
    last_error: Option<EngineError>,
}

impl Middle {
    pub fn new(session: Session, project_dir: PathBuf) -> EngineResult<Self> {
        let transport = Transport::from_config(session.config())?;
        Ok(Self {
            session,
            transport,
            project_dir,
            status: String::from("ready"),
            last_error: None,
        })
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn last_error(&self) -> Option<&EngineError> {
        self.last_error.as_ref()
    }

    fn report(&mut self, e: EngineError) {
        log::warn!("{:?} error: {e}", e.kind());
        self.status = e.to_string();
        self.last_error = Some(e);
    }

    pub fn handle_intent(&mut self, intent: Intent, clock: &dyn AudioClock) -> Vec<AudioCommand> {
        match self.apply(intent, clock) {
            Ok(cmds) => cmds,
            Err(e) => {
                self.report(e);
                Vec::new()
            }
        }
    }

    fn apply(&mut self, intent: Intent, clock: &dyn AudioClock) -> EngineResult<Vec<AudioCommand>> {
        let mut cmds = Vec::new();
        match intent {
            Intent::TogglePlay if self.transport.is_playing() => self.stop(),
            Intent::TogglePlay | Intent::Start => {
                self.transport.start(clock)?;
                self.status = format!("playing at {:.0} BPM", self.session.tempo());
            }
            Intent::Stop => self.stop(),
            Intent::SetTempo(bpm) => {
                self.session.set_tempo(bpm.clamp(MIN_TEMPO, MAX_TEMPO))?;
                self.status = format!("{:.0} BPM", self.session.tempo());
            }
            Intent::SetStepCount(n) => {
                self.session.set_step_count(n.min(MAX_STEP_COUNT))?;
                self.status = format!("{} steps", self.session.step_count());
            }

            Intent::ToggleStep { channel, step } => {
                self.session.toggle_step(channel, step)?;
            }
            Intent::AddOrRemoveNote { channel, pitch, step } => {
                let added = self.session.add_or_remove_note(channel, pitch, step)?;
                self.status = format!(
                    "{} note {pitch} at step {}",
                    if added { "added" } else { "removed" },
                    step + 1
                );
            }
            Intent::ClearChannel(channel) => self.session.clear_channel(channel)?,

            Intent::SelectChannel(channel) => self.session.select_channel(channel)?,
            Intent::AddChannel(kind) => {
                let name = match kind {
                    InstrumentKind::Synth => format!("Synth {}", self.session.channels().len() + 1),
                    InstrumentKind::Sampler => format!("Sampler {}", self.session.channels().len() + 1),
                };
                let id = self.session.add_channel(&name, kind)?;
                self.session.select_channel(id)?;
                self.status = format!("added {name}");
            }
            Intent::SetChannelVolume { channel, volume } => self.session.set_channel_volume(channel, volume)?,
            Intent::SetChannelPan { channel, pan } => self.session.set_channel_pan(channel, pan)?,
            Intent::SetChannelPitch { channel, semitones } => {
                self.session.set_channel_pitch_offset(channel, semitones)?
            }
            Intent::SetChannelTarget { channel, track } => self.session.set_channel_target(channel, track)?,
            Intent::SetSynthWaveform { channel, waveform } => {
                // only the waveform changes; a sampler keeps its sample
                let params = match &self.session.channel(channel)?.instrument {
                    Instrument::Synth(params) => *params,
                    Instrument::Sampler { .. } => return Err(EngineError::NotASynth { channel }),
                };
                self.session.set_synth_params(channel, SynthParams { waveform, ..params })?;
                self.status = format!("channel {channel} plays {}", waveform.label());
            }
            Intent::AuditionSelected { pitch } => {
                if let Some(cmd) = self.audition(clock, pitch, 1.0)? {
                    cmds.push(cmd);
                }
            }

            // faders write straight into the shared params, no command needed
            Intent::SetTrackVolume { track, volume } => self.session.set_track_volume(track, volume)?,
            Intent::SetTrackPan { track, pan } => self.session.set_track_pan(track, pan)?,
            Intent::SetTrackTarget { track, target } => {
                cmds.push(self.session.set_track_target(track, target)?);
            }
            Intent::SetTrackEffects { track, effects } => {
                let rack: Vec<String> = effects.iter().map(|e| e.label()).collect();
                cmds.push(self.session.set_track_effects(track, effects)?);
                self.status = if rack.is_empty() {
                    format!("track {track} inserts off")
                } else {
                    format!("track {track}: {}", rack.join(" > "))
                };
            }

            Intent::Export => self.export(),
            Intent::Quit => {}
        }
        Ok(cmds)
    }

    fn stop(&mut self) {
        self.transport.stop();
        self.status = String::from("stopped");
    }

    // A suspended clock would park the voice until the next Start
    fn audition(&self, clock: &dyn AudioClock, pitch: u8, velocity: f32) -> EngineResult<Option<AudioCommand>> {
        let Some(channel) = self.session.selected_channel() else {
            return Ok(None);
        };
        if !clock.is_running() {
            clock.resume()?;
        }
        let voice = channel.play_note(clock.now(), self.session.config().midi_note_duration, pitch, velocity)?;
        Ok(Some(AudioCommand::StartVoice(voice)))
    }

    fn export(&mut self) {
        let path = self.project_dir.join(EXPORT_FILE);
        match export::export_wav(&self.session, &self.session.config().export, &path) {
            Ok(()) => self.status = format!("exported {}", path.display()),
            Err(e) => {
                log::error!("export failed: {e:#}");
                self.status = format!("export failed: {e}");
            }
        }
    }

    // NoteOn plays on the selected channel right now; NoteOff is a no-op
    // because note lengths are fixed.
    pub fn handle_midi(&mut self, msg: MidiMessage, clock: &dyn AudioClock) -> Vec<AudioCommand> {
        let MidiMessage::NoteOn { pitch, velocity, .. } = msg else {
            return Vec::new();
        };
        match self.audition(clock, pitch, MidiMessage::velocity_gain(velocity)) {
            Ok(cmd) => cmd.into_iter().collect(),
            Err(e) => {
                self.report(e);
                Vec::new()
            }
        }
    }

    // Called every pass of the driver loop
    pub fn tick(&mut self, clock: &dyn AudioClock) -> Vec<AudioCommand> {
        let mut cmds = Vec::new();
        match self.transport.tick(&self.session, clock, &mut cmds) {
            Ok(report) => {
                for e in report.errors {
                    self.report(e);
                }
            }
            Err(e) => {
                // a confused clock: stop rather than schedule garbage
                self.transport.stop();
                self.report(e);
            }
        }
        cmds
    }

    pub fn display_state(&self, now: f64) -> DisplayState {
        let step_count = self.session.step_count();
        let pattern = self.session.pattern();
        let selected = self.session.selected_channel().map(|c| c.id);

        let channels = self
            .session
            .channels()
            .iter()
            .map(|c| {
                let track = pattern.track(c.id);
                let mut note_steps = vec![false; step_count];
                for note in track.into_iter().flat_map(|t| t.notes.iter()) {
                    if let Some(cell) = note_steps.get_mut(note.step) {
                        *cell = true;
                    }
                }
                ChannelRow {
                    id: c.id,
                    name: c.name.clone(),
                    kind: c.instrument.label(),
                    waveform: match &c.instrument {
                        Instrument::Synth(params) => Some(params.waveform),
                        Instrument::Sampler { .. } => None,
                    },
                    steps: track.map(|t| t.steps.clone()).unwrap_or_default(),
                    note_steps,
                    volume: c.volume,
                    pan: c.pan,
                    pitch_offset: c.pitch_offset,
                    target_track: c.target_track,
                    selected: Some(c.id) == selected,
                }
            })
            .collect();

        let mixer = self.session.mixer();
        let tracks = mixer
            .tracks()
            .iter()
            .map(|t| TrackRow {
                label: t.label(),
                volume: t.volume(),
                pan: t.pan(),
                level: t.level(),
                target: mixer.routing().target(t.index),
                effects: t.effects.clone(),
            })
            .collect();

        DisplayState {
            playing: self.transport.is_playing(),
            tempo: self.session.tempo(),
            step_count,
            position: self.transport.position(),
            playhead: self.transport.playhead(now),
            channels,
            tracks,
            status: self.status.clone(),
            last_error: self.last_error.as_ref().map(|e| e.to_string()),
        }
    }

    pub fn selected_channel(&self) -> Option<ChannelId> {
        self.session.selected_channel().map(|c| c.id)
    }
}
