use std::time::Duration;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crate::audio::next_rack;
use crate::pipeline::InstrumentKind;
use crate::shared::{DisplayState, Intent};
use super::mode::TuiState;

const VOLUME_STEP: f32 = 0.05;
const PAN_STEP: f32 = 0.1;

// poll for input from tui, moves the cursor in tuistate and resolves keys
// against the current display state into intents for the middle layer
pub fn poll_input(timeout: Duration, ts: &mut TuiState, ds: &DisplayState) -> anyhow::Result<Vec<Intent>> {
    if !event::poll(timeout)? {
        return Ok(vec![]);
    }

    if let Event::Key(key) = event::read()? {
        if key.kind != KeyEventKind::Press {
            return Ok(vec![]);
        }
        return Ok(handle_key(key.code, ts, ds));
    }
    Ok(vec![])
}

pub fn handle_key(code: KeyCode, ts: &mut TuiState, ds: &DisplayState) -> Vec<Intent> {
    ts.clamp_to(ds);
    match code {
        KeyCode::Esc | KeyCode::Char('q') => return vec![Intent::Quit],
        KeyCode::Char(' ') => return vec![Intent::TogglePlay],

        // cursor
        KeyCode::Up => { ts.move_by(-1, 0, ds); return select_row(ts, ds); }
        KeyCode::Down | KeyCode::Tab => { ts.move_by(1, 0, ds); return select_row(ts, ds); }
        KeyCode::Left => { ts.move_by(0, -1, ds); return vec![]; }
        KeyCode::Right => { ts.move_by(0, 1, ds); return vec![]; }
        KeyCode::Char(',') => { ts.note_pitch = ts.note_pitch.saturating_sub(1); return vec![]; }
        KeyCode::Char('.') => { ts.note_pitch = (ts.note_pitch + 1).min(127); return vec![]; }

        // transport
        KeyCode::Char('-') => return vec![Intent::SetTempo(ds.tempo - 1.0)],
        KeyCode::Char('=') => return vec![Intent::SetTempo(ds.tempo + 1.0)],
        KeyCode::Char('[') => return vec![Intent::SetStepCount(ds.step_count.saturating_sub(1).max(1))],
        KeyCode::Char(']') => return vec![Intent::SetStepCount(ds.step_count + 1)],

        KeyCode::Char('s') => return vec![Intent::AddChannel(InstrumentKind::Synth)],
        KeyCode::Char('i') => return vec![Intent::AddChannel(InstrumentKind::Sampler)],
        KeyCode::Char('e') => return vec![Intent::Export],
        _ => {}
    }

    // everything below acts on the channel under the cursor
    let Some(row) = ds.channels.get(ts.row) else {
        return vec![];
    };
    let channel = row.id;
    match code {
        KeyCode::Enter => vec![Intent::ToggleStep { channel, step: ts.step }],
        KeyCode::Char('n') => vec![Intent::AddOrRemoveNote { channel, pitch: ts.note_pitch, step: ts.step }],
        KeyCode::Char('x') => vec![Intent::ClearChannel(channel)],
        KeyCode::Char('k') => vec![Intent::AuditionSelected { pitch: ts.note_pitch }],
        KeyCode::Char('v') => vec![Intent::SetChannelVolume { channel, volume: row.volume - VOLUME_STEP }],
        KeyCode::Char('V') => vec![Intent::SetChannelVolume { channel, volume: row.volume + VOLUME_STEP }],
        KeyCode::Char('p') => vec![Intent::SetChannelPan { channel, pan: row.pan - PAN_STEP }],
        KeyCode::Char('P') => vec![Intent::SetChannelPan { channel, pan: row.pan + PAN_STEP }],
        KeyCode::Char('o') => vec![Intent::SetChannelPitch { channel, semitones: row.pitch_offset - 1 }],
        KeyCode::Char('O') => vec![Intent::SetChannelPitch { channel, semitones: row.pitch_offset + 1 }],
        KeyCode::Char('t') => {
            // cycle through the non-master tracks
            let tracks = ds.tracks.len().saturating_sub(1).max(1);
            vec![Intent::SetChannelTarget { channel, track: row.target_track % tracks + 1 }]
        }
        KeyCode::Char('w') => row
            .waveform
            .map(|w| vec![Intent::SetSynthWaveform { channel, waveform: w.next() }])
            .unwrap_or_default(),

        // the mixer track this channel feeds
        KeyCode::Char('m') | KeyCode::Char('M') | KeyCode::Char('b') | KeyCode::Char('B') | KeyCode::Char('r') | KeyCode::Char('f') => {
            let track = row.target_track;
            let Some(t) = ds.tracks.get(track) else {
                return vec![];
            };
            match code {
                KeyCode::Char('m') => vec![Intent::SetTrackVolume { track, volume: t.volume - VOLUME_STEP }],
                KeyCode::Char('M') => vec![Intent::SetTrackVolume { track, volume: t.volume + VOLUME_STEP }],
                KeyCode::Char('b') => vec![Intent::SetTrackPan { track, pan: t.pan - PAN_STEP }],
                KeyCode::Char('B') => vec![Intent::SetTrackPan { track, pan: t.pan + PAN_STEP }],
                KeyCode::Char('f') => vec![Intent::SetTrackEffects { track, effects: next_rack(&t.effects) }],
                _ => {
                    // next destination, master included, skipping itself
                    let n = ds.tracks.len();
                    let mut target = (t.target.unwrap_or(0) + 1) % n;
                    if target == track {
                        target = (target + 1) % n;
                    }
                    vec![Intent::SetTrackTarget { track, target }]
                }
            }
        }
        _ => vec![],
    }
}

// moving onto a row selects that channel
fn select_row(ts: &TuiState, ds: &DisplayState) -> Vec<Intent> {
    ds.channels
        .get(ts.row)
        .map(|row| vec![Intent::SelectChannel(row.id)])
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{ManualClock, Waveform};
    use crate::config::EngineConfig;
    use crate::middle::Middle;
    use crate::pipeline::Session;

    fn display() -> DisplayState {
        let session = Session::with_defaults(EngineConfig::default()).unwrap();
        Middle::new(session, std::env::temp_dir()).unwrap().display_state(0.0)
    }

    #[test]
    fn enter_toggles_the_cell_under_the_cursor() {
        let ds = display();
        let mut ts = TuiState::default();
        handle_key(KeyCode::Right, &mut ts, &ds);
        handle_key(KeyCode::Right, &mut ts, &ds);
        let intents = handle_key(KeyCode::Down, &mut ts, &ds);
        assert_eq!(intents, vec![Intent::SelectChannel(ds.channels[1].id)]);
        assert_eq!(
            handle_key(KeyCode::Enter, &mut ts, &ds),
            vec![Intent::ToggleStep { channel: ds.channels[1].id, step: 2 }]
        );
    }

    #[test]
    fn cursor_wraps_around_the_grid() {
        let ds = display();
        let mut ts = TuiState::default();
        handle_key(KeyCode::Left, &mut ts, &ds);
        handle_key(KeyCode::Up, &mut ts, &ds);
        assert_eq!(ts.step, ds.step_count - 1);
        assert_eq!(ts.row, ds.channels.len() - 1);
    }

    #[test]
    fn keys_map_to_relative_changes() {
        let ds = display();
        let mut ts = TuiState::default();
        assert_eq!(handle_key(KeyCode::Char('='), &mut ts, &ds), vec![Intent::SetTempo(121.0)]);
        assert_eq!(handle_key(KeyCode::Char('['), &mut ts, &ds), vec![Intent::SetStepCount(15)]);
        handle_key(KeyCode::Char('.'), &mut ts, &ds);
        assert_eq!(
            handle_key(KeyCode::Char('n'), &mut ts, &ds),
            vec![Intent::AddOrRemoveNote { channel: ds.channels[0].id, pitch: 61, step: 0 }]
        );
    }

    #[test]
    fn mixer_keys_act_on_the_channels_track() {
        let ds = display();
        let mut ts = TuiState::default();
        let track = ds.channels[0].target_track;
        assert_eq!(
            handle_key(KeyCode::Char('M'), &mut ts, &ds),
            vec![Intent::SetTrackVolume { track, volume: ds.tracks[track].volume + VOLUME_STEP }]
        );
        // track 1 feeds master; the next destination up is track 2
        assert_eq!(
            handle_key(KeyCode::Char('r'), &mut ts, &ds),
            vec![Intent::SetTrackTarget { track: 1, target: 2 }]
        );
    }

    #[test]
    fn waveform_and_rack_keys() {
        let ds = display();
        let mut ts = TuiState::default();
        // row 0 is the kick sampler
        assert!(handle_key(KeyCode::Char('w'), &mut ts, &ds).is_empty());
        let track = ds.channels[0].target_track;
        assert_eq!(
            handle_key(KeyCode::Char('f'), &mut ts, &ds),
            vec![Intent::SetTrackEffects { track, effects: next_rack(&[]) }]
        );
        for _ in 0..3 {
            handle_key(KeyCode::Down, &mut ts, &ds);
        }
        assert_eq!(
            handle_key(KeyCode::Char('w'), &mut ts, &ds),
            vec![Intent::SetSynthWaveform { channel: ds.channels[3].id, waveform: Waveform::Square }]
        );
    }

    #[test]
    fn target_cycles_past_the_last_track() {
        let ds = display();
        let mut ts = TuiState::default();
        let mut middle = Middle::new(Session::with_defaults(EngineConfig::default()).unwrap(), std::env::temp_dir()).unwrap();
        let clock = ManualClock::new(0.0);
        // channel 0 sits on track 1; eight presses walk all the way round
        for _ in 0..8 {
            let ds = middle.display_state(0.0);
            for intent in handle_key(KeyCode::Char('t'), &mut ts, &ds) {
                middle.handle_intent(intent, &clock);
            }
        }
        assert_eq!(middle.display_state(0.0).channels[0].target_track, ds.channels[0].target_track);
        assert!(middle.last_error().is_none());
    }
}
