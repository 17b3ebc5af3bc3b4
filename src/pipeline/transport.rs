// Lookahead scheduler.
//
// A coarse driver calls `tick` every `lookahead` (25 ms by default). Each tick
// schedules every step whose time falls before `now + schedule_ahead`, with
// timestamps accumulated from exact step durations on the audio clock. When the
// driver callback happens to run doesn't matter, only that the window is wider
// than the gap between ticks.
use std::collections::VecDeque;
use std::time::Duration;

use super::session::Session;
use crate::audio::{AudioClock, Engine, Voice};
use crate::audio_api::AudioCommand;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};

pub const STEPS_PER_BEAT: usize = 4; // steps are sixteenth notes
const HISTORY: usize = 64;

// one sixteenth note, in seconds
pub fn step_duration(tempo: f64) -> f64 {
    0.25 * (60.0 / tempo)
}

// Wherever scheduled voices go: the audio thread, an offline engine, a test.
pub trait VoiceSink {
    fn dispatch(&mut self, voice: Voice);
}

impl VoiceSink for Vec<Voice> {
    fn dispatch(&mut self, voice: Voice) {
        self.push(voice);
    }
}

impl VoiceSink for Vec<AudioCommand> {
    fn dispatch(&mut self, voice: Voice) {
        self.push(AudioCommand::StartVoice(voice));
    }
}

impl VoiceSink for Engine {
    fn dispatch(&mut self, voice: Voice) {
        self.handle_cmd(AudioCommand::StartVoice(voice));
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportState {
    Stopped,
    Playing,
}

// bar.beat.sixteenth, all 1-based
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Position {
    pub bar: u64,
    pub beat: usize,
    pub sixteenth: usize,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickReport {
    pub steps: Vec<(usize, f64)>, // (step, time) for every step emitted
    pub voices: usize,
    pub errors: Vec<EngineError>,
}

impl TickReport {
    fn merge(&mut self, other: TickReport) {
        self.steps.extend(other.steps);
        self.voices += other.voices;
        self.errors.extend(other.errors);
    }
}

#[derive(Clone, Debug)]
pub struct Transport {
    state: TransportState,
    current_step: usize,
    next_event_time: f64,
    lookahead: Duration,
    schedule_ahead: f64,
    last_now: f64,
    loops: u64,
    history: VecDeque<(f64, usize)>,
}

impl Transport {
    pub fn new(lookahead: Duration, schedule_ahead: f64) -> EngineResult<Self> {
        let interval = lookahead.as_secs_f64();
        if !(schedule_ahead.is_finite() && schedule_ahead > interval) {
            return Err(EngineError::InvalidSchedulingWindow {
                ahead: schedule_ahead,
                lookahead: interval,
            });
        }
        Ok(Self {
            state: TransportState::Stopped,
            current_step: 0,
            next_event_time: 0.0,
            lookahead,
            schedule_ahead,
            last_now: 0.0,
            loops: 0,
            history: VecDeque::with_capacity(HISTORY),
        })
    }

    pub fn from_config(config: &EngineConfig) -> EngineResult<Self> {
        Self::new(config.lookahead(), config.schedule_ahead_secs)
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == TransportState::Playing
    }

    pub fn lookahead(&self) -> Duration {
        self.lookahead
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn next_event_time(&self) -> f64 {
        self.next_event_time
    }

    // Resumes a suspended clock, then restarts from step 0 at the clock's "now"
    pub fn start(&mut self, clock: &dyn AudioClock) -> EngineResult<()> {
        if !clock.is_running() {
            clock.resume()?;
        }
        let now = clock.now();
        self.current_step = 0;
        self.next_event_time = now;
        self.last_now = now;
        self.loops = 0;
        self.history.clear();
        self.state = TransportState::Playing;
        log::debug!("transport started at {now:.3}s");
        Ok(())
    }

    // Only stops future scheduling; voices already handed out play to the end.
    pub fn stop(&mut self) {
        self.state = TransportState::Stopped;
        log::debug!("transport stopped at step {}", self.current_step);
    }

    pub fn tick(
        &mut self,
        session: &Session,
        clock: &dyn AudioClock,
        sink: &mut dyn VoiceSink,
    ) -> EngineResult<TickReport> {
        if !self.is_playing() {
            return Ok(TickReport::default());
        }
        let now = clock.now();
        if now < self.last_now {
            return Err(EngineError::ClockWentBackwards {
                previous: self.last_now,
                now,
            });
        }
        self.last_now = now;
        Ok(self.schedule_until(now + self.schedule_ahead, session, sink))
    }

    // The core loop: emit every step starting before `horizon`.
    pub fn schedule_until(
        &mut self,
        horizon: f64,
        session: &Session,
        sink: &mut dyn VoiceSink,
    ) -> TickReport {
        let mut report = TickReport::default();
        while self.next_event_time < horizon {
            let step_count = session.step_count();
            self.current_step %= step_count;
            let time = self.next_event_time;
            report.merge(self.emit(self.current_step, time, session, sink));

            self.next_event_time += step_duration(session.tempo());
            self.current_step += 1;
            if self.current_step >= step_count {
                self.current_step = 0;
                self.loops += 1;
            }
        }
        report
    }

    fn emit(&mut self, step: usize, time: f64, session: &Session, sink: &mut dyn VoiceSink) -> TickReport {
        let mut report = TickReport::default();
        report.steps.push((step, time));
        if self.history.len() == HISTORY {
            self.history.pop_front();
        }
        self.history.push_back((time, step));

        let step_len = step_duration(session.tempo());
        let pattern = session.pattern();
        for channel in session.channels() {
            let Some(track) = pattern.track(channel.id) else {
                continue;
            };

            if track.steps.get(step).copied().unwrap_or(false) {
                match channel.play_note(time, session.drum_hit_duration(), 60, 1.0) {
                    Ok(voice) => {
                        sink.dispatch(voice);
                        report.voices += 1;
                    }
                    Err(e) => report.errors.push(e),
                }
            }

            for note in track.notes_at(step) {
                let at = time + note.offset as f64 * step_len;
                let duration = note.duration as f64 * step_len * STEPS_PER_BEAT as f64;
                match channel.play_note(at, duration, note.pitch, note.velocity) {
                    Ok(voice) => {
                        sink.dispatch(voice);
                        report.voices += 1;
                    }
                    Err(e) => report.errors.push(e),
                }
            }
        }
        report
    }

    pub fn position(&self) -> Position {
        Position {
            bar: self.loops + 1,
            beat: self.current_step / STEPS_PER_BEAT + 1,
            sixteenth: self.current_step % STEPS_PER_BEAT + 1,
        }
    }

    // Step that is actually sounding at `now`, as opposed to the one being scheduled
    pub fn playhead(&self, now: f64) -> Option<usize> {
        if !self.is_playing() {
            return None;
        }
        self.history
            .iter()
            .rev()
            .find(|(time, _)| *time <= now)
            .map(|&(_, step)| step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{ManualClock, SampleBuffer, VoiceSource};
    use crate::pipeline::channel::ChannelId;
    use crate::pipeline::pattern::Note;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn transport() -> Transport {
        Transport::new(Duration::from_millis(25), 0.1).unwrap()
    }

    // one sampler channel with steps 0/4/8/12 on
    fn four_on_the_floor(tempo: f64) -> (Session, ChannelId) {
        let config = EngineConfig { tempo, ..EngineConfig::default() };
        let mut session = Session::empty(config).unwrap();
        let id = session
            .add_channel_with(|id, target| {
                crate::pipeline::Channel::sampler(id, "Kick", Some(SampleBuffer::new(vec![0.1; 100], 44100)), target)
            })
            .unwrap();
        for step in [0, 4, 8, 12] {
            session.toggle_step(id, step).unwrap();
        }
        (session, id)
    }

    #[test]
    fn window_must_exceed_tick_interval() {
        assert!(Transport::new(Duration::from_millis(100), 0.05).is_err());
    }

    #[test]
    fn stopped_transport_schedules_nothing() {
        let (session, _) = four_on_the_floor(120.0);
        let clock = ManualClock::new(0.0);
        let mut sink: Vec<Voice> = Vec::new();
        let report = transport().tick(&session, &clock, &mut sink).unwrap();
        assert!(report.steps.is_empty());
        assert!(sink.is_empty());
    }

    #[test]
    fn start_resumes_a_suspended_clock() {
        let clock = ManualClock::suspended(3.0);
        let mut t = transport();
        t.start(&clock).unwrap();
        assert!(clock.is_running());
        assert_eq!(t.next_event_time(), 3.0);
        assert_eq!(t.current_step(), 0);
    }

    #[test]
    fn four_hits_per_loop_a_beat_apart() {
        let (session, _) = four_on_the_floor(130.0);
        let clock = ManualClock::new(0.0);
        let mut t = transport();
        t.start(&clock).unwrap();
        let mut sink: Vec<Voice> = Vec::new();
        let loop_len = 16.0 * step_duration(130.0);
        // just short of the last step of a loop so the next downbeat isn't included
        let horizon = loop_len - 0.5 * step_duration(130.0);
        t.schedule_until(horizon, &session, &mut sink);
        assert_eq!(sink.len(), 4);
        for pair in sink.windows(2) {
            let gap = pair[1].start - pair[0].start;
            assert!((gap - 60.0 / 130.0).abs() < 1e-9, "gap {gap}");
        }
        assert!((step_duration(130.0) - 0.11538).abs() < 1e-4);
    }

    #[test]
    fn jittery_ticks_never_skip_or_repeat_a_step() {
        let (session, _) = four_on_the_floor(137.0);
        let clock = ManualClock::new(0.5);
        let mut t = transport();
        t.start(&clock).unwrap();
        let mut rng = StdRng::seed_from_u64(99);
        let mut steps = Vec::new();
        let mut sink: Vec<Voice> = Vec::new();
        for _ in 0..2000 {
            // ticks land anywhere from 5 to 70 ms apart
            clock.advance(rng.gen_range(0.005..0.07));
            let report = t.tick(&session, &clock, &mut sink).unwrap();
            steps.extend(report.steps);
        }
        let dur = step_duration(137.0);
        assert!(steps.len() > 16 * 10);
        for (i, &(step, time)) in steps.iter().enumerate() {
            assert_eq!(step, i % 16);
            assert!((time - (0.5 + i as f64 * dur)).abs() < 1e-6);
        }
        for pair in steps.windows(2) {
            assert!(pair[1].1 > pair[0].1);
        }
        assert_eq!(sink.len(), steps.len() / 4 + usize::from(steps.len() % 4 != 0));
    }

    #[test]
    fn never_schedules_past_the_window() {
        let (session, _) = four_on_the_floor(120.0);
        let clock = ManualClock::new(0.0);
        let mut t = transport();
        t.start(&clock).unwrap();
        let mut sink: Vec<Voice> = Vec::new();
        let report = t.tick(&session, &clock, &mut sink).unwrap();
        // 120 bpm -> 0.125 s per step, window 0.1 s: only step 0
        assert_eq!(report.steps, vec![(0, 0.0)]);
        assert!(t.next_event_time() >= clock.now() + 0.1);
    }

    #[test]
    fn clock_going_backwards_is_a_timing_error() {
        let (session, _) = four_on_the_floor(120.0);
        let clock = ManualClock::new(1.0);
        let mut t = transport();
        t.start(&clock).unwrap();
        clock.set(0.5);
        let mut sink: Vec<Voice> = Vec::new();
        assert!(matches!(
            t.tick(&session, &clock, &mut sink),
            Err(EngineError::ClockWentBackwards { .. })
        ));
    }

    #[test]
    fn stop_leaves_issued_voices_alone() {
        let (session, _) = four_on_the_floor(120.0);
        let clock = ManualClock::new(0.0);
        let mut t = transport();
        t.start(&clock).unwrap();
        let mut sink: Vec<Voice> = Vec::new();
        t.tick(&session, &clock, &mut sink).unwrap();
        t.stop();
        clock.advance(1.0);
        t.tick(&session, &clock, &mut sink).unwrap();
        assert_eq!(sink.len(), 1);
        assert_eq!(t.playhead(clock.now()), None);
    }

    #[test]
    fn notes_use_offset_and_beat_relative_duration() {
        let config = EngineConfig::default();
        let mut session = Session::empty(config).unwrap();
        let id = session.add_channel_with(|id, target| crate::pipeline::Channel::synth(id, "Lead", target)).unwrap();
        session
            .put_note(id, Note { offset: 0.5, duration: 2.0, ..Note::at(1, 69) })
            .unwrap();
        session.put_note(id, Note::at(1, 72)).unwrap();

        let clock = ManualClock::new(0.0);
        let mut t = transport();
        t.start(&clock).unwrap();
        let mut sink: Vec<Voice> = Vec::new();
        t.schedule_until(0.2, &session, &mut sink);
        assert_eq!(sink.len(), 2);
        let dur = step_duration(120.0);
        let offset_note = sink.iter().find(|v| v.start > dur).unwrap();
        assert!((offset_note.start - 1.5 * dur).abs() < 1e-9);
        // two steps * step * 4, plus release and tail
        let hold = 2.0 * dur * 4.0;
        assert!((offset_note.duration() - (hold + 0.3)).abs() < 1e-9);
        let plain = sink.iter().find(|v| (v.start - dur).abs() < 1e-12).unwrap();
        assert!(matches!(plain.source, VoiceSource::Synth { .. }));
    }

    #[test]
    fn everything_on_one_step_shares_a_timestamp() {
        let mut session = Session::empty(EngineConfig::default()).unwrap();
        let hit = session
            .add_channel_with(|id, target| {
                crate::pipeline::Channel::sampler(id, "Hit", Some(SampleBuffer::new(vec![0.5; 100], 44100)), target)
            })
            .unwrap();
        let lead = session.add_channel_with(|id, target| crate::pipeline::Channel::synth(id, "Lead", target)).unwrap();
        session.toggle_step(hit, 2).unwrap();
        session.add_or_remove_note(lead, 60, 2).unwrap();
        session.add_or_remove_note(lead, 67, 2).unwrap();

        let clock = ManualClock::new(0.0);
        let mut t = transport();
        t.start(&clock).unwrap();
        let mut sink: Vec<Voice> = Vec::new();
        t.schedule_until(0.3, &session, &mut sink);
        assert_eq!(sink.len(), 3);
        let first = sink[0].start;
        assert!((first - 2.0 * step_duration(120.0)).abs() < 1e-12);
        assert!(sink.iter().all(|v| v.start == first));
        assert_eq!(sink.iter().filter(|v| matches!(v.source, VoiceSource::Synth { .. })).count(), 2);
    }

    #[test]
    fn missing_samples_are_reported_not_skipped_silently() {
        let mut session = Session::empty(EngineConfig::default()).unwrap();
        let id = session
            .add_channel_with(|id, target| crate::pipeline::Channel::sampler(id, "Empty", None, target))
            .unwrap();
        session.toggle_step(id, 0).unwrap();
        let clock = ManualClock::new(0.0);
        let mut t = transport();
        t.start(&clock).unwrap();
        let mut sink: Vec<Voice> = Vec::new();
        let report = t.tick(&session, &clock, &mut sink).unwrap();
        assert!(sink.is_empty());
        assert_eq!(report.errors, vec![EngineError::MissingSample { channel: id }]);
    }

    #[test]
    fn position_and_playhead_follow_the_cursor() {
        let (session, _) = four_on_the_floor(120.0);
        let clock = ManualClock::new(0.0);
        let mut t = transport();
        t.start(&clock).unwrap();
        let mut sink: Vec<Voice> = Vec::new();
        // schedule 1.25 loops
        t.schedule_until(20.0 * step_duration(120.0) - 0.01, &session, &mut sink);
        assert_eq!(t.current_step(), 4);
        assert_eq!(t.position(), Position { bar: 2, beat: 2, sixteenth: 1 });
        assert_eq!(t.playhead(0.3), Some(2));
    }

    #[test]
    fn shrinking_the_pattern_mid_loop_wraps_the_cursor() {
        let (mut session, _) = four_on_the_floor(120.0);
        let clock = ManualClock::new(0.0);
        let mut t = transport();
        t.start(&clock).unwrap();
        let mut sink: Vec<Voice> = Vec::new();
        t.schedule_until(10.0 * step_duration(120.0) - 0.01, &session, &mut sink);
        assert_eq!(t.current_step(), 10);
        session.set_step_count(8).unwrap();
        let report = t.schedule_until(11.0 * step_duration(120.0) - 0.01, &session, &mut sink);
        assert_eq!(report.steps[0].0, 2);
    }
}
