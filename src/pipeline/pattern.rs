// Step flags and piano-roll notes for one loop, keyed by channel.
use std::collections::BTreeMap;

use super::channel::{ChannelId, MAX_PITCH};
use crate::error::{EngineError, EngineResult};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Note {
    pub step: usize,   // grid step the note starts on
    pub offset: f32,   // fraction of a step past `step`, 0..1
    pub duration: f32, // quarter-note-relative steps, played as duration * 4 steps
    pub pitch: u8,
    pub velocity: f32,
}

impl Note {
    // What toggling an empty cell inserts: one step long, full velocity
    pub fn at(step: usize, pitch: u8) -> Self {
        Self {
            step,
            offset: 0.0,
            duration: 1.0,
            pitch,
            velocity: 1.0,
        }
    }

    // notes are identified by where they start and what they play
    pub fn same_slot(&self, pitch: u8, step: usize) -> bool {
        self.pitch == pitch && self.step == step
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Track {
    pub steps: Vec<bool>,
    pub notes: Vec<Note>,
}

impl Track {
    fn new(step_count: usize) -> Self {
        Self {
            steps: vec![false; step_count],
            notes: Vec::new(),
        }
    }

    pub fn notes_at(&self, step: usize) -> impl Iterator<Item = &Note> + '_ {
        self.notes.iter().filter(move |n| n.step == step)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Pattern {
    step_count: usize,
    tracks: BTreeMap<ChannelId, Track>,
}

impl Pattern {
    pub fn new(step_count: usize) -> EngineResult<Self> {
        if step_count == 0 {
            return Err(EngineError::InvalidStepCount(step_count));
        }
        Ok(Self {
            step_count,
            tracks: BTreeMap::new(),
        })
    }

    pub fn step_count(&self) -> usize {
        self.step_count
    }

    pub fn add_channel(&mut self, channel: ChannelId) {
        let step_count = self.step_count;
        self.tracks.entry(channel).or_insert_with(|| Track::new(step_count));
    }

    pub fn remove_channel(&mut self, channel: ChannelId) {
        self.tracks.remove(&channel);
    }

    pub fn track(&self, channel: ChannelId) -> Option<&Track> {
        self.tracks.get(&channel)
    }

    fn track_mut(&mut self, channel: ChannelId) -> EngineResult<&mut Track> {
        self.tracks
            .get_mut(&channel)
            .ok_or(EngineError::UnknownChannel(channel))
    }

    fn check_step(&self, step: usize) -> EngineResult<()> {
        if step >= self.step_count {
            return Err(EngineError::StepOutOfRange {
                step,
                step_count: self.step_count,
            });
        }
        Ok(())
    }

    pub fn is_step_on(&self, channel: ChannelId, step: usize) -> bool {
        self.track(channel)
            .and_then(|t| t.steps.get(step).copied())
            .unwrap_or(false)
    }

    // Returns the new state of the step
    pub fn toggle_step(&mut self, channel: ChannelId, step: usize) -> EngineResult<bool> {
        self.check_step(step)?;
        let track = self.track_mut(channel)?;
        let flag = &mut track.steps[step];
        *flag = !*flag;
        Ok(*flag)
    }

    // Removes the note at (pitch, step) if there is one, otherwise inserts a
    // default one there. Returns true if a note was added.
    pub fn add_or_remove_note(&mut self, channel: ChannelId, pitch: u8, step: usize) -> EngineResult<bool> {
        if pitch > MAX_PITCH {
            return Err(EngineError::InvalidPitch(pitch));
        }
        self.check_step(step)?;
        let track = self.track_mut(channel)?;
        if let Some(idx) = track.notes.iter().position(|n| n.same_slot(pitch, step)) {
            track.notes.remove(idx);
            return Ok(false);
        }
        track.notes.push(Note::at(step, pitch));
        Ok(true)
    }

    // Inserts or replaces the note occupying the same (pitch, step) slot
    pub fn put_note(&mut self, channel: ChannelId, note: Note) -> EngineResult<()> {
        if note.pitch > MAX_PITCH {
            return Err(EngineError::InvalidPitch(note.pitch));
        }
        if !(note.duration.is_finite() && note.duration >= 0.0) {
            return Err(EngineError::NegativeDuration(note.duration as f64));
        }
        self.check_step(note.step)?;
        let note = Note {
            offset: note.offset.clamp(0.0, 0.999),
            velocity: note.velocity.clamp(0.0, 1.0),
            ..note
        };
        let track = self.track_mut(channel)?;
        track.notes.retain(|n| !n.same_slot(note.pitch, note.step));
        track.notes.push(note);
        Ok(())
    }

    pub fn clear_channel(&mut self, channel: ChannelId) -> EngineResult<()> {
        let track = self.track_mut(channel)?;
        track.steps.fill(false);
        track.notes.clear();
        Ok(())
    }

    // Growing pads with empty steps, shrinking cuts the tail. Notes past the
    // end stay put and come back if the pattern grows again.
    pub fn set_step_count(&mut self, step_count: usize) -> EngineResult<()> {
        if step_count == 0 {
            return Err(EngineError::InvalidStepCount(step_count));
        }
        for track in self.tracks.values_mut() {
            track.steps.resize(step_count, false);
        }
        self.step_count = step_count;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KICK: ChannelId = ChannelId(1);

    fn pattern() -> Pattern {
        let mut p = Pattern::new(16).unwrap();
        p.add_channel(KICK);
        p
    }

    #[test]
    fn toggling_twice_restores_the_step() {
        let mut p = pattern();
        let before = p.clone();
        assert!(p.toggle_step(KICK, 4).unwrap());
        assert!(p.is_step_on(KICK, 4));
        assert!(!p.toggle_step(KICK, 4).unwrap());
        assert_eq!(p, before);
    }

    #[test]
    fn note_toggle_is_its_own_inverse() {
        let mut p = pattern();
        p.add_or_remove_note(KICK, 64, 2).unwrap();
        let before = p.clone();
        assert!(p.add_or_remove_note(KICK, 60, 2).unwrap());
        assert_eq!(p.track(KICK).unwrap().notes.len(), 2);
        assert!(!p.add_or_remove_note(KICK, 60, 2).unwrap());
        assert_eq!(p, before);
    }

    #[test]
    fn new_notes_are_one_step_full_velocity() {
        let mut p = pattern();
        p.add_or_remove_note(KICK, 72, 3).unwrap();
        assert_eq!(p.track(KICK).unwrap().notes[0], Note::at(3, 72));
        assert_eq!(p.track(KICK).unwrap().notes_at(3).count(), 1);
    }

    #[test]
    fn steps_track_the_step_count() {
        let mut p = pattern();
        p.toggle_step(KICK, 15).unwrap();
        p.toggle_step(KICK, 1).unwrap();
        p.set_step_count(8).unwrap();
        assert_eq!(p.track(KICK).unwrap().steps.len(), 8);
        p.set_step_count(32).unwrap();
        let steps = &p.track(KICK).unwrap().steps;
        assert_eq!(steps.len(), 32);
        assert!(steps[1]);
        assert!(!steps[15]); // truncated, not remembered
    }

    #[test]
    fn new_channels_get_the_current_length() {
        let mut p = pattern();
        p.set_step_count(12).unwrap();
        p.add_channel(ChannelId(9));
        assert_eq!(p.track(ChannelId(9)).unwrap().steps.len(), 12);
    }

    #[test]
    fn invalid_edits_are_rejected() {
        let mut p = pattern();
        assert!(Pattern::new(0).is_err());
        assert!(p.toggle_step(KICK, 16).is_err());
        assert_eq!(
            p.toggle_step(ChannelId(99), 0),
            Err(EngineError::UnknownChannel(ChannelId(99)))
        );
        assert_eq!(p.add_or_remove_note(KICK, 128, 0), Err(EngineError::InvalidPitch(128)));
        assert_eq!(p.set_step_count(0), Err(EngineError::InvalidStepCount(0)));
    }

    #[test]
    fn put_note_replaces_the_same_slot() {
        let mut p = pattern();
        p.put_note(KICK, Note { velocity: 0.5, ..Note::at(0, 60) }).unwrap();
        p.put_note(KICK, Note { duration: 2.0, ..Note::at(0, 60) }).unwrap();
        let notes = &p.track(KICK).unwrap().notes;
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].duration, 2.0);
    }
}
