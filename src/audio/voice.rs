use std::sync::Arc;

use super::envelope::Envelope;
use super::frame::StereoFrame;
use super::sample_buffer::SampleBuffer;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Waveform {
    #[default]
    Sawtooth,
    Square,
    Triangle,
    Sine,
}

impl Waveform {
    // phase in [0, 1)
    #[inline]
    pub fn sample(self, phase: f64) -> f32 {
        let p = phase - phase.floor();
        let s = match self {
            Waveform::Sawtooth => 2.0 * p - 1.0,
            Waveform::Square => {
                if p < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Triangle => 1.0 - 4.0 * (p - 0.5).abs(),
            Waveform::Sine => (std::f64::consts::TAU * p).sin(),
        };
        s as f32
    }

    pub fn next(self) -> Self {
        match self {
            Waveform::Sawtooth => Waveform::Square,
            Waveform::Square => Waveform::Triangle,
            Waveform::Triangle => Waveform::Sine,
            Waveform::Sine => Waveform::Sawtooth,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Waveform::Sawtooth => "saw",
            Waveform::Square => "square",
            Waveform::Triangle => "tri",
            Waveform::Sine => "sine",
        }
    }
}

#[derive(Clone, Debug)]
pub enum VoiceSource {
    Synth {
        waveform: Waveform,
        frequency: f64,
        envelope: Envelope,
    },
    Sample {
        buffer: Arc<SampleBuffer>,
        rate: f64, // playback speed, 2.0 = octave up
        gain: f32,
    },
}

// One note-on worth of sound. Built by a channel, handed to the engine, dropped
// by the engine once `stop` has passed. Holds nothing that points back at the
// session.
#[derive(Clone, Debug)]
pub struct Voice {
    pub track: usize,
    pub start: f64, // audio-clock seconds
    pub stop: f64,  // hard stop, audio-clock seconds
    pub pan: f32,
    pub source: VoiceSource,
}

impl Voice {
    pub fn duration(&self) -> f64 {
        self.stop - self.start
    }

    // Moves the voice so it starts at `now`, keeping its length. Used when a
    // command shows up after its start time already went by.
    pub fn rebase(&mut self, now: f64) {
        let length = self.duration();
        self.start = now;
        self.stop = now + length;
    }

    // Value of the voice `t` seconds after its start
    #[inline]
    pub fn sample_at(&self, t: f64) -> f32 {
        match &self.source {
            VoiceSource::Synth {
                waveform,
                frequency,
                envelope,
            } => waveform.sample(frequency * t) * envelope.level(t),
            // the buffer's own rate, so stop times from `duration()` line up
            VoiceSource::Sample { buffer, rate, gain } => {
                buffer.read(t * buffer.sample_rate as f64 * rate) * gain
            }
        }
    }

    // Mix the voice into `out`, whose first frame sits at absolute frame
    // `block_start`. Returns false once the voice is done for good.
    pub fn render_into(&self, out: &mut [StereoFrame], block_start: u64, sample_rate: f64) -> bool {
        let start_frame = (self.start * sample_rate).round() as i64;
        let stop_frame = (self.stop * sample_rate).round() as i64;
        let block_start = block_start as i64;
        let (l_gain, r_gain) = super::frame::equal_power_gains(self.pan);

        for (i, frame) in out.iter_mut().enumerate() {
            let abs = block_start + i as i64;
            if abs < start_frame {
                continue;
            }
            if abs >= stop_frame {
                return false;
            }
            let t = (abs - start_frame) as f64 / sample_rate;
            let s = self.sample_at(t);
            frame.left += s * l_gain;
            frame.right += s * r_gain;
        }
        block_start + (out.len() as i64) < stop_frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::envelope::EnvelopeShape;

    fn sample_voice(start: f64, len: usize) -> Voice {
        let buffer = Arc::new(SampleBuffer::new(vec![1.0; len], 100));
        Voice {
            track: 1,
            start,
            stop: start + len as f64 / 100.0,
            pan: 0.0,
            source: VoiceSource::Sample { buffer, rate: 1.0, gain: 1.0 },
        }
    }

    #[test]
    fn waveforms_stay_in_range() {
        for w in [Waveform::Sawtooth, Waveform::Square, Waveform::Triangle, Waveform::Sine] {
            for i in 0..64 {
                let s = w.sample(i as f64 / 64.0);
                assert!((-1.0..=1.0).contains(&s), "{:?} out of range", w);
            }
        }
        assert_eq!(Waveform::Sawtooth.sample(0.0), -1.0);
        assert_eq!(Waveform::Sawtooth.sample(0.5), 0.0);
    }

    #[test]
    fn voice_waits_for_its_start_frame() {
        let v = sample_voice(0.05, 10); // frame 5 at 100 Hz
        let mut out = [StereoFrame::zero(); 8];
        assert!(v.render_into(&mut out, 0, 100.0));
        assert_eq!(out[4], StereoFrame::zero());
        assert!(out[5].left > 0.0);
    }

    #[test]
    fn voice_reports_done_after_stop() {
        let v = sample_voice(0.0, 4);
        let mut out = [StereoFrame::zero(); 8];
        assert!(!v.render_into(&mut out, 0, 100.0));
        assert!(out[3].left > 0.0);
        assert_eq!(out[4], StereoFrame::zero());
    }

    #[test]
    fn synth_voice_is_silent_at_note_on() {
        let envelope = Envelope::new(EnvelopeShape::default(), 1.0, 0.1);
        let v = Voice {
            track: 1,
            start: 0.0,
            stop: 0.4,
            pan: 0.0,
            source: VoiceSource::Synth { waveform: Waveform::Sawtooth, frequency: 440.0, envelope },
        };
        assert_eq!(v.sample_at(0.0), 0.0);
        assert!(v.sample_at(0.02).abs() > 0.0);
    }

    #[test]
    fn sample_plays_at_its_own_rate() {
        // 1 s of DC at 22050 Hz, rendered by a 44100 Hz engine
        let buffer = Arc::new(SampleBuffer::new(vec![1.0; 22050], 22050));
        let v = Voice {
            track: 1,
            start: 0.0,
            stop: buffer.duration(),
            pan: 0.0,
            source: VoiceSource::Sample { buffer, rate: 1.0, gain: 1.0 },
        };
        assert_eq!(v.stop, 1.0);
        assert_eq!(v.sample_at(0.6), 1.0);
        assert_eq!(v.sample_at(1.1), 0.0);

        let mut out = vec![StereoFrame::zero(); 44100];
        v.render_into(&mut out, 0, 44100.0);
        assert!(out[44099].left > 0.0);
    }

    #[test]
    fn rebase_keeps_length() {
        let mut v = sample_voice(1.0, 50);
        v.rebase(2.0);
        assert_eq!(v.start, 2.0);
        assert!((v.duration() - 0.5).abs() < 1e-12);
    }
}
