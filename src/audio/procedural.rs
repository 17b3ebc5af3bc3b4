// Built-in drum sounds, generated from formulas instead of shipped as files.
// Noise comes from the caller's RNG so a seeded session renders identically.
use std::f64::consts::TAU;

use rand::Rng;

use super::sample_buffer::SampleBuffer;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Preset {
    Kick,
    Snare,
    Hat,
}

impl Preset {
    pub const ALL: [Preset; 3] = [Preset::Kick, Preset::Snare, Preset::Hat];

    pub fn name(self) -> &'static str {
        match self {
            Preset::Kick => "Kick",
            Preset::Snare => "Snare",
            Preset::Hat => "Hat",
        }
    }

    pub fn length_secs(self) -> f64 {
        match self {
            Preset::Kick | Preset::Snare => 0.5,
            Preset::Hat => 0.1,
        }
    }

    pub fn generate<R: Rng>(self, sample_rate: u32, rng: &mut R) -> SampleBuffer {
        let frames = (self.length_secs() * sample_rate as f64).round() as usize;
        let sr = sample_rate as f64;
        let data = (0..frames)
            .map(|i| {
                let t = i as f64 / sr;
                match self {
                    Preset::Kick => kick(t),
                    Preset::Snare => snare(t, rng.gen_range(-1.0..=1.0)),
                    Preset::Hat => hat(t, rng.gen_range(-1.0..=1.0)),
                }
            })
            .collect();
        SampleBuffer::new(data, sample_rate)
    }
}

// falling pitch sweep under a slower amplitude decay
fn kick(t: f64) -> f32 {
    let freq = 150.0 * (-15.0 * t).exp();
    let envelope = (-5.0 * t).exp();
    ((TAU * freq * t).sin() * envelope) as f32
}

fn snare(t: f64, noise: f64) -> f32 {
    let tone = (TAU * 200.0 * t).sin();
    ((0.8 * noise + 0.2 * tone) * (-10.0 * t).exp()) as f32
}

fn hat(t: f64, noise: f64) -> f32 {
    (noise * (-40.0 * t).exp()) as f32
}
