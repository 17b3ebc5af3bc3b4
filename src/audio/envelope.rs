// Four-stage amplitude envelope for synth voices, evaluated as a pure function
// of time since note-on so a voice can be rendered from any frame.
//
//   attack:  linear 0 -> peak
//   decay:   exponential peak -> peak * sustain
//   hold:    peak * sustain until the note ends
//   release: exponential toward `floor` (exponential ramps can't reach zero)
//   tail:    the voice keeps running this long after release, then hard stops

pub const ATTACK: f64 = 0.01;
pub const DECAY: f64 = 0.1;
pub const SUSTAIN: f32 = 0.5;
pub const RELEASE: f64 = 0.2;
pub const FLOOR: f32 = 0.001;
pub const TAIL: f64 = 0.1;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EnvelopeShape {
    pub attack: f64,
    pub decay: f64,
    pub sustain: f32, // fraction of peak
    pub release: f64,
    pub floor: f32,
    pub tail: f64,
}

impl Default for EnvelopeShape {
    fn default() -> Self {
        Self {
            attack: ATTACK,
            decay: DECAY,
            sustain: SUSTAIN,
            release: RELEASE,
            floor: FLOOR,
            tail: TAIL,
        }
    }
}

impl EnvelopeShape {
    // How long a note of `hold` seconds keeps its voice alive
    pub fn voice_length(&self, hold: f64) -> f64 {
        hold + self.release + self.tail
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Envelope {
    shape: EnvelopeShape,
    peak: f32,
    hold: f64, // seconds from note-on to release start
}

impl Envelope {
    pub fn new(shape: EnvelopeShape, peak: f32, hold: f64) -> Self {
        Self {
            shape,
            peak: peak.max(0.0),
            hold: hold.max(0.0),
        }
    }

    pub fn peak(&self) -> f32 {
        self.peak
    }

    // Level before release kicks in
    fn held_level(&self, t: f64) -> f32 {
        let s = &self.shape;
        if t <= 0.0 {
            return 0.0;
        }
        if t < s.attack {
            return self.peak * (t / s.attack) as f32;
        }
        let target = (self.peak * s.sustain).max(s.floor);
        if self.peak <= 0.0 {
            return 0.0;
        }
        let into_decay = t - s.attack;
        if into_decay < s.decay {
            return exp_ramp(self.peak, target, (into_decay / s.decay) as f32);
        }
        target
    }

    pub fn level(&self, t: f64) -> f32 {
        if t < self.hold {
            return self.held_level(t);
        }
        // release starts from wherever the note got to, even mid-attack
        let start = self.held_level(self.hold);
        let floor = self.shape.floor;
        if start <= floor {
            return start;
        }
        let into_release = t - self.hold;
        if into_release < self.shape.release {
            return exp_ramp(start, floor, (into_release / self.shape.release) as f32);
        }
        floor
    }
}

#[inline]
fn exp_ramp(from: f32, to: f32, x: f32) -> f32 {
    from * (to / from).powf(x.clamp(0.0, 1.0))
}
