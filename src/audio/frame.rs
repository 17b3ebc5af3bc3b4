// The smallest unit of audio on a mixer bus; one stereo frame
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StereoFrame {
    pub left: f32,
    pub right: f32,
}

impl StereoFrame {
    pub fn zero() -> Self {
        Self::default()
    }

    // Balance control for an already-stereo signal: the far side is attenuated,
    // the near side is left alone.
    pub fn balance(self, pan: f32) -> Self {
        let pan = pan.clamp(-1.0, 1.0);
        Self {
            left: self.left * (1.0 - pan).min(1.0),
            right: self.right * (1.0 + pan).min(1.0),
        }
    }

    pub fn mono(self) -> f32 {
        0.5 * (self.left + self.right)
    }
}

// Gains for placing a mono sample in the stereo field,
// pan -1.0 = hard left, 0.0 = centre, 1.0 = hard right.
pub fn equal_power_gains(pan: f32) -> (f32, f32) {
    let x = (pan.clamp(-1.0, 1.0) + 1.0) * 0.5; // 0..1
    let angle = x * std::f32::consts::FRAC_PI_2;
    (angle.cos(), angle.sin())
}
