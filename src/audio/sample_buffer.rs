// Mono PCM owned by a channel. Imports are resampled to the engine rate on
// the way in so voices never have to care about the source rate.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleBuffer {
    pub data: Vec<f32>,
    pub sample_rate: u32,
}

impl SampleBuffer {
    pub fn new(data: Vec<f32>, sample_rate: u32) -> Self {
        Self { data, sample_rate }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    // Length in seconds at the buffer's own rate
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.data.len() as f64 / self.sample_rate as f64
    }

    // Interpolated read at a fractional index, silence past the end
    #[inline]
    pub fn read(&self, pos: f64) -> f32 {
        if pos < 0.0 {
            return 0.0;
        }
        let i = pos.floor() as usize;
        let Some(&s0) = self.data.get(i) else {
            return 0.0;
        };
        let s1 = self.data.get(i + 1).copied().unwrap_or(0.0);
        let frac = (pos - i as f64) as f32;
        s0 * (1.0 - frac) + s1 * frac
    }

    pub fn resampled(self, target_rate: u32) -> Self {
        if self.sample_rate == target_rate || self.sample_rate == 0 {
            return self;
        }
        let data = resample_linear(&self.data, self.sample_rate, target_rate);
        Self {
            data,
            sample_rate: target_rate,
        }
    }
}

fn resample_linear(samples: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    // plain linear interpolation; fine for one-shot drum material
    let ratio = target_rate as f64 / source_rate as f64;
    let out_len = (samples.len() as f64 * ratio).ceil() as usize;
    let mut out = Vec::with_capacity(out_len);

    for i in 0..out_len {
        let src_pos = i as f64 / ratio; // ex. 3.7
        let idx = src_pos.floor() as usize; // ex. 3
        let frac = (src_pos - idx as f64) as f32; // ex. 0.7
        if idx >= samples.len().saturating_sub(1) {
            out.push(samples.last().copied().unwrap_or(0.0));
        } else {
            out.push(samples[idx] * (1.0 - frac) + samples[idx + 1] * frac);
        }
    }
    out
}
