use super::frame::StereoFrame;

// A mixer track's insert rack, as the control side sees it. The audio thread
// turns each spec into a live processor when the rack is installed.
#[derive(Clone, Debug, PartialEq)]
pub enum EffectSpec {
    // bit depth 1..=16, hold = keep every nth frame (1 is off)
    Crush { bits: u8, hold: u32 },
    // amount 0..1 of tanh saturation, mix 0 dry .. 1 wet
    Drive { amount: f32, mix: f32 },
}

impl EffectSpec {
    pub fn to_effect(&self) -> Box<dyn Effect> {
        match self {
            EffectSpec::Crush { bits, hold } => Box::new(Crush::new(*bits, *hold)),
            EffectSpec::Drive { amount, mix } => Box::new(Drive::new(*amount, *mix)),
        }
    }

    pub fn label(&self) -> String {
        match self {
            EffectSpec::Crush { bits, hold: 1 } => format!("crush {bits}b"),
            EffectSpec::Crush { bits, hold } => format!("crush {bits}b/{hold}"),
            EffectSpec::Drive { amount, mix } => {
                format!("drive {:.0}%@{:.0}", amount * 100.0, mix * 100.0)
            }
        }
    }
}

// Racks the 'f' key steps through, off first
pub fn racks() -> Vec<Vec<EffectSpec>> {
    vec![
        vec![],
        vec![EffectSpec::Crush { bits: 8, hold: 1 }],
        vec![EffectSpec::Crush { bits: 4, hold: 4 }],
        vec![EffectSpec::Drive { amount: 0.5, mix: 1.0 }],
        vec![
            EffectSpec::Drive { amount: 0.3, mix: 0.5 },
            EffectSpec::Crush { bits: 6, hold: 2 },
        ],
    ]
}

// The rack after `current`; anything hand-built goes back to off
pub fn next_rack(current: &[EffectSpec]) -> Vec<EffectSpec> {
    let racks = racks();
    let next = racks
        .iter()
        .position(|r| r.as_slice() == current)
        .map_or(0, |i| (i + 1) % racks.len());
    racks[next].clone()
}

pub trait Effect: Send {
    fn process(&mut self, buf: &mut [StereoFrame]);
}

// Runs a track's chain in order over one block.
pub fn run_chain(chain: &mut [Box<dyn Effect>], buf: &mut [StereoFrame]) {
    for effect in chain.iter_mut() {
        effect.process(buf);
    }
}

// Bit depth reduction plus sample-and-hold. The hold position carries over
// between blocks so the stair steps don't reset every callback.
pub struct Crush {
    half_range: f32, // quantizer steps per unit of amplitude
    hold: u32,
    counter: u32,
    held: StereoFrame,
}

impl Crush {
    pub fn new(bits: u8, hold: u32) -> Self {
        let bits = bits.clamp(1, 16);
        Self {
            half_range: (1u32 << (bits - 1)) as f32,
            hold: hold.max(1),
            counter: 0,
            held: StereoFrame::zero(),
        }
    }

    #[inline]
    fn quantize(&self, x: f32) -> f32 {
        (x.clamp(-1.0, 1.0) * self.half_range).round() / self.half_range
    }
}

impl Effect for Crush {
    fn process(&mut self, buf: &mut [StereoFrame]) {
        for f in buf.iter_mut() {
            if self.counter == 0 {
                self.held = StereoFrame {
                    left: self.quantize(f.left),
                    right: self.quantize(f.right),
                };
            }
            self.counter = (self.counter + 1) % self.hold;
            *f = self.held;
        }
    }
}

// Saturation normalised so a full-scale input still peaks at 1
pub struct Drive {
    pre_gain: f32,
    norm: f32,
    mix: f32,
}

impl Drive {
    pub fn new(amount: f32, mix: f32) -> Self {
        let pre_gain = 1.0 + amount.clamp(0.0, 1.0) * 10.0;
        Self {
            pre_gain,
            norm: 1.0 / pre_gain.tanh(),
            mix: mix.clamp(0.0, 1.0),
        }
    }

    #[inline]
    fn shape(&self, x: f32) -> f32 {
        let wet = (self.pre_gain * x.clamp(-1.0, 1.0)).tanh() * self.norm;
        x + (wet - x) * self.mix
    }
}

impl Effect for Drive {
    fn process(&mut self, buf: &mut [StereoFrame]) {
        for f in buf.iter_mut() {
            f.left = self.shape(f.left);
            f.right = self.shape(f.right);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_bit_crush_snaps_to_three_levels() {
        let mut fx = EffectSpec::Crush { bits: 1, hold: 1 }.to_effect();
        let mut buf = [StereoFrame { left: 0.4, right: -0.7 }];
        fx.process(&mut buf);
        assert_eq!(buf[0].left, 0.0);
        assert_eq!(buf[0].right, -1.0);
    }

    #[test]
    fn hold_repeats_frames_across_blocks() {
        let mut fx = Crush::new(16, 2);
        let mut first = [0.5, 0.25, 0.75].map(|x| StereoFrame { left: x, right: x });
        fx.process(&mut first);
        assert_eq!(first[1].left, 0.5);
        assert_eq!(first[2].left, 0.75);
        // the third frame opened a new hold, so the next block's first frame repeats it
        let mut second = [StereoFrame { left: -1.0, right: -1.0 }];
        fx.process(&mut second);
        assert_eq!(second[0].left, 0.75);
    }

    #[test]
    fn drive_stays_bounded_and_dry_mix_is_transparent() {
        let mut chain = vec![EffectSpec::Drive { amount: 1.0, mix: 1.0 }.to_effect()];
        let mut buf = [StereoFrame { left: 5.0, right: -5.0 }; 4];
        run_chain(&mut chain, &mut buf);
        assert!(buf.iter().all(|f| f.left <= 1.0 && f.right >= -1.0));

        let mut quiet = [StereoFrame { left: 0.1, right: 0.1 }];
        Drive::new(1.0, 1.0).process(&mut quiet);
        assert!(quiet[0].left > 0.5);

        let mut dry = [StereoFrame { left: 0.1, right: -0.3 }];
        Drive::new(1.0, 0.0).process(&mut dry);
        assert_eq!(dry[0], StereoFrame { left: 0.1, right: -0.3 });
    }

    #[test]
    fn empty_chain_is_transparent() {
        let mut buf = [StereoFrame { left: 0.25, right: 0.5 }];
        run_chain(&mut [], &mut buf);
        assert_eq!(buf[0], StereoFrame { left: 0.25, right: 0.5 });
    }

    #[test]
    fn labels_read_like_a_rack() {
        assert_eq!(EffectSpec::Crush { bits: 8, hold: 1 }.label(), "crush 8b");
        assert_eq!(EffectSpec::Crush { bits: 4, hold: 4 }.label(), "crush 4b/4");
        assert_eq!(EffectSpec::Drive { amount: 0.5, mix: 1.0 }.label(), "drive 50%@100");
    }

    #[test]
    fn racks_cycle_back_to_off() {
        let mut rack = Vec::new();
        for _ in 0..racks().len() {
            rack = next_rack(&rack);
            assert!(racks().contains(&rack));
        }
        assert!(rack.is_empty());
        let custom = vec![EffectSpec::Drive { amount: 0.9, mix: 0.1 }];
        assert!(next_rack(&custom).is_empty());
    }
}
