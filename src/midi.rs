// Raw MIDI bytes in, note events out. Binding an actual input port is left to
// whatever feeds `parse`.
use midly::live::LiveEvent;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MidiMessage {
    NoteOn { channel: u8, pitch: u8, velocity: u8 },
    NoteOff { channel: u8, pitch: u8 },
}

impl MidiMessage {
    // Only note messages; everything else (and garbage) is None
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let LiveEvent::Midi { channel, message } = LiveEvent::parse(bytes).ok()? else {
            return None;
        };
        let channel = channel.as_int();
        match message {
            // NoteOn with velocity 0 is how most gear says NoteOff
            midly::MidiMessage::NoteOn { key, vel } if vel.as_int() == 0 => Some(Self::NoteOff {
                channel,
                pitch: key.as_int(),
            }),
            midly::MidiMessage::NoteOn { key, vel } => Some(Self::NoteOn {
                channel,
                pitch: key.as_int(),
                velocity: vel.as_int(),
            }),
            midly::MidiMessage::NoteOff { key, .. } => Some(Self::NoteOff {
                channel,
                pitch: key.as_int(),
            }),
            _ => None,
        }
    }

    // 0..1, what `Channel::play_note` expects
    pub fn velocity_gain(velocity: u8) -> f32 {
        velocity.min(127) as f32 / 127.0
    }
}
