pub use crate::audio::{EffectSpec, Voice};

// Everything the control side can tell the audio thread. Voices arrive fully
// built with absolute start/stop times on the shared audio clock; once sent they
// can't be taken back.
#[derive(Clone, Debug)]
pub enum AudioCommand {
    StartVoice(Voice),

    // Full routing table, index = track, value = downstream track (master's entry is ignored)
    SetRouting(Vec<usize>),

    // Replaces a track's insert chain
    SetEffects { track: usize, effects: Vec<EffectSpec> },
}
