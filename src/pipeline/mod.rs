// Session data the presentation layer edits and the transport reads.
pub mod channel;
pub mod mixer;
pub mod pattern;
pub mod session;
pub mod transport;

pub use channel::{Channel, ChannelId, Instrument, SynthParams};
pub use mixer::{Mixer, MixerTrack};
pub use pattern::{Note, Pattern};
pub use session::{InstrumentKind, Session};
pub use transport::{Position, TickReport, Transport, TransportState, VoiceSink, step_duration};
