use thiserror::Error;

use crate::pipeline::ChannelId;

// Broad buckets the UI and the logs care about; every EngineError lands in exactly one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Resource,
    Routing,
    Timing,
}

#[derive(Clone, Debug, PartialEq, Error)]
pub enum EngineError {
    // configuration
    #[error("tempo must be positive, got {0} bpm")]
    InvalidTempo(f64),
    #[error("step count must be positive, got {0}")]
    InvalidStepCount(usize),
    #[error("step {step} is outside the pattern (0..{step_count})")]
    StepOutOfRange { step: usize, step_count: usize },
    #[error("pitch {0} is outside the 0-127 range")]
    InvalidPitch(u8),
    #[error("schedule-ahead window ({ahead}s) must be wider than the lookahead interval ({lookahead}s)")]
    InvalidSchedulingWindow { ahead: f64, lookahead: f64 },
    #[error("unsupported export format: {0}")]
    InvalidExportFormat(String),
    #[error("no channel with id {0}")]
    UnknownChannel(ChannelId),
    #[error("channel {channel} is not a synth")]
    NotASynth { channel: ChannelId },

    // resources
    #[error("channel {channel} is a sampler with no sample loaded")]
    MissingSample { channel: ChannelId },
    #[error("could not decode sample: {0}")]
    Decode(String),

    // routing
    #[error("mixer track {track} is out of range (1..={track_count})")]
    TrackOutOfRange { track: usize, track_count: usize },
    #[error("channel {channel} cannot target the master track directly")]
    MasterTarget { channel: ChannelId },
    #[error("routing track {track} there would create a cycle")]
    RoutingCycle { track: usize },

    // timing
    #[error("note duration must be a non-negative finite number, got {0}")]
    NegativeDuration(f64),
    #[error("event time must be a non-negative finite number, got {0}")]
    NegativeTime(f64),
    #[error("audio clock went backwards ({previous}s -> {now}s)")]
    ClockWentBackwards { previous: f64, now: f64 },
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::InvalidTempo(_)
            | EngineError::InvalidStepCount(_)
            | EngineError::StepOutOfRange { .. }
            | EngineError::InvalidPitch(_)
            | EngineError::InvalidSchedulingWindow { .. }
            | EngineError::InvalidExportFormat(_)
            | EngineError::UnknownChannel(_)
            | EngineError::NotASynth { .. } => ErrorKind::Configuration,
            EngineError::MissingSample { .. } | EngineError::Decode(_) => ErrorKind::Resource,
            EngineError::TrackOutOfRange { .. }
            | EngineError::MasterTarget { .. }
            | EngineError::RoutingCycle { .. } => ErrorKind::Routing,
            EngineError::NegativeDuration(_)
            | EngineError::NegativeTime(_)
            | EngineError::ClockWentBackwards { .. } => ErrorKind::Timing,
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_variant_maps_to_its_category() {
        assert_eq!(EngineError::InvalidTempo(0.0).kind(), ErrorKind::Configuration);
        assert_eq!(EngineError::InvalidStepCount(0).kind(), ErrorKind::Configuration);
        assert_eq!(EngineError::NotASynth { channel: ChannelId(1) }.kind(), ErrorKind::Configuration);
        assert_eq!(EngineError::MissingSample { channel: ChannelId(3) }.kind(), ErrorKind::Resource);
        assert_eq!(EngineError::Decode("bad".into()).kind(), ErrorKind::Resource);
        assert_eq!(EngineError::RoutingCycle { track: 2 }.kind(), ErrorKind::Routing);
        assert_eq!(
            EngineError::TrackOutOfRange { track: 9, track_count: 8 }.kind(),
            ErrorKind::Routing
        );
        assert_eq!(EngineError::NegativeDuration(-1.0).kind(), ErrorKind::Timing);
    }

    #[test]
    fn messages_name_the_offending_value() {
        let msg = EngineError::MissingSample { channel: ChannelId(7) }.to_string();
        assert!(msg.contains("channel 7"));
    }
}
