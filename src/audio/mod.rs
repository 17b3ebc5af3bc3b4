use std::sync::Arc;

use anyhow::Context;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};

use crate::audio_api::AudioCommand;

pub mod clock;
mod effect;
mod engine;
pub mod envelope;
mod frame;
pub mod mixer;
pub mod procedural;
mod sample_buffer;
mod voice;

pub use clock::{AudioClock, ManualClock, SharedClock};
pub use effect::{Effect, EffectSpec, next_rack};
pub use engine::Engine;
pub use envelope::{Envelope, EnvelopeShape};
pub use frame::StereoFrame;
pub use mixer::{MASTER, RoutingTable, TrackParams};
pub use procedural::Preset;
pub use sample_buffer::SampleBuffer;
pub use voice::{Voice, VoiceSource, Waveform};

const COMMAND_QUEUE: usize = 1024;

pub struct AudioHandle {
    tx: Sender<AudioCommand>,
    clock: Arc<SharedClock>,
    _output_stream: cpal::Stream,
}

impl AudioHandle {
    // Never blocks; a full queue means the audio thread is wedged anyway
    pub fn send(&self, cmd: AudioCommand) {
        if let Err(e) = self.tx.try_send(cmd) {
            log::warn!("dropped audio command: {e}");
        }
    }

    pub fn clock(&self) -> &Arc<SharedClock> {
        &self.clock
    }
}

// The default output device, opened but not yet streaming. Split from
// `start_audio` so the session can be built at the device's sample rate.
pub struct OutputDevice {
    device: cpal::Device,
    config: cpal::SupportedStreamConfig,
}

impl OutputDevice {
    pub fn open_default() -> anyhow::Result<Self> {
        let host = cpal::default_host();
        let device = host.default_output_device().context("no default output device")?;
        let config = device.default_output_config().context("no default output config")?;
        if config.sample_format() != cpal::SampleFormat::F32 {
            anyhow::bail!(
                "unsupported sample format {:?} (only f32 supported for now)",
                config.sample_format()
            );
        }
        Ok(Self { device, config })
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate()
    }

    pub fn channels(&self) -> usize {
        self.config.channels() as usize
    }
}

pub fn start_audio(
    output: OutputDevice,
    tracks: Vec<Arc<TrackParams>>,
    routing: RoutingTable,
) -> anyhow::Result<AudioHandle> {
    let (tx, rx) = crossbeam_channel::bounded::<AudioCommand>(COMMAND_QUEUE);
    let clock = SharedClock::new(output.sample_rate());
    let engine = Engine::new(output.sample_rate(), tracks, routing).with_clock(clock.clone());

    let channels = output.channels();
    let stream_config: cpal::StreamConfig = output.config.clone().into();
    let stream = build_output_stream_f32(&output.device, &stream_config, rx, engine, channels)?;
    stream.play().context("failed to play output stream")?;
    log::info!(
        "audio output running at {} Hz, {} channel(s)",
        output.sample_rate(),
        channels
    );

    Ok(AudioHandle {
        tx,
        clock,
        _output_stream: stream,
    })
}

fn build_output_stream_f32(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    rx: Receiver<AudioCommand>,
    mut engine: Engine,
    channels: usize,
) -> anyhow::Result<cpal::Stream> {
    let err_fn = |err| log::error!("audio output stream error: {err}");

    let stream = device.build_output_stream(
        config,
        move |data: &mut [f32], _info| {
            while let Ok(cmd) = rx.try_recv() {
                engine.handle_cmd(cmd);
            }
            engine.render_interleaved(data, channels);
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}
