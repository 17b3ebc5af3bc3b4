// Offline bounce: replays the live scheduling algorithm against a hand-cranked
// clock and an offline engine, then encodes the result as RIFF/WAVE.
use std::io::Cursor;
use std::path::Path;

use anyhow::Context;

use crate::audio::{Engine, ManualClock, RoutingTable, StereoFrame, TrackParams};
use crate::config::{ExportSampleFormat, ExportSettings};
use crate::error::{EngineError, EngineResult};
use crate::pipeline::{Session, TickReport, Transport, step_duration};

const BLOCK: usize = 512;
const BEATS_PER_BAR: f64 = 4.0;

pub fn loop_seconds(tempo: f64, bars: u32) -> f64 {
    bars as f64 * BEATS_PER_BAR * 60.0 / tempo
}

// Interleaved float frames for `settings.bars` bars at the session's rate
pub fn render(session: &Session, settings: &ExportSettings) -> EngineResult<Vec<f32>> {
    if !(1..=2).contains(&settings.channels) {
        return Err(EngineError::InvalidExportFormat(format!(
            "{} output channels",
            settings.channels
        )));
    }
    let sample_rate = session.sample_rate();
    let seconds = loop_seconds(session.tempo(), settings.bars);
    let total_frames = (seconds * sample_rate as f64).round() as usize;

    // fader copies, so the offline meters never land on the live ones
    let params = session
        .mixer()
        .tracks()
        .iter()
        .map(|t| TrackParams::new(t.volume(), t.pan()))
        .collect();
    let routing = RoutingTable::from_targets(session.mixer().routing().targets().to_vec())?;
    let mut engine = Engine::new(sample_rate, params, routing);
    for track in session.mixer().tracks() {
        if !track.effects.is_empty() {
            engine.handle_cmd(crate::audio_api::AudioCommand::SetEffects {
                track: track.index,
                effects: track.effects.clone(),
            });
        }
    }

    let clock = ManualClock::new(0.0);
    let mut transport = Transport::new(
        session.config().lookahead(),
        session.config().schedule_ahead_secs,
    )?;
    transport.start(&clock)?;

    let channels = settings.channels as usize;
    let mut out = Vec::with_capacity(total_frames * channels);
    let mut block = vec![StereoFrame::zero(); BLOCK];
    let mut report = TickReport::default();
    let mut rendered = 0;
    while rendered < total_frames {
        let n = (total_frames - rendered).min(BLOCK);
        // same window the live driver uses, clipped to the loop
        let block_end = (rendered + n) as f64 / sample_rate as f64;
        let horizon = (block_end + session.config().schedule_ahead_secs).min(seconds);
        let tick = transport.schedule_until(horizon, session, &mut engine);
        report.steps.extend(tick.steps);
        report.voices += tick.voices;
        report.errors.extend(tick.errors);

        engine.render_block(&mut block[..n]);
        for frame in &block[..n] {
            if channels == 1 {
                out.push(frame.mono());
            } else {
                out.push(frame.left);
                out.push(frame.right);
            }
        }
        rendered += n;
        clock.set(block_end);
    }
    for e in &report.errors {
        log::warn!("export: {e}");
    }
    log::debug!(
        "export: {} steps, {} voices over {:.3}s ({} frames at {:.4}s/step)",
        report.steps.len(),
        report.voices,
        seconds,
        total_frames,
        step_duration(session.tempo())
    );
    Ok(out)
}

pub fn encode_wav(samples: &[f32], sample_rate: u32, channels: u16, format: ExportSampleFormat) -> EngineResult<Vec<u8>> {
    let (bits_per_sample, sample_format) = match format {
        ExportSampleFormat::Int16 => (16, hound::SampleFormat::Int),
        ExportSampleFormat::Int24 => (24, hound::SampleFormat::Int),
        ExportSampleFormat::Float32 => (32, hound::SampleFormat::Float),
    };
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample,
        sample_format,
    };
    let wav_err = |e: hound::Error| EngineError::InvalidExportFormat(e.to_string());

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).map_err(wav_err)?;
        for &s in samples {
            let s = s.clamp(-1.0, 1.0);
            match format {
                ExportSampleFormat::Int16 => writer.write_sample((s * i16::MAX as f32) as i16),
                ExportSampleFormat::Int24 => writer.write_sample((s * 8_388_607.0) as i32),
                ExportSampleFormat::Float32 => writer.write_sample(s),
            }
            .map_err(wav_err)?;
        }
        writer.finalize().map_err(wav_err)?;
    }
    Ok(cursor.into_inner())
}

pub fn export_bytes(session: &Session, settings: &ExportSettings) -> EngineResult<Vec<u8>> {
    let samples = render(session, settings)?;
    encode_wav(&samples, session.sample_rate(), settings.channels, settings.format)
}

pub fn export_wav(session: &Session, settings: &ExportSettings, path: &Path) -> anyhow::Result<()> {
    let bytes = export_bytes(session, settings)?;
    std::fs::write(path, &bytes).with_context(|| format!("failed to write {}", path.display()))?;
    log::info!("exported {} bytes to {}", bytes.len(), path.display());
    Ok(())
}
