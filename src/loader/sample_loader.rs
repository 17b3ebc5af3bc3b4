// Sample import: raw RIFF/WAVE bytes in, a mono buffer at the engine rate out.
use std::io::Cursor;
use std::path::{Path, PathBuf};

use crate::audio::SampleBuffer;
use crate::error::{EngineError, EngineResult};

pub fn decode(bytes: &[u8], target_rate: u32) -> EngineResult<SampleBuffer> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| EngineError::Decode(e.to_string()))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader // float, just pass it through
            .samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| EngineError::Decode(e.to_string()))?,
        hound::SampleFormat::Int => {
            // int, scale into -1..1
            let max = (1i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|x| x as f32 / max))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| EngineError::Decode(e.to_string()))?
        }
    };

    // fold everything down to mono; a trailing partial frame is dropped
    let mono: Vec<f32> = samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect();
    if mono.is_empty() {
        return Err(EngineError::Decode("file has no audio frames".to_string()));
    }

    Ok(SampleBuffer::new(mono, spec.sample_rate).resampled(target_rate))
}

// .wav files directly inside `dir`, sorted so channel order is stable
pub fn index_wav_in_dir(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"))
        })
        .collect();
    paths.sort();
    Ok(paths)
}
