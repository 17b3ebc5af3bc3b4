// Engine settings. Everything has a sensible default so a missing or partial
// config file still gives a working session.
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::shared::{DEFAULT_STEP_COUNT, DEFAULT_TEMPO, DEFAULT_TRACK_COUNT};

const BEATGRID_DIR: &str = ".beatgrid";
const CONFIG_FILE: &str = "config.json";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub sample_rate: u32,
    pub lookahead_ms: u64, // how often the driver loop wakes the scheduler
    pub schedule_ahead_secs: f64, // how far past "now" each tick schedules
    pub tempo: f64,
    pub step_count: usize,
    pub track_count: usize, // mixer tracks, not counting master
    pub preset_seed: u64,
    pub midi_note_duration: f64,
    pub drum_hit_duration: f64,
    pub export: ExportSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            lookahead_ms: 25,
            schedule_ahead_secs: 0.1,
            tempo: DEFAULT_TEMPO,
            step_count: DEFAULT_STEP_COUNT,
            track_count: DEFAULT_TRACK_COUNT,
            preset_seed: 0x5eed_beef,
            midi_note_duration: 0.5,
            drum_hit_duration: 0.1,
            export: ExportSettings::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportSampleFormat {
    Int16,
    Int24,
    Float32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    pub bars: u32,
    pub channels: u16,
    pub format: ExportSampleFormat,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            bars: 1,
            channels: 1,
            format: ExportSampleFormat::Int16,
        }
    }
}

impl EngineConfig {
    pub fn lookahead(&self) -> Duration {
        Duration::from_millis(self.lookahead_ms)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if !(self.tempo.is_finite() && self.tempo > 0.0) {
            return Err(EngineError::InvalidTempo(self.tempo));
        }
        if self.step_count == 0 {
            return Err(EngineError::InvalidStepCount(self.step_count));
        }
        if self.track_count == 0 {
            return Err(EngineError::TrackOutOfRange { track: 1, track_count: 0 });
        }
        let lookahead = self.lookahead().as_secs_f64();
        // the window has to overlap consecutive ticks or steps fall through the gap
        if !(self.schedule_ahead_secs > lookahead) {
            return Err(EngineError::InvalidSchedulingWindow {
                ahead: self.schedule_ahead_secs,
                lookahead,
            });
        }
        if !(1..=2).contains(&self.export.channels) {
            return Err(EngineError::InvalidExportFormat(format!(
                "{} output channels",
                self.export.channels
            )));
        }
        Ok(())
    }
}

// <project_dir>/.beatgrid/config.json
pub fn config_file_path(project_dir: &Path) -> PathBuf {
    project_dir.join(BEATGRID_DIR).join(CONFIG_FILE)
}

// A missing file means defaults; a present but broken one is an error.
pub fn load_config(project_dir: &Path) -> anyhow::Result<EngineConfig> {
    let path = config_file_path(project_dir);
    if !path.exists() {
        log::debug!("no config at {}, using defaults", path.display());
        return Ok(EngineConfig::default());
    }
    let data = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let config: EngineConfig = serde_json::from_str(&data)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    config.validate()?;
    log::info!("loaded config from {}", path.display());
    Ok(config)
}
