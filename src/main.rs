mod shared;
mod tui;
mod audio_api;
mod audio;
mod config;
mod error;
mod export;
mod loader;
mod middle;
mod midi;
mod pipeline;

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use anyhow::Context;
use crossterm::terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

use audio::{AudioClock, OutputDevice};
use middle::Middle;
use pipeline::Session;
use shared::Intent;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

// The TUI owns the terminal, so logs go to a file next to the config
fn init_logging(project_dir: &Path) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    let log_dir = config::config_file_path(project_dir)
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| project_dir.to_path_buf());
    let file = std::fs::create_dir_all(&log_dir).and_then(|_| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_dir.join("beatgrid.log"))
    });
    if let Ok(file) = file {
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.init();
}

fn run() -> anyhow::Result<()> {
    let project_dir: PathBuf = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());
    init_logging(&project_dir);

    let mut config = config::load_config(&project_dir)?;
    let output = OutputDevice::open_default()?;
    config.sample_rate = output.sample_rate(); // presets and imports render at the device rate

    let mut session = Session::with_defaults(config).context("invalid engine config")?;
    let wav_paths = loader::sample_loader::index_wav_in_dir(&project_dir).unwrap_or_default();
    for path in wav_paths {
        if path.file_name().is_some_and(|n| n == middle::EXPORT_FILE) {
            continue; // don't feed our own bounces back in
        }
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let imported = std::fs::read(&path)
            .map_err(anyhow::Error::from)
            .and_then(|bytes| Ok(session.import_sample(None, &name, &bytes)?));
        if let Err(e) = imported {
            log::warn!("skipping {}: {e:#}", path.display());
        }
    }

    let audio = audio::start_audio(
        output,
        session.mixer().shared_params(),
        session.mixer().routing().clone(),
    )?;
    let mut middle = Middle::new(session, project_dir)?;

    terminal::enable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), terminal::EnterAlternateScreen)?;
    let _guard = RawModeGuard; // auto drops when out of scope

    let backend = CrosstermBackend::new(std::io::stdout());
    let mut term = Terminal::new(backend)?;
    term.clear()?;

    // input polling doubles as the scheduler timer
    let tick_rate = middle.transport().lookahead();
    let mut tui_state = tui::mode::TuiState::default();

    loop {
        let clock = audio.clock().as_ref();
        let ds = middle.display_state(clock.now());
        tui_state.clamp_to(&ds);

        term.draw(|frame| {
            tui::view::render(frame, frame.area(), &ds, &tui_state);
        })?;

        let intents = tui::input::poll_input(tick_rate, &mut tui_state, &ds)?;
        for intent in intents {
            if intent == Intent::Quit {
                return Ok(());
            }
            for cmd in middle.handle_intent(intent, clock) {
                audio.send(cmd);
            }
        }

        for cmd in middle.tick(clock) {
            audio.send(cmd);
        }
    }
}

struct RawModeGuard;
impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = crossterm::execute!(std::io::stdout(), terminal::LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
    }
}
