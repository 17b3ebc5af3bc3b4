use crate::shared::DisplayState;
use super::mode::TuiState;
use ratatui::layout::{Layout, Direction, Constraint, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

const NAME_WIDTH: usize = 10;
const METER_WIDTH: usize = 12;

pub fn render(frame: &mut Frame, area: Rect, state: &DisplayState, ts: &TuiState) {
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // transport line
            Constraint::Min(6), // step grid
            Constraint::Length(state.tracks.len() as u16 + 2), // mixer meters
            Constraint::Length(1), // status
        ])
        .split(area);

    draw_transport(frame, sections[0], state, ts);
    draw_grid(frame, sections[1], state, ts);
    draw_mixer(frame, sections[2], state);
    draw_status(frame, sections[3], state);
}

fn draw_transport(frame: &mut Frame, area: Rect, state: &DisplayState, ts: &TuiState) {
    let icon = if state.playing { "▶" } else { "■" };
    let p = state.position;
    let line = Line::from(vec![
        Span::styled(format!(" {icon} "), Style::default().fg(Color::LightGreen)),
        Span::raw(format!("{:>5.1} BPM  ", state.tempo)),
        Span::raw(format!("{:>3}.{}.{}  ", p.bar, p.beat, p.sixteenth)),
        Span::raw(format!("{} steps  ", state.step_count)),
        Span::styled(format!("note {}", ts.note_pitch), Style::default().fg(Color::Cyan)),
    ]);
    let block = Block::default().borders(Borders::ALL).title(" beatgrid ");
    frame.render_widget(Paragraph::new(line).block(block), area);
}

fn draw_grid(frame: &mut Frame, area: Rect, state: &DisplayState, ts: &TuiState) {
    let mut lines = Vec::with_capacity(state.channels.len());
    for (row_idx, row) in state.channels.iter().enumerate() {
        let name_style = if row.selected {
            Style::default().add_modifier(Modifier::BOLD).fg(Color::Yellow)
        } else {
            Style::default()
        };
        let mut spans = vec![Span::styled(
            format!("{:<width$.width$}", row.name, width = NAME_WIDTH),
            name_style,
        )];

        for (step, &on) in row.steps.iter().enumerate() {
            let note = row.note_steps.get(step).copied().unwrap_or(false);
            let glyph = match (on, note) {
                (true, _) => "■",
                (false, true) => "♪",
                (false, false) => "·",
            };
            let mut style = if step % 4 == 0 {
                Style::default().fg(Color::White)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            if on || note {
                style = style.fg(Color::LightMagenta);
            }
            if state.playhead == Some(step) {
                style = style.bg(Color::Magenta);
            }
            if row_idx == ts.row && step == ts.step {
                style = style.add_modifier(Modifier::REVERSED);
            }
            spans.push(Span::styled(format!("{glyph} "), style));
        }

        spans.push(Span::styled(
            format!(
                " {} vol {:.2} pan {:+.1} pitch {:+} → {}",
                row.kind, row.volume, row.pan, row.pitch_offset, row.target_track
            ),
            Style::default().fg(Color::DarkGray),
        ));
        lines.push(Line::from(spans));
    }
    let block = Block::default().borders(Borders::ALL).title(" pattern ");
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_mixer(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let lines: Vec<Line> = state
        .tracks
        .iter()
        .map(|t| {
            let lit = ((t.level * 2.0).clamp(0.0, 1.0) * METER_WIDTH as f32).round() as usize;
            let target = t.target.map(|i| if i == 0 { "M".to_string() } else { i.to_string() });
            Line::from(vec![
                Span::raw(format!("{:>2} ", t.label)),
                Span::styled("|".repeat(lit), Style::default().fg(Color::LightGreen)),
                Span::styled(".".repeat(METER_WIDTH - lit), Style::default().fg(Color::DarkGray)),
                Span::raw(format!(
                    " vol {:.2} pan {:+.1}{}",
                    t.volume,
                    t.pan,
                    target.map(|s| format!(" → {s}")).unwrap_or_default()
                )),
                Span::styled(
                    t.effects.iter().map(|e| format!(" [{}]", e.label())).collect::<String>(),
                    Style::default().fg(Color::Yellow),
                ),
            ])
        })
        .collect();
    let block = Block::default().borders(Borders::ALL).title(" mixer ");
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_status(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let style = if state.last_error.as_deref() == Some(state.status.as_str()) {
        Style::default().fg(Color::LightRed)
    } else {
        Style::default().fg(Color::Gray)
    };
    frame.render_widget(Paragraph::new(Span::styled(state.status.as_str(), style)), area);
}
