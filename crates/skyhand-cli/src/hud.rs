use std::io::{stdout, Stdout};

use anyhow::{Context, Result};
use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame, Terminal,
};
use skyhand_vision::overlay::{self, DrawInstruction, DrawKind, View};
use skyhand_vision::{Frame as VideoFrame, RenderCanvas};

fn color(c: overlay::Color) -> Color {
    match c {
        overlay::Color::Green => Color::Green,
        overlay::Color::Amber => Color::Rgb(255, 165, 0),
        overlay::Color::Red => Color::Red,
        overlay::Color::Gray => Color::DarkGray,
        overlay::Color::Yellow => Color::Yellow,
        overlay::Color::White => Color::White,
        overlay::Color::Black => Color::Black,
    }
}

/// Text lines for one view, top to bottom. Detection boxes become one
/// summary line each; label tabs are dropped.
fn lines(frame: Option<(u64, u32, u32)>, draw: &[DrawInstruction]) -> Vec<Line<'static>> {
    let mut items: Vec<&DrawInstruction> = draw
        .iter()
        .filter(|d| !matches!(d.kind, DrawKind::Rect { filled: true, .. }))
        .filter(|d| !d.as_text().map_or(false, |s| s.starts_with("Target #")))
        .collect();
    items.sort_by_key(|d| (d.position.1, d.position.0));

    let mut out: Vec<Line<'static>> = items
        .into_iter()
        .map(|d| {
            let text = match &d.kind {
                DrawKind::Text { content, .. } => content.clone(),
                DrawKind::Rect { width, height, .. } => {
                    format!("[target at {},{} {}x{}]", d.position.0, d.position.1, width, height)
                }
            };
            Line::from(Span::styled(text, Style::default().fg(color(d.color))))
        })
        .collect();

    let video = match frame {
        Some((seq, w, h)) => format!("video: frame {} ({}x{})", seq, w, h),
        None => "video: no signal".to_string(),
    };
    out.insert(0, Line::from(Span::styled(video, Style::default().fg(Color::DarkGray))));
    out
}

/// Terminal heads-up display: both views side by side, key help below.
pub struct TerminalHud {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    help: String,
    primary: Vec<Line<'static>>,
    released: bool,
}

impl TerminalHud {
    pub fn open(help: String) -> Result<Self> {
        execute!(stdout(), EnterAlternateScreen).context("enter alternate screen")?;
        let mut terminal = Terminal::new(CrosstermBackend::new(stdout())).context("open terminal")?;
        terminal.clear().context("clear terminal")?;
        Ok(Self { terminal, help, primary: Vec::new(), released: false })
    }

    fn draw(f: &mut Frame, primary: &[Line<'static>], derived: &[Line<'static>], help: &str) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(3)])
            .split(f.area());
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(rows[0]);

        let pane = |lines: &[Line<'static>], title: &'static str, area: Rect, f: &mut Frame| {
            let p = Paragraph::new(lines.to_vec()).block(Block::default().borders(Borders::ALL).title(title));
            f.render_widget(p, area);
        };
        pane(primary, " skyhand ", cols[0], f);
        pane(derived, " telemetry ", cols[1], f);

        let footer = Paragraph::new(help.to_string())
            .block(Block::default().borders(Borders::ALL))
            .style(Style::default().fg(Color::Cyan));
        f.render_widget(footer, rows[1]);
    }
}

impl RenderCanvas for TerminalHud {
    fn submit(&mut self, view: View, frame: Option<&VideoFrame>, draw: &[DrawInstruction]) -> Result<()> {
        let info = frame.map(|f| (f.seq, f.width(), f.height()));
        match view {
            View::Primary => {
                self.primary = lines(info, draw);
                Ok(())
            }
            View::Derived => {
                let derived = lines(info, draw);
                let (primary, help) = (&self.primary, &self.help);
                self.terminal
                    .draw(|f| Self::draw(f, primary, &derived, help))
                    .context("draw hud")?;
                Ok(())
            }
        }
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}

impl Drop for TerminalHud {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skyhand_fc::Warning;
    use skyhand_proto::{FlightState, Telemetry, VelocityCommand};
    use skyhand_vision::overlay::{OverlayConfig, OverlayInput};
    use skyhand_vision::{DetectionState, Detection};

    #[test]
    fn lines_are_ordered_and_boxes_summarized() {
        let t = Telemetry { battery_percent: Some(40), ..Telemetry::default() };
        let boxes = [Detection { x: 5, y: 300, w: 20, h: 30 }];
        let warnings: [Warning; 0] = [];
        let input = OverlayInput {
            state: FlightState::Grounded,
            telemetry: &t,
            thermal: None,
            warnings: &warnings,
            detection: DetectionState { enabled: true, last_count: 1, available: true },
            detections: &boxes,
            active_controls: &[],
            command: VelocityCommand::ZERO,
            fps: 0.0,
            frame_height: 720,
        };
        let draw = overlay::render(&OverlayConfig::default(), &input, View::Primary);
        let text: Vec<String> = lines(None, &draw)
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect();

        assert_eq!(text[0], "video: no signal");
        assert_eq!(text[1], "Status: ON GROUND");
        assert!(text.contains(&"[target at 5,300 20x30]".to_string()));
        assert!(!text.iter().any(|s| s.starts_with("Target #")));
        assert_eq!(text.last().map(String::as_str), Some("COLOR VIEW"));
    }
}
