// src/ui/widgets/status.rs
//! One-line session status and key help.

use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

/// Everything the status bar shows.
#[derive(Debug, Clone, Default)]
pub struct StatusInfo {
    pub sample_rate: u32,
    pub samples_per_window: usize,
    pub max_frequency: f64,
    pub visible_secs: f64,
    pub history_secs: f64,
    pub windows_produced: u64,
    pub pending_rows: usize,
    pub colour_map: &'static str,
    pub contrast: f64,
    pub playing: bool,
    pub message: Option<String>,
}

impl StatusInfo {
    fn summary(&self) -> String {
        format!(
            "{} Hz | {} samples/window | 0-{:.0} Hz | {:.1}s shown of {:.1}s | windows {} (+{} queued)",
            self.sample_rate,
            self.samples_per_window,
            self.max_frequency,
            self.visible_secs,
            self.history_secs,
            self.windows_produced,
            self.pending_rows,
        )
    }
}

/// Render the status pane.
pub fn render_status(f: &mut Frame<'_>, area: Rect, info: &StatusInfo) {
    let keys = Style::default().fg(Color::Cyan);
    let mut help = vec![
        Span::styled("q", keys),
        Span::raw(" quit  "),
        Span::styled("c", keys),
        Span::raw(format!(" map: {}  ", info.colour_map)),
        Span::styled("+/-", keys),
        Span::raw(format!(" contrast: {:.2}  ", info.contrast)),
        Span::styled("e", keys),
        Span::raw(" export  "),
        Span::styled("p", keys),
        Span::raw(" play"),
    ];
    if info.playing {
        help.push(Span::styled(
            "  ▶ playing",
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        ));
    }

    let mut lines = vec![Line::from(info.summary()), Line::from(help)];
    if let Some(message) = &info.message {
        lines.push(Line::from(Span::styled(
            message.clone(),
            Style::default().fg(Color::Yellow),
        )));
    }

    f.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Status")),
        area,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_mentions_rate_and_range() {
        let info = StatusInfo {
            sample_rate: 16000,
            samples_per_window: 300,
            max_frequency: 8000.0,
            visible_secs: 2.0,
            history_secs: 18.75,
            windows_produced: 42,
            ..StatusInfo::default()
        };
        let summary = info.summary();
        assert!(summary.starts_with("16000 Hz | 300 samples/window | 0-8000 Hz"));
        assert!(summary.contains("2.0s shown of 18.8s"));
        assert!(summary.contains("windows 42"));
    }
}
