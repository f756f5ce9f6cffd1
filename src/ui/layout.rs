// src/ui/layout.rs
//! Layout computation for the UI panels.

use ratatui::layout::{Constraint, Direction, Layout, Rect};

/// Height of the status pane including its border.
const STATUS_HEIGHT: u16 = 5;

/// Computed layout areas for rendering.
pub struct ComputedLayout {
    pub spectrogram: Rect,
    pub status: Rect,
}

impl ComputedLayout {
    /// Columns available for bitmap rows inside the spectrogram border.
    pub fn visible_columns(&self) -> usize {
        self.spectrogram.width.saturating_sub(2) as usize
    }
}

/// Split the terminal into the spectrogram pane and the status pane below it.
pub fn compute_layout(area: Rect) -> ComputedLayout {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(STATUS_HEIGHT)])
        .split(area);

    ComputedLayout {
        spectrogram: chunks[0],
        status: chunks[1],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_keeps_fixed_height() {
        let layout = compute_layout(Rect::new(0, 0, 80, 30));
        assert_eq!(layout.status.height, STATUS_HEIGHT);
        assert_eq!(layout.spectrogram.height, 30 - STATUS_HEIGHT);
        assert_eq!(layout.visible_columns(), 78);
    }
}
