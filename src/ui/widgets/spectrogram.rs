// src/ui/widgets/spectrogram.rs
//! Scrolling spectrogram drawn with half-block glyphs.

use std::collections::VecDeque;

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Color,
    widgets::{Block, Borders, Widget},
    Frame,
};

use crate::spectrogram::Palette;

/// Upper half block: foreground paints the top pixel, background the bottom.
const HALF_BLOCK: &str = "▀";

/// Colour-index rows, one terminal column each, newest last.
pub struct SpectrogramWidget<'a> {
    columns: &'a VecDeque<Vec<u8>>,
    palette: &'a Palette,
}

impl<'a> SpectrogramWidget<'a> {
    pub fn new(columns: &'a VecDeque<Vec<u8>>, palette: &'a Palette) -> Self {
        Self { columns, palette }
    }
}

/// Row of `bins` shown at pixel row `pixel` of `pixels`, top to bottom.
fn bin_for_pixel(pixel: usize, pixels: usize, bins: usize) -> usize {
    (pixel * bins / pixels.max(1)).min(bins.saturating_sub(1))
}

fn colour_at(palette: &Palette, column: &[u8], pixel: usize, pixels: usize) -> Color {
    if column.is_empty() {
        return Color::Reset;
    }
    let index = column[bin_for_pixel(pixel, pixels, column.len())];
    let [r, g, b] = palette.colour(index).0;
    Color::Rgb(r, g, b)
}

impl Widget for SpectrogramWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 {
            return;
        }
        let pixels = area.height as usize * 2;
        let width = area.width as usize;
        // Right-align so the newest column sits at the right edge.
        let shown = self.columns.len().min(width);
        let skip = self.columns.len() - shown;
        let offset = (width - shown) as u16;

        for (i, column) in self.columns.iter().skip(skip).enumerate() {
            let x = area.x + offset + i as u16;
            for row in 0..area.height {
                let pixel = row as usize * 2;
                let top = colour_at(self.palette, column, pixel, pixels);
                let bottom = colour_at(self.palette, column, pixel + 1, pixels);
                if let Some(cell) = buf.cell_mut((x, area.y + row)) {
                    cell.set_symbol(HALF_BLOCK).set_fg(top).set_bg(bottom);
                }
            }
        }
    }
}

/// Render the spectrogram pane with its border.
pub fn render_spectrogram(
    f: &mut Frame<'_>,
    area: Rect,
    title: &str,
    columns: &VecDeque<Vec<u8>>,
    palette: &Palette,
) {
    let block = Block::default().borders(Borders::ALL).title(title.to_string());
    let inner = block.inner(area);
    f.render_widget(block, area);
    f.render_widget(SpectrogramWidget::new(columns, palette), inner);
}
