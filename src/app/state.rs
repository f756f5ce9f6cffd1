// src/app/state.rs
//! Application state management.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::Duration;

use crossterm::event::KeyEvent;
use ratatui::Frame;
use tracing::{info, warn};

use crate::audio::ClipPlayer;
use crate::error::SpectrogramError;
use crate::export::{CaptureRequest, StoredCapture};
use crate::pipeline::Session;
use crate::ui::{
    keybindings::{key_to_action, Action, CONTRAST_STEP},
    layout::compute_layout,
    widgets::{render_spectrogram, render_status, StatusInfo},
};

/// Main application state: the display stage of a running session.
pub struct App {
    pub session: Session,
    /// Most recent bitmap rows, oldest first
    pub columns: VecDeque<Vec<u8>>,
    /// Width of the spectrogram pane at the last draw
    pub max_columns: usize,
    pub player: ClipPlayer,
    pub export_dir: PathBuf,
    /// Last action outcome shown in the status pane
    pub message: Option<String>,
    pub torn_rows: u64,
}

impl App {
    pub fn new(session: Session, player: ClipPlayer, export_dir: PathBuf) -> Self {
        Self {
            session,
            columns: VecDeque::new(),
            max_columns: 0,
            player,
            export_dir,
            message: None,
            torn_rows: 0,
        }
    }

    /// Move every published row into the column history. Never blocks.
    pub fn drain_rows(&mut self) {
        let limit = self.max_columns.max(1);
        while let Some(row) = self.session.consumer().try_consume_bitmap(Duration::ZERO) {
            let mut column = if self.columns.len() >= limit {
                self.columns.pop_front().unwrap_or_default()
            } else {
                Vec::new()
            };
            column.resize(row.len(), 0);
            if let Err(err) = row.copy_to(&mut column) {
                self.torn_rows += 1;
                warn!(%err, "display row torn");
            }
            self.columns.push_back(column);
        }
        while self.columns.len() > limit {
            self.columns.pop_front();
        }
    }

    /// Handle a key event and return true if the app should quit.
    pub fn on_key(&mut self, key: KeyEvent) -> bool {
        match key_to_action(&key) {
            Action::Quit => {
                self.player.stop();
                return true;
            }
            Action::CycleColourMap => {
                let map = self.session.settings().cycle_colour_map();
                self.message = Some(format!("Colour map: {}", map.name()));
            }
            Action::ContrastUp => {
                let contrast = self.session.settings().adjust_contrast(CONTRAST_STEP);
                self.message = Some(format!("Contrast: {contrast:.2}"));
            }
            Action::ContrastDown => {
                let contrast = self.session.settings().adjust_contrast(-CONTRAST_STEP);
                self.message = Some(format!("Contrast: {contrast:.2}"));
            }
            Action::ExportVisible => self.export_visible(),
            Action::PlayVisible => self.play_visible(),
            Action::None => {}
        }
        false
    }

    /// Window range `[start, end)` covering the columns currently on screen.
    pub fn visible_range(&self) -> (usize, usize) {
        let history = self.session.history();
        let end = history.rightmost_available_index();
        let shown = self.columns.len().min(history.available_windows());
        let start = (end + history.capacity() - shown) % history.capacity();
        (start, end)
    }

    fn full_band_request(&self) -> CaptureRequest {
        let (start_window, end_window) = self.visible_range();
        CaptureRequest {
            start_window,
            end_window,
            low_hz: 0.0,
            high_hz: self.session.config().max_frequency(),
        }
    }

    fn export_visible(&mut self) {
        let request = self.full_band_request();
        let settings = self.session.settings().load();
        let result = StoredCapture::from_range(self.session.extractor(), &request, &settings)
            .and_then(|capture| capture.save(&self.export_dir));

        self.message = Some(match result {
            Ok(files) => format!("Saved {}", files.image.display()),
            Err(SpectrogramError::EmptyRange) => "Nothing to export yet".to_string(),
            Err(err) => {
                warn!(%err, "export failed");
                format!("Export failed: {err}")
            }
        });
    }

    fn play_visible(&mut self) {
        let (start, end) = self.visible_range();
        let samples = self.session.extractor().extract_audio(start, end);
        if samples.is_empty() {
            self.message = Some("Nothing to play yet".to_string());
            return;
        }
        info!(start, end, samples = samples.len(), "playing visible span");
        let sample_rate = self.session.config().sample_rate;
        self.message = Some(match self.player.play(samples, sample_rate) {
            Ok(()) => "Playing visible span".to_string(),
            Err(err) => format!("Playback failed: {err}"),
        });
    }

    fn status(&self) -> StatusInfo {
        let config = self.session.config();
        let history = self.session.history();
        let settings = self.session.settings().load();
        let window_secs = config.window_duration().as_secs_f64();

        StatusInfo {
            sample_rate: config.sample_rate,
            samples_per_window: config.samples_per_window,
            max_frequency: config.max_frequency(),
            visible_secs: self.columns.len() as f64 * window_secs,
            history_secs: config.history_duration().as_secs_f64(),
            windows_produced: history.windows_produced(),
            pending_rows: history.bitmap_ready_count(),
            colour_map: settings.colour_map.name(),
            contrast: settings.contrast_preference,
            playing: self.player.is_playing(),
            message: self.message.clone(),
        }
    }

    /// Draw the application UI.
    pub fn draw(&mut self, f: &mut Frame<'_>) {
        let layout = compute_layout(f.area());
        self.max_columns = layout.visible_columns();

        let settings = self.session.settings().load();
        let title = if self.session.source_finished() {
            "Spectrogram (input ended)"
        } else {
            "Spectrogram"
        };
        render_spectrogram(f, layout.spectrogram, title, &self.columns, &settings.palette);
        render_status(f, layout.status, &self.status());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::BufferSource;
    use crate::config::{LiveSettings, SharedSettings, SpectrogramConfig};
    use crate::spectrogram::ColourMap;
    use crossterm::event::{KeyCode, KeyModifiers};

    fn app_with_windows(windows: usize) -> App {
        let config = SpectrogramConfig {
            samples_per_window: 16,
            capacity: 8,
            ..SpectrogramConfig::default()
        };
        let source = BufferSource::new(vec![500; 16 * windows], 16000);
        let settings = SharedSettings::new(LiveSettings::new(0.5, ColourMap::Greys));
        let session = Session::start(config, source, settings).unwrap();
        assert!(session.wait_until_drained(Duration::from_secs(5)));
        let export_dir = std::env::temp_dir().join(format!("spectrogram-app-{}", std::process::id()));
        App::new(session, ClipPlayer::new(), export_dir)
    }

    #[test]
    fn test_drain_keeps_only_visible_columns() {
        let mut app = app_with_windows(5);
        app.max_columns = 3;
        app.drain_rows();
        assert_eq!(app.columns.len(), 3);
        assert!(app.columns.iter().all(|c| c.len() == 8));
        assert_eq!(app.visible_range(), (2, 5));
    }

    #[test]
    fn test_visible_range_after_wrap() {
        // 10 windows through a ring of 8: transform cursor ends at slot 2.
        let mut app = app_with_windows(10);
        app.max_columns = 100;
        app.drain_rows();
        // Only 7 windows are ever usable once the ring wraps.
        assert_eq!(app.visible_range(), (3, 2));
    }

    #[test]
    fn test_keys_update_shared_settings() {
        let mut app = app_with_windows(1);
        let press = |code| KeyEvent::new(code, KeyModifiers::NONE);

        assert!(!app.on_key(press(KeyCode::Char('c'))));
        assert_eq!(app.session.settings().load().colour_map, ColourMap::YellowOrangeRed);

        app.on_key(press(KeyCode::Char('+')));
        assert!((app.session.settings().load().contrast_preference - 0.55).abs() < 1e-9);

        assert!(app.on_key(press(KeyCode::Char('q'))));
    }
}
