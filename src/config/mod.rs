// src/config/mod.rs
//! Session configuration and the live-tunable display settings.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;

use crate::error::{Result, SpectrogramError};
use crate::spectrogram::{contrast_exponent, ColourMap, Palette};

/// Sample rates accepted for live capture.
pub const SUPPORTED_SAMPLE_RATES: [u32; 4] = [11025, 16000, 22050, 44100];

pub const DEFAULT_SAMPLE_RATE: u32 = 16000;
pub const DEFAULT_SAMPLES_PER_WINDOW: usize = 300;
/// 1000 windows of 300 samples at 16 kHz is 18.75 seconds of history.
pub const DEFAULT_CAPACITY: usize = 1000;
pub const DEFAULT_CONTRAST_PREFERENCE: f64 = 1.0 / 3.0;

/// Name of the folder captures are stored in.
pub const STORE_DIR_NAME: &str = "Spectrogram captures";

/// Settings fixed for the lifetime of a session.
#[derive(Debug, Clone)]
pub struct SpectrogramConfig {
    pub sample_rate: u32,
    pub samples_per_window: usize,
    /// Raw contrast slider value in `[0, 1]`
    pub contrast_preference: f64,
    pub colour_map: ColourMap,
    /// Number of windows kept in the ring buffers
    pub capacity: usize,
    pub export_dir: PathBuf,
}

impl Default for SpectrogramConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            samples_per_window: DEFAULT_SAMPLES_PER_WINDOW,
            contrast_preference: DEFAULT_CONTRAST_PREFERENCE,
            colour_map: ColourMap::default(),
            capacity: DEFAULT_CAPACITY,
            export_dir: default_export_dir(),
        }
    }
}

impl SpectrogramConfig {
    /// Check the settings shared by every input kind.
    pub fn validate(&self) -> Result<()> {
        if self.samples_per_window < 2 || self.samples_per_window % 2 != 0 {
            return Err(SpectrogramError::Config(format!(
                "samples per window must be an even number >= 2, got {}",
                self.samples_per_window
            )));
        }
        if self.capacity < 2 {
            return Err(SpectrogramError::Config(format!(
                "capacity must hold at least 2 windows, got {}",
                self.capacity
            )));
        }
        if !(0.0..=1.0).contains(&self.contrast_preference) {
            return Err(SpectrogramError::Config(format!(
                "contrast must be within [0, 1], got {}",
                self.contrast_preference
            )));
        }
        if self.sample_rate == 0 {
            return Err(SpectrogramError::Config("sample rate must be positive".into()));
        }
        Ok(())
    }

    /// Stricter check for microphone capture, which only offers a few rates.
    pub fn validate_for_capture(&self) -> Result<()> {
        self.validate()?;
        if !SUPPORTED_SAMPLE_RATES.contains(&self.sample_rate) {
            return Err(SpectrogramError::Config(format!(
                "sample rate {} is not one of {:?}",
                self.sample_rate, SUPPORTED_SAMPLE_RATES
            )));
        }
        Ok(())
    }

    pub fn num_freq_bins(&self) -> usize {
        self.samples_per_window / 2
    }

    pub fn contrast_exponent(&self) -> f64 {
        contrast_exponent(self.contrast_preference)
    }

    pub fn window_duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples_per_window as f64 / self.sample_rate as f64)
    }

    /// Time span the ring buffers can hold before overwriting.
    pub fn history_duration(&self) -> Duration {
        self.window_duration() * self.capacity as u32
    }

    /// Highest frequency shown, i.e. the Nyquist frequency.
    pub fn max_frequency(&self) -> f64 {
        self.sample_rate as f64 / 2.0
    }

    pub fn live_settings(&self) -> LiveSettings {
        LiveSettings::new(self.contrast_preference, self.colour_map)
    }
}

/// `Pictures/Spectrogram captures` when a picture directory exists, otherwise
/// a folder of that name under the working directory.
pub fn default_export_dir() -> PathBuf {
    directories::UserDirs::new()
        .and_then(|dirs| dirs.picture_dir().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(STORE_DIR_NAME)
}

/// Immutable snapshot of the settings that may change mid-session.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveSettings {
    pub contrast_preference: f64,
    pub colour_map: ColourMap,
    pub palette: Palette,
}

impl LiveSettings {
    pub fn new(contrast_preference: f64, colour_map: ColourMap) -> Self {
        Self {
            contrast_preference: contrast_preference.clamp(0.0, 1.0),
            colour_map,
            palette: Palette::new(colour_map),
        }
    }

    pub fn contrast_exponent(&self) -> f64 {
        contrast_exponent(self.contrast_preference)
    }
}

/// Atomically swapped [`LiveSettings`]; readers load one snapshot per window.
#[derive(Debug, Clone)]
pub struct SharedSettings {
    inner: Arc<ArcSwap<LiveSettings>>,
}

impl SharedSettings {
    pub fn new(settings: LiveSettings) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(settings)),
        }
    }

    pub fn load(&self) -> Arc<LiveSettings> {
        self.inner.load_full()
    }

    pub fn set_contrast_preference(&self, preference: f64) {
        self.inner
            .rcu(|current| LiveSettings::new(preference, current.colour_map));
    }

    /// Shift the contrast preference by `delta`, returning the new value.
    pub fn adjust_contrast(&self, delta: f64) -> f64 {
        let updated = self.inner.rcu(|current| {
            LiveSettings::new(current.contrast_preference + delta, current.colour_map)
        });
        // `rcu` hands back the previous value.
        (updated.contrast_preference + delta).clamp(0.0, 1.0)
    }

    pub fn set_colour_map(&self, map: ColourMap) {
        self.inner.rcu(|current| LiveSettings::new(current.contrast_preference, map));
    }

    pub fn cycle_colour_map(&self) -> ColourMap {
        let previous = self.inner.rcu(|current| {
            LiveSettings::new(current.contrast_preference, current.colour_map.next())
        });
        previous.colour_map.next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SpectrogramConfig::default();
        assert!(config.validate_for_capture().is_ok());
        assert_eq!(config.num_freq_bins(), 150);
        assert!((config.history_duration().as_secs_f64() - 18.75).abs() < 1e-6);
    }

    #[test]
    fn test_rejects_odd_window_and_unsupported_rate() {
        let config = SpectrogramConfig {
            samples_per_window: 301,
            ..SpectrogramConfig::default()
        };
        assert!(matches!(config.validate(), Err(SpectrogramError::Config(_))));

        let config = SpectrogramConfig {
            sample_rate: 48000,
            ..SpectrogramConfig::default()
        };
        assert!(config.validate().is_ok());
        assert!(config.validate_for_capture().is_err());
    }

    #[test]
    fn test_live_settings_swap() {
        let shared = SharedSettings::new(LiveSettings::new(0.0, ColourMap::Greys));
        let before = shared.load();

        shared.set_contrast_preference(0.5);
        assert_eq!(shared.load().contrast_exponent(), 2.5);
        assert_eq!(shared.cycle_colour_map(), ColourMap::YellowOrangeRed);
        assert_eq!(shared.load().palette, Palette::new(ColourMap::YellowOrangeRed));

        // Snapshots already handed out are never mutated.
        assert_eq!(before.colour_map, ColourMap::Greys);
        assert_eq!(before.contrast_preference, 0.0);
    }

    #[test]
    fn test_adjust_contrast_clamps() {
        let shared = SharedSettings::new(LiveSettings::new(0.9, ColourMap::HotMetal));
        assert_eq!(shared.adjust_contrast(0.5), 1.0);
        assert_eq!(shared.load().contrast_preference, 1.0);
    }
}
