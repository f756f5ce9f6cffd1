// src/export.rs
//! Saving a selected time/frequency range as a JPEG image plus a WAV clip.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::RgbImage;
use tracing::info;

use crate::audio::{write_wav, BandPass};
use crate::config::LiveSettings;
use crate::error::{Result, SpectrogramError};
use crate::pipeline::ChunkExtractor;

/// Stored images are enlarged by this factor in both directions.
pub const STORE_SCALE: u32 = 2;
pub const JPEG_QUALITY: u8 = 90;

/// A window range and frequency band to capture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureRequest {
    pub start_window: usize,
    pub end_window: usize,
    pub low_hz: f64,
    pub high_hz: f64,
}

impl CaptureRequest {
    /// Convert a time range in seconds since the first captured window into
    /// window indices. Only meaningful while the history has not wrapped, so
    /// `end_secs` must come after `start_secs`.
    pub fn from_seconds(
        extractor: &ChunkExtractor,
        start_secs: f64,
        end_secs: f64,
        low_hz: f64,
        high_hz: f64,
    ) -> Result<Self> {
        if !(end_secs > start_secs) {
            return Err(SpectrogramError::EmptyRange);
        }
        let windows_per_sec =
            extractor.sample_rate() as f64 / extractor.history().samples_per_window() as f64;
        let to_window = |secs: f64| (secs.max(0.0) * windows_per_sec).floor() as usize;
        Ok(Self {
            start_window: to_window(start_secs),
            end_window: to_window(end_secs),
            low_hz,
            high_hz,
        })
    }
}

/// Paths written by [`StoredCapture::save`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFiles {
    pub image: PathBuf,
    pub audio: PathBuf,
}

/// A rendered and filtered capture, ready to be written out.
pub struct StoredCapture {
    pub image: RgbImage,
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub captured_at: DateTime<Local>,
}

impl StoredCapture {
    /// Re-render the requested range and band-pass its audio to the same band.
    pub fn from_range(
        extractor: &ChunkExtractor,
        request: &CaptureRequest,
        settings: &LiveSettings,
    ) -> Result<Self> {
        if extractor.window_count(request.start_window, request.end_window) == 0 {
            return Err(SpectrogramError::EmptyRange);
        }

        let bottom_bin = extractor.hz_to_bin(request.low_hz);
        let top_bin = extractor.hz_to_bin(request.high_hz);
        let chunk = extractor.extract_image(
            request.start_window,
            request.end_window,
            bottom_bin,
            top_bin,
            settings.contrast_exponent(),
        )?;
        let image = chunk.to_rgb_image(&settings.palette);
        let image = imageops::resize(
            &image,
            image.width() * STORE_SCALE,
            image.height() * STORE_SCALE,
            FilterType::Nearest,
        );

        let sample_rate = extractor.sample_rate();
        let mut samples = extractor.extract_audio(request.start_window, request.end_window);
        BandPass::new(sample_rate, request.low_hz, request.high_hz).apply(&mut samples);

        Ok(Self {
            image,
            samples,
            sample_rate,
            captured_at: Local::now(),
        })
    }

    /// `Spectrogram-<local timestamp>`, shared by both files.
    pub fn file_stem(&self) -> String {
        format!("Spectrogram-{}", self.captured_at.format("%Y-%m-%d-%H-%M-%S"))
    }

    /// Write `<stem>.jpg` and `<stem>.wav` into `dir`, creating it if needed.
    pub fn save(&self, dir: &Path) -> Result<ExportedFiles> {
        fs::create_dir_all(dir)?;
        let stem = self.file_stem();
        let image_path = dir.join(format!("{stem}.jpg"));
        let audio_path = dir.join(format!("{stem}.wav"));

        let mut writer = BufWriter::new(File::create(&image_path)?);
        JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY).encode_image(&self.image)?;
        writer.flush()?;

        write_wav(
            BufWriter::new(File::create(&audio_path)?),
            self.sample_rate,
            &self.samples,
        )?;

        info!(
            image = %image_path.display(),
            audio = %audio_path.display(),
            width = self.image.width(),
            height = self.image.height(),
            samples = self.samples.len(),
            "capture saved"
        );
        Ok(ExportedFiles {
            image: image_path,
            audio: audio_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{RingBufferCoordinator, RingHandles};
    use crate::spectrogram::ColourMap;

    fn extractor_with_tone(windows: usize) -> ChunkExtractor {
        let samples_per_window = 64;
        let RingHandles {
            mut producer,
            history,
            ..
        } = RingBufferCoordinator::new(16, samples_per_window).split();
        let mut phase = 0usize;
        for _ in 0..windows {
            let window: Vec<i16> = (0..samples_per_window)
                .map(|_| {
                    phase += 1;
                    (6000.0 * (2.0 * std::f64::consts::PI * 1000.0 * phase as f64 / 16000.0).sin())
                        as i16
                })
                .collect();
            producer.produce_audio(&window);
        }
        ChunkExtractor::new(history, 16000)
    }

    #[test]
    fn test_seconds_to_windows() {
        let extractor = extractor_with_tone(0);
        // 64 samples at 16 kHz is 4 ms per window.
        let request = CaptureRequest::from_seconds(&extractor, 0.010, 0.040, 0.0, 8000.0).unwrap();
        assert_eq!((request.start_window, request.end_window), (2, 10));
    }

    #[test]
    fn test_reversed_seconds_are_rejected() {
        // Six windows in a ring of 16: a reversed range would otherwise wrap
        // through slots that were never written.
        let extractor = extractor_with_tone(6);
        for (start, end) in [(0.016, 0.004), (0.008, 0.008), (f64::NAN, 0.004)] {
            assert!(matches!(
                CaptureRequest::from_seconds(&extractor, start, end, 0.0, 8000.0),
                Err(SpectrogramError::EmptyRange)
            ));
        }
    }

    #[test]
    fn test_capture_dimensions_and_files() {
        let extractor = extractor_with_tone(6);
        let request = CaptureRequest {
            start_window: 1,
            end_window: 5,
            low_hz: 1000.0,
            high_hz: 4000.0,
        };
        let settings = LiveSettings::new(0.3, ColourMap::HotMetal);
        let capture = StoredCapture::from_range(&extractor, &request, &settings).unwrap();

        // Bins 4..16 of 32, four windows, doubled.
        assert_eq!(capture.image.dimensions(), (8, 24));
        assert_eq!(capture.samples.len(), 4 * 64);
        assert!(capture.file_stem().starts_with("Spectrogram-"));

        let dir = std::env::temp_dir().join(format!("spectrogram-export-{}", std::process::id()));
        let files = capture.save(&dir).unwrap();
        assert_eq!(files.image.extension().unwrap(), "jpg");

        let decoded = image::open(&files.image).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (8, 24));

        let reader = hound::WavReader::open(&files.audio).unwrap();
        assert_eq!(reader.spec().sample_rate, 16000);
        assert_eq!(reader.len(), 4 * 64);
    }

    #[test]
    fn test_empty_range_is_rejected() {
        let extractor = extractor_with_tone(4);
        let request = CaptureRequest {
            start_window: 2,
            end_window: 2,
            low_hz: 0.0,
            high_hz: 8000.0,
        };
        let settings = LiveSettings::new(0.0, ColourMap::default());
        assert!(matches!(
            StoredCapture::from_range(&extractor, &request, &settings),
            Err(SpectrogramError::EmptyRange)
        ));
    }
}
