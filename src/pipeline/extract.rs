// src/pipeline/extract.rs
//! Reconstructing past time/frequency ranges from the ring buffers.

use image::{Rgb, RgbImage};
use tracing::{debug, warn};

use super::ring::RingHistory;
use crate::error::{Result, SpectrogramError};
use crate::spectrogram::{AmplitudeNormalizer, Palette, StftProcessor};

/// Colour indices of an extracted range, row-major with the highest
/// frequency in row 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkImage {
    pub width: usize,
    pub height: usize,
    pub indices: Vec<u8>,
}

impl ChunkImage {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn index_at(&self, x: usize, y: usize) -> u8 {
        self.indices[y * self.width + x]
    }

    pub fn to_rgb_image(&self, palette: &Palette) -> RgbImage {
        RgbImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            let colour: Rgb<u8> = palette.colour(self.index_at(x as usize, y as usize));
            colour
        })
    }
}

/// Serialise samples as little-endian 16-bit PCM.
pub fn to_le_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|sample| sample.to_le_bytes()).collect()
}

/// Reads chronological ranges `[start, end)` out of the ring history.
///
/// `end < start` means the range crosses the end of the ring. Indices are
/// reduced modulo capacity first. Nothing here is locked against the live
/// stages, so a range that is being overwritten comes back partly new.
#[derive(Clone)]
pub struct ChunkExtractor {
    history: RingHistory,
    sample_rate: u32,
}

impl ChunkExtractor {
    pub fn new(history: RingHistory, sample_rate: u32) -> Self {
        Self {
            history,
            sample_rate,
        }
    }

    pub fn history(&self) -> &RingHistory {
        &self.history
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of windows covered by `[start, end)`.
    pub fn window_count(&self, start: usize, end: usize) -> usize {
        let capacity = self.history.capacity();
        let (start, end) = (start % capacity, end % capacity);
        if end < start {
            capacity - start + end
        } else {
            end - start
        }
    }

    /// Slot indices of `[start, end)` in chronological order.
    fn slots(&self, start: usize, end: usize) -> impl Iterator<Item = usize> {
        let capacity = self.history.capacity();
        let (start, end) = (start % capacity, end % capacity);
        let (first, second) = if end < start {
            (start..capacity, 0..end)
        } else {
            (start..end, 0..0)
        };
        first.chain(second)
    }

    /// Frequency bin containing `hz`, clamped to `[0, num_freq_bins]`.
    pub fn hz_to_bin(&self, hz: f64) -> usize {
        let bins = self.history.num_freq_bins();
        let bin = (2.0 * hz / self.sample_rate as f64 * bins as f64).floor();
        if bin.is_nan() || bin < 0.0 {
            0
        } else {
            (bin as usize).min(bins)
        }
    }

    /// Lower edge frequency of `bin`.
    pub fn bin_to_hz(&self, bin: usize) -> f64 {
        bin as f64 * self.sample_rate as f64 / (2.0 * self.history.num_freq_bins() as f64)
    }

    fn check_bins(&self, bottom_bin: usize, top_bin: usize) -> Result<()> {
        let bins = self.history.num_freq_bins();
        if bottom_bin >= top_bin || top_bin > bins {
            return Err(SpectrogramError::InvalidBinRange {
                bottom: bottom_bin,
                top: top_bin,
                bins,
            });
        }
        Ok(())
    }

    /// Raw samples of `[start, end)` concatenated chronologically.
    pub fn extract_audio(&self, start: usize, end: usize) -> Vec<i16> {
        let samples_per_window = self.history.samples_per_window();
        let mut samples = vec![0i16; self.window_count(start, end) * samples_per_window];

        for (chunk, slot) in samples
            .chunks_exact_mut(samples_per_window)
            .zip(self.slots(start, end))
        {
            if let Err(err) = self.history.read_audio_window(slot, chunk) {
                warn!(%err, "window changed while extracting audio");
            }
        }
        samples
    }

    /// Re-render `[start, end)` restricted to bins `[bottom_bin, top_bin)`.
    ///
    /// The transform is recomputed from stored audio with a fresh processor.
    /// The whole image shares one normalisation whose maximum is the loudest
    /// smoothed power in the range, so the first columns are not saturated.
    pub fn extract_image(
        &self,
        start: usize,
        end: usize,
        bottom_bin: usize,
        top_bin: usize,
        contrast_exponent: f64,
    ) -> Result<ChunkImage> {
        self.check_bins(bottom_bin, top_bin)?;

        let samples_per_window = self.history.samples_per_window();
        let width = self.window_count(start, end);
        let height = top_bin - bottom_bin;

        let mut processor =
            StftProcessor::new(samples_per_window, AmplitudeNormalizer::new(contrast_exponent));
        let mut window = vec![0i16; samples_per_window];
        let mut powers = Vec::with_capacity(width * height);
        let mut peak = 0.0f64;

        for slot in self.slots(start, end) {
            if let Err(err) = self.history.read_audio_window(slot, &mut window) {
                warn!(%err, "window changed while extracting image");
            }
            let combined = processor.power_spectrum(&window);
            for &power in &combined[bottom_bin..top_bin] {
                peak = peak.max(power);
                powers.push(power);
            }
        }

        let mut normalizer = AmplitudeNormalizer::primed(contrast_exponent, peak);
        let mut indices = vec![0u8; width * height];
        for (x, column) in powers.chunks_exact(height.max(1)).enumerate() {
            for (j, &power) in column.iter().enumerate() {
                let y = height - j - 1;
                indices[y * width + x] = normalizer.cap_value(power);
            }
        }

        debug!(start, end, width, height, peak, "extracted image chunk");
        Ok(ChunkImage {
            width,
            height,
            indices,
        })
    }
}
