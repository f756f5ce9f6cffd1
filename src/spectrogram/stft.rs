// src/spectrogram/stft.rs
//! Short-time Fourier transform of one audio window into one bitmap row.

use std::f64::consts::PI;
use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use super::normalizer::AmplitudeNormalizer;

/// Hamming coefficients `0.54 - 0.46 cos(2πn / (L - 1))` for `n` in `[0, L)`.
pub fn hamming_window(len: usize) -> Vec<f64> {
    if len < 2 {
        return vec![1.0; len];
    }
    let denom = (len - 1) as f64;
    (0..len)
        .map(|n| 0.54 - 0.46 * (2.0 * PI * n as f64 / denom).cos())
        .collect()
}

/// Windows, transforms, smooths and colour-maps audio windows.
///
/// Every buffer is sized at construction; `process` does not allocate. The
/// processor carries the previous window's power spectrum between calls, so
/// one instance must only ever be fed a single chronological stream.
pub struct StftProcessor {
    samples_per_window: usize,
    num_freq_bins: usize,
    /// Precomputed Hamming coefficients
    window: Vec<f64>,
    fft: Arc<dyn Fft<f64>>,
    buffer: Vec<Complex<f64>>,
    scratch: Vec<Complex<f64>>,
    /// Power of the window processed last, used for two-window smoothing
    previous_power: Vec<f64>,
    /// `power + previous_power` for the window processed last
    combined: Vec<f64>,
    row: Vec<u8>,
    normalizer: AmplitudeNormalizer,
}

impl StftProcessor {
    pub fn new(samples_per_window: usize, normalizer: AmplitudeNormalizer) -> Self {
        let num_freq_bins = samples_per_window / 2;
        let fft = FftPlanner::<f64>::new().plan_fft_forward(samples_per_window);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        Self {
            samples_per_window,
            num_freq_bins,
            window: hamming_window(samples_per_window),
            fft,
            buffer: vec![Complex::new(0.0, 0.0); samples_per_window],
            scratch,
            previous_power: vec![0.0; num_freq_bins],
            combined: vec![0.0; num_freq_bins],
            row: vec![0; num_freq_bins],
            normalizer,
        }
    }

    pub fn samples_per_window(&self) -> usize {
        self.samples_per_window
    }

    pub fn num_freq_bins(&self) -> usize {
        self.num_freq_bins
    }

    pub fn normalizer(&self) -> &AmplitudeNormalizer {
        &self.normalizer
    }

    pub fn normalizer_mut(&mut self) -> &mut AmplitudeNormalizer {
        &mut self.normalizer
    }

    /// Multiply `samples` element-wise by the Hamming window.
    pub fn apply_window(&self, samples: &mut [f64]) {
        for (sample, coefficient) in samples.iter_mut().zip(&self.window) {
            *sample *= coefficient;
        }
    }

    /// Power spectrum of the window processed last, before smoothing.
    pub fn last_power(&self) -> &[f64] {
        &self.previous_power
    }

    /// Forget the carried spectrum so the next window is treated as the first.
    pub fn reset_history(&mut self) {
        self.previous_power.fill(0.0);
    }

    /// Transform one window and return the smoothed power per bin, lowest
    /// frequency first.
    pub fn power_spectrum(&mut self, samples: &[i16]) -> &[f64] {
        debug_assert_eq!(samples.len(), self.samples_per_window);

        for ((slot, &sample), &coefficient) in
            self.buffer.iter_mut().zip(samples).zip(&self.window)
        {
            *slot = Complex::new(f64::from(sample) * coefficient, 0.0);
        }
        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        // Bins above L/2 mirror the lower half for real input.
        for k in 0..self.num_freq_bins {
            let bin = self.buffer[k];
            let power = bin.re * bin.re + bin.im * bin.im;
            self.combined[k] = power + self.previous_power[k];
            self.previous_power[k] = power;
        }

        &self.combined
    }

    /// Transform one window into a row of colour indices.
    ///
    /// Index 0 of the returned row is the highest frequency bin, matching a
    /// display whose first pixel row is at the top.
    pub fn process(&mut self, samples: &[i16]) -> &[u8] {
        self.power_spectrum(samples);

        let bins = self.num_freq_bins;
        for k in 0..bins {
            self.row[bins - k - 1] = self.normalizer.cap_value(self.combined[k]);
        }

        &self.row
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(len: usize, bin: usize, amplitude: f64) -> Vec<i16> {
        (0..len)
            .map(|n| (amplitude * (2.0 * PI * (bin * n) as f64 / len as f64).sin()) as i16)
            .collect()
    }

    #[test]
    fn test_hamming_matches_closed_form() {
        for len in [2usize, 7, 300, 512] {
            let processor = StftProcessor::new(len, AmplitudeNormalizer::default());
            let mut ones = vec![1.0; len];
            processor.apply_window(&mut ones);
            for (n, value) in ones.iter().enumerate() {
                let expected = 0.54 - 0.46 * (2.0 * PI * n as f64 / (len - 1) as f64).cos();
                assert!((value - expected).abs() < 1e-9, "n={n} len={len}");
            }
        }
    }

    #[test]
    fn test_hamming_is_symmetric_with_low_edges() {
        let window = hamming_window(300);
        assert!((window[0] - 0.08).abs() < 1e-12);
        assert!((window[299] - 0.08).abs() < 1e-12);
        for n in 0..150 {
            assert!((window[n] - window[299 - n]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_first_window_is_not_smoothed() {
        let mut processor = StftProcessor::new(64, AmplitudeNormalizer::default());
        let window = sine(64, 5, 8000.0);
        let combined = processor.power_spectrum(&window).to_vec();
        assert_eq!(combined, processor.last_power());
    }

    #[test]
    fn test_smoothing_sums_consecutive_windows() {
        let first = sine(64, 5, 8000.0);
        let second = sine(64, 12, 3000.0);

        let mut alone = StftProcessor::new(64, AmplitudeNormalizer::default());
        let power_first = alone.power_spectrum(&first).to_vec();
        alone.reset_history();
        let power_second = alone.power_spectrum(&second).to_vec();

        let mut chained = StftProcessor::new(64, AmplitudeNormalizer::default());
        chained.power_spectrum(&first);
        let combined = chained.power_spectrum(&second).to_vec();

        for k in 0..32 {
            let expected = power_first[k] + power_second[k];
            assert!(
                (combined[k] - expected).abs() <= 1e-6 * expected.max(1.0),
                "bin {k}: {} vs {}",
                combined[k],
                expected
            );
        }
        assert_eq!(chained.last_power(), &power_second[..]);
    }

    #[test]
    fn test_sine_peaks_in_its_bin() {
        let mut processor = StftProcessor::new(128, AmplitudeNormalizer::default());
        let power = processor.power_spectrum(&sine(128, 20, 10000.0)).to_vec();
        let peak = power
            .iter()
            .enumerate()
            .fold((0, f64::MIN), |best, (k, &p)| if p > best.1 { (k, p) } else { best })
            .0;
        assert_eq!(peak, 20);
        assert_eq!(power.len(), 64);
    }

    #[test]
    fn test_row_is_frequency_reversed() {
        let mut processor = StftProcessor::new(128, AmplitudeNormalizer::new(2.0));
        let row = processor.process(&sine(128, 20, 10000.0)).to_vec();
        assert_eq!(row.len(), 64);
        // The peak bin is the first value above running_max, so it saturates.
        assert_eq!(row[64 - 20 - 1], 255);
        // Bins above the peak come after it and can no longer raise the max.
        assert!(row[..64 - 20 - 1].iter().all(|&v| v < 255));
    }

    #[test]
    fn test_silence_is_black() {
        let mut processor = StftProcessor::new(300, AmplitudeNormalizer::default());
        let row = processor.process(&[0i16; 300]);
        assert!(row.iter().all(|&v| v == 0));
    }
}
