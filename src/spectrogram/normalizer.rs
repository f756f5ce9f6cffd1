// src/spectrogram/normalizer.rs
//! Adaptive mapping from spectral power to an 8-bit colour index.

/// Lowest and highest contrast exponents reachable from a `[0, 1]` preference.
pub const MIN_CONTRAST_EXPONENT: f64 = 1.0;
pub const MAX_CONTRAST_EXPONENT: f64 = 4.0;

/// Turn a raw contrast preference in `[0, 1]` into an exponent in `[1, 4]`.
pub fn contrast_exponent(preference: f64) -> f64 {
    let preference = if preference.is_nan() { 0.0 } else { preference.clamp(0.0, 1.0) };
    preference * 3.0 + 1.0
}

/// Log-compresses power relative to the loudest value seen so far, then
/// reshapes it with a contrast exponent.
///
/// `running_max` only ever grows, so rows coloured earlier in a session are
/// never reinterpreted when a louder peak arrives.
#[derive(Debug, Clone)]
pub struct AmplitudeNormalizer {
    running_max: f64,
    contrast_exponent: f64,
}

impl AmplitudeNormalizer {
    pub fn new(contrast_exponent: f64) -> Self {
        Self {
            running_max: 1.0,
            contrast_exponent: clamp_exponent(contrast_exponent),
        }
    }

    /// Build a normalizer that already treats `peak` as the loudest value.
    pub fn primed(contrast_exponent: f64, peak: f64) -> Self {
        let mut normalizer = Self::new(contrast_exponent);
        if peak.is_finite() && peak > normalizer.running_max {
            normalizer.running_max = peak;
        }
        normalizer
    }

    pub fn running_max(&self) -> f64 {
        self.running_max
    }

    pub fn contrast_exponent(&self) -> f64 {
        self.contrast_exponent
    }

    pub fn set_contrast_exponent(&mut self, exponent: f64) {
        self.contrast_exponent = clamp_exponent(exponent);
    }

    /// Map one power value to a colour index in `[0, 255]`.
    pub fn cap_value(&mut self, power: f64) -> u8 {
        // NaN fails every comparison below, so catch it with the negatives.
        if power.is_nan() || power < 0.0 {
            return 0;
        }
        if power > self.running_max {
            self.running_max = power;
            return 255;
        }
        let ratio = power.ln_1p() / self.running_max.ln_1p();
        let scaled = (255.0 * ratio.powf(self.contrast_exponent)).floor();
        scaled.clamp(0.0, 255.0) as u8
    }
}

impl Default for AmplitudeNormalizer {
    fn default() -> Self {
        Self::new(contrast_exponent(1.0 / 3.0))
    }
}

fn clamp_exponent(exponent: f64) -> f64 {
    if exponent.is_nan() {
        MIN_CONTRAST_EXPONENT
    } else {
        exponent.clamp(MIN_CONTRAST_EXPONENT, MAX_CONTRAST_EXPONENT)
    }
}
