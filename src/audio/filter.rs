// src/audio/filter.rs
//! Butterworth band-pass applied to exported audio.

use std::f64::consts::PI;

/// Order of each side of the band: a 4th-order high-pass followed by a
/// 4th-order low-pass.
const SIDE_ORDER: usize = 4;

#[derive(Debug, Clone, Copy)]
struct Biquad {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
    z1: f64,
    z2: f64,
}

impl Biquad {
    fn new(b: [f64; 3], a: [f64; 3]) -> Self {
        Self {
            b0: b[0] / a[0],
            b1: b[1] / a[0],
            b2: b[2] / a[0],
            a1: a[1] / a[0],
            a2: a[2] / a[0],
            z1: 0.0,
            z2: 0.0,
        }
    }

    fn low_pass(sample_rate: f64, cutoff: f64, q: f64) -> Self {
        let (cos, alpha) = prewarp(sample_rate, cutoff, q);
        Self::new(
            [(1.0 - cos) / 2.0, 1.0 - cos, (1.0 - cos) / 2.0],
            [1.0 + alpha, -2.0 * cos, 1.0 - alpha],
        )
    }

    fn high_pass(sample_rate: f64, cutoff: f64, q: f64) -> Self {
        let (cos, alpha) = prewarp(sample_rate, cutoff, q);
        Self::new(
            [(1.0 + cos) / 2.0, -(1.0 + cos), (1.0 + cos) / 2.0],
            [1.0 + alpha, -2.0 * cos, 1.0 - alpha],
        )
    }

    // Transposed direct form II.
    fn process(&mut self, x: f64) -> f64 {
        let y = self.b0 * x + self.z1;
        self.z1 = self.b1 * x - self.a1 * y + self.z2;
        self.z2 = self.b2 * x - self.a2 * y;
        y
    }
}

fn prewarp(sample_rate: f64, cutoff: f64, q: f64) -> (f64, f64) {
    let w0 = 2.0 * PI * cutoff / sample_rate;
    (w0.cos(), w0.sin() / (2.0 * q))
}

/// Q of each second-order section of a Butterworth filter of `order`.
fn butterworth_qs(order: usize) -> impl Iterator<Item = f64> {
    (0..order / 2).map(move |k| {
        let theta = PI * (2 * k + 1) as f64 / (2 * order) as f64;
        1.0 / (2.0 * theta.cos())
    })
}

/// Cascade of biquads passing `[low_hz, high_hz]`.
///
/// An edge at or below 0 Hz drops the high-pass half; an edge at or above
/// Nyquist drops the low-pass half. With both dropped the filter is a no-op.
#[derive(Debug, Clone)]
pub struct BandPass {
    sections: Vec<Biquad>,
}

impl BandPass {
    pub fn new(sample_rate: u32, low_hz: f64, high_hz: f64) -> Self {
        let rate = sample_rate as f64;
        let nyquist = rate / 2.0;
        let mut sections = Vec::with_capacity(SIDE_ORDER);

        if low_hz > 0.0 && low_hz < nyquist {
            sections.extend(butterworth_qs(SIDE_ORDER).map(|q| Biquad::high_pass(rate, low_hz, q)));
        }
        if high_hz > 0.0 && high_hz < nyquist {
            sections.extend(butterworth_qs(SIDE_ORDER).map(|q| Biquad::low_pass(rate, high_hz, q)));
        }

        Self { sections }
    }

    pub fn is_passthrough(&self) -> bool {
        self.sections.is_empty()
    }

    /// Filter `samples` in place, saturating at the i16 range.
    pub fn apply(&mut self, samples: &mut [i16]) {
        if self.is_passthrough() {
            return;
        }
        for sample in samples.iter_mut() {
            let mut value = f64::from(*sample);
            for section in &mut self.sections {
                value = section.process(value);
            }
            *sample = value.round().clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16;
        }
    }
}
