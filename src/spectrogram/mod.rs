// src/spectrogram/mod.rs
//! Turning audio windows into colour-indexed spectrogram rows.

pub mod normalizer;
pub mod palette;
pub mod stft;

pub use normalizer::{contrast_exponent, AmplitudeNormalizer};
pub use palette::{ColourMap, Palette};
pub use stft::{hamming_window, StftProcessor};
