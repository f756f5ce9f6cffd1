// src/lib.rs
//! Spectrogram - live audio to scrolling spectrogram, with history export.
//!
//! Audio flows from a [`audio::SampleSource`] through a capture thread and a
//! transform thread into fixed-capacity ring buffers, where the display stage
//! reads finished rows and [`pipeline::ChunkExtractor`] reconstructs any past
//! range as an image or as raw audio.

pub mod app;
pub mod audio;
pub mod config;
pub mod error;
pub mod export;
pub mod fs;
pub mod pipeline;
pub mod spectrogram;
pub mod ui;

pub use error::{Result, SpectrogramError};
