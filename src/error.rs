// src/error.rs
//! Error type shared by the library modules.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Everything the capture, transform and export paths can fail with.
#[derive(Debug, Error)]
pub enum SpectrogramError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("capture device error: {0}")]
    CaptureDevice(String),

    #[error("capture source exhausted")]
    SourceExhausted,

    #[error("{} is not an audio file (detected {mime})", path.display())]
    NotAudio { path: PathBuf, mime: String },

    #[error("failed to decode {}: {reason}", path.display())]
    Decode { path: PathBuf, reason: String },

    #[error("frequency bins [{bottom}, {top}) outside [0, {bins})")]
    InvalidBinRange { bottom: usize, top: usize, bins: usize },

    #[error("selected range contains no windows")]
    EmptyRange,

    #[error("slot {index} was overwritten while it was being read")]
    TornRead { index: usize },

    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("WAV encoding failed: {0}")]
    Wav(#[from] hound::Error),

    #[error("playback failed: {0}")]
    Playback(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, SpectrogramError>;
