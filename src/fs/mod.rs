// src/fs/mod.rs
//! Filesystem helpers: input type detection.

pub mod detection;

pub use detection::{detect_file_type, ensure_audio_file, FileCategory, FileType};
