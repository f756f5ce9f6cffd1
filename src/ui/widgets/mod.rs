// src/ui/widgets/mod.rs
//! Custom widgets for the spectrogram UI.

pub mod spectrogram;
pub mod status;

// Re-export widget rendering functions
pub use spectrogram::{render_spectrogram, SpectrogramWidget};
pub use status::{render_status, StatusInfo};
