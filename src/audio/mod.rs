// src/audio/mod.rs
//! Audio module - sample sources, export encoding, filtering and playback.

pub mod filter;
pub mod playback;
pub mod sample_capture;
pub mod source;
pub mod wav;

// Re-export commonly used types
pub use filter::BandPass;
pub use playback::ClipPlayer;
pub use sample_capture::MicSource;
pub use source::{read_until_full, BufferSource, FileSource, SampleSource};
pub use wav::{wav_spec, write_wav, HEADER_LEN};
