// src/pipeline/mod.rs
//! The capture → transform → display pipeline and its history.

pub mod extract;
pub mod ring;
pub mod semaphore;
pub mod session;

pub use extract::{to_le_bytes, ChunkExtractor, ChunkImage};
pub use ring::{
    AudioProducer, BitmapConsumer, BitmapRow, BitmapTransformer, RingBufferCoordinator, RingHandles,
    RingHistory,
};
pub use session::Session;
