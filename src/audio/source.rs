// src/audio/source.rs
//! Pull-based sample sources feeding the capture stage.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use rodio::{Decoder, Source};
use tracing::{debug, info};

use crate::error::{Result, SpectrogramError};
use crate::fs::ensure_audio_file;

/// Anything the capture stage can pull mono 16-bit samples from.
pub trait SampleSource: Send {
    fn sample_rate(&self) -> u32;

    /// Copy up to `dest.len()` samples into `dest` and return how many were
    /// written. `Ok(0)` means nothing is available yet; the end of a finite
    /// source is [`SpectrogramError::SourceExhausted`].
    fn read(&mut self, dest: &mut [i16]) -> Result<usize>;
}

impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn read(&mut self, dest: &mut [i16]) -> Result<usize> {
        (**self).read(dest)
    }
}

/// Read from `source` until `window` is full.
///
/// Returns `Ok(false)` if `running` was cleared first. A finite source that
/// ends part-way through a window has the remainder zero-filled; the next call
/// reports [`SpectrogramError::SourceExhausted`].
pub fn read_until_full<S>(source: &mut S, window: &mut [i16], running: &AtomicBool) -> Result<bool>
where
    S: SampleSource + ?Sized,
{
    let mut filled = 0;
    while filled < window.len() {
        if !running.load(Ordering::Relaxed) {
            return Ok(false);
        }
        match source.read(&mut window[filled..]) {
            Ok(read) => filled += read,
            Err(SpectrogramError::SourceExhausted) if filled > 0 => {
                debug!(filled, "source ended mid-window, padding with silence");
                window[filled..].fill(0);
                return Ok(true);
            }
            Err(err) => return Err(err),
        }
    }
    Ok(true)
}

/// Finite in-memory source, handed out in chunks of at most `chunk` samples.
pub struct BufferSource {
    samples: Vec<i16>,
    position: usize,
    sample_rate: u32,
    chunk: usize,
}

impl BufferSource {
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            position: 0,
            sample_rate,
            chunk: usize::MAX,
        }
    }

    /// Limit how much one `read` returns, mimicking a device delivering
    /// small buffers.
    pub fn with_chunk(mut self, chunk: usize) -> Self {
        self.chunk = chunk.max(1);
        self
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl SampleSource for BufferSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read(&mut self, dest: &mut [i16]) -> Result<usize> {
        let remaining = &self.samples[self.position..];
        if remaining.is_empty() {
            return Err(SpectrogramError::SourceExhausted);
        }
        let count = dest.len().min(remaining.len()).min(self.chunk);
        dest[..count].copy_from_slice(&remaining[..count]);
        self.position += count;
        Ok(count)
    }
}

/// Decoded audio file, downmixed to mono.
///
/// With `realtime` set, reads are paced to the file's sample rate so the
/// display scrolls as it would for live input.
pub struct FileSource {
    decoder: Decoder<BufReader<File>>,
    channels: usize,
    sample_rate: u32,
    realtime: bool,
    started: Option<Instant>,
    delivered: u64,
}

impl FileSource {
    pub fn open(path: &Path, realtime: bool) -> Result<Self> {
        let file_type = ensure_audio_file(path)?;
        let file = File::open(path)?;
        let decoder = Decoder::new(BufReader::new(file)).map_err(|err| SpectrogramError::Decode {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;

        let channels = usize::from(decoder.channels().max(1));
        let sample_rate = decoder.sample_rate();
        info!(
            path = %path.display(),
            mime = %file_type.mime,
            channels,
            sample_rate,
            realtime,
            "opened audio file"
        );

        Ok(Self {
            decoder,
            channels,
            sample_rate,
            realtime,
            started: None,
            delivered: 0,
        })
    }

    /// Decode the whole file into memory.
    pub fn read_all(mut self) -> Result<Vec<i16>> {
        self.realtime = false;
        let mut samples = Vec::new();
        let mut chunk = vec![0i16; 4096];
        loop {
            match self.read(&mut chunk) {
                Ok(read) => samples.extend_from_slice(&chunk[..read]),
                Err(SpectrogramError::SourceExhausted) => return Ok(samples),
                Err(err) => return Err(err),
            }
        }
    }

    fn next_frame(&mut self) -> Option<i16> {
        let mut sum = 0i32;
        let mut read = 0i32;
        for _ in 0..self.channels {
            match self.decoder.next() {
                Some(sample) => {
                    sum += i32::from(sample);
                    read += 1;
                }
                None => break,
            }
        }
        // A truncated final frame averages only the samples it has.
        (read > 0).then(|| (sum / read) as i16)
    }

    fn pace(&mut self) {
        let started = *self.started.get_or_insert_with(Instant::now);
        let due = Duration::from_secs_f64(self.delivered as f64 / self.sample_rate as f64);
        if let Some(wait) = due.checked_sub(started.elapsed()) {
            thread::sleep(wait);
        }
    }
}

impl SampleSource for FileSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read(&mut self, dest: &mut [i16]) -> Result<usize> {
        let mut count = 0;
        for slot in dest.iter_mut() {
            match self.next_frame() {
                Some(sample) => {
                    *slot = sample;
                    count += 1;
                }
                None => break,
            }
        }
        if count == 0 && !dest.is_empty() {
            return Err(SpectrogramError::SourceExhausted);
        }
        self.delivered += count as u64;
        if self.realtime {
            self.pace();
        }
        Ok(count)
    }
}
