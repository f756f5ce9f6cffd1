// src/audio/sample_capture.rs
//! Microphone capture into a circular sample buffer.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use ringbuf::{traits::*, HeapRb};
use rodio::cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rodio::cpal::{self, BufferSize, SampleFormat, SampleRate, StreamConfig};
use tracing::{debug, info, warn};

use super::source::SampleSource;
use crate::error::{Result, SpectrogramError};

/// How long `read` waits for the device before returning zero samples.
const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Samples pushed by the device callback, waiting to be pulled by `read`.
struct CaptureBuffer {
    samples: Mutex<HeapRb<i16>>,
    arrived: Condvar,
}

impl CaptureBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            samples: Mutex::new(HeapRb::new(capacity)),
            arrived: Condvar::new(),
        }
    }

    /// Average interleaved frames to mono and push them, dropping the oldest
    /// samples when the reader has fallen behind.
    fn push_frames<T: Copy>(&self, data: &[T], channels: usize, widen: impl Fn(T) -> i32) {
        let mut buf = self.samples.lock();
        for frame in data.chunks(channels) {
            let sum: i32 = frame.iter().map(|&sample| widen(sample)).sum();
            let mono = (sum / frame.len() as i32) as i16;
            if buf.is_full() {
                let _ = buf.try_pop();
            }
            let _ = buf.try_push(mono);
        }
        self.arrived.notify_one();
    }
}

/// Live microphone input.
///
/// The cpal stream is owned by a keeper thread, since streams cannot move
/// between threads on every platform. Dropping the source stops the stream.
pub struct MicSource {
    buffer: Arc<CaptureBuffer>,
    sample_rate: u32,
    stop_tx: Option<mpsc::Sender<()>>,
    keeper: Option<JoinHandle<()>>,
}

impl MicSource {
    /// Open the default input device at `sample_rate`.
    ///
    /// Returns once the stream is running, or with the device error.
    pub fn open(sample_rate: u32) -> Result<Self> {
        let buffer = Arc::new(CaptureBuffer::new(sample_rate as usize));
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<()>>(1);
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let keeper_buffer = buffer.clone();
        let keeper = thread::Builder::new()
            .name("mic-stream".into())
            .spawn(move || {
                let stream = match build_stream(sample_rate, keeper_buffer) {
                    Ok(stream) => stream,
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                // Blocks until a stop message or the sender is dropped.
                let _ = stop_rx.recv();
                drop(stream);
                debug!("microphone stream closed");
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                let _ = keeper.join();
                return Err(err);
            }
            Err(_) => {
                return Err(SpectrogramError::CaptureDevice(
                    "stream thread exited before starting".into(),
                ));
            }
        }

        info!(sample_rate, "microphone capture started");
        Ok(Self {
            buffer,
            sample_rate,
            stop_tx: Some(stop_tx),
            keeper: Some(keeper),
        })
    }
}

fn device_error(err: impl std::fmt::Display) -> SpectrogramError {
    SpectrogramError::CaptureDevice(err.to_string())
}

fn build_stream(sample_rate: u32, buffer: Arc<CaptureBuffer>) -> Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| SpectrogramError::CaptureDevice("no default input device".into()))?;
    let supported = device.default_input_config().map_err(device_error)?;

    let channels = supported.channels().max(1);
    let config = StreamConfig {
        channels,
        sample_rate: SampleRate(sample_rate),
        buffer_size: BufferSize::Default,
    };
    let channels = usize::from(channels);
    debug!(
        device = %device.name().unwrap_or_default(),
        channels,
        format = ?supported.sample_format(),
        "configuring input stream"
    );

    let on_error = |err: cpal::StreamError| warn!(%err, "input stream error");
    let stream = match supported.sample_format() {
        SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                buffer.push_frames(data, channels, i32::from)
            },
            on_error,
            None,
        ),
        SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                buffer.push_frames(data, channels, |sample| {
                    (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i32
                })
            },
            on_error,
            None,
        ),
        other => {
            return Err(SpectrogramError::CaptureDevice(format!(
                "unsupported sample format {other:?}"
            )));
        }
    }
    .map_err(device_error)?;

    stream.play().map_err(device_error)?;
    Ok(stream)
}

impl SampleSource for MicSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read(&mut self, dest: &mut [i16]) -> Result<usize> {
        let mut buf = self.buffer.samples.lock();
        if buf.is_empty() {
            self.buffer.arrived.wait_for(&mut buf, READ_TIMEOUT);
        }
        Ok(buf.pop_slice(dest))
    }
}

impl Drop for MicSource {
    fn drop(&mut self) {
        self.stop_tx.take();
        if let Some(keeper) = self.keeper.take() {
            let _ = keeper.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_frames_downmixes_and_drops_oldest() {
        let buffer = CaptureBuffer::new(3);
        buffer.push_frames(&[10i16, 30, -20, -40], 2, i32::from);
        buffer.push_frames(&[1i16, 1, 2, 2, 3, 3], 2, i32::from);

        let mut out = [0i16; 4];
        let read = buffer.samples.lock().pop_slice(&mut out);
        assert_eq!(&out[..read], &[1, 2, 3]);
    }

    #[test]
    fn test_float_frames_scale_to_i16() {
        let buffer = CaptureBuffer::new(4);
        buffer.push_frames(&[1.0f32, -1.0, 0.5, 2.0], 1, |s| {
            (s.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i32
        });
        let mut out = [0i16; 4];
        buffer.samples.lock().pop_slice(&mut out);
        assert_eq!(out, [i16::MAX, -i16::MAX, 16383, i16::MAX]);
    }
}
