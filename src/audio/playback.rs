// src/audio/playback.rs
//! Playback of extracted audio through the default output device.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, Sink};
use tracing::{debug, warn};

use crate::error::{Result, SpectrogramError};

/// How often the audio thread checks whether the current clip has finished.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Commands sent to the audio playback thread.
enum PlayerCommand {
    Play { samples: Vec<i16>, sample_rate: u32 },
    Stop,
}

/// Plays mono clips on a background thread, one at a time.
///
/// The output stream lives on its own thread for as long as the player does;
/// starting a clip stops the previous one.
pub struct ClipPlayer {
    cmd_tx: Sender<PlayerCommand>,
    is_playing_flag: Arc<AtomicBool>,
    available: Arc<AtomicBool>,
}

impl ClipPlayer {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel::<PlayerCommand>();
        let is_playing_flag = Arc::new(AtomicBool::new(false));
        let available = Arc::new(AtomicBool::new(true));

        let playing = is_playing_flag.clone();
        let output_ok = available.clone();
        let spawned = thread::Builder::new()
            .name("playback".into())
            .spawn(move || {
                let (stream, handle) = match OutputStream::try_default() {
                    Ok(pair) => pair,
                    Err(err) => {
                        warn!(%err, "no audio output, playback disabled");
                        output_ok.store(false, Ordering::SeqCst);
                        // Drain until the player is dropped.
                        while rx.recv().is_ok() {}
                        return;
                    }
                };
                let mut sink: Option<Sink> = None;

                loop {
                    match rx.recv_timeout(POLL_INTERVAL) {
                        Ok(PlayerCommand::Play {
                            samples,
                            sample_rate,
                        }) => {
                            if let Some(s) = sink.take() {
                                s.stop();
                            }
                            match Sink::try_new(&handle) {
                                Ok(new_sink) => {
                                    debug!(samples = samples.len(), sample_rate, "playing clip");
                                    new_sink.append(SamplesBuffer::new(1, sample_rate, samples));
                                    new_sink.play();
                                    playing.store(true, Ordering::SeqCst);
                                    sink = Some(new_sink);
                                }
                                Err(err) => warn!(%err, "failed to open playback sink"),
                            }
                        }
                        Ok(PlayerCommand::Stop) => {
                            if let Some(s) = sink.take() {
                                s.stop();
                            }
                            playing.store(false, Ordering::SeqCst);
                        }
                        Err(RecvTimeoutError::Timeout) => {
                            if sink.as_ref().is_some_and(Sink::empty) {
                                sink = None;
                                playing.store(false, Ordering::SeqCst);
                            }
                        }
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }

                if let Some(s) = sink.take() {
                    s.stop();
                }
                drop(stream);
            });

        if let Err(err) = spawned {
            warn!(%err, "failed to spawn playback thread");
            available.store(false, Ordering::SeqCst);
        }

        Self {
            cmd_tx: tx,
            is_playing_flag,
            available,
        }
    }

    /// Queue `samples` for playback, replacing whatever is playing.
    pub fn play(&self, samples: Vec<i16>, sample_rate: u32) -> Result<()> {
        if !self.is_available() {
            return Err(SpectrogramError::Playback("no audio output device".into()));
        }
        self.cmd_tx
            .send(PlayerCommand::Play {
                samples,
                sample_rate,
            })
            .map_err(|_| SpectrogramError::Playback("playback thread has exited".into()))
    }

    /// Immediately halt playback (if any).
    pub fn stop(&self) {
        let _ = self.cmd_tx.send(PlayerCommand::Stop);
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing_flag.load(Ordering::SeqCst)
    }

    /// False once the output device failed to open.
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}

impl Default for ClipPlayer {
    fn default() -> Self {
        Self::new()
    }
}
