// src/pipeline/session.rs
//! Wiring a sample source through the capture and transform threads.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use super::extract::ChunkExtractor;
use super::ring::{
    AudioProducer, BitmapConsumer, BitmapTransformer, RingBufferCoordinator, RingHandles,
    RingHistory,
};
use crate::audio::{read_until_full, SampleSource};
use crate::config::{SharedSettings, SpectrogramConfig};
use crate::error::{Result, SpectrogramError};
use crate::spectrogram::{AmplitudeNormalizer, StftProcessor};

/// Bound on every blocking wait inside the workers, so a cleared run flag is
/// noticed promptly.
const WORKER_POLL: Duration = Duration::from_millis(100);

/// A running capture-to-bitmap pipeline.
///
/// The caller's thread is the display stage: it drains rows through
/// [`consumer`](Self::consumer) and reads history through
/// [`extractor`](Self::extractor).
pub struct Session {
    config: SpectrogramConfig,
    settings: SharedSettings,
    running: Arc<AtomicBool>,
    source_finished: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
    consumer: BitmapConsumer,
    history: RingHistory,
    extractor: ChunkExtractor,
}

impl Session {
    /// Validate `config`, allocate the rings and start both workers.
    ///
    /// The source's own sample rate wins over `config.sample_rate`.
    pub fn start<S>(mut config: SpectrogramConfig, source: S, settings: SharedSettings) -> Result<Self>
    where
        S: SampleSource + 'static,
    {
        config.sample_rate = source.sample_rate();
        config.validate()?;

        let RingHandles {
            producer,
            transformer,
            consumer,
            history,
        } = RingBufferCoordinator::new(config.capacity, config.samples_per_window).split();

        let running = Arc::new(AtomicBool::new(true));
        let source_finished = Arc::new(AtomicBool::new(false));
        let mut workers = Vec::with_capacity(2);

        let capture = {
            let running = running.clone();
            let finished = source_finished.clone();
            thread::Builder::new()
                .name("capture".into())
                .spawn(move || capture_loop(source, producer, &running, &finished))?
        };
        workers.push(capture);

        let transform = {
            let running = running.clone();
            let settings = settings.clone();
            let samples_per_window = config.samples_per_window;
            thread::Builder::new()
                .name("transform".into())
                .spawn(move || transform_loop(transformer, samples_per_window, &settings, &running))
        };
        match transform {
            Ok(handle) => workers.push(handle),
            Err(err) => {
                running.store(false, Ordering::SeqCst);
                for worker in workers {
                    let _ = worker.join();
                }
                return Err(err.into());
            }
        }

        info!(
            sample_rate = config.sample_rate,
            samples_per_window = config.samples_per_window,
            capacity = config.capacity,
            history_secs = config.history_duration().as_secs_f64(),
            "session started"
        );

        let extractor = ChunkExtractor::new(history.clone(), config.sample_rate);
        Ok(Self {
            config,
            settings,
            running,
            source_finished,
            workers,
            consumer,
            history,
            extractor,
        })
    }

    pub fn config(&self) -> &SpectrogramConfig {
        &self.config
    }

    pub fn settings(&self) -> &SharedSettings {
        &self.settings
    }

    /// Display-stage handle; owns the read cursor.
    pub fn consumer(&mut self) -> &mut BitmapConsumer {
        &mut self.consumer
    }

    pub fn history(&self) -> &RingHistory {
        &self.history
    }

    pub fn extractor(&self) -> &ChunkExtractor {
        &self.extractor
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// True once a finite source has delivered its last window.
    pub fn source_finished(&self) -> bool {
        self.source_finished.load(Ordering::SeqCst)
    }

    /// Wait until the source has ended and every produced window has been
    /// transformed. Returns `false` on timeout.
    pub fn wait_until_drained(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.source_finished()
                && self.history.windows_transformed() >= self.history.windows_produced()
            {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    /// Clear the run flag and join both workers. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        self.running.store(false, Ordering::SeqCst);
        for worker in self.workers.drain(..) {
            let name = worker.thread().name().unwrap_or("worker").to_string();
            if worker.join().is_err() {
                error!(thread = %name, "worker panicked");
            }
        }
        info!(
            produced = self.history.windows_produced(),
            transformed = self.history.windows_transformed(),
            "session stopped"
        );
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop();
    }
}

fn capture_loop<S: SampleSource>(
    mut source: S,
    mut producer: AudioProducer,
    running: &AtomicBool,
    finished: &AtomicBool,
) {
    let mut window = vec![0i16; producer.samples_per_window()];
    while running.load(Ordering::Relaxed) {
        match read_until_full(&mut source, &mut window, running) {
            Ok(true) => producer.produce_audio(&window),
            Ok(false) => break,
            Err(SpectrogramError::SourceExhausted) => {
                info!("capture source exhausted");
                break;
            }
            Err(err) => {
                warn!(%err, "capture failed, stopping capture");
                break;
            }
        }
    }
    finished.store(true, Ordering::SeqCst);
}

fn transform_loop(
    mut transformer: BitmapTransformer,
    samples_per_window: usize,
    settings: &SharedSettings,
    running: &AtomicBool,
) {
    let initial = settings.load();
    let mut processor = StftProcessor::new(
        samples_per_window,
        AmplitudeNormalizer::new(initial.contrast_exponent()),
    );

    while running.load(Ordering::Relaxed) {
        // One snapshot per window; a change lands on the next row.
        let snapshot = settings.load();
        processor
            .normalizer_mut()
            .set_contrast_exponent(snapshot.contrast_exponent());
        transformer.try_consume_audio_and_produce_bitmap(&mut processor, WORKER_POLL);
    }
}
