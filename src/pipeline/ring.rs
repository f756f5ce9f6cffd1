// src/pipeline/ring.rs
//! Parallel circular stores of audio windows and bitmap rows.
//!
//! The coordinator is split once into single-owner handles, one per stage:
//!
//! - [`AudioProducer`] (capture thread) owns `write_index`
//! - [`BitmapTransformer`] (transform thread) owns `transform_index`
//! - [`BitmapConsumer`] (display) owns `read_index`
//! - [`RingHistory`] is a cloneable read view for range queries and export
//!
//! The producer never waits: a full ring silently overwrites its oldest slot.
//! Each slot carries a generation counter that is odd while the slot is being
//! written, so readers that race a writer can tell their copy is torn.

use std::sync::atomic::{fence, AtomicBool, AtomicI16, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace, warn};

use super::semaphore::Semaphore;
use crate::error::{Result, SpectrogramError};
use crate::spectrogram::StftProcessor;

/// How long a blocking consumer sleeps before logging and waiting again.
const ACQUIRE_POLL: Duration = Duration::from_millis(250);

struct RingStore {
    capacity: usize,
    samples_per_window: usize,
    num_freq_bins: usize,
    audio: Box<[AtomicI16]>,
    bitmaps: Box<[AtomicU8]>,
    audio_generations: Box<[AtomicU64]>,
    bitmap_generations: Box<[AtomicU64]>,
    write_index: AtomicUsize,
    transform_index: AtomicUsize,
    read_index: AtomicUsize,
    oldest_valid_index: AtomicUsize,
    wrapped: AtomicBool,
    windows_produced: AtomicU64,
    windows_transformed: AtomicU64,
    audio_ready: Semaphore,
    bitmap_ready: Semaphore,
}

impl RingStore {
    fn audio_slot(&self, index: usize) -> &[AtomicI16] {
        let start = index * self.samples_per_window;
        &self.audio[start..start + self.samples_per_window]
    }

    fn bitmap_slot(&self, index: usize) -> &[AtomicU8] {
        let start = index * self.num_freq_bins;
        &self.bitmaps[start..start + self.num_freq_bins]
    }
}

fn atomic_slice<T>(len: usize, make: impl Fn() -> T) -> Box<[T]> {
    (0..len).map(|_| make()).collect()
}

/// Mark a slot as being written. Only the owning stage calls this.
fn begin_write(generation: &AtomicU64) -> u64 {
    let current = generation.load(Ordering::Relaxed);
    generation.store(current + 1, Ordering::Relaxed);
    fence(Ordering::Release);
    current
}

fn end_write(generation: &AtomicU64, started_at: u64) {
    generation.store(started_at + 2, Ordering::Release);
}

/// Copy a slot out, reporting whether a writer touched it meanwhile.
fn read_slot<A, T>(
    cells: &[A],
    generation: &AtomicU64,
    expected: Option<u64>,
    dest: &mut [T],
    load: impl Fn(&A) -> T,
) -> bool {
    let before = generation.load(Ordering::Acquire);
    for (out, cell) in dest.iter_mut().zip(cells) {
        *out = load(cell);
    }
    fence(Ordering::Acquire);
    let after = generation.load(Ordering::Relaxed);
    before % 2 == 0 && before == after && expected.is_none_or(|seen| seen == before)
}

/// Owner of the ring allocations before the stages are handed out.
pub struct RingBufferCoordinator {
    store: Arc<RingStore>,
}

/// The four views produced by [`RingBufferCoordinator::split`].
pub struct RingHandles {
    pub producer: AudioProducer,
    pub transformer: BitmapTransformer,
    pub consumer: BitmapConsumer,
    pub history: RingHistory,
}

impl RingBufferCoordinator {
    /// Allocate `capacity` audio windows and bitmap rows up front.
    pub fn new(capacity: usize, samples_per_window: usize) -> Self {
        let num_freq_bins = samples_per_window / 2;
        let store = RingStore {
            capacity,
            samples_per_window,
            num_freq_bins,
            audio: atomic_slice(capacity * samples_per_window, || AtomicI16::new(0)),
            bitmaps: atomic_slice(capacity * num_freq_bins, || AtomicU8::new(0)),
            audio_generations: atomic_slice(capacity, || AtomicU64::new(0)),
            bitmap_generations: atomic_slice(capacity, || AtomicU64::new(0)),
            write_index: AtomicUsize::new(0),
            transform_index: AtomicUsize::new(0),
            read_index: AtomicUsize::new(0),
            oldest_valid_index: AtomicUsize::new(0),
            wrapped: AtomicBool::new(false),
            windows_produced: AtomicU64::new(0),
            windows_transformed: AtomicU64::new(0),
            audio_ready: Semaphore::new(0),
            bitmap_ready: Semaphore::new(0),
        };
        debug!(
            capacity,
            samples_per_window, num_freq_bins, "allocated ring buffers"
        );
        Self {
            store: Arc::new(store),
        }
    }

    /// Hand out one handle per stage. Each cursor ends up with exactly one owner.
    pub fn split(self) -> RingHandles {
        let samples_per_window = self.store.samples_per_window;
        RingHandles {
            producer: AudioProducer {
                store: self.store.clone(),
                write_index: 0,
            },
            transformer: BitmapTransformer {
                store: self.store.clone(),
                transform_index: 0,
                wrapped: false,
                oldest_valid_index: 0,
                samples: vec![0; samples_per_window],
            },
            consumer: BitmapConsumer {
                store: self.store.clone(),
                read_index: 0,
            },
            history: RingHistory { store: self.store },
        }
    }
}

/// Capture-side handle.
pub struct AudioProducer {
    store: Arc<RingStore>,
    write_index: usize,
}

impl AudioProducer {
    /// Copy one window into the next slot and signal the transform stage.
    ///
    /// Never blocks. If the transform stage is a full ring behind, the oldest
    /// untransformed window is overwritten. A window shorter than
    /// `samples_per_window` is zero-padded; extra samples are ignored.
    pub fn produce_audio(&mut self, window: &[i16]) {
        let store = &*self.store;
        let index = self.write_index;

        let generation = &store.audio_generations[index];
        let started = begin_write(generation);
        let slot = store.audio_slot(index);
        for (position, cell) in slot.iter().enumerate() {
            cell.store(window.get(position).copied().unwrap_or(0), Ordering::Relaxed);
        }
        end_write(generation, started);

        self.write_index = (index + 1) % store.capacity;
        store.write_index.store(self.write_index, Ordering::Release);
        store.windows_produced.fetch_add(1, Ordering::Relaxed);
        store.audio_ready.release();
    }

    pub fn write_index(&self) -> usize {
        self.write_index
    }

    pub fn samples_per_window(&self) -> usize {
        self.store.samples_per_window
    }
}

/// Transform-side handle.
pub struct BitmapTransformer {
    store: Arc<RingStore>,
    transform_index: usize,
    wrapped: bool,
    oldest_valid_index: usize,
    /// Scratch copy of the slot being transformed
    samples: Vec<i16>,
}

impl BitmapTransformer {
    /// Wait for a produced window, transform it into its paired bitmap row and
    /// signal the display stage.
    pub fn consume_audio_and_produce_bitmap(&mut self, processor: &mut StftProcessor) {
        while !self.store.audio_ready.acquire_timeout(ACQUIRE_POLL) {
            trace!("no audio window ready, waiting again");
        }
        self.transform_slot(processor);
    }

    /// Like [`consume_audio_and_produce_bitmap`](Self::consume_audio_and_produce_bitmap)
    /// but gives up after `timeout`. Returns whether a window was transformed.
    pub fn try_consume_audio_and_produce_bitmap(
        &mut self,
        processor: &mut StftProcessor,
        timeout: Duration,
    ) -> bool {
        if !self.store.audio_ready.acquire_timeout(timeout) {
            return false;
        }
        self.transform_slot(processor);
        true
    }

    fn transform_slot(&mut self, processor: &mut StftProcessor) {
        let store = &*self.store;
        let index = self.transform_index;

        let consistent = read_slot(
            store.audio_slot(index),
            &store.audio_generations[index],
            None,
            &mut self.samples,
            |cell| cell.load(Ordering::Relaxed),
        );
        if !consistent {
            warn!(index, "audio slot overwritten during transform");
        }

        let row = processor.process(&self.samples);
        let generation = &store.bitmap_generations[index];
        let started = begin_write(generation);
        for (cell, &value) in store.bitmap_slot(index).iter().zip(row) {
            cell.store(value, Ordering::Relaxed);
        }
        end_write(generation, started);

        self.transform_index = (index + 1) % store.capacity;
        if self.transform_index == 0 && !self.wrapped {
            debug!(capacity = store.capacity, "ring buffers wrapped");
            self.wrapped = true;
            store.wrapped.store(true, Ordering::Release);
        }
        if self.wrapped {
            self.oldest_valid_index = (self.oldest_valid_index + 1) % store.capacity;
            store
                .oldest_valid_index
                .store(self.oldest_valid_index, Ordering::Release);
        }
        store
            .transform_index
            .store(self.transform_index, Ordering::Release);
        store.windows_transformed.fetch_add(1, Ordering::Release);
        store.bitmap_ready.release();
    }

    pub fn transform_index(&self) -> usize {
        self.transform_index
    }
}

/// Display-side handle.
pub struct BitmapConsumer {
    store: Arc<RingStore>,
    read_index: usize,
}

impl BitmapConsumer {
    /// Wait for the next published row.
    ///
    /// The row is not locked: the transform stage rewrites it `capacity` rows
    /// later. [`BitmapRow::copy_to`] reports when that happened mid-read.
    pub fn consume_bitmap(&mut self) -> BitmapRow<'_> {
        while !self.store.bitmap_ready.acquire_timeout(ACQUIRE_POLL) {
            trace!("no bitmap row ready, waiting again");
        }
        self.take_row()
    }

    /// The next published row, waiting at most `timeout` for one.
    pub fn try_consume_bitmap(&mut self, timeout: Duration) -> Option<BitmapRow<'_>> {
        let ready = if timeout.is_zero() {
            self.store.bitmap_ready.try_acquire()
        } else {
            self.store.bitmap_ready.acquire_timeout(timeout)
        };
        if ready { Some(self.take_row()) } else { None }
    }

    fn take_row(&mut self) -> BitmapRow<'_> {
        let store = &*self.store;
        let index = self.read_index;
        self.read_index = (index + 1) % store.capacity;
        store.read_index.store(self.read_index, Ordering::Release);

        let generation = &store.bitmap_generations[index];
        BitmapRow {
            index,
            cells: store.bitmap_slot(index),
            generation,
            published: generation.load(Ordering::Acquire),
        }
    }

    /// Rows published but not consumed yet.
    pub fn pending(&self) -> usize {
        self.store.bitmap_ready.available_permits()
    }

    pub fn read_index(&self) -> usize {
        self.read_index
    }
}

/// Borrowed view of one published bitmap row.
pub struct BitmapRow<'a> {
    index: usize,
    cells: &'a [AtomicU8],
    generation: &'a AtomicU64,
    published: u64,
}

impl BitmapRow<'_> {
    /// Ring slot this row lives in.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Copy the colour indices into `dest`, highest frequency first.
    ///
    /// Fails with [`SpectrogramError::TornRead`] if the slot was rewritten
    /// since it was published; `dest` then holds a mix of old and new data.
    pub fn copy_to(&self, dest: &mut [u8]) -> Result<()> {
        let consistent = read_slot(
            self.cells,
            self.generation,
            Some(self.published),
            dest,
            |cell| cell.load(Ordering::Relaxed),
        );
        if consistent {
            Ok(())
        } else {
            Err(SpectrogramError::TornRead { index: self.index })
        }
    }
}

/// Shared read-only view used for range queries and extraction.
#[derive(Clone)]
pub struct RingHistory {
    store: Arc<RingStore>,
}

impl RingHistory {
    pub fn capacity(&self) -> usize {
        self.store.capacity
    }

    pub fn samples_per_window(&self) -> usize {
        self.store.samples_per_window
    }

    pub fn num_freq_bins(&self) -> usize {
        self.store.num_freq_bins
    }

    /// Oldest chronologically usable slot. Advisory: the transform stage may
    /// have moved on by the time the caller uses it.
    pub fn leftmost_available_index(&self) -> usize {
        if !self.store.wrapped.load(Ordering::Acquire) {
            return 0;
        }
        (self.store.transform_index.load(Ordering::Acquire) + 1) % self.store.capacity
    }

    /// Slot the transform stage fills next, i.e. the exclusive end of the
    /// usable history. Advisory.
    pub fn rightmost_available_index(&self) -> usize {
        self.store.transform_index.load(Ordering::Acquire)
    }

    pub fn oldest_valid_index(&self) -> usize {
        self.store.oldest_valid_index.load(Ordering::Acquire)
    }

    pub fn has_wrapped(&self) -> bool {
        self.store.wrapped.load(Ordering::Acquire)
    }

    pub fn write_index(&self) -> usize {
        self.store.write_index.load(Ordering::Relaxed)
    }

    pub fn read_index(&self) -> usize {
        self.store.read_index.load(Ordering::Relaxed)
    }

    /// Number of transformed windows between leftmost and rightmost.
    pub fn available_windows(&self) -> usize {
        let right = self.rightmost_available_index();
        if self.has_wrapped() {
            self.store.capacity - 1
        } else {
            right
        }
    }

    pub fn audio_ready_count(&self) -> usize {
        self.store.audio_ready.available_permits()
    }

    pub fn bitmap_ready_count(&self) -> usize {
        self.store.bitmap_ready.available_permits()
    }

    pub fn windows_produced(&self) -> u64 {
        self.store.windows_produced.load(Ordering::Relaxed)
    }

    pub fn windows_transformed(&self) -> u64 {
        self.store.windows_transformed.load(Ordering::Acquire)
    }

    /// Copy the raw samples of slot `index` into `dest`.
    pub fn read_audio_window(&self, index: usize, dest: &mut [i16]) -> Result<()> {
        let store = &*self.store;
        let consistent = read_slot(
            store.audio_slot(index),
            &store.audio_generations[index],
            None,
            dest,
            |cell| cell.load(Ordering::Relaxed),
        );
        if consistent {
            Ok(())
        } else {
            Err(SpectrogramError::TornRead { index })
        }
    }

    /// Copy the stored colour indices of slot `index` into `dest`.
    pub fn read_bitmap_row(&self, index: usize, dest: &mut [u8]) -> Result<()> {
        let store = &*self.store;
        let consistent = read_slot(
            store.bitmap_slot(index),
            &store.bitmap_generations[index],
            None,
            dest,
            |cell| cell.load(Ordering::Relaxed),
        );
        if consistent {
            Ok(())
        } else {
            Err(SpectrogramError::TornRead { index })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectrogram::AmplitudeNormalizer;

    fn processor(samples_per_window: usize) -> StftProcessor {
        StftProcessor::new(samples_per_window, AmplitudeNormalizer::new(1.0))
    }

    fn transform_all(
        transformer: &mut BitmapTransformer,
        processor: &mut StftProcessor,
        count: usize,
    ) {
        for _ in 0..count {
            assert!(transformer.try_consume_audio_and_produce_bitmap(processor, Duration::ZERO));
        }
    }

    #[test]
    fn test_ready_count_tracks_produced_minus_consumed() {
        let RingHandles {
            mut producer,
            mut transformer,
            history,
            ..
        } = RingBufferCoordinator::new(8, 4).split();
        let mut stft = processor(4);

        for m in 0..5 {
            producer.produce_audio(&[m, m, m, m]);
        }
        assert_eq!(history.audio_ready_count(), 5);

        transform_all(&mut transformer, &mut stft, 3);
        assert_eq!(history.audio_ready_count(), 2);
        assert_eq!(history.bitmap_ready_count(), 3);
        assert_eq!(history.windows_produced(), 5);
        assert_eq!(history.windows_transformed(), 3);
    }

    #[test]
    fn test_mismatched_window_lengths_are_padded_or_cut() {
        let RingHandles {
            mut producer,
            history,
            ..
        } = RingBufferCoordinator::new(4, 4).split();

        producer.produce_audio(&[7, 8]);
        producer.produce_audio(&[1, 2, 3, 4, 5, 6]);

        let mut window = [-1i16; 4];
        history.read_audio_window(0, &mut window).unwrap();
        assert_eq!(window, [7, 8, 0, 0]);
        history.read_audio_window(1, &mut window).unwrap();
        assert_eq!(window, [1, 2, 3, 4]);
        assert_eq!(history.windows_produced(), 2);
    }

    #[test]
    fn test_full_ring_overwrites_oldest() {
        let RingHandles {
            mut producer,
            history,
            ..
        } = RingBufferCoordinator::new(3, 2).split();

        for value in 1..=4 {
            producer.produce_audio(&[value, -value]);
        }
        assert_eq!(producer.write_index(), 1);

        let mut window = [0i16; 2];
        history.read_audio_window(0, &mut window).unwrap();
        assert_eq!(window, [4, -4]);
        history.read_audio_window(1, &mut window).unwrap();
        assert_eq!(window, [2, -2]);
        // Overwriting never blocks and counts every window.
        assert_eq!(history.audio_ready_count(), 4);
    }

    #[test]
    fn test_available_range_before_and_after_wrap() {
        let RingHandles {
            mut producer,
            mut transformer,
            history,
            ..
        } = RingBufferCoordinator::new(4, 2).split();
        let mut stft = processor(2);

        for _ in 0..3 {
            producer.produce_audio(&[1, 1]);
        }
        transform_all(&mut transformer, &mut stft, 3);
        assert!(!history.has_wrapped());
        assert_eq!(history.leftmost_available_index(), 0);
        assert_eq!(history.rightmost_available_index(), 3);
        assert_eq!(history.available_windows(), 3);

        producer.produce_audio(&[1, 1]);
        transform_all(&mut transformer, &mut stft, 1);
        assert!(history.has_wrapped());
        assert_eq!(history.rightmost_available_index(), 0);
        assert_eq!(history.leftmost_available_index(), 1);
        assert_eq!(history.oldest_valid_index(), 1);

        producer.produce_audio(&[1, 1]);
        transform_all(&mut transformer, &mut stft, 1);
        assert_eq!(history.rightmost_available_index(), 1);
        assert_eq!(history.leftmost_available_index(), 2);
        assert_eq!(history.oldest_valid_index(), 2);
        assert_eq!(history.available_windows(), 3);
    }

    #[test]
    fn test_bitmaps_consumed_in_production_order() {
        let RingHandles {
            mut producer,
            mut transformer,
            mut consumer,
            ..
        } = RingBufferCoordinator::new(4, 8).split();
        let mut stft = processor(8);

        assert!(consumer.try_consume_bitmap(Duration::ZERO).is_none());

        producer.produce_audio(&[0; 8]);
        producer.produce_audio(&[3000, -3000, 3000, -3000, 3000, -3000, 3000, -3000]);
        producer.produce_audio(&[0; 8]);
        transform_all(&mut transformer, &mut stft, 3);
        assert_eq!(consumer.pending(), 3);

        let mut row = [0u8; 4];
        let mut order = Vec::new();
        let mut loud = Vec::new();
        while let Some(bitmap) = consumer.try_consume_bitmap(Duration::ZERO) {
            bitmap.copy_to(&mut row).unwrap();
            order.push(bitmap.index());
            loud.push(row.iter().any(|&v| v > 0));
        }
        assert_eq!(order, vec![0, 1, 2]);
        // The silent third window still carries the loud one through smoothing.
        assert_eq!(loud, vec![false, true, true]);
        assert_eq!(consumer.read_index(), 3);
    }

    #[test]
    fn test_overwritten_row_is_reported_torn() {
        let RingHandles {
            mut producer,
            mut transformer,
            mut consumer,
            ..
        } = RingBufferCoordinator::new(2, 4).split();
        let mut stft = processor(4);

        producer.produce_audio(&[1, 2, 3, 4]);
        transform_all(&mut transformer, &mut stft, 1);
        let row = consumer.consume_bitmap();
        assert_eq!(row.index(), 0);

        // Lap the ring so slot 0 is written again.
        producer.produce_audio(&[5, 6, 7, 8]);
        producer.produce_audio(&[9, 10, 11, 12]);
        transform_all(&mut transformer, &mut stft, 2);

        let mut dest = [0u8; 2];
        assert!(matches!(
            row.copy_to(&mut dest),
            Err(SpectrogramError::TornRead { index: 0 })
        ));
    }
}
