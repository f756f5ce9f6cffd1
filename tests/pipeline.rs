use std::f64::consts::PI;
use std::time::Duration;

use spectrogram::audio::BufferSource;
use spectrogram::config::{LiveSettings, SharedSettings, SpectrogramConfig};
use spectrogram::export::{CaptureRequest, StoredCapture};
use spectrogram::pipeline::Session;
use spectrogram::spectrogram::ColourMap;

const RATE: u32 = 16000;
const WINDOW: usize = 64;

fn tone(hz: f64, windows: usize) -> Vec<i16> {
    (0..windows * WINDOW)
        .map(|n| (8000.0 * (2.0 * PI * hz * n as f64 / RATE as f64).sin()) as i16)
        .collect()
}

fn config(capacity: usize) -> SpectrogramConfig {
    SpectrogramConfig {
        sample_rate: RATE,
        samples_per_window: WINDOW,
        capacity,
        export_dir: std::env::temp_dir().join(format!("spectrogram-it-{}", std::process::id())),
        ..SpectrogramConfig::default()
    }
}

fn run_to_end(samples: Vec<i16>, capacity: usize) -> Session {
    let settings = SharedSettings::new(LiveSettings::new(0.0, ColourMap::Greys));
    let source = BufferSource::new(samples, RATE).with_chunk(37);
    let session = Session::start(config(capacity), source, settings).unwrap();
    assert!(session.wait_until_drained(Duration::from_secs(10)));
    session
}

#[test]
fn live_rows_show_the_tone_in_its_bin() {
    // 1 kHz sits in bin 2·1000/16000·32 = 4, shown at row 32 - 4 - 1.
    let mut session = run_to_end(tone(1000.0, 6), 16);

    let mut row = vec![0u8; WINDOW / 2];
    let mut rows = 0;
    while let Some(bitmap) = session.consumer().try_consume_bitmap(Duration::ZERO) {
        bitmap.copy_to(&mut row).unwrap();
        rows += 1;
    }
    assert_eq!(rows, 6);
    // Equal to the running max up to i16 rounding between windows.
    assert!(row[27] >= 250, "row {row:?}");
    assert!(row[..20].iter().all(|&v| v < row[27]));
}

#[test]
fn wrapped_history_is_extracted_chronologically() {
    // Eight windows with distinct DC levels through a ring of five.
    let samples: Vec<i16> = (0..8i16).flat_map(|w| std::iter::repeat_n(w * 100, WINDOW)).collect();
    let session = run_to_end(samples, 5);
    let history = session.history();

    assert!(history.has_wrapped());
    assert_eq!(history.rightmost_available_index(), 3);
    assert_eq!(history.leftmost_available_index(), 4);

    let extractor = session.extractor();
    let (start, end) = (history.leftmost_available_index(), history.rightmost_available_index());
    assert_eq!(extractor.window_count(start, end), 4);

    let audio = extractor.extract_audio(start, end);
    let levels: Vec<i16> = audio.chunks(WINDOW).map(|w| w[0]).collect();
    assert_eq!(levels, vec![400, 500, 600, 700]);
}

#[test]
fn export_writes_readable_files() {
    let session = run_to_end(tone(2000.0, 20), 32);
    let request = CaptureRequest::from_seconds(session.extractor(), 0.0, 0.04, 1000.0, 3000.0)
        .unwrap();
    assert_eq!((request.start_window, request.end_window), (0, 10));

    let settings = session.settings().load();
    let capture = StoredCapture::from_range(session.extractor(), &request, &settings).unwrap();
    let files = capture.save(&session.config().export_dir).unwrap();

    let image = image::open(&files.image).unwrap();
    // Bins 4..12 over ten windows, doubled.
    assert_eq!((image.width(), image.height()), (20, 16));

    let mut reader = hound::WavReader::open(&files.audio).unwrap();
    assert_eq!(reader.spec().sample_rate, RATE);
    let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
    assert_eq!(samples.len(), 10 * WINDOW);
    // The in-band tone survives the band-pass.
    let peak = samples[WINDOW * 5..].iter().map(|s| s.saturating_abs()).max().unwrap();
    assert!(peak > 5000, "peak {peak}");
}
