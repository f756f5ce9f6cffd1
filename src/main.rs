use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use spectrogram::app::App;
use spectrogram::audio::{BufferSource, ClipPlayer, FileSource, MicSource, SampleSource};
use spectrogram::config::{
    default_export_dir, SharedSettings, SpectrogramConfig, DEFAULT_CAPACITY,
    DEFAULT_CONTRAST_PREFERENCE, DEFAULT_SAMPLES_PER_WINDOW, DEFAULT_SAMPLE_RATE,
};
use spectrogram::export::{CaptureRequest, StoredCapture};
use spectrogram::pipeline::Session;
use spectrogram::spectrogram::ColourMap;
use spectrogram::ui;

#[derive(Parser)]
#[command(name = "spectrogram")]
#[command(about = "Scrolling terminal spectrogram with capture export")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    options: SharedOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SharedOptions {
    /// Samples per analysis window (even)
    #[arg(long, global = true, default_value_t = DEFAULT_SAMPLES_PER_WINDOW)]
    window: usize,

    /// Contrast preference between 0 and 1
    #[arg(long, global = true, default_value_t = DEFAULT_CONTRAST_PREFERENCE)]
    contrast: f64,

    /// Colour map used for display and export
    #[arg(long, global = true, value_enum, default_value_t = ColourMap::default())]
    colour_map: ColourMap,

    /// Number of windows kept in history
    #[arg(long, global = true, default_value_t = DEFAULT_CAPACITY)]
    capacity: usize,

    /// Where captures are saved (defaults to the user's picture folder)
    #[arg(long, global = true)]
    out_dir: Option<PathBuf>,

    /// Log file used while the terminal UI is active
    #[arg(long, global = true, default_value = "spectrogram.log")]
    log_file: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Show a live spectrogram of the default microphone
    Live {
        /// Capture sample rate in Hz (11025, 16000, 22050 or 44100)
        #[arg(long, default_value_t = DEFAULT_SAMPLE_RATE)]
        sample_rate: u32,
    },

    /// Show the spectrogram of an audio file
    File {
        path: PathBuf,

        /// Play the file through at its natural speed
        #[arg(long)]
        realtime: bool,
    },

    /// Save a time/frequency slice of an audio file as JPEG + WAV
    Export {
        path: PathBuf,

        /// Start of the slice in seconds
        #[arg(long)]
        start: f64,

        /// End of the slice in seconds
        #[arg(long)]
        end: f64,

        /// Lower edge of the frequency band in Hz
        #[arg(long, default_value_t = 0.0)]
        low_hz: f64,

        /// Upper edge of the frequency band in Hz (defaults to Nyquist)
        #[arg(long)]
        high_hz: Option<f64>,
    },
}

impl SharedOptions {
    fn config(&self, sample_rate: u32) -> SpectrogramConfig {
        SpectrogramConfig {
            sample_rate,
            samples_per_window: self.window,
            contrast_preference: self.contrast,
            colour_map: self.colour_map,
            capacity: self.capacity,
            export_dir: self.out_dir.clone().unwrap_or_else(default_export_dir),
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Log to a file so the terminal UI is not overwritten.
fn init_file_logging(path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}

fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .init();
}

fn run_display(config: SpectrogramConfig, session: Session) -> Result<()> {
    let app = App::new(session, ClipPlayer::new(), config.export_dir);
    ui::run(app)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let options = &cli.options;

    match cli.command {
        Commands::Live { sample_rate } => {
            init_file_logging(&options.log_file)?;
            let config = options.config(sample_rate);
            config.validate_for_capture()?;
            let settings = SharedSettings::new(config.live_settings());

            let source = MicSource::open(sample_rate).context("failed to open microphone")?;
            let session = Session::start(config.clone(), source, settings)?;
            run_display(config, session)
        }
        Commands::File { path, realtime } => {
            init_file_logging(&options.log_file)?;
            let source = FileSource::open(&path, realtime)
                .with_context(|| format!("failed to open {}", path.display()))?;
            let config = options.config(source.sample_rate());
            let settings = SharedSettings::new(config.live_settings());

            let session = Session::start(config.clone(), source, settings)?;
            run_display(config, session)
        }
        Commands::Export {
            path,
            start,
            end,
            low_hz,
            high_hz,
        } => {
            init_stderr_logging();
            export_file(options, &path, start, end, low_hz, high_hz)
        }
    }
}

/// Run the whole file through a session sized to hold it, then save the
/// requested slice.
fn export_file(
    options: &SharedOptions,
    path: &Path,
    start: f64,
    end: f64,
    low_hz: f64,
    high_hz: Option<f64>,
) -> Result<()> {
    let source = FileSource::open(path, false)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let sample_rate = source.sample_rate();
    let samples = source
        .read_all()
        .with_context(|| format!("failed to decode {}", path.display()))?;

    let mut config = options.config(sample_rate);
    let windows = samples.len().div_ceil(config.samples_per_window.max(1));
    config.capacity = config.capacity.max(windows + 1);
    let settings = SharedSettings::new(config.live_settings());

    let session = Session::start(config.clone(), BufferSource::new(samples, sample_rate), settings)?;
    let budget = Duration::from_secs(30) + config.window_duration() * windows as u32;
    anyhow::ensure!(
        session.wait_until_drained(budget),
        "timed out transforming {}",
        path.display()
    );

    let mut request = CaptureRequest::from_seconds(
        session.extractor(),
        start,
        end,
        low_hz,
        high_hz.unwrap_or_else(|| config.max_frequency()),
    )
    .with_context(|| format!("invalid time range {start}s..{end}s"))?;
    request.start_window = request.start_window.min(windows);
    request.end_window = request.end_window.min(windows);
    info!(?request, windows, "exporting slice");

    let capture = StoredCapture::from_range(session.extractor(), &request, &session.settings().load())
        .context("failed to render capture")?;
    let files = capture
        .save(&config.export_dir)
        .with_context(|| format!("failed to save capture in {}", config.export_dir.display()))?;

    println!("{}", files.image.display());
    println!("{}", files.audio.display());
    Ok(())
}
