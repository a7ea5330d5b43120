use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand};

use facewatch_core::capture::domain::display_surface::DisplaySurface;
use facewatch_core::capture::domain::frame_source::FrameSource;
use facewatch_core::capture::infrastructure::annotated_image_surface::AnnotatedImageSurface;
use facewatch_core::capture::infrastructure::image_sequence_source::{
    ImageSequenceSource, DEFAULT_FPS,
};
use facewatch_core::identity::enrollment::enroll;
use facewatch_core::identity::identity_database::IdentityDatabase;
use facewatch_core::overlay::annotation_slot::AnnotationSlot;
use facewatch_core::overlay::frame_annotator::DEFAULT_THICKNESS;
use facewatch_core::recognition::domain::face_detector::FaceDetector;
use facewatch_core::recognition::domain::feature_extractor::FeatureExtractor;
use facewatch_core::recognition::infrastructure::onnx_embedding_extractor::OnnxEmbeddingExtractor;
use facewatch_core::recognition::infrastructure::onnx_yolo_detector::{
    OnnxYoloDetector, DEFAULT_CONFIDENCE,
};
use facewatch_core::recognition::recognizer::Recognizer;
use facewatch_core::session::session_controller::SessionController;
use facewatch_core::shared::constants::{
    EMBEDDING_MODEL_NAME, EMBEDDING_MODEL_URL, YOLO_MODEL_NAME, YOLO_MODEL_URL,
};
use facewatch_core::shared::frame::Frame;
use facewatch_core::shared::model_resolver;
use facewatch_core::shared::settings::RecognitionSettings;
use facewatch_core::shared::threshold::SharedThreshold;

/// How long the final frame's analysis may take once the input is exhausted.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

/// Live face recognition with on-frame annotations.
#[derive(Parser)]
#[command(name = "facewatch", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Play an image or a directory of images through a recognition session.
    Watch(WatchArgs),
    /// Register the largest face in an image in the identity database.
    Enroll(EnrollArgs),
}

#[derive(Args)]
struct WatchArgs {
    /// Image file or directory of images (played in file name order).
    input: PathBuf,

    /// Identity database (defaults to the saved setting).
    #[arg(long)]
    database: Option<PathBuf>,

    /// Minimum match confidence for an identity (0.0-1.0).
    #[arg(long)]
    threshold: Option<f64>,

    /// Minimum spacing between analysed frames, in milliseconds.
    #[arg(long)]
    detect_interval_ms: Option<u64>,

    /// Maximum number of faces annotated at once.
    #[arg(long)]
    max_annotations: Option<usize>,

    /// Frame rate the input is played at.
    #[arg(long, default_value_t = DEFAULT_FPS)]
    fps: f64,

    /// Write annotated frames as PNG files into this directory.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Outline thickness of annotations written with --output, in pixels.
    #[arg(long, default_value_t = DEFAULT_THICKNESS)]
    thickness: u32,

    /// Pace playback at the given frame rate instead of as fast as possible.
    #[arg(long)]
    realtime: bool,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long, default_value_t = DEFAULT_CONFIDENCE)]
    confidence: f64,

    /// Persist the effective recognition settings for later runs.
    #[arg(long)]
    save_settings: bool,
}

#[derive(Args)]
struct EnrollArgs {
    /// Image containing the face to register.
    image: PathBuf,

    /// Name shown next to the recognised face.
    #[arg(long)]
    label: String,

    /// Extra information shown after the label (repeatable).
    #[arg(long = "info")]
    info: Vec<String>,

    /// Identity database (defaults to the saved setting).
    #[arg(long)]
    database: Option<PathBuf>,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long, default_value_t = DEFAULT_CONFIDENCE)]
    confidence: f64,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    match cli.command {
        Command::Watch(args) => run_watch(args),
        Command::Enroll(args) => run_enroll(args),
    }
}

fn run_watch(args: WatchArgs) -> Result<(), Box<dyn std::error::Error>> {
    validate_watch(&args)?;
    let settings = effective_settings(&args);
    if args.save_settings {
        settings.save();
    }

    let database = IdentityDatabase::load_or_empty(&settings.database_path);
    log::info!(
        "{} identities loaded from {}",
        database.len(),
        settings.database_path.display()
    );

    let recognizer = Recognizer::new(
        build_detector(args.confidence)?,
        build_extractor()?,
        Arc::new(database),
        SharedThreshold::new(settings.threshold),
    );

    let surface: Box<dyn DisplaySurface> = match &args.output {
        Some(dir) => Box::new(AnnotatedImageSurface::new(dir)?.with_thickness(args.thickness)),
        None => Box::new(LoggingSurface::default()),
    };

    let mut source = ImageSequenceSource::new(args.fps);
    let metadata = source.open(&args.input)?;

    let mut session = SessionController::new(surface, recognizer, &settings);
    session.start()?;

    let started = Instant::now();
    for frame in source.frames() {
        let frame = frame?;
        if args.realtime {
            pace(started, frame.timestamp());
        }
        eprint!(
            "\rPresenting frame {}/{}",
            frame.index() + 1,
            metadata.total_frames
        );
        session.present_frame(frame);
    }
    eprintln!();
    session.flush(FLUSH_TIMEOUT);

    let adapter = session.adapter_stats();
    let worker = session.worker_stats().unwrap_or_default();
    session.stop();
    source.close();

    log::info!(
        "Presented {} frames: {} analysed, {} busy, {} throttled, {} malformed; {} result batches",
        adapter.presented,
        adapter.forwarded,
        adapter.busy,
        adapter.throttled,
        adapter.malformed,
        worker.emitted
    );
    if let Some(dir) = &args.output {
        log::info!("Annotated frames written to {}", dir.display());
    }
    Ok(())
}

fn run_enroll(args: EnrollArgs) -> Result<(), Box<dyn std::error::Error>> {
    if !args.image.is_file() {
        return Err(format!("Image file not found: {}", args.image.display()).into());
    }
    validate_confidence(args.confidence)?;
    let database_path = args
        .database
        .clone()
        .unwrap_or_else(|| RecognitionSettings::load().database_path);

    let existing = if database_path.exists() {
        Some(IdentityDatabase::load(&database_path)?)
    } else {
        None
    };

    let frame = first_frame(&args.image)?;
    let mut detector = build_detector(args.confidence)?;
    let mut extractor = build_extractor()?;
    let record = enroll(
        detector.as_mut(),
        extractor.as_mut(),
        &frame,
        &args.label,
        args.info,
    )?;

    if let Some(db) = existing.filter(|db| !db.is_empty()) {
        if db.dimension() != record.features().len() {
            return Err(format!(
                "{} stores {}-dimensional features but the model produced {}",
                database_path.display(),
                db.dimension(),
                record.features().len()
            )
            .into());
        }
    }

    IdentityDatabase::append_record(&database_path, &record)?;
    println!(
        "Enrolled {} into {}",
        record.display_string(),
        database_path.display()
    );
    Ok(())
}

fn effective_settings(args: &WatchArgs) -> RecognitionSettings {
    let mut settings = RecognitionSettings::load();
    if let Some(path) = &args.database {
        settings.database_path = path.clone();
    }
    if let Some(threshold) = args.threshold {
        settings.threshold = threshold;
    }
    if let Some(ms) = args.detect_interval_ms {
        settings.detect_interval_ms = ms;
    }
    if let Some(n) = args.max_annotations {
        settings.max_annotations = n;
    }
    settings
}

fn validate_watch(args: &WatchArgs) -> Result<(), Box<dyn std::error::Error>> {
    if !args.input.exists() {
        return Err(format!("Input not found: {}", args.input.display()).into());
    }
    if let Some(t) = args.threshold {
        if !(0.0..=1.0).contains(&t) {
            return Err(format!("Threshold must be between 0.0 and 1.0, got {t}").into());
        }
    }
    if args.thickness == 0 {
        return Err("Thickness must be at least 1".into());
    }
    if args.max_annotations == Some(0) {
        return Err("Max annotations must be at least 1".into());
    }
    if !(args.fps.is_finite() && args.fps > 0.0) {
        return Err(format!("Frame rate must be positive, got {}", args.fps).into());
    }
    validate_confidence(args.confidence)
}

fn validate_confidence(confidence: f64) -> Result<(), Box<dyn std::error::Error>> {
    if !(0.0..=1.0).contains(&confidence) {
        return Err(format!("Confidence must be between 0.0 and 1.0, got {confidence}").into());
    }
    Ok(())
}

fn first_frame(path: &Path) -> Result<Frame, Box<dyn std::error::Error>> {
    let mut source = ImageSequenceSource::default();
    source.open(path)?;
    let frame = source.frames().next().ok_or("Image produced no frame")??;
    source.close();
    Ok(frame)
}

fn pace(started: Instant, timestamp: Duration) {
    let elapsed = started.elapsed();
    if timestamp > elapsed {
        std::thread::sleep(timestamp - elapsed);
    }
}

fn build_detector(confidence: f64) -> Result<Box<dyn FaceDetector>, Box<dyn std::error::Error>> {
    log::info!("Resolving model: {YOLO_MODEL_NAME}");
    let model_path = model_resolver::resolve(
        YOLO_MODEL_NAME,
        YOLO_MODEL_URL,
        None,
        Some(Box::new(|done: u64, total: u64| {
            download_progress("face detection", done, total)
        })),
    )?;
    Ok(Box::new(OnnxYoloDetector::new(&model_path, confidence)?))
}

fn build_extractor() -> Result<Box<dyn FeatureExtractor>, Box<dyn std::error::Error>> {
    log::info!("Resolving model: {EMBEDDING_MODEL_NAME}");
    let model_path = model_resolver::resolve(
        EMBEDDING_MODEL_NAME,
        EMBEDDING_MODEL_URL,
        None,
        Some(Box::new(|done: u64, total: u64| {
            download_progress("face embedding", done, total)
        })),
    )?;
    Ok(Box::new(OnnxEmbeddingExtractor::new(&model_path)?))
}

fn download_progress(what: &str, downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading {what} model... {pct}%");
    } else {
        eprint!("\rDownloading {what} model... {downloaded} bytes");
    }
    if total > 0 && downloaded >= total {
        eprintln!();
    }
}

/// Logs the visible annotations whenever they change.
#[derive(Default)]
struct LoggingSurface {
    last: Vec<String>,
}

impl DisplaySurface for LoggingSurface {
    fn present(
        &mut self,
        frame: &Frame,
        annotations: &[AnnotationSlot],
    ) -> Result<(), Box<dyn std::error::Error>> {
        let current: Vec<String> = annotations
            .iter()
            .filter(|s| s.is_visible())
            .map(|s| {
                let r = s.rect();
                format!("{} at ({}, {}, {}x{})", s.label(), r.x, r.y, r.width, r.height)
            })
            .collect();
        if current != self.last {
            if current.is_empty() {
                log::info!("Frame {}: no faces", frame.index());
            } else {
                log::info!("Frame {}: {}", frame.index(), current.join("; "));
            }
            self.last = current;
        }
        Ok(())
    }
}
