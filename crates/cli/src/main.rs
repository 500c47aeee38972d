use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;

use facemark_core::capture::domain::frame_source::CaptureError;
use facemark_core::capture::infrastructure::ffmpeg_source::FfmpegFrameSource;
use facemark_core::capture::infrastructure::image_file_reader::read_image;
use facemark_core::extraction::domain::nose_pointer::NosePointer;
use facemark_core::extraction::extraction_logger::LogExtractionLogger;
use facemark_core::extraction::infrastructure::extractor_factory::{
    open_extractor, open_extractor_with_source, open_image_extractor,
};
use facemark_core::extraction::landmark_extractor::{ExtractError, LandmarkExtractor};
use facemark_core::shared::config::ExtractorConfig;
use facemark_core::shared::constants::IMAGE_EXTENSIONS;

/// Webcam face landmark extraction: nose and lip positions as JSON lines.
#[derive(Parser)]
#[command(name = "facemark")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// JSON config file (default: platform config dir, if present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Camera index, /dev/videoN path or backend device name.
    #[arg(long, global = true)]
    device: Option<String>,

    /// Directory searched for model files after the cache.
    #[arg(long, global = true)]
    model_dir: Option<PathBuf>,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long, global = true)]
    min_detection_confidence: Option<f64>,

    /// Landmark presence needed to keep tracking a face (0.0-1.0).
    #[arg(long, global = true)]
    min_tracking_confidence: Option<f64>,

    /// Use the 468-point mesh without iris landmarks.
    #[arg(long, global = true)]
    no_refine: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Print landmark coordinates for live camera frames.
    Capture {
        /// Stop after this many frames (default: run until the source ends).
        #[arg(long)]
        count: Option<usize>,

        /// Nose and lips (six) or landmark 0 only (one).
        #[arg(long, value_enum, default_value_t = LandmarkSet::Six)]
        landmarks: LandmarkSet,

        /// Replay a recorded video instead of opening the camera.
        #[arg(long)]
        video: Option<PathBuf>,
    },
    /// Print landmark 0 of the first face in a still image.
    Image {
        /// Image file.
        path: PathBuf,
    },
    /// Calibrate on the first face, then print nose positions on a grid.
    Pointer {
        /// Grid size as WIDTHxHEIGHT.
        #[arg(long, default_value = "80x50", value_parser = parse_grid)]
        grid: (u32, u32),

        /// Stop after this many frames.
        #[arg(long)]
        count: Option<usize>,

        /// Replay a recorded video instead of opening the camera.
        #[arg(long)]
        video: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LandmarkSet {
    Six,
    One,
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
    let config = load_config(&cli)?;

    match cli.command {
        Command::Capture {
            count,
            landmarks,
            video,
        } => {
            let mut extractor = open_live(&config, video.as_deref())?;
            run_capture(&mut extractor, count, landmarks)?;
            extractor.close();
        }
        Command::Image { path } => run_image(&config, &path)?,
        Command::Pointer { grid, count, video } => {
            let mut extractor = open_live(&config, video.as_deref())?;
            run_pointer(&mut extractor, grid, count)?;
            extractor.close();
        }
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<ExtractorConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => ExtractorConfig::load(path)?,
        None => ExtractorConfig::load_or_default()?,
    };
    apply_overrides(&mut config, cli);
    config.validate()?;
    Ok(config)
}

/// Command-line flags win over the config file.
fn apply_overrides(config: &mut ExtractorConfig, cli: &Cli) {
    if let Some(device) = &cli.device {
        config.device = device.clone();
    }
    if let Some(dir) = &cli.model_dir {
        config.model_dir = Some(dir.clone());
    }
    if let Some(c) = cli.min_detection_confidence {
        config.min_detection_confidence = c;
    }
    if let Some(c) = cli.min_tracking_confidence {
        config.min_tracking_confidence = c;
    }
    if cli.no_refine {
        config.refine_landmarks = false;
    }
}

fn open_live(
    config: &ExtractorConfig,
    video: Option<&Path>,
) -> Result<LandmarkExtractor, Box<dyn std::error::Error>> {
    let extractor = match video {
        Some(path) => {
            let source = FfmpegFrameSource::open_file(path)?;
            open_extractor_with_source(config, Box::new(source), Some(download_progress))?
        }
        None => open_extractor(config, Some(download_progress))?,
    };
    Ok(extractor.with_logger(Box::new(LogExtractionLogger::new())))
}

fn run_capture(
    extractor: &mut LandmarkExtractor,
    count: Option<usize>,
    landmarks: LandmarkSet,
) -> Result<(), Box<dyn std::error::Error>> {
    for frame in frame_numbers(count) {
        let line = match landmarks {
            LandmarkSet::Six => match end_of_stream_as_none(extractor.capture_and_extract_six())? {
                None => break,
                Some(Some(c)) => json!({
                    "frame": frame,
                    "nose": c.nose,
                    "upper_lip": c.upper_lip,
                    "lower_lip": c.lower_lip,
                }),
                Some(None) => json!({ "frame": frame, "face": null }),
            },
            LandmarkSet::One => match end_of_stream_as_none(extractor.capture_and_extract_one())? {
                None => break,
                Some(Some(p)) => json!({ "frame": frame, "point": p }),
                Some(None) => json!({ "frame": frame, "face": null }),
            },
        };
        println!("{line}");
    }
    Ok(())
}

fn run_image(config: &ExtractorConfig, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if !is_image(path) {
        return Err(format!("Not an image file: {}", path.display()).into());
    }
    let frame = read_image(path)?;
    let mut extractor = open_image_extractor(config, Some(download_progress))?;
    let line = match extractor.extract_from_image(&frame)? {
        Some(p) => json!({ "frame": 0, "point": p }),
        None => json!({ "frame": 0, "face": null }),
    };
    println!("{line}");
    Ok(())
}

fn run_pointer(
    extractor: &mut LandmarkExtractor,
    (width, height): (u32, u32),
    count: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut pointer = NosePointer::new(width, height);
    for frame in frame_numbers(count) {
        let Some(coords) = end_of_stream_as_none(extractor.capture_and_extract_six())? else {
            break;
        };
        let line = match coords {
            Some(c) => {
                if !pointer.is_calibrated() {
                    pointer.calibrate(c.nose);
                    log::info!("Calibrated on frame {frame}");
                }
                json!({ "frame": frame, "point": pointer.map(c.nose) })
            }
            None => json!({ "frame": frame, "face": null }),
        };
        println!("{line}");
    }
    Ok(())
}

fn frame_numbers(count: Option<usize>) -> std::ops::Range<usize> {
    0..count.unwrap_or(usize::MAX)
}

/// A replayed video running out of frames ends the loop instead of failing.
fn end_of_stream_as_none<T>(result: Result<T, ExtractError>) -> Result<Option<T>, ExtractError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(ExtractError::Capture(CaptureError::EndOfStream(source))) => {
            log::info!("{source} has no more frames");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn parse_grid(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{s}'"))?;
    let w: u32 = w.trim().parse().map_err(|_| format!("invalid grid width '{w}'"))?;
    let h: u32 = h.trim().parse().map_err(|_| format!("invalid grid height '{h}'"))?;
    if w == 0 || h == 0 {
        return Err(format!("grid must be at least 1x1, got '{s}'"));
    }
    Ok((w, h))
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn download_progress(name: &str, downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading {name}... {pct}%");
    } else {
        eprint!("\rDownloading {name}... {downloaded} bytes");
    }
    if total > 0 && downloaded >= total {
        eprintln!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_grid() {
        assert_eq!(parse_grid("80x50"), Ok((80, 50)));
        assert_eq!(parse_grid("640X480"), Ok((640, 480)));
        assert!(parse_grid("80").is_err());
        assert!(parse_grid("0x5").is_err());
        assert!(parse_grid("ax5").is_err());
    }

    #[test]
    fn test_is_image() {
        assert!(is_image(Path::new("face.PNG")));
        assert!(is_image(Path::new("dir/face.jpeg")));
        assert!(!is_image(Path::new("clip.mp4")));
        assert!(!is_image(Path::new("noext")));
    }

    #[test]
    fn test_capture_defaults() {
        let cli = Cli::try_parse_from(["facemark", "capture"]).unwrap();
        match cli.command {
            Command::Capture {
                count,
                landmarks,
                video,
            } => {
                assert_eq!(count, None);
                assert_eq!(landmarks, LandmarkSet::Six);
                assert!(video.is_none());
            }
            _ => panic!("expected capture"),
        }
    }

    #[test]
    fn test_pointer_grid_flag() {
        let cli = Cli::try_parse_from(["facemark", "pointer", "--grid", "40x30"]).unwrap();
        assert!(matches!(cli.command, Command::Pointer { grid: (40, 30), .. }));
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::try_parse_from([
            "facemark",
            "capture",
            "--device",
            "/dev/video2",
            "--min-detection-confidence",
            "0.7",
            "--no-refine",
        ])
        .unwrap();
        let mut config = ExtractorConfig::default();
        apply_overrides(&mut config, &cli);

        assert_eq!(config.device, "/dev/video2");
        assert_eq!(config.min_detection_confidence, 0.7);
        assert_eq!(config.min_tracking_confidence, 0.5);
        assert!(!config.refine_landmarks);
    }

    #[test]
    fn test_end_of_stream_ends_loop() {
        let eos: Result<(), ExtractError> =
            Err(ExtractError::Capture(CaptureError::EndOfStream("clip".into())));
        assert!(matches!(end_of_stream_as_none(eos), Ok(None)));

        let closed: Result<(), ExtractError> = Err(ExtractError::Closed);
        assert!(end_of_stream_as_none(closed).is_err());
    }
}
