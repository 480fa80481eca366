//! Roadframe CLI Tool
//!
//! Command-line interface for picking the best frame of every clip of a road
//! survey video.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use roadframe_core::{CropMode, OutputFormat, PipelineConfig, SurveyLayout};
use roadframe_media::{extract_frames, frames_per_clip, segment_video, SegmentOptions, VideoReader};
use roadframe_pipeline::{
    select_best_frames, spawn_pipeline, Orchestrator, PipelineEvent, ProgressObserver,
    ProgressTracker,
};
use roadframe_quality::{OnnxModelConfig, OnnxQualityModel, QualityScorer};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "roadframe")]
#[command(about = "Road survey frame selection - one sharp, informative frame per clip")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline: segment, extract, select
    Run(RunArgs),

    /// Split a video into fixed-duration clips
    Segment {
        /// Input video file path
        input: PathBuf,

        /// Output directory for clips
        #[arg(short, long)]
        output: PathBuf,

        /// Clip duration in seconds
        #[arg(long, default_value = "2.0")]
        clip_duration: f64,
    },

    /// Decode every clip of a directory into per-clip frame folders
    Extract {
        /// Directory holding clip{n}.avi files
        clips_dir: PathBuf,

        /// Output directory for frames
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Pick the best frame of every extracted clip
    Select {
        /// Directory holding clip{n}/frame{i}.jpg
        frames_dir: PathBuf,

        /// Output directory for selected frames
        #[arg(short, long)]
        output: PathBuf,

        /// Perceptual quality model (ONNX)
        #[arg(long)]
        model: PathBuf,

        /// Output image format (webp, jpg, png, avif)
        #[arg(long, default_value = "webp")]
        format: OutputFormat,

        /// Model input crop (random, center)
        #[arg(long, default_value = "random")]
        crop: CropMode,
    },

    /// Print the quality breakdown of a single image
    Score {
        /// Image file path
        image: PathBuf,

        /// Perceptual quality model (ONNX)
        #[arg(long)]
        model: PathBuf,

        /// Model input crop (random, center)
        #[arg(long, default_value = "random")]
        crop: CropMode,
    },

    /// Show video information and the expected clip count
    Info {
        /// Input video file path
        input: PathBuf,

        /// Clip duration in seconds
        #[arg(long, default_value = "2.0")]
        clip_duration: f64,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Input video file path
    video: Option<PathBuf>,

    /// Perceptual quality model (ONNX)
    #[arg(long)]
    model: Option<PathBuf>,

    /// JSON configuration file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Workspace root holding clips/, frames/ and selected/ per survey
    #[arg(long, requires = "survey")]
    workspace: Option<PathBuf>,

    /// Survey name inside the workspace
    #[arg(long, requires = "workspace")]
    survey: Option<String>,

    #[arg(long)]
    clips_dir: Option<PathBuf>,

    #[arg(long)]
    frames_dir: Option<PathBuf>,

    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Clip duration in seconds
    #[arg(long)]
    clip_duration: Option<f64>,

    /// Output image format (webp, jpg, png, avif)
    #[arg(long)]
    format: Option<OutputFormat>,

    /// Model input crop (random, center)
    #[arg(long)]
    crop: Option<CropMode>,

    /// Remove clips and extracted frames after a successful run
    #[arg(long)]
    discard_intermediates: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run_pipeline(args).await?,

        Commands::Segment {
            input,
            output,
            clip_duration,
        } => {
            let options = SegmentOptions {
                clip_duration_secs: clip_duration,
                ..SegmentOptions::default()
            };
            let report =
                segment_video(&input, &output, &options).context("Failed to segment video")?;
            println!(
                "Wrote {} clips ({} frames, {} per clip) to {}",
                report.clips.len(),
                report.total_frames,
                report.frames_per_clip,
                output.display()
            );
        }

        Commands::Extract { clips_dir, output } => {
            let report = extract_frames(&clips_dir, &output).context("Failed to extract frames")?;
            for clip in &report.clips {
                println!("  clip{}: {} frames ({:?})", clip.ordinal, clip.frame_count, clip.status);
            }
            println!("Extracted {} frames to {}", report.total_frames(), output.display());
        }

        Commands::Select {
            frames_dir,
            output,
            model,
            format,
            crop,
        } => {
            let scorer = load_scorer(&model, crop)?;
            let mut tracker = ProgressTracker::new("Selected clip");
            let report = select_best_frames(
                &frames_dir,
                &output,
                &scorer,
                format,
                &mut tracker,
                &CancellationToken::new(),
            )
            .context("Failed to select frames")?;
            println!(
                "Selected {} frames into {} ({} clips skipped)",
                report.selected().len(),
                output.display(),
                report.skipped().len()
            );
        }

        Commands::Score { image, model, crop } => {
            let scorer = load_scorer(&model, crop)?;
            let breakdown = scorer
                .breakdown_path(&image)
                .with_context(|| format!("Failed to score {}", image.display()))?;
            println!("\n=== Quality of {} ===", image.display());
            println!("Sharpness:  {:.3}", breakdown.sharpness);
            println!("Contrast:   {:.3}", breakdown.contrast);
            println!("Entropy:    {:.3}", breakdown.entropy);
            println!("Perceptual: {:.3}", breakdown.perceptual);
            println!("Composite:  {:.3}", breakdown.composite);
        }

        Commands::Info {
            input,
            clip_duration,
        } => print_info(&input, clip_duration)?,
    }

    Ok(())
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("roadframe=info,ort=warn"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(false))
            .with(env_filter)
            .init();
    }
}

fn build_config(args: RunArgs) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    if let Some(video) = args.video {
        config.video_path = video;
    }
    if let Some(model) = args.model {
        config.model_path = model;
    }
    if let (Some(root), Some(survey)) = (args.workspace, args.survey) {
        let layout = SurveyLayout::new(root, survey);
        config.clips_dir = layout.clips_dir();
        config.frames_dir = layout.frames_dir();
        config.output_dir = layout.output_dir();
    }
    if let Some(dir) = args.clips_dir {
        config.clips_dir = dir;
    }
    if let Some(dir) = args.frames_dir {
        config.frames_dir = dir;
    }
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }
    if let Some(secs) = args.clip_duration {
        config.clip_duration_secs = secs;
    }
    if let Some(format) = args.format {
        config.output_format = format;
    }
    if let Some(crop) = args.crop {
        config.crop_mode = crop;
    }
    if args.discard_intermediates {
        config.keep_intermediates = false;
    }

    if config.model_path.as_os_str().is_empty() {
        bail!("No model given; pass --model or set model_path in the config file");
    }
    config.validate().context("Invalid pipeline configuration")?;
    Ok(config)
}

async fn run_pipeline(args: RunArgs) -> Result<()> {
    let config = build_config(args)?;
    println!("Processing video: {}", config.video_path.display());
    println!("Output: {}", config.output_dir.display());

    let orchestrator =
        Orchestrator::from_config(config).context("Failed to initialize pipeline")?;
    let mut handle = spawn_pipeline(Arc::new(orchestrator));
    let mut tracker = ProgressTracker::new("Clip");

    while let Some(event) = handle.next_event().await {
        match event {
            PipelineEvent::Progress(progress) => tracker.on_progress(progress),
            PipelineEvent::Completed(summary) => {
                info!(clips = summary.clips, "Run finished");
                println!(
                    "Selected {} frames from {} clips ({} frames decoded)",
                    summary.selected.len(),
                    summary.clips,
                    summary.frames_extracted
                );
                if !summary.skipped.is_empty() {
                    println!("Clips without a usable frame: {:?}", summary.skipped);
                }
                return Ok(());
            }
            PipelineEvent::Failed(message) => bail!("Pipeline failed: {message}"),
        }
    }
    bail!("Pipeline stopped without reporting a result")
}

fn load_scorer(model: &Path, crop: CropMode) -> Result<QualityScorer> {
    let config = OnnxModelConfig {
        crop_mode: crop,
        ..OnnxModelConfig::default()
    };
    let model = OnnxQualityModel::load(model, config).context("Failed to load quality model")?;
    Ok(QualityScorer::new(Arc::new(model)))
}

fn print_info(input: &Path, clip_duration: f64) -> Result<()> {
    let reader = VideoReader::open(input).context("Failed to open video file")?;
    let info = reader.info();

    println!("\n=== Video Information ===");
    println!("File: {}", info.path.display());
    println!("Resolution: {}x{}", info.width, info.height);
    println!(
        "Frame rate: {}/{} ({:.2} fps)",
        info.fps_num,
        info.fps_den,
        info.fps()
    );
    println!(
        "Duration: {} ms ({:.2} seconds)",
        info.duration_ms,
        info.duration_ms as f64 / 1000.0
    );
    println!("Frames (reported): {}", info.frame_count);

    let per_clip = frames_per_clip(clip_duration, info.fps())
        .context("Clip duration too short for this frame rate")?;
    println!(
        "Clips of {:.2}s: {} frames each, {} expected",
        clip_duration,
        per_clip,
        info.frame_count.div_ceil(per_clip as u64)
    );
    Ok(())
}
