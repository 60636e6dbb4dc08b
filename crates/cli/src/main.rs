use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};

use signcall_core::pipeline::caption_pipeline::CaptionPipeline;
use signcall_core::pipeline::event_handler::{EventHandler, NoHandsExtractor};
use signcall_core::pipeline::infrastructure::threaded_event_executor::ThreadedEventExecutor;
use signcall_core::pipeline::pipeline_logger::{PipelineLogger, SummaryPipelineLogger};
use signcall_core::shared::constants::HAND_KEYPOINTS;
use signcall_core::shared::landmarks::{HandLandmarks, Handedness, Keypoint, LandmarkFrame};
use signcall_core::shared::session_store::SessionKey;
use signcall_core::shared::settings::Settings;
use signcall_core::translation::domain::caption_style::CaptionStyle;

/// Live sign-language captioning over a JSON-lines event stream.
#[derive(Parser)]
#[command(name = "signcall")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Read frame and correction events, write caption events to stdout.
    Run(RunArgs),
    /// Caption a synthetic waving hand to check the installation.
    Demo(DemoArgs),
}

#[derive(Args)]
struct PipelineArgs {
    /// Settings file (defaults to the platform config file when present).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Frames per recognition window.
    #[arg(long)]
    window_size: Option<usize>,

    /// Drop predictions below this confidence before smoothing (0.0-1.0).
    #[arg(long)]
    confidence_floor: Option<f64>,

    /// Directory holding the learned pose model files.
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Frames between progress log lines.
    #[arg(long, default_value = "100")]
    log_every: usize,
}

#[derive(Args)]
struct RunArgs {
    /// Event file (reads stdin when omitted).
    #[arg(long)]
    input: Option<PathBuf>,

    /// Worker threads; events for one (session, user) stay on one worker.
    #[arg(long, default_value = "2")]
    workers: usize,

    /// Forget sessions idle for this many seconds.
    #[arg(long)]
    idle_timeout: Option<u64>,

    #[command(flatten)]
    pipeline: PipelineArgs,
}

#[derive(Args)]
struct DemoArgs {
    /// Number of synthetic frames.
    #[arg(long, default_value = "30")]
    frames: usize,

    /// Caption style: concise or detailed.
    #[arg(long, default_value = "concise")]
    style: CaptionStyle,

    #[command(flatten)]
    pipeline: PipelineArgs,
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
        Command::Run(args) => run_stream(args),
        Command::Demo(args) => run_demo(args),
    }
}

fn run_stream(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    if args.workers == 0 {
        return Err("--workers must be at least 1".into());
    }
    let mut settings = load_settings(&args.pipeline)?;
    if let Some(secs) = args.idle_timeout {
        settings.session_idle_timeout_secs = Some(secs);
    }
    settings.validate()?;
    log_configuration(&settings);

    let input: Box<dyn BufRead + Send> = match &args.input {
        Some(path) => {
            let file = File::open(path)
                .map_err(|e| format!("Cannot open input {}: {e}", path.display()))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(io::stdin())),
    };

    let pipeline = Arc::new(CaptionPipeline::from_settings(
        &settings,
        build_logger(args.pipeline.log_every),
    ));
    let handler = Arc::new(EventHandler::new(
        pipeline.clone(),
        Box::new(NoHandsExtractor),
    ));
    // Sweep at half the idle timeout.
    let sweep = settings.session_idle_timeout().map(|t| t / 2);
    let executor = ThreadedEventExecutor::new(args.workers).with_sweep_interval(sweep);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let stats = executor.execute(handler, input, &mut |caption| {
        serde_json::to_writer(&mut out, caption)?;
        writeln!(out)?;
        out.flush()?;
        Ok(())
    })?;

    pipeline.summary();
    log::info!(
        "Read {} lines, handled {} events, dropped {}, emitted {} captions, evicted {} idle entries",
        stats.lines_read,
        stats.events_handled,
        stats.events_dropped,
        stats.captions_emitted,
        stats.entries_evicted
    );
    Ok(())
}

fn run_demo(args: DemoArgs) -> Result<(), Box<dyn std::error::Error>> {
    let settings = load_settings(&args.pipeline)?;
    settings.validate()?;
    log_configuration(&settings);

    let pipeline = CaptionPipeline::from_settings(&settings, build_logger(args.pipeline.log_every));
    let key = SessionKey::new("demo", "signer");
    let stdout = io::stdout();
    let mut out = stdout.lock();

    for i in 0..args.frames {
        let ts = i as i64 * 125;
        let outcome = pipeline.process_frame(&key, ts, wave_frame(i, ts), None, Some(args.style));
        if let Some(caption) = outcome.into_caption() {
            serde_json::to_writer(&mut out, &caption)?;
            writeln!(out)?;
        }
    }
    out.flush()?;
    pipeline.summary();
    Ok(())
}

fn load_settings(args: &PipelineArgs) -> Result<Settings, Box<dyn std::error::Error>> {
    let mut settings = Settings::load(args.config.as_deref())?;
    if let Some(window) = args.window_size {
        settings.window_size = window;
        settings.max_buffer_len = settings.max_buffer_len.max(window);
    }
    if let Some(floor) = args.confidence_floor {
        if !(0.0..=1.0).contains(&floor) {
            return Err(format!("Confidence floor must be between 0.0 and 1.0, got {floor}").into());
        }
        settings.confidence_floor = Some(floor);
    }
    if let Some(dir) = &args.model_dir {
        settings.model_dir = Some(dir.clone());
    }
    Ok(settings)
}

fn build_logger(log_every: usize) -> Box<dyn PipelineLogger> {
    Box::new(SummaryPipelineLogger::new(log_every))
}

fn log_configuration(settings: &Settings) {
    log::info!(
        "Window {} frames, buffer cap {}, thresholds {:.2}/{:.2}",
        settings.window_size,
        settings.max_buffer_len,
        settings.confidence_low,
        settings.confidence_high
    );
    if settings.llm.is_configured() {
        log::info!("Caption service: {} at {}", settings.llm.model, settings.llm.endpoint);
    } else {
        log::info!("No caption service configured, using templates only");
    }
}

/// Open right hand swinging side to side at shoulder height.
fn wave_frame(index: usize, ts: i64) -> LandmarkFrame {
    let x = 0.5 + 0.06 * (index as f64 * 1.2).sin();
    let y = 0.35;
    let mut points = [Keypoint::new(x, y, 0.0); HAND_KEYPOINTS];
    for (finger, dx) in [-0.06, -0.03, -0.01, 0.01, 0.03].iter().enumerate() {
        for joint in 0..4 {
            let up = 0.05 + 0.025 * joint as f64;
            points[1 + finger * 4 + joint] = Keypoint::new(x + dx, y - up, 0.0);
        }
    }
    LandmarkFrame::with_hands(ts, vec![HandLandmarks::complete(points, Some(Handedness::Right))])
}
