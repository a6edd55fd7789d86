use anyhow::Result;
use bean_roast::{
    capture::{CaptureMode, FacingMode},
    config::{Config, PipelineConfig, TARGET_SIZE},
    image::ResizePolicy,
    web::serve,
};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bean-roast")]
#[command(about = "Coffee bean roast level classifier (Dark / Green / Light / Medium)")]
struct Args {
    /// Server bind address
    #[arg(long, default_value = "0.0.0.0:5005")]
    bind: String,

    /// Number of worker threads
    #[arg(long)]
    workers: Option<usize>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Model directory path (expects roast/model.onnx)
    #[arg(long, default_value = "models")]
    models_dir: String,

    /// Image acquisition mode
    #[arg(long, value_enum, default_value = "live-stream")]
    capture_mode: CaptureMode,

    /// Resize interpolation used before inference
    #[arg(long, value_enum, default_value = "bilinear")]
    resize: ResizePolicy,

    /// Preferred camera facing
    #[arg(long, value_enum, default_value = "environment")]
    facing: FacingMode,

    /// Enable development mode
    #[arg(long)]
    dev: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // 初始化日志系统
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_target(false)
        .init();

    tracing::info!("Starting bean roast classifier...");
    tracing::info!("Bind address: {}", args.bind);
    tracing::info!("Models directory: {}", args.models_dir);

    let pipeline = PipelineConfig {
        capture_mode: args.capture_mode,
        resize_policy: args.resize,
        target_size: TARGET_SIZE,
        facing: args.facing,
    };

    let config = Config::new(args.bind, args.models_dir, args.workers, args.dev, pipeline)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.workers)
        .enable_all()
        .build()?;

    runtime.block_on(serve(config))?;

    Ok(())
}
