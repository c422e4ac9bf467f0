//! waste_sorter - camera-driven biodegradable / non-biodegradable sorting gate
//!
//! Startup:
//! 1. Load configuration (file, then SORTER_* environment overrides)
//! 2. Open the camera, detector, servos and display
//! 3. Connect the camera, warm up the detector, center the servos
//!
//! Then the control loop runs until the operator presses the exit key (window)
//! or Ctrl+C (headless).

use anyhow::Result;
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;

use waste_sorter::config::DisplayKind;
use waste_sorter::{SorterConfig, SortingLoop};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(
    name = "waste_sorter",
    version,
    about = "Sort items into biodegradable and non-biodegradable bins"
)]
struct Args {
    /// Config file (JSON, or TOML by extension). Falls back to SORTER_CONFIG.
    #[arg(long, value_name = "PATH", env = "SORTER_CONFIG")]
    config: Option<PathBuf>,

    /// Use the synthetic camera, scripted detector and recording servos.
    #[arg(long)]
    dry_run: bool,

    /// Log status instead of opening a window; stop with Ctrl+C.
    #[arg(long)]
    headless: bool,

    /// Stop after this many frames.
    #[arg(long, value_name = "N")]
    frames: Option<u64>,

    /// UI mode for stderr startup progress
    #[arg(long, value_enum, default_value_t = ui::UiMode::Auto)]
    ui: ui::UiMode,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let ui = ui::Ui::new(args.ui, std::io::stderr().is_terminal());

    let cfg = ui.stage("Load configuration", || {
        let mut cfg = SorterConfig::load_from(args.config.as_deref())?;
        if args.dry_run {
            cfg = cfg.into_dry_run();
        }
        if args.headless {
            cfg.display.mode = DisplayKind::Headless;
        }
        if let Some(frames) = args.frames {
            cfg.display.frame_limit = Some(frames);
        }
        Ok(cfg)
    })?;

    log::info!(
        "camera={} {}x{} {:?}, detector={:?} ({}), pins={:?}",
        cfg.camera.device,
        cfg.camera.width,
        cfg.camera.height,
        cfg.camera.pixel_format,
        cfg.detector.backend,
        cfg.detector.model_path.display(),
        cfg.actuators.pins
    );
    log::info!(
        "biodegradable=[{}] nonbiodegradable=[{}] tie_break={:?}",
        cfg.categories.biodegradable().collect::<Vec<_>>().join(", "),
        cfg.categories.nonbiodegradable().collect::<Vec<_>>().join(", "),
        cfg.sorting.tie_break
    );

    let mut sorter = ui.stage("Open components", || SortingLoop::from_config(&cfg))?;
    if let Err(err) = ui.stage("Start camera, detector and servos", || sorter.start()) {
        sorter.shutdown();
        return Err(err);
    }

    let stats = sorter.run()?;
    log::info!(
        "final state={} frames={} skipped_detections={}",
        stats.last_state,
        stats.frames,
        stats.skipped_detections
    );
    Ok(())
}
