//! metrics_placeholder - Create a placeholder metrics.json.
//!
//! Never overwrites an existing file. The last detection record, when
//! readable, is embedded as `last_detection`.

use anyhow::Result;
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;

use traffic_lens::config::ToolConfig;
use traffic_lens::reconcile::{write_placeholder, PlaceholderOutcome};
use traffic_lens::record::PriorRecord;

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(
    name = "metrics_placeholder",
    about = "Create a placeholder metrics.json if none exists"
)]
struct Args {
    /// Directory holding detection records and metrics files
    #[arg(long, value_name = "DIR")]
    results_dir: Option<PathBuf>,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = ui::Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    let mut cfg = ToolConfig::load()?;
    if let Some(dir) = args.results_dir {
        cfg.metrics.results_dir = dir;
    }
    cfg.validate()?;

    let path = cfg.metrics.placeholder_path();
    if path.exists() {
        println!("{} already exists. Nothing changed.", path.display());
        return Ok(());
    }

    std::fs::create_dir_all(&cfg.metrics.results_dir)?;
    let last_detection = PriorRecord::load(&cfg.metrics.last_detection_path()).map(|r| r.raw);
    if last_detection.is_some() {
        log::info!("including the last detection record");
    }

    let outcome = {
        let _stage = ui.stage("Write placeholder metrics");
        write_placeholder(&path, last_detection, chrono::Utc::now())?
    };
    match outcome {
        PlaceholderOutcome::Created => println!("Created placeholder {}", path.display()),
        PlaceholderOutcome::AlreadyPresent => {
            println!("{} already exists. Nothing changed.", path.display())
        }
    }
    Ok(())
}
