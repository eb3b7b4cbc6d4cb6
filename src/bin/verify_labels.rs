//! verify_labels - Check that a dataset holds canonical labels.
//!
//! Read-only: reports directory layout, then every label file whose lines
//! are not `<class> <cx> <cy> <w> <h>` with a valid class and normalized
//! coordinates. Exits non-zero when problems are found.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;

use traffic_lens::config::ToolConfig;
use traffic_lens::labels::{check_layout, verify_dataset, DatasetLayout};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(
    name = "verify_labels",
    about = "Verify that dataset label files are canonical"
)]
struct Args {
    /// Dataset root containing <split>/images and <split>/labels
    #[arg(long, value_name = "DIR")]
    dataset_root: Option<PathBuf>,

    /// Split to check (repeatable; default from config)
    #[arg(long = "split", value_name = "NAME")]
    splits: Vec<String>,

    /// Number of classes; class ids must be below this
    #[arg(long)]
    num_classes: Option<u32>,

    /// Maximum number of problems to print
    #[arg(long, default_value_t = 20)]
    limit: usize,

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
    if let Some(root) = args.dataset_root {
        cfg.dataset.root = root;
    }
    if !args.splits.is_empty() {
        cfg.dataset.splits = args.splits;
    }
    if let Some(num_classes) = args.num_classes {
        cfg.dataset.num_classes = num_classes;
    }
    cfg.validate()?;

    let layout = DatasetLayout::new(&cfg.dataset.root);

    {
        let _stage = ui.stage("Check dataset layout");
        let presence = |present: bool| if present { "EXISTS" } else { "MISSING" };
        println!("{} -> {}", layout.root.display(), presence(layout.root.is_dir()));
        for split in check_layout(&layout, &cfg.dataset.splits) {
            println!(
                "{} images: {} -> {}",
                split.split.to_uppercase(),
                split.images_dir.display(),
                presence(split.images_present)
            );
            println!(
                "{} labels: {} -> {}",
                split.split.to_uppercase(),
                split.labels_dir.display(),
                presence(split.labels_present)
            );
        }
    }
    println!();

    let report = {
        let _stage = ui.stage("Verify label files");
        verify_dataset(&layout, &cfg.dataset.splits, cfg.dataset.num_classes)
    };
    for (split, count) in &report.checked {
        println!("Checked {} ({} label files)", split, count);
    }

    if report.is_clean() {
        println!();
        println!("All {} label files look fine.", report.total_checked());
        return Ok(());
    }

    println!();
    println!("Found problematic label files:");
    for (path, problem) in report.problems.iter().take(args.limit) {
        println!("  {} -> {}", path.display(), problem);
    }
    println!("Total bad files: {}", report.problems.len());
    Err(anyhow!(
        "{} of {} label files failed verification",
        report.problems.len(),
        report.total_checked()
    ))
}
