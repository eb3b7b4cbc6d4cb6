//! fix_labels - Repair a YOLO-style dataset's label files in place.
//!
//! For every `<root>/<split>/labels/*.txt` the tool infers the coordinate
//! system of each line, rewrites the file as canonical normalized lines, or
//! deletes it when nothing is recoverable. A summary report is written at the
//! end. `--dry-run` computes the report without touching any file.

use anyhow::Result;
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;

use traffic_lens::config::ToolConfig;
use traffic_lens::labels::dataset::list_label_files;
use traffic_lens::labels::{normalize_dataset, DatasetLayout, FixOptions};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(
    name = "fix_labels",
    about = "Normalize dataset label files into canonical YOLO lines"
)]
struct Args {
    /// Dataset root containing <split>/images and <split>/labels
    #[arg(long, value_name = "DIR")]
    dataset_root: Option<PathBuf>,

    /// Split to process (repeatable; default from config)
    #[arg(long = "split", value_name = "NAME")]
    splits: Vec<String>,

    /// Number of classes; 1 forces every class id to 0
    #[arg(long)]
    num_classes: Option<u32>,

    /// Skip lines whose coordinate system cannot be determined reliably
    #[arg(long)]
    strict: bool,

    /// Report what would change without writing or deleting files
    #[arg(long)]
    dry_run: bool,

    /// Where to write the fix report
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,

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
    if let Some(report) = args.report {
        cfg.dataset.report_path = report;
    }
    cfg.dataset.strict |= args.strict;
    cfg.dataset.dry_run |= args.dry_run;
    cfg.validate()?;

    let layout = DatasetLayout::new(&cfg.dataset.root);
    let options = FixOptions {
        num_classes: cfg.dataset.num_classes,
        mode: cfg.dataset.inference_mode(),
        dry_run: cfg.dataset.dry_run,
    };
    log::info!(
        "normalizing {} (splits: {}, classes: {}, mode: {:?}{})",
        layout.root.display(),
        cfg.dataset.splits.join(","),
        options.num_classes,
        options.mode,
        if options.dry_run { ", dry run" } else { "" }
    );

    let total: usize = cfg
        .dataset
        .splits
        .iter()
        .filter_map(|split| list_label_files(&layout.labels_dir(split)).ok())
        .map(|files| files.len())
        .sum();

    let report = {
        let progress = ui.progress("Repair label files", total as u64);
        normalize_dataset(&layout, &cfg.dataset.splits, &options, |_, _| progress.inc())
    };

    let rendered = report.render(cfg.dataset.report_detail_limit);
    for line in rendered.lines().take(10) {
        println!("{}", line);
    }
    if cfg.dataset.dry_run {
        println!();
        println!("Dry run: no files were changed and no report was written.");
        return Ok(());
    }

    {
        let _stage = ui.stage("Write report");
        report.write(&cfg.dataset.report_path, cfg.dataset.report_detail_limit)?;
    }
    println!();
    println!("Wrote detailed report to {}", cfg.dataset.report_path.display());
    Ok(())
}
