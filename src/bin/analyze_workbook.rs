use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, warn};

use gas_meter_analyzer::classifier::{BoundsMode, Verdict};
use gas_meter_analyzer::report::export_to_dir;
use gas_meter_analyzer::services::{apply_history, AnalysisService, BatchReport};

#[derive(Parser)]
#[command(name = "analyze-workbook")]
#[command(about = "Classify gas meter operating range from monthly customer workbooks", long_about = None)]
struct Cli {
    /// Monthly workbooks (.xls/.xlsx), oldest first; the file stem is used as the period label
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Where rated bounds come from: 'table' (capacity table) or 'per-sample' (instrument columns)
    #[arg(long, env = "BOUNDS_MODE", default_value = "table")]
    bounds: BoundsMode,

    /// Directory for the recap files
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Also write the full batch report as JSON
    #[arg(long)]
    json: bool,

    /// Do not carry verdicts of earlier files into later recaps
    #[arg(long)]
    no_history: bool,
}

fn period_label(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "unnamed".to_string())
}

fn verdict_summary(report: &BatchReport) -> String {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for (_, record) in report.records() {
        *counts.entry(record.verdict.to_string()).or_default() += 1;
    }
    for verdict in [Verdict::Normal, Verdict::Overrange, Verdict::Underrange] {
        counts.entry(verdict.to_string()).or_default();
    }
    counts
        .iter()
        .map(|(verdict, n)| format!("{verdict}={n}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if it exists (ignore errors if not found)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let start = Instant::now();
    let service = AnalysisService::default();

    info!(
        "Analyzing {} workbook(s) with {:?} bounds",
        cli.files.len(),
        cli.bounds
    );

    let pb = ProgressBar::new(cli.files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")?
            .progress_chars("##-"),
    );

    let mut history: Vec<BatchReport> = Vec::new();
    let mut failed_files = 0;

    for file in &cli.files {
        let period = period_label(file);
        pb.set_message(period.clone());

        let report = match service.analyze_path(file, Some(&period), cli.bounds) {
            Ok(report) => report,
            Err(e) => {
                error!("Skipping {}: {}", file.display(), e);
                failed_files += 1;
                pb.inc(1);
                continue;
            }
        };

        let report = if cli.no_history {
            report
        } else {
            let n = history.len();
            let previous = n.checked_sub(1).map(|i| &history[i]);
            let before_previous = n.checked_sub(2).map(|i| &history[i]);
            apply_history(report, previous, before_previous)
        };

        let paths = export_to_dir(&report, &cli.output_dir, cli.json)?;
        pb.println(format!(
            "{period}: {} classified ({}), {} failed -> {}",
            report.classified,
            verdict_summary(&report),
            report.failed,
            paths.recap.display()
        ));
        if let Some(failures) = &paths.failures {
            warn!("{} sheet(s) failed, see {}", report.failed, failures.display());
        }

        history.push(report);
        pb.inc(1);
    }

    pb.finish_with_message(format!(
        "✓ {} workbook(s) analyzed in {:.1}s",
        history.len(),
        start.elapsed().as_secs_f64()
    ));

    if failed_files > 0 {
        return Err(format!("{failed_files} workbook(s) could not be read").into());
    }
    Ok(())
}
