//! Batch processing command for multiple invoice documents.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, warn};

use invex_core::models::PipelineResult;
use invex_core::models::config::InvexConfig;
use invex_core::validation::{ValidationReport, Validator};
use invex_core::{CancelFlag, ExtractionPipeline, NoProgress};

use super::output::{OutputFormat, format_result};
use super::process::GenerationOverrides;
use super::{build_backend, load_config};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Input files or glob pattern
    #[arg(required = true)]
    input: String,

    /// Output directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output format for each file
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Also generate a summary CSV
    #[arg(long)]
    summary: bool,

    /// Continue on error
    #[arg(long)]
    continue_on_error: bool,

    #[command(flatten)]
    generation: GenerationOverrides,
}

/// Result of processing a single file.
struct FileOutcome {
    path: PathBuf,
    result: Option<PipelineResult>,
    report: Option<ValidationReport>,
    error: Option<String>,
    processing_time_ms: u64,
}

impl FileOutcome {
    fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    args.generation.apply(&mut config);

    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| {
            let ext = p.extension().and_then(|e| e.to_str()).unwrap_or("");
            matches!(ext.to_lowercase().as_str(), "pdf" | "txt" | "md")
        })
        .collect();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let overall_pb = ProgressBar::new(files.len() as u64);
    overall_pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("=>-"),
    );

    let cancel = CancelFlag::new();
    let mut handle = tokio::task::spawn_blocking({
        let config = config.clone();
        let cancel = cancel.clone();
        let pb = overall_pb.clone();
        let continue_on_error = args.continue_on_error;
        move || process_files(files, &config, cancel, &pb, continue_on_error)
    });

    let outcomes = tokio::select! {
        joined = &mut handle => joined??,
        _ = tokio::signal::ctrl_c() => {
            cancel.cancel();
            overall_pb.set_message("cancelling...");
            handle.await??
        }
    };

    overall_pb.finish_with_message("Complete");

    if let Some(output_dir) = &args.output_dir {
        for outcome in outcomes.iter().filter(|o| o.succeeded()) {
            let Some(result) = &outcome.result else {
                continue;
            };
            let output_name = outcome
                .path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("invoice");
            let output_path = output_dir.join(format!("{}.{}", output_name, args.format.extension()));

            let content = format_result(result, outcome.report.as_ref(), args.format)?;
            fs::write(&output_path, content)?;
            debug!("Wrote output to {}", output_path.display());
        }
    }

    if args.summary {
        let summary_path = args
            .output_dir
            .as_ref()
            .map(|d| d.join("summary.csv"))
            .unwrap_or_else(|| PathBuf::from("summary.csv"));

        write_summary(&summary_path, &outcomes)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    let successful = outcomes.iter().filter(|o| o.succeeded()).count();
    let failed: Vec<_> = outcomes.iter().filter(|o| !o.succeeded()).collect();

    println!();
    println!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        outcomes.len(),
        start.elapsed()
    );
    println!(
        "   {} successful, {} failed",
        style(successful).green(),
        style(failed.len()).red()
    );

    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for outcome in &failed {
            println!(
                "  - {}: {}",
                outcome.path.display(),
                outcome.error.as_deref().unwrap_or("unknown error")
            );
        }

        if !args.continue_on_error {
            anyhow::bail!(
                "Processing failed: {}",
                failed[0].error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    Ok(())
}

/// Process files one after another with a single backend.
///
/// Without `continue_on_error` the first failure stops the batch; the
/// outcomes gathered so far are still returned.
fn process_files(
    files: Vec<PathBuf>,
    config: &InvexConfig,
    cancel: CancelFlag,
    pb: &ProgressBar,
    continue_on_error: bool,
) -> anyhow::Result<Vec<FileOutcome>> {
    let backend = build_backend(config)?;
    let pipeline = ExtractionPipeline::new(backend, config).with_cancel_flag(cancel.clone());
    let validator = Validator::new(config.validation.clone());

    let mut outcomes = Vec::with_capacity(files.len());

    for path in files {
        if cancel.is_cancelled() {
            warn!("Batch cancelled, {} not processed", path.display());
            break;
        }

        pb.set_message(display_name(&path));
        let file_start = Instant::now();
        let result = pipeline.run(&path, &NoProgress);
        let processing_time_ms = file_start.elapsed().as_millis() as u64;

        let outcome = match result.error() {
            None => FileOutcome {
                report: Some(validator.score(&result)),
                result: Some(result),
                error: None,
                path,
                processing_time_ms,
            },
            Some((kind, message)) => {
                let error_msg = format!("{}: {}", kind, message);
                if continue_on_error {
                    warn!("Failed to process {}: {}", path.display(), error_msg);
                } else {
                    error!("Failed to process {}: {}", path.display(), error_msg);
                }
                FileOutcome {
                    path,
                    result: None,
                    report: None,
                    error: Some(error_msg),
                    processing_time_ms,
                }
            }
        };

        let stop = !continue_on_error && !outcome.succeeded();
        outcomes.push(outcome);
        pb.inc(1);
        if stop {
            break;
        }
    }

    Ok(outcomes)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_string()
}

fn write_summary(path: &Path, outcomes: &[FileOutcome]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "filename",
        "status",
        "invoice_count",
        "invoice_numbers",
        "failed_stages",
        "overall_score",
        "quality",
        "is_valid",
        "processing_time_ms",
        "error",
    ])?;

    for outcome in outcomes {
        let filename = display_name(&outcome.path);
        let elapsed = outcome.processing_time_ms.to_string();

        match (&outcome.result, &outcome.report) {
            (Some(result), Some(report)) => {
                let metadata = result.metadata();
                let failed_stages: usize = metadata
                    .extraction_stages
                    .iter()
                    .map(|p| p.failed_stages().len())
                    .sum();
                let status = if metadata.cancelled { "cancelled" } else { "success" };

                wtr.write_record([
                    filename.as_str(),
                    status,
                    &metadata.invoice_count.to_string(),
                    &metadata.invoice_numbers.join(";"),
                    &failed_stages.to_string(),
                    &format!("{:.1}", report.overall_score),
                    report.quality.as_str(),
                    &report.is_valid.to_string(),
                    &elapsed,
                    "",
                ])?;
            }
            _ => {
                wtr.write_record([
                    filename.as_str(),
                    "error",
                    "",
                    "",
                    "",
                    "",
                    "",
                    "",
                    &elapsed,
                    outcome.error.as_deref().unwrap_or(""),
                ])?;
            }
        }
    }

    wtr.flush()?;
    Ok(())
}
