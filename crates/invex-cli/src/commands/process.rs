//! Process command - extract invoices from a single document.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use invex_core::models::config::InvexConfig;
use invex_core::models::{NullPolicy, PipelineResult};
use invex_core::validation::Validator;
use invex_core::{CancelFlag, ExtractionPipeline};

use super::output::{OutputFormat, format_result};
use super::{build_backend, load_config};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input file (PDF, TXT or MD)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    #[command(flatten)]
    generation: GenerationOverrides,

    /// Score the extracted data and report warnings
    #[arg(long)]
    validate: bool,
}

/// Command-line overrides of the generation settings.
#[derive(Args, Clone, Default)]
pub struct GenerationOverrides {
    /// Ollama model name
    #[arg(short, long)]
    model: Option<String>,

    /// Ollama server address
    #[arg(long)]
    base_url: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Let explicit nulls from later stages erase earlier values
    #[arg(long)]
    overwrite_nulls: bool,
}

impl GenerationOverrides {
    pub fn apply(&self, config: &mut InvexConfig) {
        if let Some(model) = &self.model {
            config.generation.model = model.clone();
        }
        if let Some(base_url) = &self.base_url {
            config.generation.base_url = base_url.clone();
        }
        if let Some(timeout) = self.timeout {
            config.generation.timeout_secs = timeout;
        }
        if self.overwrite_nulls {
            config.pipeline.null_policy = NullPolicy::Overwrite;
        }
    }
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    args.generation.apply(&mut config);

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    info!(
        "Processing {} with {} at {}",
        args.input.display(),
        config.generation.model,
        config.generation.base_url
    );

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );
    pb.enable_steady_tick(Duration::from_millis(120));

    let cancel = CancelFlag::new();
    let result = run_pipeline(&config, args.input.clone(), cancel, &pb).await?;

    pb.finish_and_clear();

    let report = args
        .validate
        .then(|| Validator::new(config.validation.clone()).score(&result));

    if let Some(report) = &report {
        if !report.warnings.is_empty() || !report.critical_issues.is_empty() {
            eprintln!("{}", style("Validation issues:").yellow());
            for issue in &report.critical_issues {
                eprintln!("  - {}", style(issue).red());
            }
            for warning in &report.warnings {
                eprintln!("  - {}", warning);
            }
        }
        eprintln!(
            "{} Quality: {:.1}% ({})",
            style("ℹ").blue(),
            report.overall_score,
            report.quality
        );
    }

    let output = format_result(&result, report.as_ref(), args.format)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    let metadata = result.metadata();
    if metadata.is_degraded() {
        eprintln!(
            "{} Some stages failed; affected invoices may be incomplete",
            style("⚠").yellow()
        );
    }

    debug!("Total processing time: {:?}", start.elapsed());

    if let Some((kind, message)) = result.error() {
        anyhow::bail!("Extraction failed ({}): {}", kind, message);
    }

    Ok(())
}

/// Run the pipeline on a worker thread; Ctrl-C cancels after the current stage.
async fn run_pipeline(
    config: &InvexConfig,
    input: PathBuf,
    cancel: CancelFlag,
    pb: &ProgressBar,
) -> anyhow::Result<PipelineResult> {
    let mut handle = tokio::task::spawn_blocking({
        let config = config.clone();
        let cancel = cancel.clone();
        let pb = pb.clone();
        move || -> anyhow::Result<PipelineResult> {
            let backend = build_backend(&config)?;
            let pipeline = ExtractionPipeline::new(backend, &config).with_cancel_flag(cancel);
            let sink = |message: &str| pb.set_message(message.to_string());
            Ok(pipeline.run(&input, &sink))
        }
    });

    tokio::select! {
        joined = &mut handle => joined?,
        _ = tokio::signal::ctrl_c() => {
            cancel.cancel();
            pb.set_message("Cancelling after the current stage...");
            handle.await?
        }
    }
}
