//! Models command - inspect the Ollama server and pick the extraction model.

use clap::{Args, Subcommand};
use console::style;

use invex_core::models::config::InvexConfig;

use super::{build_backend, default_config_path, load_config};

/// Arguments for the models command.
#[derive(Args)]
pub struct ModelsArgs {
    #[command(subcommand)]
    command: ModelsCommand,
}

#[derive(Subcommand)]
enum ModelsCommand {
    /// List models installed on the Ollama server
    List,

    /// Check that the server is reachable and the configured model installed
    Status,

    /// Set the model used for extraction
    Use {
        /// Model name as listed by `invex models list`
        model: String,
    },
}

pub async fn run(args: ModelsArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    match args.command {
        ModelsCommand::List => {
            let models = fetch_models(config.clone()).await?;
            list_models(&config, &models);
            Ok(())
        }
        ModelsCommand::Status => check_status(config).await,
        ModelsCommand::Use { model } => use_model(config, &model),
    }
}

/// Query `/api/tags` on a worker thread.
async fn fetch_models(config: InvexConfig) -> anyhow::Result<Vec<String>> {
    tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<String>> {
        let backend = build_backend(&config)?;
        Ok(backend.list_models()?)
    })
    .await?
}

fn list_models(config: &InvexConfig, models: &[String]) {
    println!(
        "{} {}",
        style("Models on").bold(),
        style(&config.generation.base_url).bold().cyan()
    );
    println!();

    if models.is_empty() {
        println!("{} No models installed. Run 'ollama pull <model>'.", style("ℹ").blue());
        return;
    }

    for name in models {
        let marker = if *name == config.generation.model {
            style(" ◀ active").green().to_string()
        } else {
            String::new()
        };
        println!("  {} {}{}", style("▸").cyan(), name, marker);
    }
}

async fn check_status(config: InvexConfig) -> anyhow::Result<()> {
    println!(
        "{} Server: {}",
        style("ℹ").blue(),
        config.generation.base_url
    );

    let active = config.generation.model.clone();
    match fetch_models(config).await {
        Ok(models) => {
            println!("    {} Reachable ({} models)", style("✓").green(), models.len());
            if models.iter().any(|m| model_matches(m, &active)) {
                println!("    {} Model {} installed", style("✓").green(), active);
            } else {
                println!(
                    "    {} Model {} not installed. Run 'ollama pull {}'.",
                    style("⚠").yellow(),
                    active,
                    active
                );
            }
            Ok(())
        }
        Err(e) => {
            println!("    {} Unreachable: {}", style("✗").red(), e);
            anyhow::bail!("Ollama server is not reachable")
        }
    }
}

/// Ollama lists untagged models as `name:latest`.
fn model_matches(installed: &str, wanted: &str) -> bool {
    installed == wanted || (!wanted.contains(':') && installed == format!("{}:latest", wanted))
}

fn use_model(mut config: InvexConfig, model: &str) -> anyhow::Result<()> {
    let config_path = default_config_path();
    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    config.generation.model = model.to_string();
    config.save(&config_path)?;

    println!(
        "{} Using model {} (saved to {})",
        style("✓").green(),
        model,
        config_path.display()
    );
    Ok(())
}
