use clap::{Parser, Subcommand};
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use marginalia::llm::OllamaClient;
use marginalia::scheduler::CommentScheduler;
use marginalia::store::Store;

#[derive(Parser)]
#[command(
    name = "marginalia",
    version,
    about = "Self-hosted journal backend with autonomous LLM margin comments"
)]
struct Cli {
    /// Data directory holding the JSON documents
    #[arg(long, global = true, env = "MARGINALIA_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the background comment scheduler until interrupted
    Run,
    /// Make one generation attempt right now
    Once {
        /// Model to use; a random allowed model when omitted
        #[arg(long)]
        model: Option<String>,
    },
    /// List the models the scheduler is allowed to use
    Models,
}

fn setup_logging() -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("marginalia")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("marginalia.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}


#[tokio::main]
async fn main() -> Result<()> {
    setup_logging()?;
    let cli = Cli::parse();

    let store = Store::new(&cli.data_dir);
    let client = Arc::new(OllamaClient::new(&cli.data_dir)?);
    let scheduler = CommentScheduler::new(store.clone(), client);

    match cli.command {
        Commands::Run => {
            info!("starting scheduler, data dir {}", cli.data_dir.display());
            let handle = scheduler
                .start()
                .ok_or_else(|| eyre::eyre!("scheduler already running"))?;

            println!("{}", "Comment scheduler running. Ctrl-C to stop.".cyan());
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for ctrl-c")?;

            println!("{}", "Stopping...".yellow());
            scheduler.stop();
            // Cooperative: the loop exits at its next tick check. An
            // in-flight generation attempt is allowed to finish.
            let _ = handle.await;
            Ok(())
        }
        Commands::Once { model } => {
            let model = match model {
                Some(m) => m,
                None => scheduler.pick_random_model().await?,
            };
            match scheduler.run_once_for_model(&model).await {
                Ok(outcome) => {
                    println!(
                        "{} model {} commented on post {} (comment {})",
                        "ok:".green(),
                        outcome.model,
                        outcome.post_id,
                        outcome.comment_id
                    );
                    Ok(())
                }
                Err(e) => {
                    println!("{} {}", "failed:".red(), e);
                    Err(e.into())
                }
            }
        }
        Commands::Models => {
            let config = store.load_llm_config()?;
            let models = scheduler.allowed_models(&config).await;
            if models.is_empty() {
                println!("{}", "No allowed models available.".yellow());
            }
            for model in models {
                println!("{model}");
            }
            Ok(())
        }
    }
}
