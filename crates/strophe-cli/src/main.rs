//! Strophe CLI - human-in-the-loop stanza writing
//!
//! Usage:
//!   strophe start "<brief>"                Start a new session
//!   strophe resume <session> "<feedback>"  Resume a suspended session
//!   strophe show <session>                 Show the latest session state

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use strophe_core::StropheConfig;
use strophe_engine::{Engine, FileCheckpointer, SessionState};
use strophe_gen::HttpGenerator;
use strophe_retrieval::HttpRetriever;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "strophe")]
#[command(version, about = "Stanza writing with pause-for-feedback orchestration")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file
    #[arg(long, default_value = "strophe.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a new session from a brief
    Start {
        /// The creative brief
        brief: String,
    },

    /// Resume a suspended session with raw feedback
    Resume {
        /// Session identifier from a previous start
        session: String,

        /// Free-text feedback on the visible stanza
        feedback: String,
    },

    /// Show the latest persisted state of a session
    Show {
        /// Session identifier
        session: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = StropheConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    // Long-lived service clients, constructed once and injected
    let generator =
        Arc::new(HttpGenerator::new(config.models.clone()).context("generation client")?);
    let retriever = Arc::new(HttpRetriever::new(config.retrieval_url.clone()));
    let checkpointer = Arc::new(FileCheckpointer::new(config.checkpoint_dir.clone()));
    let engine = Engine::new(generator, retriever, checkpointer, config);

    match cli.command {
        Commands::Start { brief } => {
            let state = engine.start_session(&brief).await?;
            print_state(&state);
        }
        Commands::Resume { session, feedback } => {
            let state = engine.continue_session(&session, &feedback).await?;
            print_state(&state);
        }
        Commands::Show { session } => match engine.snapshot(&session).await? {
            Some(ctx) => {
                println!("Session: {}", session);
                println!("Stage: {}", ctx.stage);
                println!("Stanzas: {}", ctx.stanzas.len());
                if let Some(visible) = &ctx.visible {
                    println!("\n--- stanza {} ---\n{}", visible.k, visible.text);
                }
                if ctx.awaiting_feedback {
                    if let Some(prompt) = &ctx.feedback_prompt {
                        println!("\nAwaiting feedback. {}", prompt);
                    }
                }
                if let Some(final_text) = &ctx.final_text {
                    println!("\n=== final ===\n{}", final_text);
                }
            }
            None => println!("No such session: {}", session),
        },
    }

    Ok(())
}

fn print_state(state: &SessionState) {
    println!("Session: {}", state.session_id);
    if let Some(visible) = &state.visible {
        println!("\n--- stanza {} ---\n{}", visible.k, visible.text);
    }
    match &state.final_text {
        Some(final_text) => println!("\n=== final ===\n{}", final_text),
        None if state.awaiting_feedback => {
            println!("\nAwaiting feedback. Resume with: strophe resume {} \"<notes>\"", state.session_id);
        }
        None => {}
    }
}
