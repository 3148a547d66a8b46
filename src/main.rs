use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

mod attachment;
mod commands;
mod config;
mod conversation;
mod error;
mod events;
mod llm;
mod logging;
mod prompts;
mod server;
mod session;
mod storage;
#[cfg(test)]
mod testing;

use config::Config;
use conversation::{ChatController, ChatSettings};
use events::ConversationMode;
use llm::{GeminiClient, GenerativeBackend};
use server::ServerState;
use storage::StorageManager;

#[derive(Parser)]
#[command(name = "gemchat")]
#[command(version)]
#[command(about = "Multimodal chat with Gemini: text, images, video, audio and documents", long_about = None)]
struct Cli {
    /// Model to use instead of the configured one
    #[arg(long, global = true)]
    model: Option<String>,

    /// Send every turn on its own, without conversation memory
    #[arg(long, global = true)]
    single_turn: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP chat service (default)
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Chat in the terminal
    Chat,
    /// Ask a single question and print the answer
    Ask {
        text: String,
        /// File to send along with the question
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    logging::init_logging()?;

    let cli = Cli::parse();
    let mut config = Config::load()?;
    if let Some(model) = cli.model {
        config.model = model;
    }
    if cli.single_turn {
        config.mode = ConversationMode::SingleTurn;
    }

    let api_key = Config::api_key()?;
    let client = GeminiClient::new(&config, api_key)?;
    tracing::info!(model = client.model(), mode = config.mode.display_name(), "gemini client ready");
    let backend: Arc<dyn GenerativeBackend> = Arc::new(client);

    match cli.command.unwrap_or(Commands::Serve { host: None, port: None }) {
        Commands::Serve { host, port } => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            let addr: SocketAddr = format!("{}:{}", host, port)
                .parse()
                .with_context(|| format!("Invalid listen address {}:{}", host, port))?;

            let controller = ChatController::new(backend, ChatSettings::from_config(&config));
            let storage = StorageManager::new(config.staging_dir());
            let state = Arc::new(
                ServerState::new(controller, storage, config.upload.max_upload_bytes)
                    .with_idle_timeout(config.server.idle_timeout()),
            );
            server::run_server(addr, state).await?;
        }
        Commands::Chat => {
            let controller = ChatController::new(backend, ChatSettings::from_config(&config));
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            commands::run_chat(&controller, stdin, &mut std::io::stdout()).await?;
        }
        Commands::Ask { text, file } => {
            let settings = ChatSettings {
                mode: ConversationMode::SingleTurn,
                ..ChatSettings::from_config(&config)
            };
            let controller = ChatController::new(backend, settings);
            let (outcome, reply) = commands::ask_once(&controller, &text, file.as_deref()).await?;
            println!("{}", reply);
            if outcome.is_failure() {
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
