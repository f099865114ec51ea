use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use doc_assistant::{
    cli::{Cli, Commands},
    collaborators::LanguageModel,
    config::{Config, LogFormat},
    index::LocalIndexer,
    llm::{LlmClient, OfflineModel},
    server::{self, AppState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    init_logging(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Document assistant starting..."
    );

    let llm: Arc<dyn LanguageModel> = match &config.llm.endpoint_url {
        Some(url) => match LlmClient::new(&config.llm, config.request.clone()) {
            Ok(client) => {
                info!(endpoint = %url, "LLM client initialized");
                Arc::new(client)
            }
            Err(e) => {
                error!(error = %e, "Failed to initialize LLM client");
                return Err(e.into());
            }
        },
        None => {
            warn!("LLM_ENDPOINT_URL not set, using offline model");
            Arc::new(OfflineModel::new())
        }
    };

    let command = cli.command();
    let bind = match &command {
        Commands::Serve { bind } => bind.clone().unwrap_or_else(|| config.server.bind.clone()),
        Commands::Purge => String::new(),
    };

    let state = Arc::new(AppState::new(config, Arc::new(LocalIndexer::new()), llm));

    match command {
        Commands::Purge => {
            state.cache.purge_all().await?;
            info!("Purge complete");
        }
        Commands::Serve { .. } => {
            match server::handle_startup(&state).await {
                Ok(report) => info!(
                    recovered = report.recovered.len(),
                    missing = report.missing_index.len(),
                    "Cache restored"
                ),
                Err(e) => warn!(error = %e, "Cache recovery failed, starting empty"),
            }

            if let Err(e) = server::run(state, &bind).await {
                error!(error = %e, "Server error");
                return Err(e);
            }
            info!("Server shutdown complete");
        }
    }

    Ok(())
}

/// Initialize tracing/logging
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
