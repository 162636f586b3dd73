//! ksync CLI entry point.

use clap::Parser;

use knowledge_sync::cli::commands;
use knowledge_sync::cli::{handle_error, Cli, Commands};
use knowledge_sync::infrastructure::config::ConfigLoader;
use knowledge_sync::infrastructure::logging::LoggerImpl;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match cli.config.as_deref() {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(err) => handle_error(err, cli.json),
    };

    // Keeps the file writer flushing until exit
    let _logger = match LoggerImpl::init(&config.logging) {
        Ok(logger) => logger,
        Err(err) => handle_error(err, cli.json),
    };

    let result = match cli.command {
        Commands::Init(args) => commands::init::execute(args, cli.json).await,
        Commands::Source(args) => commands::source::execute(args, &config, cli.json).await,
        Commands::File(args) => commands::file::execute(args, &config, cli.json).await,
        Commands::Reconcile(args) => commands::reconcile::execute(args, &config, cli.json).await,
        Commands::Run(args) => commands::run::execute(args, &config, cli.json).await,
    };

    if let Err(err) = result {
        handle_error(err, cli.json);
    }
}
