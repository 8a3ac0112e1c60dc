use attest::cli::{self, commands::LogFormat};
use attest::config;
use attest::errors::AttestError;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    // Initialize logging
    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    match cli.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_ansi(!cli.no_color)
            .with_writer(std::io::stderr)
            .init(),
    }
    if cli.no_color {
        console::set_colors_enabled(false);
    }

    let global = cli.global;
    let result = match cli.command {
        cli::Commands::Serve(args) => cli::serve::handle_serve(args, &global).await,
        cli::Commands::Check(args) => cli::check::handle_check(args, &global).await,
        cli::Commands::Fanout(args) => cli::check::handle_fanout(args, &global).await,
        cli::Commands::Sebi(args) => cli::sebi::handle_sebi(args, &global).await,
        cli::Commands::Import(args) => cli::import::handle_import(args, &global).await,
        cli::Commands::Validate(args) => handle_validate(args).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        let exit_code = match &e {
            AttestError::Config(_) => 2,
            AttestError::InvalidInput(_) => 3,
            AttestError::NotFound(_) => 4,
            AttestError::LLMUnavailable(_) | AttestError::Network(_) => 5,
            _ => 1,
        };
        std::process::exit(exit_code);
    }
}

async fn handle_validate(args: cli::commands::ValidateArgs) -> Result<(), AttestError> {
    let path = std::path::PathBuf::from(&args.config);
    let _config = config::parse_config(&path).await?;
    println!("Configuration is valid: {}", args.config);
    Ok(())
}
