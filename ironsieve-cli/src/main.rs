use clap::Parser;

use ironsieve_cli::cli::{Cli, Commands};
use ironsieve_cli::commands;
use ironsieve_cli::logging;
use ironsieve_cli::output::OutputWriter;
use ironsieve_core::config::GeneralConfig;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let general = GeneralConfig {
        log_level: cli.log_level.clone().unwrap_or_else(|| "warn".to_owned()),
        ..GeneralConfig::default()
    };
    if let Err(e) = logging::init_tracing(&general) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }

    // no-op until a metrics recorder is installed
    ironsieve_core::metrics::describe_all();

    tracing::debug!(config = %cli.config.display(), "ironsieve starting");

    let writer = OutputWriter::new(cli.output);
    let result = match cli.command {
        Commands::Eval(args) => commands::eval::execute(args, &cli.config, &writer).await,
        Commands::Filters(args) => commands::filters::execute(args, &cli.config, &writer).await,
        Commands::Config(args) => commands::config::execute(args, &cli.config, &writer).await,
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(e.exit_code());
    }
}
