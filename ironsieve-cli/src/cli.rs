//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's derive macros.
//! It is purely declarative with no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Ironsieve -- filter, rate-limit and sample alert/log events.
///
/// Use `ironsieve <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "ironsieve", version, about, long_about = None)]
pub struct Cli {
    /// Path to the ironsieve.toml configuration file.
    #[arg(short, long, default_value = "ironsieve.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table / text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run events from a JSON Lines file through the configured filter chain.
    Eval(EvalArgs),

    /// Inspect and validate filter definitions.
    Filters(FiltersArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- eval ----

/// Evaluate a batch of events.
#[derive(Args, Debug)]
pub struct EvalArgs {
    /// JSON Lines file with one event per line (`{"type": "log", ...}` or `{"type": "alert", ...}`).
    pub input: PathBuf,

    /// Correlation ID passed to every evaluation (default: each event's own correlation ID).
    #[arg(long)]
    pub correlation_id: Option<String>,

    /// Additional YAML filter directory (overrides `chain.filter_dir`).
    #[arg(long)]
    pub filter_dir: Option<PathBuf>,

    /// Print only suppressed / deferred events.
    #[arg(long)]
    pub suppressed_only: bool,
}

// ---- filters ----

/// Inspect and validate filter definitions.
#[derive(Args, Debug)]
pub struct FiltersArgs {
    #[command(subcommand)]
    pub action: FiltersAction,
}

#[derive(Subcommand, Debug)]
pub enum FiltersAction {
    /// List every configured filter in evaluation order.
    List,
    /// Validate YAML filter definitions without evaluating events.
    Validate {
        /// Directory containing YAML filter files (default: `chain.filter_dir`).
        path: Option<PathBuf>,
    },
}

// ---- config ----

/// Manage ironsieve configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, chain, filters).
        #[arg(long)]
        section: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parse_eval_defaults() {
        let cli = Cli::try_parse_from(["ironsieve", "eval", "events.jsonl"]).expect("should parse");
        match cli.command {
            Commands::Eval(args) => {
                assert_eq!(args.input, PathBuf::from("events.jsonl"));
                assert!(args.correlation_id.is_none());
                assert!(args.filter_dir.is_none());
                assert!(!args.suppressed_only);
            }
            _ => panic!("expected Eval command"),
        }
        assert_eq!(cli.config, PathBuf::from("ironsieve.toml"));
    }

    #[test]
    fn test_cli_parse_eval_options() {
        let cli = Cli::try_parse_from([
            "ironsieve",
            "eval",
            "in.jsonl",
            "--correlation-id",
            "batch-7",
            "--filter-dir",
            "/etc/ironsieve/filters",
            "--suppressed-only",
        ])
        .expect("should parse");
        match cli.command {
            Commands::Eval(args) => {
                assert_eq!(args.correlation_id.as_deref(), Some("batch-7"));
                assert_eq!(args.filter_dir, Some(PathBuf::from("/etc/ironsieve/filters")));
                assert!(args.suppressed_only);
            }
            _ => panic!("expected Eval command"),
        }
    }

    #[test]
    fn test_cli_parse_eval_requires_input() {
        assert!(Cli::try_parse_from(["ironsieve", "eval"]).is_err());
    }

    #[test]
    fn test_cli_parse_filters_list() {
        let cli = Cli::try_parse_from(["ironsieve", "filters", "list"]).expect("should parse");
        match cli.command {
            Commands::Filters(args) => assert!(matches!(args.action, FiltersAction::List)),
            _ => panic!("expected Filters command"),
        }
    }

    #[test]
    fn test_cli_parse_filters_validate_path() {
        let cli = Cli::try_parse_from(["ironsieve", "filters", "validate", "/tmp/filters"])
            .expect("should parse");
        match cli.command {
            Commands::Filters(args) => match args.action {
                FiltersAction::Validate { path } => {
                    assert_eq!(path, Some(PathBuf::from("/tmp/filters")));
                }
                _ => panic!("expected Validate action"),
            },
            _ => panic!("expected Filters command"),
        }
    }

    #[test]
    fn test_cli_parse_config_show_section() {
        let cli = Cli::try_parse_from(["ironsieve", "config", "show", "--section", "chain"])
            .expect("should parse");
        match cli.command {
            Commands::Config(args) => match args.action {
                ConfigAction::Show { section } => assert_eq!(section.as_deref(), Some("chain")),
                _ => panic!("expected Show action"),
            },
            _ => panic!("expected Config command"),
        }
    }

    #[test]
    fn test_cli_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "ironsieve",
            "-c",
            "/custom/ironsieve.toml",
            "config",
            "validate",
            "--output",
            "json",
            "--log-level",
            "debug",
        ])
        .expect("should parse");
        assert_eq!(cli.config, PathBuf::from("/custom/ironsieve.toml"));
        assert!(matches!(cli.output, OutputFormat::Json));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_cli_parse_invalid_command_fails() {
        assert!(Cli::try_parse_from(["ironsieve", "start"]).is_err());
        assert!(Cli::try_parse_from(["ironsieve"]).is_err());
    }

    #[test]
    fn test_cli_verify_command_structure() {
        let cmd = Cli::command();
        assert_eq!(cmd.get_name(), "ironsieve");
        let subcommands: Vec<_> = cmd.get_subcommands().map(|s| s.get_name()).collect();
        assert_eq!(subcommands, ["eval", "filters", "config"]);
        cmd.debug_assert();
    }
}
