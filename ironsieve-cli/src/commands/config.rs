//! `ironsieve config` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use ironsieve_core::config::IronsieveConfig;
use ironsieve_filter::ChainOptions;

use crate::cli::{ConfigAction, ConfigArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `config` command.
pub async fn execute(
    args: ConfigArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        ConfigAction::Validate => execute_validate(config_path, writer).await,
        ConfigAction::Show { section } => execute_show(config_path, section, writer).await,
    }
}

/// Load and validate the configuration file, reporting any errors.
///
/// Beyond the file-level checks, every `[[filters]]` entry is built once so
/// that bad filter settings are reported here rather than at evaluation time.
///
/// # Errors
///
/// Returns `CliError::Config` if validation fails (missing fields, invalid values, parse errors).
async fn execute_validate(config_path: &Path, writer: &OutputWriter) -> Result<(), CliError> {
    info!(path = %config_path.display(), "validating configuration");

    let report = match IronsieveConfig::load(config_path).await {
        Ok(config) => validation_report(config_path, &config),
        Err(e) => ConfigValidationReport {
            source: config_path.display().to_string(),
            valid: false,
            errors: vec![e.to_string()],
        },
    };

    writer.render(&report)?;

    if !report.valid {
        return Err(CliError::Config("configuration is invalid".to_owned()));
    }

    Ok(())
}

/// Validate a loaded configuration: chain options, then each filter definition.
pub fn validation_report(config_path: &Path, config: &IronsieveConfig) -> ConfigValidationReport {
    let mut errors = Vec::new();
    if let Err(e) = ChainOptions::from_core(&config.chain).validate() {
        errors.push(e.to_string());
    }
    let factory = ironsieve_filter::FilterFactory::new();
    for spec in &config.filters {
        if let Err(e) = factory.build(spec) {
            errors.push(e.to_string());
        }
    }
    ConfigValidationReport {
        source: config_path.display().to_string(),
        valid: errors.is_empty(),
        errors,
    }
}

/// Load and display the effective configuration (file + env overrides + defaults).
///
/// # Errors
///
/// Returns `CliError::Core` if loading fails or `CliError::Command` if the section name is invalid.
async fn execute_show(
    config_path: &Path,
    section: Option<String>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    info!(path = %config_path.display(), "loading configuration");

    let config = IronsieveConfig::load(config_path).await?;
    let report = show_report(config_path, &config, section.as_deref())?;
    writer.render(&report)?;

    Ok(())
}

/// Serialize the whole configuration or one section as TOML.
pub fn show_report(
    config_path: &Path,
    config: &IronsieveConfig,
    section: Option<&str>,
) -> Result<ConfigReport, CliError> {
    let config_toml = match section {
        None => toml::to_string_pretty(config),
        Some("general") => toml::to_string_pretty(&config.general),
        Some("chain") => toml::to_string_pretty(&config.chain),
        Some("filters") => {
            #[derive(Serialize)]
            struct Filters<'a> {
                filters: &'a [ironsieve_core::config::FilterSpec],
            }
            toml::to_string_pretty(&Filters {
                filters: &config.filters,
            })
        }
        Some(other) => {
            return Err(CliError::Command(format!(
                "unknown section: {other} (expected: general, chain, filters)"
            )));
        }
    }
    .unwrap_or_else(|e| format!("(serialization error: {e})"));

    Ok(ConfigReport {
        source: config_path.display().to_string(),
        section: section.map(str::to_owned),
        config_toml,
    })
}

/// Configuration display report.
///
/// The `config_toml` field is skipped during JSON serialization (only used for text rendering).
#[derive(Serialize)]
pub struct ConfigReport {
    /// Configuration file path
    pub source: String,
    /// Optional section name (None = full config)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// Serialized TOML configuration
    #[serde(skip)]
    pub config_toml: String,
}

impl Render for ConfigReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        if let Some(ref section) = self.section {
            let section_label = format!("[{}]", section);
            writeln!(
                w,
                "Configuration {} (source: {})",
                section_label.bold(),
                self.source
            )?;
        } else {
            writeln!(w, "Configuration (source: {})", self.source.bold())?;
        }

        writeln!(w)?;
        write!(w, "{}", self.config_toml)?;

        Ok(())
    }
}

/// Configuration validation report.
#[derive(Serialize)]
pub struct ConfigValidationReport {
    /// Configuration file path
    pub source: String,
    /// Whether the configuration is valid
    pub valid: bool,
    /// Validation error messages (empty if valid)
    pub errors: Vec<String>,
}

impl Render for ConfigValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Config Validation: {}", self.source.bold())?;

        if self.valid {
            writeln!(w, "  Result: {}", "VALID".green().bold())?;
        } else {
            writeln!(w, "  Result: {}", "INVALID".red().bold())?;
            for err in &self.errors {
                writeln!(w, "  Error: {}", err.red())?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ironsieve_core::config::FilterSpec;

    fn path() -> &'static Path {
        Path::new("ironsieve.toml")
    }

    #[test]
    fn test_validation_report_flags_bad_filter_settings() {
        let mut config = IronsieveConfig::default();
        config.filters.push(FilterSpec::new("ok", "level"));
        config
            .filters
            .push(FilterSpec::new("bad", "level").with_setting("min_level", "loud"));

        let report = validation_report(path(), &config);
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("'bad'"));
    }

    #[test]
    fn test_validation_report_valid_default() {
        let report = validation_report(path(), &IronsieveConfig::default());
        assert!(report.valid);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn test_show_report_sections() {
        let mut config = IronsieveConfig::default();
        config.filters.push(FilterSpec::new("lv", "level").with_priority(5));

        let chain = show_report(path(), &config, Some("chain")).unwrap();
        assert!(chain.config_toml.contains("recent_window"));

        let filters = show_report(path(), &config, Some("filters")).unwrap();
        assert!(filters.config_toml.contains("[[filters]]"));
        assert!(filters.config_toml.contains("name = \"lv\""));

        assert!(matches!(
            show_report(path(), &config, Some("daemon")),
            Err(CliError::Command(_))
        ));
    }

    #[test]
    fn test_config_report_json_skips_toml_body() {
        let report = show_report(path(), &IronsieveConfig::default(), Some("general")).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["section"], "general");
        assert!(json.get("config_toml").is_none());
    }

    #[test]
    fn test_config_validation_report_render_invalid() {
        colored::control::set_override(false);
        let report = ConfigValidationReport {
            source: "bad.toml".to_owned(),
            valid: false,
            errors: vec!["failed to parse config".to_owned()],
        };
        let mut buffer = Vec::new();
        report.render_text(&mut buffer).unwrap();
        let output = String::from_utf8(buffer).unwrap();
        assert!(output.contains("INVALID"));
        assert!(output.contains("Error: failed to parse config"));
    }
}
