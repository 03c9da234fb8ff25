//! `ironsieve filters` command handler

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use ironsieve_core::config::IronsieveConfig;
use ironsieve_filter::{FilterChain, FilterFactory, FilterLoader};

use crate::cli::{FiltersAction, FiltersArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

use super::{build_chain, collect_specs};

/// Execute the `filters` command.
pub async fn execute(
    args: FiltersArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let config = IronsieveConfig::load(config_path).await?;
    match args.action {
        FiltersAction::List => execute_list(&config, writer).await,
        FiltersAction::Validate { path } => execute_validate(&config, path, writer).await,
    }
}

async fn execute_list(config: &IronsieveConfig, writer: &OutputWriter) -> Result<(), CliError> {
    let specs = collect_specs(config, None).await?;
    let chain = build_chain(config, &specs)?;
    let report = FilterListReport::from_chain(&chain);
    chain.dispose();
    writer.render(&report)?;
    Ok(())
}

async fn execute_validate(
    config: &IronsieveConfig,
    path: Option<PathBuf>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let dir = match path {
        Some(path) => path,
        None if !config.chain.filter_dir.is_empty() => PathBuf::from(&config.chain.filter_dir),
        None => {
            return Err(CliError::Command(
                "no filter directory given and chain.filter_dir is empty".to_owned(),
            ));
        }
    };
    info!(path = %dir.display(), "validating filter definitions");

    let report = validate_directory(&dir).await?;
    writer.render(&report)?;

    if report.invalid > 0 {
        return Err(CliError::Filter(format!(
            "{} invalid filter definition(s)",
            report.invalid
        )));
    }
    Ok(())
}

/// Parse and build every YAML file in `dir`, collecting per-file errors.
///
/// Unlike loading for evaluation, every file is reported instead of skipped.
pub async fn validate_directory(dir: &Path) -> Result<FilterValidationReport, CliError> {
    let mut paths = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path
            .extension()
            .is_some_and(|ext| ext == "yml" || ext == "yaml")
        {
            paths.push(path);
        }
    }
    paths.sort();

    let factory = FilterFactory::new();
    let mut valid = 0;
    let mut errors = Vec::new();
    for path in &paths {
        let built = FilterLoader::load_file(path).await.and_then(|specs| {
            let chain = FilterChain::default();
            factory.populate(&chain, &specs)
        });
        match built {
            Ok(count) => valid += count,
            Err(e) => errors.push(FileError {
                file: path.display().to_string(),
                error: e.to_string(),
            }),
        }
    }

    Ok(FilterValidationReport {
        path: dir.display().to_string(),
        total_files: paths.len(),
        valid,
        invalid: errors.len(),
        errors,
    })
}

#[derive(Serialize)]
pub struct FilterListReport {
    pub total: usize,
    pub chain_enabled: bool,
    pub filters: Vec<FilterEntry>,
}

#[derive(Serialize)]
pub struct FilterEntry {
    pub name: String,
    pub kind: String,
    pub priority: i32,
    pub enabled: bool,
    pub warnings: Vec<String>,
}

impl FilterListReport {
    /// Summarize a chain in evaluation order.
    pub fn from_chain(chain: &FilterChain) -> Self {
        let validation = chain.validate_filters();
        let filters: Vec<FilterEntry> = chain
            .diagnostics()
            .filters
            .into_iter()
            .map(|d| FilterEntry {
                warnings: validation
                    .get(&d.name)
                    .map(|v| v.warnings.clone())
                    .unwrap_or_default(),
                name: d.name,
                kind: d.kind.to_string(),
                priority: d.priority,
                enabled: d.enabled,
            })
            .collect();
        Self {
            total: filters.len(),
            chain_enabled: chain.is_enabled(),
            filters,
        }
    }
}

impl Render for FilterListReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        let state = if self.chain_enabled {
            "enabled".green()
        } else {
            "disabled".red()
        };
        writeln!(
            w,
            "Filters ({} total, chain {})",
            self.total.to_string().bold(),
            state
        )?;
        writeln!(w)?;
        writeln!(
            w,
            "{:<28} {:<14} {:>8} {:<8}",
            "NAME", "KIND", "PRIORITY", "STATUS"
        )?;
        writeln!(w, "{}", "-".repeat(62))?;
        for f in &self.filters {
            let status = if f.enabled {
                "enabled".green()
            } else {
                "disabled".dimmed()
            };
            writeln!(
                w,
                "{:<28} {:<14} {:>8} {:<8}",
                f.name, f.kind, f.priority, status
            )?;
            for warning in &f.warnings {
                writeln!(w, "  {} {}", "warning:".yellow(), warning)?;
            }
        }
        Ok(())
    }
}

#[derive(Serialize)]
pub struct FilterValidationReport {
    pub path: String,
    pub total_files: usize,
    pub valid: usize,
    pub invalid: usize,
    pub errors: Vec<FileError>,
}

#[derive(Serialize)]
pub struct FileError {
    pub file: String,
    pub error: String,
}

impl Render for FilterValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Filter Validation: {}", self.path.bold())?;
        writeln!(w, "  Files:   {}", self.total_files)?;
        writeln!(w, "  Filters: {}", self.valid.to_string().green())?;
        if self.invalid == 0 {
            writeln!(w, "  Result:  {}", "VALID".green().bold())?;
        } else {
            writeln!(w, "  Result:  {}", "INVALID".red().bold())?;
            for e in &self.errors {
                writeln!(w, "  {}: {}", e.file, e.error.red())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use ironsieve_filter::{Filter, LevelFilter, TagFilter};

    #[test]
    fn list_report_follows_evaluation_order() {
        let chain = FilterChain::default();
        chain.add_filter(Arc::new(TagFilter::new("tags"))).unwrap();
        let level = Arc::new(LevelFilter::new("level"));
        level.set_enabled(false);
        chain.add_filter(level).unwrap();

        let report = FilterListReport::from_chain(&chain);
        assert_eq!(report.total, 2);
        assert_eq!(report.filters[0].name, "level");
        assert_eq!(report.filters[0].kind, "level");
        assert!(!report.filters[0].enabled);
        assert_eq!(report.filters[1].kind, "tag");
        assert_eq!(report.filters[1].warnings.len(), 1);
    }

    #[tokio::test]
    async fn validate_directory_reports_each_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.yml"), "name: ok\nkind: level\n").unwrap();
        std::fs::write(
            dir.path().join("b.yml"),
            "name: bad\nkind: level\nsettings:\n  min_level: loud\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("c.yaml"), "name: nope\nkind: teleport\n").unwrap();
        std::fs::write(dir.path().join("readme.md"), "ignored").unwrap();

        let report = validate_directory(dir.path()).await.unwrap();
        assert_eq!(report.total_files, 3);
        assert_eq!(report.valid, 1);
        assert_eq!(report.invalid, 2);
        assert!(report.errors[0].file.ends_with("b.yml"));
        assert!(report.errors[1].error.contains("unknown filter kind"));
    }
}
