//! Command handlers -- one module per subcommand

pub mod config;
pub mod eval;
pub mod filters;

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use ironsieve_core::config::{FilterSpec, IronsieveConfig};
use ironsieve_core::publish::TracingPublisher;
use ironsieve_filter::{ChainOptions, FilterChain, FilterFactory, FilterLoader};

use crate::error::CliError;

/// Collect every filter definition: `[[filters]]` from the config, then the YAML directory.
///
/// `dir_override` takes precedence over `chain.filter_dir`.
pub async fn collect_specs(
    config: &IronsieveConfig,
    dir_override: Option<&Path>,
) -> Result<Vec<FilterSpec>, CliError> {
    let mut specs = config.filters.clone();
    let dir = match dir_override {
        Some(dir) => Some(dir.to_path_buf()),
        None if !config.chain.filter_dir.is_empty() => Some(config.chain.filter_dir.clone().into()),
        None => None,
    };
    if let Some(dir) = dir {
        info!(dir = %dir.display(), "loading filter definitions");
        specs.extend(FilterLoader::load_directory(&dir).await?);
    }
    Ok(specs)
}

/// Build a filter chain from the configuration and the given definitions.
pub fn build_chain(config: &IronsieveConfig, specs: &[FilterSpec]) -> Result<FilterChain, CliError> {
    let options = ChainOptions::from_core(&config.chain);
    options.validate()?;
    let chain = FilterChain::new(&options).with_publisher(Arc::new(TracingPublisher));
    FilterFactory::new().populate(&chain, specs)?;
    Ok(chain)
}
