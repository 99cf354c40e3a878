use std::fs::{self, File};

use anyhow::{Context, Result};
use capped_vault::{
    bin_utils::{ScenarioConfig, Service},
    processor::OperationError,
};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let config_path = args
        .next()
        .context("Expected a scenario config as the first argument")?;
    let operations_path = args
        .next()
        .context("Expected an operations file as the second argument")?;

    let raw = fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read `{config_path}`"))?;
    let config = ScenarioConfig::from_toml_str(&raw)?;
    let file = File::open(&operations_path)
        .with_context(|| format!("Failed to open `{operations_path}`"))?;

    let service = Service {
        config,
        input: file,
        output: &mut std::io::stdout(),
        error_printer: Box::new(|line, err| match err {
            OperationError::RowErr(err) => tracing::error!(line, "unreadable operation: {err}"),
            OperationError::CommandErr(err) => {
                tracing::error!(line, "malformed operation: {err}")
            }
            OperationError::VaultErr(err) => tracing::warn!(line, "operation rejected: {err}"),
            OperationError::CustodyErr(err) => tracing::warn!(line, "operation rejected: {err}"),
        }),
    };
    service.run()
}
