pub mod cli;
pub mod commands;
pub mod config;
pub mod logging;

pub use labtrack_core as core;
pub use labtrack_core::AppConfig;

use anyhow::{Context, Result};

use crate::cli::Cli;

/// Set up logging, open the workspace and run one command.
pub fn run(cli: Cli) -> Result<()> {
    logging::init_tracing(cli.log_filter.clone())?;
    let config = config::from_cli(&cli).context("failed to resolve data directory")?;
    tracing::debug!(data_dir = %config.data_dir().display(), command = ?cli.command, "running command");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    runtime.block_on(async move {
        let workspace =
            labtrack_core::Workspace::open(config).context("failed to open task database")?;
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        let result = commands::execute(&workspace, cli.command, &mut handle).await;
        workspace.wait_for_pending_writes().await;
        result
    })
}
