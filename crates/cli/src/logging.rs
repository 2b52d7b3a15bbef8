use anyhow::{Context, Result};
use tracing_subscriber::filter::{Directive, LevelFilter};
use tracing_subscriber::EnvFilter;

/// Install a compact stderr subscriber. An explicit filter wins over `RUST_LOG`.
pub fn init_tracing(filter: Option<String>) -> Result<()> {
    let env_filter = match filter {
        Some(filter) => EnvFilter::try_new(&filter)
            .with_context(|| format!("invalid log filter '{}'", filter))?,
        None => EnvFilter::builder()
            .with_default_directive(Directive::from(LevelFilter::WARN))
            .from_env_lossy(),
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init();
    Ok(())
}
