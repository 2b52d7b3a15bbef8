use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = labtrack::cli::Cli::parse();
    labtrack::run(cli)
}
