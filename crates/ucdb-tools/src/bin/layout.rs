//! Validate or print runtime layout profiles.
//!
//! Usage: `ucdb-layout [--check <profile>]`
//!
//! Without `--check`, prints the built-in uC++ x86-64 profile as YAML, a
//! starting point for custom profiles.

use std::path::PathBuf;
use std::process;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use ucdb_core::RuntimeLayout;

#[derive(Parser, Debug)]
#[command(name = "ucdb-layout")]
#[command(about = "Validate a runtime layout profile or print the default one")]
struct Args {
    /// Profile to validate
    #[arg(long)]
    check: Option<PathBuf>,
}

fn main() -> Result<()> {
    ucdb_tools::init_logging();

    let args = Args::parse();

    match args.check {
        Some(path) => match RuntimeLayout::load(&path) {
            Ok(layout) => {
                info!(
                    profile = %path.display(),
                    name = %layout.metadata.name,
                    symbol = %layout.switch.symbol,
                    "profile is valid"
                );
            }
            Err(err) => {
                error!("{}: {err}", path.display());
                process::exit(1);
            }
        },
        None => print!("{}", RuntimeLayout::default().to_yaml()?),
    }
    Ok(())
}
