//! Replay debugger commands against a recorded runtime image.
//!
//! Usage: `ucdb-replay <image> [--layout <profile>] [-c <command>]...`
//!
//! Without `-c`, commands are read from stdin, one per line.

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use ucdb_commands::Console;
use ucdb_core::Inspector;
use ucdb_core::snapshot::{RuntimeImage, SnapshotHost};

#[derive(Parser, Debug)]
#[command(name = "ucdb-replay")]
#[command(about = "Run uC++ debugger commands against a recorded runtime image")]
struct Args {
    /// Runtime image (JSON or YAML)
    image: PathBuf,

    /// Layout profile overriding the built-in uC++ x86-64 layout
    #[arg(long)]
    layout: Option<PathBuf>,

    /// Command to run; may be repeated
    #[arg(short = 'c', long = "command")]
    commands: Vec<String>,

    /// Print every cluster's tasks as JSON instead of running commands
    #[arg(long)]
    dump: bool,
}

fn main() -> Result<()> {
    ucdb_tools::init_logging();

    let args = Args::parse();

    let layout = ucdb_tools::load_layout(args.layout.as_deref())
        .context("failed to load layout profile")?;
    let image = RuntimeImage::load(&args.image)
        .with_context(|| format!("failed to load image {}", args.image.display()))?;
    info!(
        image = %args.image.display(),
        layout = %layout.metadata.name,
        clusters = image.clusters.len(),
        "image loaded"
    );

    let host = SnapshotHost::new(image, &layout);
    let mut inspector = Inspector::new(host, layout);

    if args.dump {
        let listing = inspector.list_all_tasks()?;
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    let mut console = Console::new(inspector);
    console.install()?;

    let stdout = io::stdout();
    let count = if args.commands.is_empty() {
        ucdb_tools::replay(&mut console, io::stdin().lock(), stdout.lock())?
    } else {
        let script = args.commands.join("\n");
        ucdb_tools::replay(&mut console, script.as_bytes(), stdout.lock())?
    };
    info!(
        commands = count,
        depth = console.inspector().history().depth(),
        "done"
    );
    Ok(())
}
