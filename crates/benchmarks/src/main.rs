//! `hlsforge` executable: explore HLS directive configurations.

use anyhow::Result;
use clap::Parser;
use hlsforge_explorer::cli::{run_cli, Cli};

fn main() -> Result<()> {
    let cli = Cli::parse();
    run_cli(cli)
}
