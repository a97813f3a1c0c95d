//! `linkback`: verify received linkback claims from the command line.
//!
//! Fetches the claimed source page, checks that it really links to the local
//! content, and prints the accepted record or the rejection.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
