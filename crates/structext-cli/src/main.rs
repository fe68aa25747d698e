// SPDX-License-Identifier: AGPL-3.0-or-later
//! Structext CLI
//!
//! Provides commands for:
//! - `publish`: render a markup file as text, HTML or XML
//! - `dump`: print the parsed document tree as JSON

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{DumpArgs, PublishArgs};

/// Structext - structured text compiler and publisher.
#[derive(Parser)]
#[command(name = "structext", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Publish a document.
    Publish(PublishArgs),
    /// Print the document tree as JSON.
    Dump(DumpArgs),
}

fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins; otherwise only warnings, on stderr
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Publish(args) => args.execute(),
        Commands::Dump(args) => args.execute(),
    };

    if let Err(err) = result {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}
