//! pdfstamp binary
//!
//! Entry point for the command-line host.

use clap::Parser;
use pdfstamp::{execute, Command, Config};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "pdfstamp")]
#[command(version, about = "Stamp text and check markers onto PDF pages")]
struct Args {
    /// TOML configuration file (defaults to ./pdfstamp.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// History file, overriding [storage] path
    #[arg(long, global = true)]
    history: Option<PathBuf>,

    /// TrueType font to draw text with, overriding [assets] font
    #[arg(long, global = true)]
    font: Option<PathBuf>,

    /// PNG drawn for check markers, overriding [assets] marker
    #[arg(long, global = true)]
    marker: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    // stdout carries command output; logs go to stderr
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::debug!("Starting pdfstamp v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::discover(args.config.as_deref())?;
    if let Some(history) = args.history {
        config.storage.path = history;
    }
    if let Some(font) = args.font {
        config.assets.font = Some(font);
    }
    if let Some(marker) = args.marker {
        config.assets.marker = Some(marker);
    }

    let report = execute(&args.command, &config).await?;
    for line in &report.lines {
        println!("{}", line);
    }
    if let Some(notice) = &report.notice {
        if notice.is_error() {
            eprintln!("{}", notice.message);
        } else {
            println!("{}", notice.message);
        }
    }

    Ok(if report.failed() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
