//! ensureconda CLI

use anyhow::Result;
use clap::Parser;
use semver::Version;
use tracing_subscriber::EnvFilter;

use ensureconda_core::io::http;
use ensureconda_core::{EnsureOptions, ensure};

#[derive(Debug, Parser)]
#[command(name = "ensureconda")]
#[command(author, version, about = "Ensures that a conda/mamba executable is available")]
struct Cli {
    /// Do not consider mamba executables
    #[arg(long)]
    no_mamba: bool,

    /// Do not consider micromamba, and never install it
    #[arg(long)]
    no_micromamba: bool,

    /// Do not consider conda executables
    #[arg(long)]
    no_conda: bool,

    /// Do not consider conda-standalone, and never install it
    #[arg(long)]
    no_conda_exe: bool,

    /// Only search for existing executables, never install
    #[arg(long)]
    no_install: bool,

    /// Minimum acceptable conda version
    #[arg(long, default_value = "4.8.2")]
    min_conda_version: Version,

    /// Minimum acceptable mamba/micromamba version
    #[arg(long, default_value = "0.7.3")]
    min_mamba_version: Version,

    /// Anaconda channel hosting conda-standalone
    #[arg(
        long,
        env = "ENSURECONDA_CONDA_STANDALONE_CHANNEL",
        default_value = "anaconda"
    )]
    channel: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Diagnostics go to stderr; stdout carries only the resolved path.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let client = http::client()?;

    let options = EnsureOptions {
        mamba: !cli.no_mamba,
        micromamba: !cli.no_micromamba,
        conda: !cli.no_conda,
        conda_exe: !cli.no_conda_exe,
        no_install: true,
        min_conda_version: Some(cli.min_conda_version),
        min_mamba_version: Some(cli.min_mamba_version),
        channel: cli.channel,
        install_dir: None,
    };

    // Two passes: prefer anything already on the machine, then fall back to
    // installing when allowed.
    let mut found = ensure(&client, &options).await?;
    if found.is_none() && !cli.no_install {
        let options = EnsureOptions {
            no_install: false,
            ..options
        };
        found = ensure(&client, &options).await?;
    }

    match found {
        Some(path) => {
            eprintln!("Found compatible executable");
            println!("{}", path.display());
            Ok(())
        }
        None => {
            eprintln!("Could not find compatible executable");
            std::process::exit(1);
        }
    }
}
