//! smartparse CLI: watch a folder and file new documents with an AI model.

use std::path::PathBuf;

use clap::Parser;
use miette::{IntoDiagnostic, Result};

use smartparse::app;
use smartparse::config::SmartParseConfig;
use smartparse::paths::SmartParsePaths;

#[derive(Parser)]
#[command(
    name = "smartparse",
    version,
    about = "Rename and file new documents and images using an AI model"
)]
struct Cli {
    /// Directory to watch. Overrides `watch_dir` from the config file.
    watch_dir: Option<PathBuf>,

    /// Process the files already in the directory, print a summary and exit.
    #[arg(long)]
    batch: bool,

    /// Configuration file (default: $XDG_CONFIG_HOME/smartparse/config.toml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write a default configuration file and exit.
    #[arg(long)]
    init_config: bool,
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let paths = SmartParsePaths::resolve()?;

    if cli.init_config {
        let target = cli.config.clone().unwrap_or_else(|| paths.config_file());
        if target.exists() {
            miette::bail!("config file already exists: {}", target.display());
        }
        paths.ensure_dirs()?;
        SmartParseConfig::default().save(&target)?;
        println!("Wrote {}", target.display());
        return Ok(());
    }

    let config = SmartParseConfig::discover(cli.config.as_deref(), &paths)?;
    app::run(&config, &paths, cli.watch_dir, cli.batch)?;

    std::io::Write::flush(&mut std::io::stdout()).into_diagnostic()?;
    Ok(())
}
