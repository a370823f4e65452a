// src/bin/cfgdemo.rs

use anyhow::Result;
use cfg_argparser::constants::DEMO_CONFIG_ENV;
use cfg_argparser::core::paths;
use cfg_argparser::{ConfigArgParser, Format, Namespace, Outcome, ReconcileError, t};
use clap::{Args, CommandFactory, Parser, Subcommand};
use colored::*;
use serde::Deserialize;
use std::path::PathBuf;

/// Options shared by every action. Values not given on the command line come from the
/// config file, then from the defaults below.
#[derive(Parser, Debug, Deserialize)]
#[command(name = "cfgdemo", version, about = t!("demo.about"))]
struct Cli {
    /// Folder holding the images to process.
    input_folder: PathBuf,

    /// Downscaling factor.
    #[arg(long, default_value_t = 4)]
    scale: u32,

    /// Number of worker threads.
    #[arg(long, default_value_t = 4)]
    threads: usize,

    /// Only files with this extension are picked up.
    #[arg(long, default_value = "png")]
    extension: String,

    /// Descend into sub-folders.
    #[arg(long)]
    recursive: bool,

    #[command(subcommand)]
    #[serde(skip)]
    action: Option<Action>,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Re-encode the downscaled images.
    Convert(ConvertArgs),
    /// Delete previously generated outputs.
    Purge(PurgeArgs),
}

#[derive(Args, Debug, Deserialize)]
struct ConvertArgs {
    /// Target image format.
    #[arg(long, default_value = "webp")]
    format: String,

    /// Encoder quality, 1-100.
    #[arg(long, default_value_t = 90)]
    quality: u8,
}

#[derive(Args, Debug, Deserialize)]
struct PurgeArgs {
    /// Only report what would be removed.
    #[arg(long)]
    dry_run: bool,

    /// Keep outputs younger than this many days.
    #[arg(long, default_value_t = 30)]
    older_than_days: u32,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("\n{}: {}", t!("common.error.prefix").red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let config_path = paths::resolve_config_path("cfgdemo", Format::Json, DEMO_CONFIG_ENV)?;
    log::debug!("Config file: {}", config_path.display());

    let mut parser = ConfigArgParser::new(Cli::command(), &config_path).exit_on_change(true);
    let namespace = match parser.try_parse_from(std::env::args_os()) {
        Ok(Outcome::Parsed(namespace)) => namespace,
        Ok(Outcome::Changed(mutation)) => {
            log::debug!("Applied {:?}", mutation);
            println!(t!("demo.info.changed"), path = config_path.display());
            return Ok(());
        }
        Err(e @ ReconcileError::Clap(_)) => e.exit(),
        Err(e) => return Err(e.into()),
    };

    execute(&namespace)
}

fn execute(namespace: &Namespace) -> Result<()> {
    let cli: Cli = namespace.deserialize()?;
    println!(
        "{} {} (x1/{}, *.{}, {} threads{})",
        "Downscaling".green().bold(),
        cli.input_folder.display(),
        cli.scale,
        cli.extension,
        cli.threads,
        if cli.recursive { ", recursive" } else { "" }
    );

    match namespace.subcommand() {
        Some("convert") => {
            let convert: ConvertArgs = namespace.deserialize()?;
            println!(
                "{} to {} at quality {}",
                "Converting".cyan().bold(),
                convert.format,
                convert.quality
            );
        }
        Some("purge") => {
            let purge: PurgeArgs = namespace.deserialize()?;
            let verb = if purge.dry_run { "Would purge" } else { "Purging" };
            println!(
                "{} outputs older than {} days",
                verb.yellow().bold(),
                purge.older_than_days
            );
        }
        _ => {}
    }
    Ok(())
}
