//! usdpkg CLI
//!
//! Convert USD stages to Unity packages and back.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use usdpkg_core::translate::Provenance;
use usdpkg_core::{ConvertError, ConvertOptions, Converter, UnityPackage};

#[derive(Parser)]
#[command(name = "usdpkg")]
#[command(author, version, about = "Convert between USD stages and Unity packages", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Report what would run without reading or writing files
    #[arg(long, global = true)]
    mock: bool,

    /// JSON options file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a USD layer into a .unitypackage
    Export {
        /// USD layer (.usda, .usd, .usdc)
        source: PathBuf,

        /// Output package
        package: PathBuf,
    },

    /// Convert a .unitypackage, .prefab or .unity file into a USDA layer
    ToUsd {
        /// Package or scene file
        source: PathBuf,

        /// Output layer
        output: PathBuf,
    },

    /// Extract a .unitypackage into a directory
    Import {
        /// Package to extract
        package: PathBuf,

        /// Destination directory
        output_dir: PathBuf,
    },

    /// List the assets in a .unitypackage
    Inspect {
        /// Package to list
        package: PathBuf,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();
}

fn converter(cli: &Cli) -> Result<Converter> {
    if cli.mock {
        return Ok(Converter::mock());
    }
    let options = match &cli.config {
        Some(path) => ConvertOptions::from_json_file(path)
            .with_context(|| format!("loading options from {}", path.display()))?,
        None => ConvertOptions::default(),
    };
    Ok(Converter::detect(options))
}

fn inspect(path: &Path) -> Result<()> {
    let package = UnityPackage::open(path).with_context(|| format!("reading {}", path.display()))?;

    println!("{} ({} assets)", path.display(), package.len());
    for asset in &package.assets {
        let meta = asset.meta_record()?;
        let size = match &asset.asset {
            Some(data) => format!("{} bytes", data.len()),
            None => "folder".to_string(),
        };
        println!(
            "  {}  {:<22} {} ({})",
            asset.guid,
            meta.importer.section_name(),
            asset.pathname,
            size
        );
        if let Some(provenance) = meta.user_data.as_deref().and_then(Provenance::from_user_data) {
            println!(
                "      from stage '{}': upAxis {}, metersPerUnit {}{}",
                provenance.stage,
                provenance.up_axis.as_token(),
                provenance.meters_per_unit,
                if provenance.synthetic_root { ", synthetic root" } else { "" }
            );
        }
    }
    Ok(())
}

fn run(cli: &Cli) -> Result<()> {
    let report = match &cli.command {
        Commands::Export { source, package } => converter(cli)?.usd_to_unity_package(source, package)?,
        Commands::ToUsd { source, output } => converter(cli)?.unity_to_usd(source, output)?,
        Commands::Import { package, output_dir } => converter(cli)?.import_unity_package(package, output_dir)?,
        Commands::Inspect { package } => return inspect(package),
    };
    println!("{}", report);
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<ConvertError>() {
                Some(convert) => eprintln!("error [{}]: {}", convert.kind(), convert),
                None => eprintln!("error: {:#}", e),
            }
            ExitCode::FAILURE
        }
    }
}
