//! Command line interface for upk

use std::env::current_dir;
use std::path::PathBuf;

use anyhow::Context;
use byte_unit::Byte;
use clap::{Parser, ValueEnum};
use colored::Colorize;

use crate::config::PackConfig;
use crate::error::UpkError;
use crate::layout::FlashSize;
use crate::{HardwareMode, ImageInput, PackageBuilder, VERSION};

/// Command line arguments for upk
#[derive(Parser, Debug)]
#[command(name = "upk")]
#[command(version = VERSION)]
#[command(about = "Build firmware update packages", long_about = None)]
pub struct Args {
    /// hh: FILES are hw1, hw2 and the images; nh: FILES are the images
    #[arg(value_enum)]
    pub mode: ModeArg,

    /// Package description, at most 39 characters
    pub description: String,

    /// Output package
    pub package: PathBuf,

    /// Hardware blobs (hh only) followed by the images
    pub files: Vec<PathBuf>,

    /// Flash size (defaults to the config file, then 16m)
    #[arg(short, long, value_enum)]
    pub flash: Option<FlashArg>,

    /// Directory holding the *.version files
    #[arg(short = 'd', long)]
    pub version_dir: Option<PathBuf>,

    /// Config file (default: ./upk.toml when present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Quiet mode - only output errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Print the written header, image table and version info
    #[arg(long)]
    pub print_info: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeArg {
    /// With hardware blobs
    Hh,
    /// No hardware blobs
    Nh,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlashArg {
    #[value(name = "8m")]
    Flash8M,
    #[value(name = "16m")]
    Flash16M,
}

impl From<FlashArg> for FlashSize {
    fn from(arg: FlashArg) -> Self {
        match arg {
            FlashArg::Flash8M => Self::Flash8M,
            FlashArg::Flash16M => Self::Flash16M,
        }
    }
}

/// Install the logger; `RUST_LOG` overrides the level picked from the flags
pub fn init_logger(verbose: bool, quiet: bool) {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .try_init();
}

/// Split FILES into the hardware mode and the images
fn split_files(mode: ModeArg, files: &[PathBuf]) -> crate::Result<(HardwareMode, Vec<ImageInput>)> {
    let (hardware, images) = match mode {
        ModeArg::Hh => {
            if files.len() < 3 {
                return Err(UpkError::config(
                    "hh mode needs two hardware blobs and at least one image",
                ));
            }
            let hardware = HardwareMode::Present {
                first: files[0].clone(),
                second: files[1].clone(),
            };
            (hardware, &files[2..])
        }
        ModeArg::Nh => (HardwareMode::Absent, files),
    };
    if images.is_empty() {
        return Err(UpkError::MissingInput);
    }
    let images = images.iter().cloned().map(ImageInput::from_path).collect();
    Ok((hardware, images))
}

/// Main CLI handler
pub fn run_cli(args: Args) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => PackConfig::load(path)?,
        None => PackConfig::load_default(&current_dir()?)?,
    };

    let flash = args.flash.map(FlashSize::from).unwrap_or(config.flash);
    let version_dir = args.version_dir.clone().unwrap_or(config.version_dir.clone());
    let (hardware, images) = split_files(args.mode, &args.files)?;

    info!(
        "building {} for {flash} flash, versions from {}",
        args.package.display(),
        version_dir.display()
    );

    let builder = PackageBuilder::new()
        .flash_size(flash)
        .hardware(hardware)
        .description(&args.description)
        .name(args.package.to_string_lossy())
        .package_id(&config.package_id)
        .signature(config.signature()?)
        .version_dir(version_dir)
        .images(images);

    let summary = builder
        .build_to_file(&args.package)
        .with_context(|| format!("failed to build {}", args.package.display()))?;

    if !args.quiet {
        println!(
            "{} {} ({:#})",
            "Package created:".green(),
            args.package.display(),
            Byte::from_u64(summary.total_len)
        );
        if summary.hardware.is_some() {
            println!(
                "{}",
                format!("hardware section: {} bytes", summary.hardware_len).yellow()
            );
        }
    }

    if args.print_info && !args.quiet {
        println!();
        summary.print_info();
    }

    Ok(())
}
