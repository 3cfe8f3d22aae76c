//! Main entry point for the upk CLI tool

use clap::Parser;
use upk::cli::{Args, init_logger, run_cli};

fn main() {
    let args = Args::parse();
    init_logger(args.verbose, args.quiet);

    if let Err(e) = run_cli(args) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
