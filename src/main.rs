//! Tiled JPEG 2000 Raster Reader CLI
//!
//! Reads regions of decoded sample dumps and writes them as images.

use clap::Parser;
use j2k_tile_reader::cli::{run, Cli};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
