// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Restore stock firmware onto a router over its recovery SSH endpoint.
//!
//! Usage: place the vendor image (`*.bin`) next to the executable and run
//!   stockback
//!
//! The tool connects to 192.168.1.1 as root, checks for the OS1 partition,
//! uploads the image to /tmp and runs `mtd -r write`.

mod cli;
mod commands;
mod transport;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let args = cli::Cli::parse();

    match EnvFilter::try_from_default_env() {
        Ok(filter) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
        Err(_) => tracing_subscriber::fmt()
            .with_max_level(args.log_level)
            .with_writer(std::io::stderr)
            .init(),
    }

    let code = match cli::run(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!();
            eprintln!("[-] Critical error: {:#}", e);
            1
        }
    };

    println!();
    commands::wait_for_enter();
    ExitCode::from(code)
}
