// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command-line interface definitions.

use anyhow::{Context, Result};
use clap::Parser;

use stockback_common::firmware::default_search_dir;
use stockback_common::{CancelFlag, Orchestrator, SessionParams};

use crate::commands::{self, ConsoleObserver};
use crate::transport::SshConnector;

/// Command-line arguments. The workflow itself takes none.
#[derive(Parser)]
#[command(name = "stockback")]
#[command(about = "Restore stock firmware onto a router over its recovery SSH endpoint")]
#[command(version)]
pub struct Cli {
    /// Diagnostic log level, used when RUST_LOG is not set
    #[arg(long, value_name = "LEVEL", default_value = "warn")]
    pub log_level: tracing::Level,
}

/// Execute the recovery run and return the process exit code.
pub fn run(_cli: Cli) -> Result<u8> {
    let params = SessionParams::default();
    commands::banner(&params);

    let dir = default_search_dir().context("Failed to find the program directory")?;

    let cancel = CancelFlag::new();
    let handler_flag = cancel.clone();
    ctrlc::set_handler(move || {
        if handler_flag.is_cancelled() {
            eprintln!("\n[-] Interrupted by user");
            std::process::exit(1);
        }
        eprintln!("\n[!] Interrupt received, closing the connection (press Ctrl-C again to force)");
        handler_flag.cancel();
    })
    .context("Failed to install Ctrl-C handler")?;

    let connector = SshConnector::new(cancel.clone());
    let mut orchestrator =
        Orchestrator::new(connector, params, ConsoleObserver::new()).with_cancel(cancel);

    println!("[*] Searching for firmware in {}...", dir.display());
    let result = orchestrator.run(&dir, commands::confirm_flash);

    Ok(commands::report(&result))
}
