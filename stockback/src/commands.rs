// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Operator console: prompts, progress rendering and the final report.

use std::io::{self, BufRead, Write};

use indicatif::{ProgressBar, ProgressStyle};

use stockback_common::protocol::STOCK_WEB_UI;
use stockback_common::{
    FlashReport, FlashState, MtdPartition, Observer, RecoveryError, Selection, SessionParams,
    WriteOutcome,
};

const RULE_WIDTH: usize = 60;

/// Answers that start the flash.
const AFFIRMATIVE: [&str; 4] = ["yes", "y", "да", "д"];

fn rule() {
    println!("{}", "=".repeat(RULE_WIDTH));
}

fn mib(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

/// Title and the fixed connection parameters.
pub fn banner(params: &SessionParams) {
    rule();
    println!("    Xiaomi Router 4A - restore stock firmware");
    rule();
    println!();
    println!("[*] Using OpenWrt default parameters:");
    println!("    IP address: {}", params.host);
    println!("    Login:      {}", params.username);
    println!("    Password:   {}", params.password_display());
    println!();
}

/// Whether an answer to the confirmation prompt means "go ahead".
pub fn is_affirmative(answer: &str) -> bool {
    let answer = answer.trim().to_lowercase();
    AFFIRMATIVE.contains(&answer.as_str())
}

fn prompt(message: &str) -> io::Result<String> {
    print!("{}", message);
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line)
}

/// Ask the operator to confirm flashing the selected image.
pub fn confirm_flash(selection: &Selection) -> bool {
    println!();
    match prompt("Start flashing? (yes/y to continue): ") {
        Ok(answer) if is_affirmative(&answer) => {
            println!();
            println!(
                "[*] Flashing {}, connecting to the router...",
                selection.firmware.file_name()
            );
            true
        }
        Ok(_) => false,
        Err(e) => {
            tracing::warn!("failed to read confirmation: {}", e);
            false
        }
    }
}

/// Block until the operator presses Enter so the window stays open.
pub fn wait_for_enter() {
    if let Err(e) = prompt("Press Enter to exit...") {
        tracing::debug!("stdin unavailable: {}", e);
    }
}

/// Print the outcome of the run and return the exit code.
pub fn report(result: &Result<FlashReport, RecoveryError>) -> u8 {
    println!();
    match result {
        Ok(report) => {
            rule();
            match report.outcome {
                WriteOutcome::Completed => {
                    println!("[+] Flashing finished, the router is rebooting...")
                }
                WriteOutcome::Disconnected => println!("[+] The router is rebooting..."),
            }
            println!("[*] Wait 2-3 minutes for it to boot");
            println!("[*] The router will be reachable at {}", STOCK_WEB_UI);
            rule();
            println!();
            println!("[✓] Process completed successfully!");
            println!();
            println!("What's next:");
            println!("  1. Wait 2-3 minutes while the router boots");
            println!("  2. Open {} in a browser", STOCK_WEB_UI);
            println!("  3. Set the router up again");
            0
        }
        Err(RecoveryError::UserCancelled) => {
            println!("[-] Cancelled by user");
            0
        }
        Err(e) => {
            println!("[-] {}", e);
            if let Some(hint) = hint(e) {
                println!("[!] {}", hint);
            }
            println!();
            println!("[✗] Process finished with errors");
            e.exit_code()
        }
    }
}

fn hint(e: &RecoveryError) -> Option<&'static str> {
    match e {
        RecoveryError::FirmwareNotFound { .. } => Some("Put the firmware file next to the program"),
        RecoveryError::AuthenticationFailed { .. } => Some("Check the router password"),
        RecoveryError::ConnectionFailed { .. } => {
            Some("Check the cable and that this computer has an address in 192.168.1.0/24")
        }
        RecoveryError::PartitionNotFound { .. } => {
            Some("This device is not supported or is not running the expected firmware")
        }
        _ => None,
    }
}

/// Renders orchestrator events on stdout.
#[derive(Default)]
pub struct ConsoleObserver {
    bar: Option<ProgressBar>,
}

impl ConsoleObserver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Observer for ConsoleObserver {
    fn firmware_selected(&mut self, selection: &Selection) {
        let firmware = &selection.firmware;

        if selection.is_ambiguous() {
            println!("[*] Several firmware images found:");
            let all = std::iter::once(&firmware.path).chain(&selection.alternatives);
            for (i, path) in all.enumerate() {
                let name = path.file_name().unwrap_or(path.as_os_str());
                println!("    {}. {}", i + 1, name.to_string_lossy());
            }
            println!("[*] Using: {}", firmware.file_name());
        }

        println!("[+] Firmware found: {}", firmware.file_name());
        println!("[+] Size: {:.2} MB", firmware.size_mib());
        match firmware.crc32() {
            Ok(crc) => println!("[+] CRC32: 0x{:08x}", crc),
            Err(e) => tracing::warn!("{}", e),
        }
    }

    fn state_changed(&mut self, state: FlashState) {
        match state {
            FlashState::Connected => {
                println!("[+] Connected");
                println!("[*] Checking MTD partitions...");
            }
            FlashState::Uploaded => println!("[+] Firmware uploaded to /tmp/"),
            FlashState::Flashing => {
                println!();
                rule();
                println!("[*] FLASHING STARTED");
                println!("[!] DO NOT POWER OFF THE ROUTER OR CLOSE THIS PROGRAM!");
                rule();
                println!();
            }
            FlashState::Failed => {
                if let Some(bar) = self.bar.take() {
                    bar.abandon();
                }
            }
            _ => {}
        }
    }

    fn partition_found(&mut self, partition: &MtdPartition) {
        println!(
            "[+] Target partition {} found ({}, {:.2} MB)",
            partition.name,
            partition.device,
            mib(partition.size)
        );
    }

    fn partition_table(&mut self, table: &str) {
        println!("[-] OS1/firmware partition not found. Device reports:");
        print!("{}", table);
    }

    fn upload_started(&mut self, total: u64) {
        println!("[*] Uploading firmware ({:.2} MB)...", mib(total));

        let pb = ProgressBar::new(total);
        let style = ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent}% {bytes}/{total_bytes} ({eta})",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        pb.set_style(style);
        self.bar = Some(pb);
    }

    fn upload_progress(&mut self, sent: u64, _total: u64) {
        if let Some(bar) = &self.bar {
            bar.set_position(sent);
        }
    }

    fn upload_finished(&mut self, _sent: u64) {
        if let Some(bar) = self.bar.take() {
            bar.finish_with_message("Upload complete");
        }
    }

    fn device_output(&mut self, chunk: &[u8]) {
        let mut stdout = io::stdout().lock();
        let _ = stdout.write_all(chunk);
        let _ = stdout.flush();
    }
}
