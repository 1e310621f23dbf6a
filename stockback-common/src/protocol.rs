// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Remote endpoint constants, commands and `/proc/mtd` parsing.
//!
//! The router side is a stock OpenWrt shell reached over SSH; the only tools
//! used on it are `cat` and `mtd`.

// --- Recovery endpoint defaults (OpenWrt factory settings) ---

pub const DEFAULT_HOST: &str = "192.168.1.1";
pub const DEFAULT_PORT: u16 = 22;
pub const DEFAULT_USERNAME: &str = "root";
pub const DEFAULT_PASSWORD: &str = "";

/// Address of the stock web UI once the vendor firmware has booted.
pub const STOCK_WEB_UI: &str = "http://192.168.31.1";

// --- Remote paths and commands ---

pub const REMOTE_FIRMWARE_PATH: &str = "/tmp/stock_firmware.bin";
pub const MTD_TABLE_COMMAND: &str = "cat /proc/mtd";

/// Partitions the image may be written to, in order of preference.
pub const TARGET_PARTITIONS: [&str; 2] = ["OS1", "firmware"];

/// Build the flash-write command. `-r` reboots the device once written.
pub fn write_command(image_path: &str, partition: &str) -> String {
    format!("mtd -r write {} {}", image_path, partition)
}

// --- /proc/mtd ---

/// One row of `/proc/mtd`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MtdPartition {
    pub device: String,
    pub size: u64,
    pub erase_size: u64,
    pub name: String,
}

impl MtdPartition {
    /// Parse a single table row, e.g. `mtd5: 00f80000 00010000 "OS1"`.
    ///
    /// Returns `None` for the header line and anything malformed.
    pub fn parse_line(line: &str) -> Option<Self> {
        let (device, rest) = line.split_once(':')?;
        let device = device.trim();
        if !device.starts_with("mtd") {
            return None;
        }

        let (size, rest) = rest.trim().split_once(char::is_whitespace)?;
        let (erase_size, name) = rest.trim_start().split_once(char::is_whitespace)?;
        let size = u64::from_str_radix(size, 16).ok()?;
        let erase_size = u64::from_str_radix(erase_size, 16).ok()?;
        let name = name.trim().trim_matches('"');
        if name.is_empty() {
            return None;
        }

        Some(Self {
            device: device.to_string(),
            size,
            erase_size,
            name: name.to_string(),
        })
    }
}

/// Parse the full text of `/proc/mtd`, skipping lines that are not partitions.
pub fn parse_mtd_table(text: &str) -> Vec<MtdPartition> {
    text.lines().filter_map(MtdPartition::parse_line).collect()
}

/// Pick the partition to flash: the first of [`TARGET_PARTITIONS`] present.
pub fn select_target(partitions: &[MtdPartition]) -> Option<&MtdPartition> {
    TARGET_PARTITIONS
        .iter()
        .find_map(|wanted| partitions.iter().find(|p| p.name == *wanted))
}
