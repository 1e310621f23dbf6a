// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Unit tests for protocol constants and `/proc/mtd` parsing.

use stockback_common::protocol::{
    parse_mtd_table, select_target, write_command, MtdPartition, DEFAULT_HOST, DEFAULT_PASSWORD,
    DEFAULT_PORT, DEFAULT_USERNAME, REMOTE_FIRMWARE_PATH, TARGET_PARTITIONS,
};
use stockback_common::SessionParams;

const XIAOMI_4A_MTD: &str = "\
dev:    size   erasesize  name
mtd0: 00030000 00010000 \"Bootloader\"
mtd1: 00010000 00010000 \"Config\"
mtd2: 00010000 00010000 \"Factory\"
mtd3: 00010000 00010000 \"crash\"
mtd4: 00010000 00010000 \"cfg_bak\"
mtd5: 00100000 00010000 \"overlay\"
mtd6: 00c60000 00010000 \"OS1\"
mtd7: 00b00000 00010000 \"rootfs\"
mtd8: 00200000 00010000 \"disk\"
";

const OPENWRT_MTD: &str = "\
dev:    size   erasesize  name
mtd0: 00030000 00010000 \"u-boot\"
mtd1: 00010000 00010000 \"u-boot-env\"
mtd2: 00010000 00010000 \"factory\"
mtd3: 00fb0000 00010000 \"firmware\"
";

// --- Endpoint defaults ---

#[test]
fn test_default_endpoint() {
    assert_eq!(DEFAULT_HOST, "192.168.1.1");
    assert_eq!(DEFAULT_PORT, 22);
    assert_eq!(DEFAULT_USERNAME, "root");
    assert!(DEFAULT_PASSWORD.is_empty());
}

#[test]
fn test_default_session_params() {
    let params = SessionParams::default();
    assert_eq!(params.address(), "192.168.1.1:22");
    assert_eq!(params.remote_path, REMOTE_FIRMWARE_PATH);
    assert_eq!(params.connect_timeout.as_secs(), 15);
    assert_eq!(params.password_display(), "<empty>");
}

#[test]
fn test_write_command() {
    assert_eq!(
        write_command(REMOTE_FIRMWARE_PATH, "OS1"),
        "mtd -r write /tmp/stock_firmware.bin OS1"
    );
}

#[test]
fn test_target_partition_preference() {
    assert_eq!(TARGET_PARTITIONS, ["OS1", "firmware"]);
}

// --- MtdPartition::parse_line ---

#[test]
fn test_parse_line_quoted_name() {
    let p = MtdPartition::parse_line("mtd6: 00c60000 00010000 \"OS1\"").unwrap();
    assert_eq!(p.device, "mtd6");
    assert_eq!(p.size, 0x00c6_0000);
    assert_eq!(p.erase_size, 0x1_0000);
    assert_eq!(p.name, "OS1");
}

#[test]
fn test_parse_line_unquoted_name_and_extra_spaces() {
    let p = MtdPartition::parse_line("mtd3:  00fb0000   00010000  firmware").unwrap();
    assert_eq!(p.device, "mtd3");
    assert_eq!(p.size, 0x00fb_0000);
    assert_eq!(p.name, "firmware");
}

#[test]
fn test_parse_line_rejects_header() {
    assert!(MtdPartition::parse_line("dev:    size   erasesize  name").is_none());
}

#[test]
fn test_parse_line_rejects_garbage() {
    assert!(MtdPartition::parse_line("").is_none());
    assert!(MtdPartition::parse_line("cat: can't open '/proc/mtd'").is_none());
    assert!(MtdPartition::parse_line("mtd0: zzzz 00010000 \"x\"").is_none());
    assert!(MtdPartition::parse_line("mtd0: 00010000 00010000").is_none());
}

// --- parse_mtd_table / select_target ---

#[test]
fn test_parse_table_skips_header() {
    let parts = parse_mtd_table(XIAOMI_4A_MTD);
    assert_eq!(parts.len(), 9);
    assert_eq!(parts[0].name, "Bootloader");
    assert_eq!(parts[8].device, "mtd8");
}

#[test]
fn test_select_target_prefers_os1() {
    let parts = parse_mtd_table(XIAOMI_4A_MTD);
    let target = select_target(&parts).unwrap();
    assert_eq!(target.name, "OS1");
    assert_eq!(target.device, "mtd6");
}

#[test]
fn test_select_target_falls_back_to_firmware() {
    let parts = parse_mtd_table(OPENWRT_MTD);
    let target = select_target(&parts).unwrap();
    assert_eq!(target.name, "firmware");
}

#[test]
fn test_select_target_prefers_os1_regardless_of_order() {
    let text = "mtd3: 00fb0000 00010000 \"firmware\"\nmtd6: 00c60000 00010000 \"OS1\"\n";
    let parts = parse_mtd_table(text);
    assert_eq!(select_target(&parts).unwrap().name, "OS1");
}

#[test]
fn test_select_target_none() {
    let text = "dev:    size   erasesize  name\nmtd0: 00030000 00010000 \"u-boot\"\n";
    let parts = parse_mtd_table(text);
    assert!(select_target(&parts).is_none());
}

#[test]
fn test_select_target_requires_exact_name() {
    // "OS1" appears as a substring only
    let text = "mtd6: 00c60000 00010000 \"OS10\"\nmtd7: 00c60000 00010000 \"kernel_firmware\"\n";
    let parts = parse_mtd_table(text);
    assert!(select_target(&parts).is_none());
}
