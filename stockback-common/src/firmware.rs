// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Locating and identifying the local firmware image.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use crc::{Crc, CRC_32_ISO_HDLC};
use glob::{glob_with, MatchOptions, Pattern};

use crate::error::RecoveryError;

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// File name patterns searched for next to the executable.
pub const FIRMWARE_PATTERNS: [&str; 4] = ["*.bin", "miwifi*.bin", "stock*.bin", "firmware*.bin"];

/// A firmware image on the local disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Firmware {
    pub path: PathBuf,
    pub size: u64,
}

impl Firmware {
    /// Stat the image, rejecting missing and empty files.
    pub fn open(path: &Path) -> Result<Self, RecoveryError> {
        let meta = fs::metadata(path).map_err(|source| RecoveryError::FirmwareUnreadable {
            path: path.to_path_buf(),
            source,
        })?;

        if meta.len() == 0 {
            return Err(RecoveryError::FirmwareEmpty {
                path: path.to_path_buf(),
            });
        }

        Ok(Self {
            path: path.to_path_buf(),
            size: meta.len(),
        })
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub fn size_mib(&self) -> f64 {
        self.size as f64 / (1024.0 * 1024.0)
    }

    /// CRC-32 of the whole image, shown so the operator can identify it.
    pub fn crc32(&self) -> Result<u32, RecoveryError> {
        self.digest()
            .map_err(|source| RecoveryError::FirmwareUnreadable {
                path: self.path.clone(),
                source,
            })
    }

    fn digest(&self) -> io::Result<u32> {
        let mut file = File::open(&self.path)?;
        let mut digest = CRC32.digest();
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            digest.update(&buf[..n]);
        }
        Ok(digest.finalize())
    }
}

/// The image chosen for this run and the other matches that were passed over.
#[derive(Clone, Debug)]
pub struct Selection {
    pub firmware: Firmware,
    pub alternatives: Vec<PathBuf>,
}

impl Selection {
    pub fn is_ambiguous(&self) -> bool {
        !self.alternatives.is_empty()
    }
}

/// Directory holding the running executable.
pub fn default_search_dir() -> io::Result<PathBuf> {
    let exe = std::env::current_exe()?;
    exe.parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "executable has no parent directory"))
}

/// All regular files in `dir` matching [`FIRMWARE_PATTERNS`], deduplicated and sorted.
///
/// Hidden files (`._stock.bin` left by macOS on FAT drives) never match.
pub fn find_candidates(dir: &Path) -> Vec<PathBuf> {
    let base = Pattern::escape(&dir.to_string_lossy());
    let options = MatchOptions {
        require_literal_leading_dot: true,
        ..MatchOptions::new()
    };
    let mut found = BTreeSet::new();

    for pattern in FIRMWARE_PATTERNS {
        let full = format!("{}/{}", base.trim_end_matches('/'), pattern);
        let Ok(entries) = glob_with(&full, options) else {
            tracing::debug!("skipping invalid pattern {}", full);
            continue;
        };
        for entry in entries.flatten() {
            if entry.is_file() {
                found.insert(entry);
            }
        }
    }

    found.into_iter().collect()
}

/// Choose the firmware image to flash from `dir`.
///
/// Several matches are not an error: the first usable one in sorted order
/// wins and every other match is returned so it can be shown to the operator.
/// Empty or unreadable matches are skipped; if none is usable the error for
/// the first one is returned.
pub fn locate(dir: &Path) -> Result<Selection, RecoveryError> {
    let candidates = find_candidates(dir);
    if candidates.is_empty() {
        return Err(RecoveryError::FirmwareNotFound {
            dir: dir.to_path_buf(),
        });
    }

    let mut chosen = None;
    let mut first_error = None;
    for path in &candidates {
        match Firmware::open(path) {
            Ok(firmware) => {
                chosen = Some(firmware);
                break;
            }
            Err(e) => {
                tracing::debug!("skipping candidate: {}", e);
                first_error.get_or_insert(e);
            }
        }
    }

    let firmware = match (chosen, first_error) {
        (Some(firmware), _) => firmware,
        (None, Some(e)) => return Err(e),
        (None, None) => {
            return Err(RecoveryError::FirmwareNotFound {
                dir: dir.to_path_buf(),
            })
        }
    };

    let alternatives: Vec<PathBuf> = candidates
        .into_iter()
        .filter(|p| *p != firmware.path)
        .collect();

    tracing::debug!(
        "selected {} ({} other candidates)",
        firmware.path.display(),
        alternatives.len()
    );

    Ok(Selection {
        firmware,
        alternatives,
    })
}
