// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! The recovery run: locate, connect, verify, upload, write.
//!
//! Each step either advances the [`FlashState`] machine or ends the run. The
//! session is held by a [`SessionGuard`] so it is closed exactly once on every
//! path out of [`Orchestrator::flash`], including panics.

use std::path::{Path, PathBuf};

use crate::cancel::CancelFlag;
use crate::config::SessionParams;
use crate::error::{is_disconnect, RecoveryError};
use crate::firmware::{self, Firmware, Selection};
use crate::flow::{FlashState, Step};
use crate::protocol::{
    parse_mtd_table, select_target, write_command, MtdPartition, MTD_TABLE_COMMAND,
    TARGET_PARTITIONS,
};
use crate::remote::{ConnectError, Connector, Remote, SessionGuard, TransportError};

/// Progress notifications emitted during a run. All methods default to no-ops.
pub trait Observer {
    fn firmware_selected(&mut self, _selection: &Selection) {}
    fn state_changed(&mut self, _state: FlashState) {}
    fn partition_found(&mut self, _partition: &MtdPartition) {}
    /// Raw `/proc/mtd` text, sent only when no target partition was found.
    fn partition_table(&mut self, _table: &str) {}
    fn upload_started(&mut self, _total: u64) {}
    fn upload_progress(&mut self, _sent: u64, _total: u64) {}
    fn upload_finished(&mut self, _sent: u64) {}
    fn device_output(&mut self, _chunk: &[u8]) {}
}

/// How the write step ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    /// `mtd` exited with status 0 before the session went away.
    Completed,
    /// The router dropped the session while rebooting into the new image.
    Disconnected,
}

/// Summary of a successful run.
#[derive(Clone, Debug)]
pub struct FlashReport {
    pub firmware: PathBuf,
    pub bytes_uploaded: u64,
    pub partition: MtdPartition,
    pub outcome: WriteOutcome,
}

/// Drives one recovery run against one device.
pub struct Orchestrator<C: Connector, O: Observer> {
    connector: C,
    params: SessionParams,
    observer: O,
    cancel: CancelFlag,
    state: FlashState,
}

impl<C: Connector, O: Observer> Orchestrator<C, O> {
    pub fn new(connector: C, params: SessionParams, observer: O) -> Self {
        Self {
            connector,
            params,
            observer,
            cancel: CancelFlag::new(),
            state: FlashState::NotConnected,
        }
    }

    /// Use `cancel` to stop the run between steps.
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn state(&self) -> FlashState {
        self.state
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// Full run: pick the image in `dir`, ask `confirm`, then flash it.
    ///
    /// Nothing touches the network until an image is found and confirmed.
    pub fn run<F>(&mut self, dir: &Path, confirm: F) -> Result<FlashReport, RecoveryError>
    where
        F: FnOnce(&Selection) -> bool,
    {
        let selection = match firmware::locate(dir) {
            Ok(selection) => selection,
            Err(e) => {
                self.fail();
                return Err(e);
            }
        };
        self.observer.firmware_selected(&selection);

        if !confirm(&selection) {
            // Ctrl-C pressed while the prompt was open
            self.check_cancel()?;
            return Err(RecoveryError::UserCancelled);
        }

        self.flash(&selection.firmware)
    }

    /// Connect and flash `firmware`. The state ends in `Disconnected` or `Failed`.
    pub fn flash(&mut self, firmware: &Firmware) -> Result<FlashReport, RecoveryError> {
        let result = self.try_flash(firmware);
        if let Err(e) = &result {
            tracing::debug!("run failed in state {:?}: {}", self.state, e);
            self.fail();
        }
        result
    }

    fn try_flash(&mut self, firmware: &Firmware) -> Result<FlashReport, RecoveryError> {
        if self.state != FlashState::NotConnected {
            return Err(RecoveryError::InvalidTransition {
                from: self.state,
                step: Step::Connect,
            });
        }
        self.check_cancel()?;

        let remote = self.connect()?;
        let mut session = SessionGuard::new(remote);
        let result = self.flash_session(session.remote(), firmware);
        session.close();
        result
    }

    fn flash_session(
        &mut self,
        remote: &mut C::Remote,
        firmware: &Firmware,
    ) -> Result<FlashReport, RecoveryError> {
        self.advance(Step::Connect)?;
        self.check_cancel()?;

        let partition = self.verify(remote, firmware)?;
        self.check_cancel()?;

        let bytes_uploaded = self.upload(remote, firmware)?;
        self.check_cancel()?;

        let outcome = self.write(remote, &partition.name)?;

        Ok(FlashReport {
            firmware: firmware.path.clone(),
            bytes_uploaded,
            partition,
            outcome,
        })
    }

    fn connect(&mut self) -> Result<C::Remote, RecoveryError> {
        tracing::info!(
            "connecting to {} as {}",
            self.params.address(),
            self.params.username
        );

        self.connector
            .connect(&self.params)
            .map_err(|e| match e {
                ConnectError::Authentication(reason) => RecoveryError::AuthenticationFailed {
                    username: self.params.username.clone(),
                    host: self.params.host.clone(),
                    reason,
                },
                ConnectError::Network(reason) => RecoveryError::ConnectionFailed {
                    host: self.params.address(),
                    reason,
                },
            })
    }

    fn verify(
        &mut self,
        remote: &mut C::Remote,
        firmware: &Firmware,
    ) -> Result<MtdPartition, RecoveryError> {
        let table = remote
            .exec(MTD_TABLE_COMMAND)
            .map_err(|e| map_transport(e, |reason| RecoveryError::VerifyFailed { reason }))?;

        let partitions = parse_mtd_table(&table);
        tracing::debug!("device reports {} mtd partitions", partitions.len());

        let Some(target) = select_target(&partitions).cloned() else {
            self.observer.partition_table(&table);
            return Err(RecoveryError::PartitionNotFound {
                expected: TARGET_PARTITIONS.iter().map(|p| p.to_string()).collect(),
                table,
            });
        };

        if firmware.size > target.size {
            return Err(RecoveryError::FirmwareTooLarge {
                size: firmware.size,
                partition: target.name,
                capacity: target.size,
            });
        }

        self.observer.partition_found(&target);
        self.advance(Step::Verify)?;
        Ok(target)
    }

    fn upload(&mut self, remote: &mut C::Remote, firmware: &Firmware) -> Result<u64, RecoveryError> {
        tracing::info!(
            "uploading {} ({} bytes) to {}",
            firmware.path.display(),
            firmware.size,
            self.params.remote_path
        );
        self.observer.upload_started(firmware.size);

        let observer = &mut self.observer;
        let sent = remote
            .upload(&firmware.path, &self.params.remote_path, &mut |sent, total| {
                observer.upload_progress(sent, total)
            })
            .map_err(|e| map_transport(e, |reason| RecoveryError::UploadFailed { reason }))?;

        if sent != firmware.size {
            return Err(RecoveryError::UploadFailed {
                reason: format!("sent {} of {} bytes", sent, firmware.size),
            });
        }

        self.observer.upload_finished(sent);
        self.advance(Step::Upload)?;
        Ok(sent)
    }

    fn write(&mut self, remote: &mut C::Remote, partition: &str) -> Result<WriteOutcome, RecoveryError> {
        let command = write_command(&self.params.remote_path, partition);
        self.advance(Step::Write)?;
        tracing::info!("running `{}`", command);

        let observer = &mut self.observer;
        let result = remote.exec_streaming(&command, &mut |chunk| observer.device_output(chunk));

        let outcome = match result {
            Ok(0) => WriteOutcome::Completed,
            Ok(status) => {
                return Err(RecoveryError::WriteFailed {
                    reason: format!("`{}` exited with status {}", command, status),
                })
            }
            Err(TransportError::Interrupted) => return Err(RecoveryError::Interrupted),
            Err(e) => {
                let message = e.to_string();
                if !is_disconnect(&message) {
                    return Err(RecoveryError::WriteFailed { reason: message });
                }
                tracing::info!("session dropped during write, device is rebooting: {}", message);
                WriteOutcome::Disconnected
            }
        };

        self.advance(Step::Finish)?;
        Ok(outcome)
    }

    fn check_cancel(&self) -> Result<(), RecoveryError> {
        if self.cancel.is_cancelled() {
            Err(RecoveryError::Interrupted)
        } else {
            Ok(())
        }
    }

    fn advance(&mut self, step: Step) -> Result<(), RecoveryError> {
        let next = self
            .state
            .next(step)
            .ok_or(RecoveryError::InvalidTransition {
                from: self.state,
                step,
            })?;
        tracing::debug!("{:?} -> {:?}", self.state, next);
        self.state = next;
        self.observer.state_changed(next);
        Ok(())
    }

    fn fail(&mut self) {
        if let Some(next) = self.state.next(Step::Fail) {
            self.state = next;
            self.observer.state_changed(next);
        }
    }
}

/// Operator interrupts keep their identity; everything else is wrapped per step.
fn map_transport(e: TransportError, wrap: impl FnOnce(String) -> RecoveryError) -> RecoveryError {
    match e {
        TransportError::Interrupted => RecoveryError::Interrupted,
        other => wrap(other.to_string()),
    }
}
