// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PTY process plumbing.
//!
//! Spawns a child under a pseudo-terminal and splits its I/O into channels:
//! a blocking reader thread feeds output chunks into an mpsc channel, a
//! writer thread drains an input channel into the master, and an exit
//! watcher resolves a oneshot with the child's exit status. The master is
//! retained for resize; termination goes through signals so the exit
//! watcher observes the real status.

use crate::error::SupervisorError;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use portable_pty::{native_pty_system, ChildKiller, CommandBuilder, ExitStatus, MasterPty, PtySize};
use std::io::{Read, Write};
use tokio::sync::{mpsc, oneshot};

/// Initial terminal geometry presented to every child.
pub(crate) const INITIAL_COLS: u16 = 80;
pub(crate) const INITIAL_ROWS: u16 = 24;

const READ_BUF_BYTES: usize = 4096;
const OUTPUT_CHANNEL_DEPTH: usize = 256;
const INPUT_CHANNEL_DEPTH: usize = 64;

/// Handle on a live PTY child retained by the supervisor.
pub(crate) struct PtyHandle {
    master: Box<dyn MasterPty + Send>,
    killer: Box<dyn ChildKiller + Send + Sync>,
    pid: Option<u32>,
    input_tx: mpsc::Sender<Vec<u8>>,
}

/// Everything produced by a successful spawn.
pub(crate) struct PtySpawn {
    pub handle: PtyHandle,
    pub output_rx: mpsc::Receiver<Vec<u8>>,
    pub exit_rx: oneshot::Receiver<ExitStatus>,
}

/// Spawn `cmd` under a fresh 80×24 PTY.
pub(crate) fn spawn_pty(cmd: CommandBuilder) -> Result<PtySpawn, SupervisorError> {
    let pty_system = native_pty_system();
    let pair = pty_system
        .openpty(PtySize {
            rows: INITIAL_ROWS,
            cols: INITIAL_COLS,
            pixel_width: 0,
            pixel_height: 0,
        })
        .map_err(|e| SupervisorError::Pty(e.to_string()))?;

    let mut child = pair
        .slave
        .spawn_command(cmd)
        .map_err(|e| SupervisorError::SpawnFailed(e.to_string()))?;
    // Drop the slave so the reader sees EOF when the child exits
    drop(pair.slave);

    let pid = child.process_id();
    let killer = child.clone_killer();

    let reader = pair
        .master
        .try_clone_reader()
        .map_err(|e| SupervisorError::Pty(e.to_string()))?;
    let writer = pair
        .master
        .take_writer()
        .map_err(|e| SupervisorError::Pty(e.to_string()))?;

    let (output_tx, output_rx) = mpsc::channel(OUTPUT_CHANNEL_DEPTH);
    let (input_tx, input_rx) = mpsc::channel(INPUT_CHANNEL_DEPTH);
    let (exit_tx, exit_rx) = oneshot::channel();

    spawn_reader_thread(reader, output_tx);
    spawn_writer_thread(writer, input_rx);

    std::thread::spawn(move || match child.wait() {
        Ok(status) => {
            let _ = exit_tx.send(status);
        }
        Err(e) => {
            tracing::warn!(error = %e, "PTY exit watcher failed");
        }
    });

    Ok(PtySpawn {
        handle: PtyHandle {
            master: pair.master,
            killer,
            pid,
            input_tx,
        },
        output_rx,
        exit_rx,
    })
}

fn spawn_reader_thread(mut reader: Box<dyn Read + Send>, tx: mpsc::Sender<Vec<u8>>) {
    std::thread::spawn(move || {
        let mut buf = [0u8; READ_BUF_BYTES];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if tx.blocking_send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });
}

fn spawn_writer_thread(mut writer: Box<dyn Write + Send>, mut rx: mpsc::Receiver<Vec<u8>>) {
    std::thread::spawn(move || {
        while let Some(bytes) = rx.blocking_recv() {
            if writer.write_all(&bytes).is_err() || writer.flush().is_err() {
                break;
            }
        }
    });
}

impl PtyHandle {
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Clone of the input channel for keystroke sequencing.
    pub fn input(&self) -> mpsc::Sender<Vec<u8>> {
        self.input_tx.clone()
    }

    pub fn resize(&self, cols: u16, rows: u16) -> Result<(), SupervisorError> {
        self.master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| SupervisorError::Pty(e.to_string()))
    }

    /// Polite termination request; the exit watcher handles the rest.
    pub fn hangup(&self) {
        if let Some(pid) = self.pid {
            let _ = kill(Pid::from_raw(pid as i32), Signal::SIGHUP);
        }
    }

    /// Hard kill for children that ignore the hangup.
    pub fn force_kill(&mut self) {
        if let Err(e) = self.killer.kill() {
            tracing::debug!(error = %e, "force kill failed (child likely gone)");
        }
    }
}

#[cfg(test)]
#[path = "pty_tests.rs"]
mod tests;
