// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon connection handling.

use corral_daemon::protocol_wire::{self, ProtocolError};
use corral_daemon::{Reply, Request};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::net::UnixStream;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("daemon is not running (no socket at {0})")]
    NotRunning(PathBuf),

    #[error("cannot connect to daemon: {0}")]
    Connect(std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// One connection to the daemon.
pub struct Client {
    stream: UnixStream,
}

impl Client {
    pub async fn connect(socket_path: &Path) -> Result<Self, ClientError> {
        if !socket_path.exists() {
            return Err(ClientError::NotRunning(socket_path.to_path_buf()));
        }
        let stream = UnixStream::connect(socket_path)
            .await
            .map_err(ClientError::Connect)?;
        Ok(Self { stream })
    }

    /// Send one request and read its reply.
    ///
    /// Blocking operations (worker_await, wait_for_state_change) reply only
    /// when they resolve, so there is no read timeout here.
    pub async fn request(&mut self, request: &Request) -> Result<Reply, ClientError> {
        let bytes = protocol_wire::encode(request)?;
        protocol_wire::write_message(&mut self.stream, &bytes).await?;
        let raw = protocol_wire::read_message(&mut self.stream).await?;
        Ok(protocol_wire::decode(&raw)?)
    }
}
