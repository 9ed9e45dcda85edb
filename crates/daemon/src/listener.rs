// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unix socket listener: accepts coordinator connections and serves
//! requests until the connection closes.

use crate::daemon::Daemon;
use crate::protocol::Reply;
use crate::protocol_wire::{self, ProtocolError, DEFAULT_TIMEOUT};
use tokio::net::{UnixListener, UnixStream};

/// Serve connections until the task is aborted.
pub fn spawn_listener(listener: UnixListener, daemon: Daemon) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    let daemon = daemon.clone();
                    tokio::spawn(async move {
                        handle_connection(stream, daemon).await;
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                }
            }
        }
    })
}

/// One connection: a sequence of request/reply exchanges.
async fn handle_connection(stream: UnixStream, daemon: Daemon) {
    let (mut reader, mut writer) = stream.into_split();
    loop {
        // Blocking operations (worker_await, wait_for_state_change) run
        // longer than the frame timeout; only the frame read is bounded.
        let request = match protocol_wire::read_message(&mut reader).await {
            Ok(bytes) => match protocol_wire::decode(&bytes) {
                Ok(request) => request,
                Err(e) => {
                    tracing::debug!(error = %e, "undecodable request");
                    let reply = Reply::fail(
                        crate::protocol::ErrorCode::InvalidJson,
                        format!("undecodable request: {e}"),
                    );
                    if protocol_wire::write_reply(&mut writer, &reply, DEFAULT_TIMEOUT)
                        .await
                        .is_err()
                    {
                        return;
                    }
                    continue;
                }
            },
            Err(ProtocolError::ConnectionClosed) => return,
            Err(e) => {
                tracing::debug!(error = %e, "connection read failed");
                return;
            }
        };

        let reply = daemon.handle_request(request).await;
        if let Err(e) = protocol_wire::write_reply(&mut writer, &reply, DEFAULT_TIMEOUT).await {
            tracing::debug!(error = %e, "connection write failed");
            return;
        }
    }
}
