// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: configuration, startup, shutdown.
//!
//! Startup order matters: the lock file is taken first (two daemons must
//! never share a store), then the store opens and recovery reaps orphans,
//! and the socket binds last so a coordinator can only reach a fully
//! constructed daemon.

use crate::credentials::load_credentials;
use crate::daemon::Daemon;
use crate::env;
use crate::messages::MessageRegistry;
use corral_core::{Clock, IdGen, SystemClock, UuidIdGen};
use corral_engine::Gate;
use corral_storage::Store;
use corral_supervisor::{recover, EventBus, Supervisor, SupervisorConfig};
use fs2::FileExt;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::UnixListener;
use tokio::sync::mpsc;

/// Daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root state directory (e.g. ~/.corral)
    pub state_dir: PathBuf,
    /// Path to the session database
    pub database_path: PathBuf,
    /// Path to the Unix socket
    pub socket_path: PathBuf,
    /// Path to the lock/PID file
    pub lock_path: PathBuf,
    /// Path to the daemon log file
    pub log_path: PathBuf,
    /// Session slots
    pub max_sessions: u32,
    /// Per-session output ring cap in bytes
    pub output_buffer_bytes: usize,
    /// Terminate sessions unpolled for this long (0 disables)
    pub session_timeout_ms: u64,
    /// Executable spawned for sessions
    pub executable: String,
    /// Directory of KEY=VALUE credential files (optional)
    pub credentials_dir: Option<PathBuf>,
    /// Reap orphaned sessions at startup
    pub auto_recover: bool,
}

impl Config {
    /// Load configuration from defaults plus environment overrides.
    pub fn load() -> Result<Self, LifecycleError> {
        let state_dir = env::state_dir().ok_or(LifecycleError::NoStateDir)?;
        Ok(Self {
            database_path: env::var_path("CORRAL_DB_PATH")
                .unwrap_or_else(|| state_dir.join("sessions.db")),
            socket_path: state_dir.join("daemon.sock"),
            lock_path: state_dir.join("daemon.pid"),
            log_path: state_dir.join("daemon.log"),
            max_sessions: env::var_u32("CORRAL_MAX_SESSIONS").unwrap_or(3),
            output_buffer_bytes: env::var_u64("CORRAL_OUTPUT_BUFFER_BYTES")
                .unwrap_or(1024 * 1024) as usize,
            session_timeout_ms: env::var_u64("CORRAL_SESSION_TIMEOUT_MS").unwrap_or(600_000),
            executable: env::var_string("CORRAL_EXECUTABLE")
                .unwrap_or_else(|| "claude".to_string()),
            credentials_dir: env::var_path("CORRAL_CREDENTIALS_DIR"),
            auto_recover: true,
            state_dir,
        })
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] corral_storage::StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A started daemon, ready to serve.
pub struct StartupResult {
    pub daemon: Daemon,
    pub listener: UnixListener,
    /// Fires when an operation requests shutdown.
    pub shutdown_rx: mpsc::Receiver<()>,
    // NOTE(lifetime): held to maintain the exclusive file lock
    #[allow(dead_code)]
    lock_file: File,
}

/// Start the daemon: lock, store, recovery, components, socket.
pub async fn startup(config: &Config) -> Result<StartupResult, LifecycleError> {
    match startup_inner(config).await {
        Ok(result) => Ok(result),
        Err(e) => {
            // Don't clean up after a lock failure — those files belong to
            // the running daemon.
            if !matches!(e, LifecycleError::LockFailed(_)) {
                cleanup_on_failure(config);
            }
            Err(e)
        }
    }
}

async fn startup_inner(config: &Config) -> Result<StartupResult, LifecycleError> {
    std::fs::create_dir_all(&config.state_dir)?;

    // Lock first; everything else follows only if we are the one daemon.
    // OpenOptions avoids truncating a running daemon's PID before the lock
    // is held.
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;
    {
        use std::io::Write;
        let mut lock_file = &lock_file;
        lock_file.set_len(0)?;
        writeln!(lock_file, "{}", std::process::id())?;
    }

    let store = Store::open(&config.database_path)?;
    let bus = EventBus::new();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let ids: Arc<dyn IdGen> = Arc::new(UuidIdGen);

    // Reap orphans before anything can observe stale "running" rows
    if config.auto_recover {
        let report = recover(&store, &bus, clock.as_ref()).await?;
        if !report.marked_failed.is_empty() {
            tracing::info!(
                orphaned = report.orphaned,
                marked_failed = report.marked_failed.len(),
                "startup recovery reaped sessions"
            );
        }
    }

    let extra_env = config
        .credentials_dir
        .as_deref()
        .map(load_credentials)
        .unwrap_or_default();

    let supervisor = Supervisor::new(
        SupervisorConfig {
            max_sessions: config.max_sessions,
            output_buffer_bytes: config.output_buffer_bytes,
            executable: config.executable.clone(),
            extra_env,
        },
        store.clone(),
        bus,
        Arc::clone(&clock),
        Arc::clone(&ids),
    );
    let gate = Arc::new(Gate::new(store.clone()));
    let messages = MessageRegistry::new(store.clone(), Arc::clone(&clock), Arc::clone(&ids));

    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    let daemon = Daemon::new(
        store,
        supervisor,
        gate,
        messages,
        clock,
        ids,
        config.session_timeout_ms,
        shutdown_tx,
    );

    // Bind last: a reachable socket implies a fully constructed daemon
    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
    }
    let listener = UnixListener::bind(&config.socket_path)
        .map_err(|e| LifecycleError::BindFailed(config.socket_path.clone(), e))?;

    tracing::info!(
        socket = %config.socket_path.display(),
        database = %config.database_path.display(),
        max_sessions = config.max_sessions,
        executable = %config.executable,
        "daemon started"
    );

    Ok(StartupResult {
        daemon,
        listener,
        shutdown_rx,
        lock_file,
    })
}

/// Remove the socket and lock files on graceful shutdown.
pub fn shutdown_cleanup(config: &Config) {
    for path in [&config.socket_path, &config.lock_path] {
        if path.exists() {
            if let Err(e) = std::fs::remove_file(path) {
                tracing::warn!(path = %path.display(), error = %e, "cleanup failed");
            }
        }
    }
    tracing::info!("daemon shutdown complete");
}

fn cleanup_on_failure(config: &Config) {
    if config.socket_path.exists() {
        let _ = std::fs::remove_file(&config.socket_path);
    }
    if config.lock_path.exists() {
        let _ = std::fs::remove_file(&config.lock_path);
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
