// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! corrald: the corral session harness daemon.

use corral_daemon::{lifecycle, listener, Config};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("corrald: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = std::fs::create_dir_all(&config.state_dir) {
        eprintln!("corrald: cannot create state dir: {e}");
        std::process::exit(1);
    }
    let file_appender = tracing_appender::rolling::never(
        config.log_path.parent().unwrap_or(&config.state_dir),
        config
            .log_path
            .file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new("daemon.log")),
    );
    let (writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(writer)
        .with_ansi(false)
        .init();

    // `startup` stays alive to the end of main: it holds the daemon lock file
    let mut startup = match lifecycle::startup(&config).await {
        Ok(startup) => startup,
        Err(e) => {
            tracing::error!(error = %e, "startup failed");
            eprintln!("corrald: {e}");
            std::process::exit(1);
        }
    };

    let socket = startup.listener;
    let background = startup.daemon.spawn_background_tasks();
    let listener_task = listener::spawn_listener(socket, startup.daemon.clone());

    // READY marker for supervising processes
    println!("READY");

    tokio::select! {
        _ = startup.shutdown_rx.recv() => {
            tracing::info!("shutdown requested via operation surface");
        }
        _ = wait_for_signal() => {
            tracing::info!("shutdown requested via signal");
        }
    }

    listener_task.abort();
    for task in background {
        task.abort();
    }
    lifecycle::shutdown_cleanup(&config);
}

async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(e) => {
            tracing::warn!(error = %e, "cannot install SIGTERM handler");
            std::future::pending::<()>().await;
            return;
        }
    };
    tokio::select! {
        _ = term.recv() => {}
        _ = tokio::signal::ctrl_c() => {}
    }
}
