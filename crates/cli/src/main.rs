// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! corral: client for the session harness daemon.

use corral_cli::{client::Client, commands, output};

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let request = match commands::parse(&args) {
        Ok(request) => request,
        Err(message) => {
            eprintln!("{message}");
            std::process::exit(2);
        }
    };

    let Some(state_dir) = corral_daemon::env::state_dir() else {
        eprintln!("corral: cannot determine state directory");
        std::process::exit(1);
    };
    let socket_path = state_dir.join("daemon.sock");

    let mut client = match Client::connect(&socket_path).await {
        Ok(client) => client,
        Err(e) => {
            eprintln!("corral: {e}");
            std::process::exit(1);
        }
    };

    match client.request(&request).await {
        Ok(reply) => {
            println!("{}", output::render(&reply));
            if !reply.success {
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("corral: {e}");
            std::process::exit(1);
        }
    }
}
