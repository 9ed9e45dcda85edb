//! The wire protocol over a real Unix socket.

use corral_daemon::lifecycle::{self, Config};
use corral_daemon::protocol::{Body, Reply, Request};
use corral_daemon::{listener, protocol_wire};
use std::path::Path;
use tokio::net::UnixStream;

fn config(dir: &Path) -> Config {
    Config {
        state_dir: dir.to_path_buf(),
        database_path: dir.join("sessions.db"),
        socket_path: dir.join("daemon.sock"),
        lock_path: dir.join("daemon.pid"),
        log_path: dir.join("daemon.log"),
        max_sessions: 2,
        output_buffer_bytes: 64 * 1024,
        session_timeout_ms: 0,
        executable: "/bin/sh".to_string(),
        credentials_dir: None,
        auto_recover: true,
    }
}

async fn roundtrip(stream: &mut UnixStream, request: &Request) -> Reply {
    let bytes = protocol_wire::encode(request).unwrap();
    protocol_wire::write_message(stream, &bytes).await.unwrap();
    let raw = protocol_wire::read_message(stream).await.unwrap();
    protocol_wire::decode(&raw).unwrap()
}

#[tokio::test]
async fn a_full_session_lifecycle_over_the_socket() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let startup = lifecycle::startup(&config).await.unwrap();
    let _listener_task = listener::spawn_listener(startup.listener, startup.daemon.clone());

    let mut stream = UnixStream::connect(&config.socket_path).await.unwrap();

    // Handshake
    let reply = roundtrip(
        &mut stream,
        &Request::Hello {
            version: corral_daemon::protocol::PROTOCOL_VERSION.to_string(),
        },
    )
    .await;
    assert!(reply.success);

    // Start, observe, end — all over the socket
    let project = dir.path().join("work");
    std::fs::create_dir_all(&project).unwrap();
    let reply = roundtrip(
        &mut stream,
        &Request::StartSession {
            working_dir: project,
            command: Some("echo over-the-wire".to_string()),
        },
    )
    .await;
    let id = match reply.body {
        Some(Body::Session { session }) => session.id.to_string(),
        other => panic!("start failed: {other:?}"),
    };

    let reply = roundtrip(
        &mut stream,
        &Request::WaitForStateChange {
            timeout_ms: 30_000,
            session_ids: Some(vec![id.clone()]),
        },
    )
    .await;
    match reply.body {
        Some(Body::StateChange {
            change: Some(change),
            ..
        }) => assert_eq!(change.change, "completed"),
        other => panic!("unexpected change: {other:?}"),
    }

    let reply = roundtrip(
        &mut stream,
        &Request::GetOutput {
            id: id.clone(),
            lines: 50,
        },
    )
    .await;
    match reply.body {
        Some(Body::Output { lines, .. }) => {
            assert!(lines.iter().any(|l| l.contains("over-the-wire")));
        }
        other => panic!("unexpected body: {other:?}"),
    }

    let reply = roundtrip(&mut stream, &Request::EndSession { id }).await;
    assert!(reply.success);

    // Undecodable bytes produce an InvalidJSON failure, not a dropped
    // connection
    let garbage = b"{\"type\":\"no_such_operation\"}";
    protocol_wire::write_message(&mut stream, garbage).await.unwrap();
    let raw = protocol_wire::read_message(&mut stream).await.unwrap();
    let reply: Reply = protocol_wire::decode(&raw).unwrap();
    assert!(!reply.success);
}

#[tokio::test]
async fn concurrent_connections_are_served() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let startup = lifecycle::startup(&config).await.unwrap();
    let _listener_task = listener::spawn_listener(startup.listener, startup.daemon.clone());

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let socket = config.socket_path.clone();
        tasks.push(tokio::spawn(async move {
            let mut stream = UnixStream::connect(&socket).await.unwrap();
            let reply = roundtrip(&mut stream, &Request::Ping).await;
            assert!(reply.success);
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }
}
