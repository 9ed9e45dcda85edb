//! Shared helpers for the behavioral specs.

use corral_daemon::daemon::Daemon;
use corral_daemon::messages::MessageRegistry;
use corral_daemon::protocol::{Body, Reply, Request};
use corral_engine::Gate;
use corral_storage::Store;
use corral_supervisor::{EventBus, Supervisor, SupervisorConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub struct Spec {
    pub daemon: Daemon,
    dir: tempfile::TempDir,
    _shutdown_rx: mpsc::Receiver<()>,
}

impl Spec {
    pub fn project(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    pub async fn request(&self, request: Request) -> Reply {
        self.daemon.handle_request(request).await
    }

    pub async fn start(&self, command: &str) -> String {
        let reply = self
            .request(Request::StartSession {
                working_dir: self.project(),
                command: Some(command.to_string()),
            })
            .await;
        match reply.body {
            Some(Body::Session { session }) => session.id.to_string(),
            other => panic!("start failed: {:?} / {other:?}", reply.error),
        }
    }

    pub async fn wait_until_ended(&self, id: &str) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        loop {
            let session = self
                .daemon
                .store
                .find_session(id)
                .unwrap()
                .expect("session exists");
            if session.status.is_terminal() {
                return;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "session {id} never reached a terminal state"
            );
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    pub async fn output_text(&self, id: &str) -> String {
        let reply = self
            .request(Request::GetOutput {
                id: id.to_string(),
                lines: 1_000,
            })
            .await;
        match reply.body {
            Some(Body::Output { lines, .. }) => lines.join("\n"),
            other => panic!("get_output failed: {other:?}"),
        }
    }
}

pub fn spec() -> Spec {
    spec_with_slots(3)
}

pub fn spec_with_slots(max_sessions: u32) -> Spec {
    let store = Store::open_in_memory().unwrap();
    let clock: Arc<dyn corral_core::Clock> = Arc::new(corral_core::SystemClock);
    let ids: Arc<dyn corral_core::IdGen> = Arc::new(corral_core::UuidIdGen);
    let supervisor = Supervisor::new(
        SupervisorConfig {
            max_sessions,
            output_buffer_bytes: 64 * 1024,
            executable: "/bin/sh".to_string(),
            extra_env: Vec::new(),
        },
        store.clone(),
        EventBus::new(),
        Arc::clone(&clock),
        Arc::clone(&ids),
    );
    let gate = Arc::new(Gate::new(store.clone()));
    let messages = MessageRegistry::new(store.clone(), Arc::clone(&clock), Arc::clone(&ids));
    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    let daemon = Daemon::new(store, supervisor, gate, messages, clock, ids, 0, shutdown_tx);
    // Terminal watcher keeps the gate in step with finished sessions
    daemon.spawn_background_tasks();
    Spec {
        daemon,
        dir: tempfile::tempdir().unwrap(),
        _shutdown_rx: shutdown_rx,
    }
}

/// Write a plan file (and optionally its summary) into the standard layout.
pub fn seed_plan(root: &Path, phase: u32, plan: u32, executed: bool) {
    let phase_dir = root.join(format!("specs/app/planning/plans/{:02}-phase", phase));
    std::fs::create_dir_all(&phase_dir).unwrap();
    std::fs::write(
        phase_dir.join(format!("{:02}-{:02}-PLAN.md", phase, plan)),
        "# plan\n",
    )
    .unwrap();
    if executed {
        std::fs::write(
            phase_dir.join(format!("{:02}-{:02}-SUMMARY.md", phase, plan)),
            "done\n",
        )
        .unwrap();
    }
}
