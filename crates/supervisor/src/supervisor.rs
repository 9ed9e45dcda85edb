// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded-slot PTY session supervisor.
//!
//! Owns the slot set and every live child's PTY, ring buffer, and wait
//! state. One spawn may be in flight at a time; slots are freed only in the
//! exit handler so a dying child can never race a new spawn for its slot.

use crate::bus::EventBus;
use crate::detect::classify_wait;
use crate::error::SupervisorError;
use crate::pty::{self, PtyHandle};
use crate::ring::RingBuffer;
use corral_core::{
    Clock, HarnessEvent, IdGen, OutputChunk, Session, SessionId, SessionStatus, WaitType,
};
use corral_storage::Store;
use parking_lot::Mutex;
use portable_pty::CommandBuilder;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Quiet interval before the wait-state classifier runs.
const DEBOUNCE_MS: u64 = 300;
/// Delay before a detected wait is published, giving a coordinator that is
/// about to call the waiter time to subscribe.
const WAITING_EMIT_DELAY_MS: u64 = 5_000;
/// Trailing chunks considered by the classifier (~2 KB of typical output).
const WAIT_TAIL_CHUNKS: usize = 10;
/// Soft wait for a child to exit after a hangup.
const TERMINATE_GRACE_MS: u64 = 5_000;
/// Give up waiting for the agent CLI's startup banner after this long.
const STARTUP_FALLBACK_MS: u64 = 10_000;
/// Cap on the buffered startup-inspection window.
const STARTUP_WINDOW_BYTES: usize = 8_192;

const ENTER_GAP_MS: u64 = 100;
const KEY_GAP_MS: u64 = 50;
const SUBMIT_GAP_MS: u64 = 300;
const TYPE_DELAY_MS: u64 = 5;

// The agent CLI prints a banner and a prompt glyph once it is ready for
// free-form stdin; sending earlier drops keystrokes into its TUI warmup.
const INIT_BANNER_MARKERS: [&str; 2] = ["Welcome to", "? for shortcuts"];
const PROMPT_GLYPH: char = '❯';

/// Supervisor configuration.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Number of concurrency slots (session capacity).
    pub max_sessions: u32,
    /// Per-session in-memory output cap in bytes.
    pub output_buffer_bytes: usize,
    /// Executable spawned for every session.
    pub executable: String,
    /// Extra environment (credentials etc.) passed to children.
    pub extra_env: Vec<(String, String)>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_sessions: 3,
            output_buffer_bytes: 1024 * 1024,
            executable: "claude".to_string(),
            extra_env: Vec::new(),
        }
    }
}

struct StartupProbe {
    command: String,
    window: String,
}

struct LiveSession {
    record: Session,
    pty: PtyHandle,
    ring: RingBuffer,
    last_wait: Option<WaitType>,
    debounce: Option<tokio::task::JoinHandle<()>>,
    startup: Option<StartupProbe>,
    terminating: bool,
}

struct Inner {
    config: SupervisorConfig,
    store: Store,
    bus: EventBus,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGen>,
    sessions: Mutex<HashMap<SessionId, LiveSession>>,
    free_slots: Mutex<BTreeSet<u32>>,
    spawn_lock: tokio::sync::Mutex<()>,
}

/// Handle to the session supervisor. Cheap to clone.
#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<Inner>,
}

impl Supervisor {
    pub fn new(
        config: SupervisorConfig,
        store: Store,
        bus: EventBus,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGen>,
    ) -> Self {
        let free_slots: BTreeSet<u32> = (1..=config.max_sessions).collect();
        Self {
            inner: Arc::new(Inner {
                config,
                store,
                bus,
                clock,
                ids,
                sessions: Mutex::new(HashMap::new()),
                free_slots: Mutex::new(free_slots),
                spawn_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    pub fn store(&self) -> &Store {
        &self.inner.store
    }

    pub fn max_sessions(&self) -> u32 {
        self.inner.config.max_sessions
    }

    /// Spawn a new session into the first free slot.
    pub async fn spawn(
        &self,
        working_dir: &Path,
        command: Option<&str>,
    ) -> Result<Session, SupervisorError> {
        let _guard = self
            .inner
            .spawn_lock
            .try_lock()
            .map_err(|_| SupervisorError::SpawnInProgress)?;

        let slot = {
            let mut slots = self.inner.free_slots.lock();
            let slot = slots.iter().next().copied().ok_or(SupervisorError::SlotsExhausted {
                max: self.inner.config.max_sessions,
            })?;
            slots.remove(&slot);
            slot
        };

        match self.spawn_inner(slot, working_dir, command).await {
            Ok(session) => Ok(session),
            Err(e) => {
                // Unwind the slot assignment; nothing was registered
                self.inner.free_slots.lock().insert(slot);
                Err(e)
            }
        }
    }

    async fn spawn_inner(
        &self,
        slot: u32,
        working_dir: &Path,
        command: Option<&str>,
    ) -> Result<Session, SupervisorError> {
        if !working_dir.is_dir() {
            return Err(SupervisorError::SpawnFailed(format!(
                "working directory does not exist: {}",
                working_dir.display()
            )));
        }

        let (cmd, deferred) = self.build_command(working_dir, command);
        let spawned = pty::spawn_pty(cmd)?;

        let now = self.inner.clock.now_ms();
        let id = SessionId::new(self.inner.ids.next());
        let record = Session {
            id: id.clone(),
            slot,
            status: SessionStatus::Running,
            working_dir: working_dir.to_path_buf(),
            current_command: command.unwrap_or_default().to_string(),
            started_at_ms: now,
            ended_at_ms: None,
            pid: spawned.handle.pid(),
            last_polled_at_ms: now,
        };
        self.inner.store.insert_session(&record)?;

        let has_deferred = deferred.is_some();
        let live = LiveSession {
            record: record.clone(),
            pty: spawned.handle,
            ring: RingBuffer::new(self.inner.config.output_buffer_bytes),
            last_wait: None,
            debounce: None,
            startup: deferred.map(|command| StartupProbe {
                command,
                window: String::new(),
            }),
            terminating: false,
        };
        self.inner.sessions.lock().insert(id.clone(), live);

        tokio::spawn(run_session(
            Arc::clone(&self.inner),
            id.clone(),
            spawned.output_rx,
            spawned.exit_rx,
        ));

        if has_deferred {
            let inner = Arc::clone(&self.inner);
            let session_id = id.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(STARTUP_FALLBACK_MS)).await;
                if let Some(command) = take_startup_command(&inner, &session_id) {
                    tracing::warn!(
                        session_id = %session_id,
                        "agent CLI readiness not detected, sending command anyway"
                    );
                    dispatch_initial_command(&inner, &session_id, command).await;
                }
            });
        }

        tracing::info!(
            session_id = %id,
            slot,
            pid = ?record.pid,
            working_dir = %working_dir.display(),
            "session started"
        );
        self.inner.bus.emit(HarnessEvent::SessionStarted {
            session_id: id,
            slot,
        });
        Ok(record)
    }

    fn build_command(
        &self,
        working_dir: &Path,
        command: Option<&str>,
    ) -> (CommandBuilder, Option<String>) {
        let executable = &self.inner.config.executable;
        let mut cmd = CommandBuilder::new(executable);
        cmd.cwd(working_dir);
        cmd.env("TERM", "xterm-256color");
        // Cooperating children check this to avoid bootstrapping their own harness
        cmd.env("CORRAL_CHILD", "1");
        for (key, value) in &self.inner.config.extra_env {
            cmd.env(key, value);
        }

        if is_agent_cli(executable) {
            // Strict minimal tool environment: no permission prompts, no
            // upstream tool configuration.
            cmd.arg("--dangerously-skip-permissions");
            cmd.arg("--strict-mcp-config");
            (cmd, command.map(str::to_string))
        } else {
            if let Some(script) = command {
                cmd.arg("-c");
                cmd.arg(script);
            }
            (cmd, None)
        }
    }

    /// Terminate a session. Unknown ids are a no-op, not an error.
    ///
    /// Sends a hangup, waits up to 5 s for the exit handler to run, then
    /// force-kills. The slot is freed by the exit handler, never here.
    pub async fn terminate(&self, id: &SessionId) -> bool {
        let found = {
            let mut sessions = self.inner.sessions.lock();
            match sessions.get_mut(id) {
                Some(live) => {
                    live.terminating = true;
                    live.pty.hangup();
                    true
                }
                None => false,
            }
        };
        if !found {
            return false;
        }

        let deadline = tokio::time::Instant::now() + Duration::from_millis(TERMINATE_GRACE_MS);
        while tokio::time::Instant::now() < deadline {
            if !self.is_live(id) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        if let Some(live) = self.inner.sessions.lock().get_mut(id) {
            live.pty.force_kill();
        }
        true
    }

    /// Terminate every live session (used by shutdown with kill).
    pub async fn terminate_all(&self) {
        for id in self.live_ids() {
            self.terminate(&id).await;
        }
    }

    /// Smart input for terminal UIs.
    ///
    /// Plain Enter double-submits; numeric menu selections and free text
    /// type their characters, settle, then double-submit. Clears the wait
    /// state so the next prompt re-fires.
    pub async fn send_input(&self, id: &SessionId, input: &str) -> Result<(), SupervisorError> {
        let tx = self.input_channel(id)?;
        let send = |bytes: Vec<u8>| {
            let tx = tx.clone();
            async move {
                tx.send(bytes)
                    .await
                    .map_err(|_| SupervisorError::SessionNotActive(id.to_string()))
            }
        };

        if input.is_empty() || input == "\r" || input == "\n" {
            // Double-submit: some selection UIs swallow the first Enter
            send(b"\r".to_vec()).await?;
            tokio::time::sleep(Duration::from_millis(ENTER_GAP_MS)).await;
            send(b"\r".to_vec()).await?;
        } else {
            send(input.as_bytes().to_vec()).await?;
            tokio::time::sleep(Duration::from_millis(KEY_GAP_MS)).await;
            send(b"\r".to_vec()).await?;
            tokio::time::sleep(Duration::from_millis(ENTER_GAP_MS)).await;
            send(b"\r".to_vec()).await?;
        }

        self.clear_wait(id);
        Ok(())
    }

    /// Write bytes exactly as given, no added keystrokes.
    pub async fn send_raw(&self, id: &SessionId, input: &str) -> Result<(), SupervisorError> {
        let tx = self.input_channel(id)?;
        tx.send(input.as_bytes().to_vec())
            .await
            .map_err(|_| SupervisorError::SessionNotActive(id.to_string()))
    }

    pub fn resize(&self, id: &SessionId, cols: u16, rows: u16) -> Result<(), SupervisorError> {
        let sessions = self.inner.sessions.lock();
        let live = sessions
            .get(id)
            .ok_or_else(|| self.missing_error(id))?;
        live.pty.resize(cols, rows)
    }

    /// Output chunks for a session: live ring first, store fallback.
    /// Reading updates `last_polled_at`.
    pub fn get_output(&self, id: &SessionId) -> Result<Vec<OutputChunk>, SupervisorError> {
        let now = self.inner.clock.now_ms();
        let live_chunks = {
            let mut sessions = self.inner.sessions.lock();
            sessions.get_mut(id).map(|live| {
                live.record.last_polled_at_ms = now;
                live.ring.all()
            })
        };
        match live_chunks {
            Some(chunks) => {
                self.inner.store.touch_session_polled(id, now)?;
                Ok(chunks)
            }
            None => {
                if self.inner.store.get_session(id)?.is_none() {
                    return Err(SupervisorError::SessionNotFound(id.to_string()));
                }
                self.inner.store.touch_session_polled(id, now)?;
                Ok(self.inner.store.outputs_all(id)?)
            }
        }
    }

    /// Live sessions whose output has not been polled within `timeout_ms`.
    pub fn find_stale(&self, timeout_ms: u64) -> Vec<SessionId> {
        let now = self.inner.clock.now_ms();
        let sessions = self.inner.sessions.lock();
        sessions
            .values()
            .filter(|live| now.saturating_sub(live.record.last_polled_at_ms) > timeout_ms)
            .map(|live| live.record.id.clone())
            .collect()
    }

    /// Last detected wait type for a live session.
    pub fn last_wait(&self, id: &SessionId) -> Option<WaitType> {
        self.inner.sessions.lock().get(id).and_then(|l| l.last_wait)
    }

    /// Clear the wait state so the next transition re-fires, and return the
    /// session to `running`.
    pub fn clear_wait(&self, id: &SessionId) {
        let mut sessions = self.inner.sessions.lock();
        if let Some(live) = sessions.get_mut(id) {
            live.last_wait = None;
            if live.record.status == SessionStatus::WaitingCheckpoint {
                live.record.status = SessionStatus::Running;
                if let Err(e) =
                    self.inner
                        .store
                        .update_session_status(id, SessionStatus::Running, None)
                {
                    tracing::warn!(session_id = %id, error = %e, "failed to persist status");
                }
            }
        }
    }

    /// Flip a session to `waiting_checkpoint` (explicit checkpoint posted).
    pub fn mark_waiting_checkpoint(&self, id: &SessionId) -> Result<(), SupervisorError> {
        self.inner
            .store
            .update_session_status(id, SessionStatus::WaitingCheckpoint, None)?;
        let mut sessions = self.inner.sessions.lock();
        if let Some(live) = sessions.get_mut(id) {
            if !live.record.status.is_terminal() {
                live.record.status = SessionStatus::WaitingCheckpoint;
            }
        }
        Ok(())
    }

    pub fn is_live(&self, id: &SessionId) -> bool {
        self.inner.sessions.lock().contains_key(id)
    }

    pub fn live_ids(&self) -> Vec<SessionId> {
        self.inner.sessions.lock().keys().cloned().collect()
    }

    /// (session, slot, command) for every live session; the gate checks
    /// these for the execute-concurrency barrier.
    pub fn active_commands(&self) -> Vec<(SessionId, u32, String)> {
        self.inner
            .sessions
            .lock()
            .values()
            .map(|l| {
                (
                    l.record.id.clone(),
                    l.record.slot,
                    l.record.current_command.clone(),
                )
            })
            .collect()
    }

    pub fn free_slot_count(&self) -> u32 {
        self.inner.free_slots.lock().len() as u32
    }

    fn input_channel(&self, id: &SessionId) -> Result<mpsc::Sender<Vec<u8>>, SupervisorError> {
        let sessions = self.inner.sessions.lock();
        sessions
            .get(id)
            .map(|live| live.pty.input())
            .ok_or_else(|| self.missing_error(id))
    }

    fn missing_error(&self, id: &SessionId) -> SupervisorError {
        match self.inner.store.get_session(id) {
            Ok(Some(_)) => SupervisorError::SessionNotActive(id.to_string()),
            _ => SupervisorError::SessionNotFound(id.to_string()),
        }
    }
}

fn is_agent_cli(executable: &str) -> bool {
    Path::new(executable)
        .file_name()
        .map(|n| n.to_string_lossy().starts_with("claude"))
        .unwrap_or(false)
}

/// Per-session task: drain output until EOF, then handle the exit.
async fn run_session(
    inner: Arc<Inner>,
    id: SessionId,
    mut output_rx: mpsc::Receiver<Vec<u8>>,
    exit_rx: tokio::sync::oneshot::Receiver<portable_pty::ExitStatus>,
) {
    while let Some(data) = output_rx.recv().await {
        handle_data(&inner, &id, data);
    }
    let status = exit_rx.await.ok();
    handle_exit(&inner, &id, status);
}

/// Data handler: ring + store append, output event, debounce reset, and the
/// startup readiness probe for the agent CLI.
fn handle_data(inner: &Arc<Inner>, id: &SessionId, data: Vec<u8>) {
    let now = inner.clock.now_ms();
    let bytes = data.len();
    let text = String::from_utf8_lossy(&data).into_owned();
    let mut ready_command = None;

    {
        let mut sessions = inner.sessions.lock();
        let Some(live) = sessions.get_mut(id) else {
            return;
        };

        let seq = match inner.store.append_output(id, now, "stdout", &data) {
            Ok(seq) => seq,
            Err(e) => {
                tracing::warn!(session_id = %id, error = %e, "failed to persist output chunk");
                0
            }
        };
        live.ring.push(OutputChunk {
            session_id: id.clone(),
            seq,
            timestamp_ms: now,
            stream: "stdout".to_string(),
            data,
        });

        if let Some(probe) = live.startup.as_mut() {
            probe.window.push_str(&text);
            if probe.window.len() > STARTUP_WINDOW_BYTES {
                let keep = probe
                    .window
                    .char_indices()
                    .rev()
                    .take(STARTUP_WINDOW_BYTES)
                    .last()
                    .map(|(i, _)| i)
                    .unwrap_or(0);
                probe.window.drain(..keep);
            }
            let ready = probe.window.contains(PROMPT_GLYPH)
                && INIT_BANNER_MARKERS.iter().any(|m| probe.window.contains(m));
            if ready {
                ready_command = live.startup.take().map(|p| p.command);
            }
        }

        // Reset the settle timer: classification runs 300 ms after the
        // last chunk.
        if let Some(handle) = live.debounce.take() {
            handle.abort();
        }
        let inner_clone = Arc::clone(inner);
        let session_id = id.clone();
        live.debounce = Some(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(DEBOUNCE_MS)).await;
            run_wait_detection(&inner_clone, &session_id);
        }));
    }

    inner.bus.emit(HarnessEvent::SessionOutput {
        session_id: id.clone(),
        bytes,
    });

    if let Some(command) = ready_command {
        let inner = Arc::clone(inner);
        let session_id = id.clone();
        tokio::spawn(async move {
            dispatch_initial_command(&inner, &session_id, command).await;
        });
    }
}

/// Classify the settled tail and emit a transition exactly once.
fn run_wait_detection(inner: &Arc<Inner>, id: &SessionId) {
    let mut sessions = inner.sessions.lock();
    let Some(live) = sessions.get_mut(id) else {
        return;
    };

    let tail: String = live
        .ring
        .tail(WAIT_TAIL_CHUNKS)
        .iter()
        .map(|c| String::from_utf8_lossy(&c.data).into_owned())
        .collect();
    let wait = classify_wait(&tail);

    if wait == live.last_wait {
        return;
    }
    // Record immediately so repeated detections of the same prompt collapse
    live.last_wait = wait;

    let Some(wait_type) = wait else {
        return;
    };

    if live.record.status == SessionStatus::Running {
        live.record.status = SessionStatus::WaitingCheckpoint;
        if let Err(e) =
            inner
                .store
                .update_session_status(id, SessionStatus::WaitingCheckpoint, None)
        {
            tracing::warn!(session_id = %id, error = %e, "failed to persist status");
        }
    }

    tracing::debug!(session_id = %id, wait = %wait_type, "wait state detected");

    // Delay emission so a coordinator about to arm the waiter can install
    // its listener first; skip if input cleared the wait meanwhile.
    let inner_clone = Arc::clone(inner);
    let session_id = id.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(WAITING_EMIT_DELAY_MS)).await;
        let still_waiting = inner_clone
            .sessions
            .lock()
            .get(&session_id)
            .is_some_and(|l| l.last_wait == Some(wait_type));
        if still_waiting {
            inner_clone.bus.emit(HarnessEvent::SessionWaiting {
                session_id,
                wait: wait_type,
            });
        }
    });
}

/// Exit handler: terminal status, slot release, lifecycle event.
fn handle_exit(inner: &Arc<Inner>, id: &SessionId, status: Option<portable_pty::ExitStatus>) {
    let removed = {
        let mut sessions = inner.sessions.lock();
        sessions.remove(id)
    };
    let Some(live) = removed else {
        return;
    };
    if let Some(handle) = live.debounce {
        handle.abort();
    }

    let (final_status, reason) = match status {
        Some(st) if st.success() && !live.terminating => (SessionStatus::Completed, None),
        Some(st) => {
            let reason = if live.terminating {
                "terminated".to_string()
            } else {
                format!("exit code {}", st.exit_code())
            };
            (SessionStatus::Failed, Some(reason))
        }
        None => (SessionStatus::Failed, Some("exit status unavailable".to_string())),
    };

    let now = inner.clock.now_ms();
    if let Err(e) = inner.store.update_session_status(id, final_status, Some(now)) {
        tracing::warn!(session_id = %id, error = %e, "failed to persist terminal status");
    }
    if let Err(e) = inner.store.set_session_pid(id, None) {
        tracing::warn!(session_id = %id, error = %e, "failed to clear pid");
    }

    inner.free_slots.lock().insert(live.record.slot);

    tracing::info!(
        session_id = %id,
        slot = live.record.slot,
        status = %final_status,
        reason = reason.as_deref().unwrap_or(""),
        "session ended"
    );

    match final_status {
        SessionStatus::Completed => inner.bus.emit(HarnessEvent::SessionCompleted {
            session_id: id.clone(),
        }),
        _ => inner.bus.emit(HarnessEvent::SessionFailed {
            session_id: id.clone(),
            reason: reason.unwrap_or_default(),
        }),
    }
}

fn take_startup_command(inner: &Arc<Inner>, id: &SessionId) -> Option<String> {
    inner
        .sessions
        .lock()
        .get_mut(id)
        .and_then(|l| l.startup.take().map(|p| p.command))
}

/// Type the held initial command into a ready agent CLI: characters with a
/// short inter-key delay, then two submission keystrokes ~300 ms apart.
async fn dispatch_initial_command(inner: &Arc<Inner>, id: &SessionId, command: String) {
    let tx = {
        let sessions = inner.sessions.lock();
        match sessions.get(id) {
            Some(live) => live.pty.input(),
            None => return,
        }
    };

    tracing::debug!(session_id = %id, "dispatching initial command to agent CLI");
    for ch in command.chars() {
        let mut buf = [0u8; 4];
        let bytes = ch.encode_utf8(&mut buf).as_bytes().to_vec();
        if tx.send(bytes).await.is_err() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(TYPE_DELAY_MS)).await;
    }
    if tx.send(b"\r".to_vec()).await.is_err() {
        return;
    }
    tokio::time::sleep(Duration::from_millis(SUBMIT_GAP_MS)).await;
    let _ = tx.send(b"\r".to_vec()).await;
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
