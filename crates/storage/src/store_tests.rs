// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use corral_core::{Session, SessionId, SessionStatus};
use std::path::PathBuf;

fn sample_session(id: &str, slot: u32) -> Session {
    Session {
        id: SessionId::new(id),
        slot,
        status: SessionStatus::Running,
        working_dir: PathBuf::from("/tmp/p"),
        current_command: String::new(),
        started_at_ms: 1,
        ended_at_ms: None,
        pid: None,
        last_polled_at_ms: 1,
    }
}

#[test]
fn open_creates_parent_dirs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/state/sessions.db");
    let store = Store::open(&path).unwrap();
    store.insert_session(&sample_session("s-1", 1)).unwrap();
    assert!(path.exists());
}

#[test]
fn reopen_preserves_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sessions.db");
    {
        let store = Store::open(&path).unwrap();
        store.insert_session(&sample_session("s-1", 1)).unwrap();
    }
    let store = Store::open(&path).unwrap();
    let session = store.get_session(&SessionId::new("s-1")).unwrap().unwrap();
    assert_eq!(session.slot, 1);
}

#[test]
fn clones_share_the_same_database() {
    let store = Store::open_in_memory().unwrap();
    let clone = store.clone();
    store.insert_session(&sample_session("s-1", 1)).unwrap();
    assert!(clone.get_session(&SessionId::new("s-1")).unwrap().is_some());
}
