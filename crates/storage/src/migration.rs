// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Schema creation and versioning.
//!
//! Migrations are idempotent: opening the same database twice is a no-op,
//! and each version step only runs when the stored version is older.

use rusqlite::Connection;

/// Current schema version.
pub(crate) const SCHEMA_VERSION: i64 = 1;

pub(crate) fn migrate(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    )?;

    let version = schema_version(conn)?;
    if version < 1 {
        conn.execute_batch(
            "BEGIN;
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                slot INTEGER NOT NULL,
                status TEXT NOT NULL,
                working_dir TEXT NOT NULL,
                current_command TEXT NOT NULL DEFAULT '',
                started_at_ms INTEGER NOT NULL,
                ended_at_ms INTEGER,
                pid INTEGER,
                last_polled_at_ms INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS outputs (
                session_id TEXT NOT NULL,
                seq INTEGER NOT NULL,
                timestamp_ms INTEGER NOT NULL,
                stream TEXT NOT NULL,
                data BLOB NOT NULL,
                PRIMARY KEY (session_id, seq)
            );

            CREATE TABLE IF NOT EXISTS worker_messages (
                id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL,
                type TEXT NOT NULL,
                payload TEXT NOT NULL DEFAULT '{}',
                timestamp_ms INTEGER NOT NULL,
                status TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_worker_messages_session_status
                ON worker_messages(session_id, status);

            CREATE TABLE IF NOT EXISTS orchestrator_messages (
                id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL,
                in_response_to TEXT NOT NULL,
                type TEXT NOT NULL,
                payload TEXT NOT NULL DEFAULT '{}',
                timestamp_ms INTEGER NOT NULL
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_orchestrator_messages_request
                ON orchestrator_messages(in_response_to);

            CREATE TABLE IF NOT EXISTS checkpoints (
                id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL,
                type TEXT NOT NULL,
                workflow TEXT,
                phase INTEGER,
                summary TEXT NOT NULL DEFAULT '',
                next_command TEXT,
                data TEXT,
                created_at_ms INTEGER NOT NULL,
                resolved_at_ms INTEGER
            );
            CREATE INDEX IF NOT EXISTS idx_checkpoints_pending
                ON checkpoints(session_id, resolved_at_ms);

            CREATE TABLE IF NOT EXISTS orchestration_state (
                project_root TEXT PRIMARY KEY,
                highest_planned_phase INTEGER NOT NULL DEFAULT 0,
                highest_executed_phase INTEGER NOT NULL DEFAULT 0,
                highest_executing_phase INTEGER NOT NULL DEFAULT 0,
                highest_executing_plan INTEGER NOT NULL DEFAULT 0,
                pending_verify_phase INTEGER
            );

            CREATE TABLE IF NOT EXISTS plans (
                project_root TEXT NOT NULL,
                phase INTEGER NOT NULL,
                plan INTEGER NOT NULL,
                path TEXT NOT NULL,
                status TEXT NOT NULL,
                PRIMARY KEY (project_root, phase, plan)
            );
            COMMIT;",
        )?;
        set_schema_version(conn, 1)?;
    }

    Ok(())
}

pub(crate) fn schema_version(conn: &Connection) -> Result<i64, rusqlite::Error> {
    let version: Option<String> = conn
        .query_row(
            "SELECT value FROM meta WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })?;
    Ok(version.and_then(|v| v.parse().ok()).unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: i64) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO meta (key, value) VALUES ('schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        [version.to_string()],
    )?;
    Ok(())
}

#[cfg(test)]
#[path = "migration_tests.rs"]
mod tests;
