// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment lookups for daemon configuration.

use std::path::PathBuf;

/// Root state directory: `$CORRAL_STATE_DIR`, else `$XDG_STATE_HOME/corral`,
/// else `~/.corral`.
pub fn state_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("CORRAL_STATE_DIR") {
        return Some(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Some(PathBuf::from(xdg).join("corral"));
    }
    dirs::home_dir().map(|home| home.join(".corral"))
}

pub fn var_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

pub fn var_u32(name: &str) -> Option<u32> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

pub fn var_path(name: &str) -> Option<PathBuf> {
    std::env::var(name).ok().map(PathBuf::from)
}

pub fn var_string(name: &str) -> Option<String> {
    std::env::var(name).ok()
}
