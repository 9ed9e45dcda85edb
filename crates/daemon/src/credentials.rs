// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Named-service credential loading.
//!
//! The credentials directory holds one file per service in `KEY=VALUE`
//! format (`#` comments, blank lines, optional single or double quotes
//! around values). Every pair is injected into child environments at
//! spawn. Missing directories are fine — credentials are optional.

use std::path::Path;

/// Parse one credential file body into key/value pairs.
pub fn parse_env_file(content: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        pairs.push((key.to_string(), unquote(value.trim()).to_string()));
    }
    pairs
}

fn unquote(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Load every credential file under `dir`, sorted by file name so later
/// files win on duplicate keys.
pub fn load_credentials(dir: &Path) -> Vec<(String, String)> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<_> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    files.sort();

    let mut pairs = Vec::new();
    for file in files {
        match std::fs::read_to_string(&file) {
            Ok(content) => {
                let parsed = parse_env_file(&content);
                tracing::debug!(
                    file = %file.display(),
                    keys = parsed.len(),
                    "loaded credential file"
                );
                for (key, value) in parsed {
                    pairs.retain(|(k, _): &(String, String)| k != &key);
                    pairs.push((key, value));
                }
            }
            Err(e) => {
                tracing::warn!(file = %file.display(), error = %e, "unreadable credential file");
            }
        }
    }
    pairs
}

#[cfg(test)]
#[path = "credentials_tests.rs"]
mod tests;
