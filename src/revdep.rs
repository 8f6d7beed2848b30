// src/revdep.rs

//! Reverse-dependency scan for broken dynamic linking.
//!
//! Samples a bounded number of executables and shared libraries under the
//! standard system paths and asks the dynamic linker which of their
//! library references fail to resolve. The bound keeps a `revdep` run
//! cheap on large roots; callers react to any finding by rebuilding the
//! world.

use crate::config::Config;
use crate::error::Result;
use crate::exec;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Upper bound on files examined in one scan.
pub const SCAN_LIMIT: usize = 5000;

/// Directories sampled, relative to the configured root.
const SCAN_DIRS: &[&str] = &[
    "usr/bin",
    "usr/sbin",
    "usr/lib",
    "usr/local/bin",
    "usr/local/lib",
];

/// A binary with unresolvable shared-library references.
#[derive(Debug, Clone)]
pub struct BrokenBinary {
    pub path: PathBuf,
    pub missing: Vec<String>,
}

/// Scan for binaries whose dynamic-linker resolution lists missing
/// libraries.
pub fn scan(config: &Config) -> Result<Vec<BrokenBinary>> {
    let mut examined = 0usize;
    let mut broken = Vec::new();

    'dirs: for dir in SCAN_DIRS {
        let base = config.root.join(dir);
        if !base.is_dir() {
            continue;
        }
        for entry in WalkDir::new(&base).into_iter().filter_map(|e| e.ok()) {
            if examined >= SCAN_LIMIT {
                debug!("scan limit of {SCAN_LIMIT} files reached");
                break 'dirs;
            }
            if !entry.file_type().is_file() || !is_candidate(entry.path()) {
                continue;
            }
            examined += 1;

            let path_str = entry.path().to_string_lossy().into_owned();
            let output = exec::run("ldd", &[&path_str], None)?;
            if !output.status.success() {
                // Statically linked or not an ELF object.
                continue;
            }
            let missing = missing_libs(&String::from_utf8_lossy(&output.stdout));
            if !missing.is_empty() {
                broken.push(BrokenBinary {
                    path: entry.into_path(),
                    missing,
                });
            }
        }
    }

    Ok(broken)
}

/// Executables and anything that looks like a shared object.
fn is_candidate(path: &Path) -> bool {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    if name.contains(".so") {
        return true;
    }
    path.metadata()
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Library names the dynamic linker reported as unresolvable.
fn missing_libs(ldd_output: &str) -> Vec<String> {
    ldd_output
        .lines()
        .filter(|line| line.contains("not found"))
        .filter_map(|line| line.split_whitespace().next())
        .map(String::from)
        .collect()
}
