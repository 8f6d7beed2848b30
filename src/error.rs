// src/error.rs

//! Crate-wide error type and result alias.
//!
//! Fatal error kinds cover configuration problems, missing external tools,
//! fetch failures, unpack/patch failures, build-step failures, and
//! filesystem/install failures. Dependency-graph anomalies and hook failures
//! are deliberately NOT represented here: they are warnings, logged at the
//! point of detection, and never abort a run.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Bad recipe, unresolvable target, or invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A required external command is not installed.
    #[error("required tool '{tool}' is not available on this system")]
    MissingTool { tool: String },

    /// HTTP download or git clone/pull failure after retries.
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// Unknown archive format or extraction failure.
    #[error("unpack failed: {0}")]
    Unpack(String),

    /// A patch did not apply cleanly.
    #[error("patch failed: {0}")]
    Patch(String),

    /// A configure/build/install step exited non-zero.
    #[error("{phase} step failed with exit code {code} (full log: {log})")]
    Build {
        phase: &'static str,
        code: i32,
        log: PathBuf,
    },

    /// Failure to mutate the live root or the package database.
    #[error("install failed: {0}")]
    Install(String),

    /// Something that should exist does not.
    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
