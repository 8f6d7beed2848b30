// src/exec.rs

//! External command invocation helpers.
//!
//! The pipeline leans on a handful of system tools (curl, git, tar, patch,
//! unzip, the build systems). Spawning one that is not installed must
//! surface as a missing-tool error rather than a bare ENOENT, so every
//! invocation goes through here.

use crate::error::{Error, Result};
use std::ffi::OsStr;
use std::path::Path;
use std::process::{Command, Output};

/// Run `tool` with `args`, capturing output.
///
/// A failed spawn because the binary does not exist maps to
/// [`Error::MissingTool`]; any other spawn failure is an I/O error.
/// A non-zero exit is NOT an error here; callers that care use
/// [`run_checked`].
pub fn run<S: AsRef<OsStr>>(tool: &str, args: &[S], cwd: Option<&Path>) -> Result<Output> {
    let mut cmd = Command::new(tool);
    cmd.args(args);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    cmd.output().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::MissingTool {
                tool: tool.to_string(),
            }
        } else {
            Error::Io(e)
        }
    })
}

/// Run `tool` with `args` and fail with its stderr if it exits non-zero.
pub fn run_checked<S: AsRef<OsStr>>(tool: &str, args: &[S], cwd: Option<&Path>) -> Result<Output> {
    let output = run(tool, args, cwd)?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Io(std::io::Error::other(format!(
            "{} exited with {:?}: {}",
            tool,
            output.status.code(),
            stderr.trim()
        ))));
    }
    Ok(output)
}
