// src/hooks.rs

//! Phase hook execution.
//!
//! Hooks are `HOOKSD/<phase>-*.sh` scripts, run in lexicographic order with
//! `(package_name, package_version, recipe_dir)` as arguments and the
//! recipe's variables exported in the environment. A failing or hanging
//! hook is a warning, never fatal: hooks observe the pipeline, they do not
//! gate it.

use crate::recipe::Recipe;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

/// Ceiling on a single hook's runtime.
const HOOK_TIMEOUT: Duration = Duration::from_secs(60);

/// The recognized hook phases.
pub const PRE_BUILD: &str = "pre-build";
pub const POST_BUILD: &str = "post-build";

/// Runs the scripts of one hooks directory.
pub struct HookRunner {
    dir: PathBuf,
}

impl HookRunner {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    /// Invoke every `<phase>-*.sh` script for `recipe`.
    pub fn run(&self, phase: &str, recipe: &Recipe) {
        let mut scripts: Vec<PathBuf> = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| {
                    p.file_name()
                        .and_then(|n| n.to_str())
                        .map(|n| n.starts_with(&format!("{phase}-")) && n.ends_with(".sh"))
                        .unwrap_or(false)
                })
                .collect(),
            Err(_) => return,
        };
        scripts.sort();

        for script in scripts {
            debug!("running {phase} hook {}", script.display());
            if let Err(reason) = self.run_one(&script, recipe) {
                warn!("{phase} hook {} failed: {reason}", script.display());
            }
        }
    }

    fn run_one(&self, script: &Path, recipe: &Recipe) -> std::result::Result<(), String> {
        let mut child = Command::new("sh")
            .arg(script)
            .arg(&recipe.name)
            .arg(&recipe.version)
            .arg(&recipe.recipe_dir)
            .envs(recipe.variables.iter().map(|(k, v)| (k.clone(), v.clone())))
            .stdin(Stdio::null())
            .spawn()
            .map_err(|e| format!("spawn failed: {e}"))?;

        match child
            .wait_timeout(HOOK_TIMEOUT)
            .map_err(|e| format!("wait failed: {e}"))?
        {
            Some(status) if status.success() => Ok(()),
            Some(status) => Err(format!("exited with {:?}", status.code())),
            None => {
                let _ = child.kill();
                let _ = child.wait();
                Err(format!("timed out after {}s", HOOK_TIMEOUT.as_secs()))
            }
        }
    }
}
