// src/build/mod.rs

//! The build driver: prepared sources in, populated staging tree out.
//!
//! Entry point is [`Driver::build`], which brackets the work with the
//! pre/post-build hooks, resets the staging tree, detects the build system,
//! and runs its steps with combined output appended to the per-package log.
//! The driver writes only under `BUILDDIR` and `LOGDIR`.

mod system;

pub use system::{BuildSystem, Step};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::hooks::{self, HookRunner};
use crate::recipe::Recipe;
use crate::unpack;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

pub struct Driver<'a> {
    config: &'a Config,
}

impl<'a> Driver<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// The log file a recipe's build writes to.
    pub fn log_path(&self, recipe: &Recipe) -> PathBuf {
        self.config.log_dir.join(format!("{}.log", recipe.id()))
    }

    /// Build a recipe: hooks, source preparation, staged install.
    ///
    /// On success the staging tree at `recipe.destdir` holds the package
    /// content. Sources must already be in the cache.
    pub fn build(&self, recipe: &Recipe) -> Result<()> {
        let hook_runner = HookRunner::new(&self.config.hooks_dir);
        hook_runner.run(hooks::PRE_BUILD, recipe);

        let source_root = unpack::prepare(self.config, recipe)?;
        let workdir = match &recipe.build_subdir {
            Some(sub) => source_root.join(sub),
            None => source_root,
        };

        if recipe.destdir.exists() {
            fs::remove_dir_all(&recipe.destdir)?;
        }
        fs::create_dir_all(&recipe.destdir)?;

        let build_system = BuildSystem::detect(&workdir, recipe).ok_or_else(|| {
            Error::Config(format!(
                "no build system detected for {} in {}",
                recipe.id(),
                workdir.display()
            ))
        })?;
        info!("building {} with {build_system}", recipe.id());

        fs::create_dir_all(&self.config.log_dir)?;
        let log_path = self.log_path(recipe);
        let mut log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        for step in build_system.plan(recipe) {
            self.run_step(recipe, &workdir, &step, &mut log, &log_path)?;
        }

        hook_runner.run(hooks::POST_BUILD, recipe);
        Ok(())
    }

    fn run_step(
        &self,
        recipe: &Recipe,
        workdir: &Path,
        step: &Step,
        log: &mut fs::File,
        log_path: &Path,
    ) -> Result<()> {
        let cwd = match step.subdir {
            Some(sub) => {
                let dir = workdir.join(sub);
                fs::create_dir_all(&dir)?;
                dir
            }
            None => workdir.to_path_buf(),
        };

        info!("{}: {} phase", recipe.id(), step.phase);
        debug!("running: {}", step.render());

        let output = Command::new(&step.program)
            .args(&step.args)
            .current_dir(&cwd)
            .envs(step.env.iter().map(|(k, v)| (k.clone(), v.clone())))
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::MissingTool {
                        tool: step.program.clone(),
                    }
                } else {
                    Error::Io(e)
                }
            })?;

        writeln!(log, "=== {}: {} ===", step.phase, step.render())?;
        log.write_all(&output.stdout)?;
        log.write_all(&output.stderr)?;

        if !output.status.success() {
            return Err(Error::Build {
                phase: step.phase,
                code: output.status.code().unwrap_or(-1),
                log: log_path.to_path_buf(),
            });
        }
        Ok(())
    }
}
