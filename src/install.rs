// src/install.rs

//! Installation into the live root, and manifest-driven removal.
//!
//! Install extracts the package archive into a scratch root, then replays
//! it path by path into the live root through the elevated executor,
//! appending each path to the manifest as it lands. The installed flag is
//! written last, so a crash mid-install leaves a manifest that `remove`
//! can replay in reverse. No rollback beyond that is offered.

use crate::config::Config;
use crate::db::PackageDb;
use crate::elevate::Elevator;
use crate::error::{Error, Result};
use crate::package;
use crate::recipe::Recipe;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

pub struct Installer<'a> {
    config: &'a Config,
    db: PackageDb,
    elevator: Elevator,
}

impl<'a> Installer<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            db: PackageDb::new(&config.db_dir),
            elevator: Elevator::from_config(config),
        }
    }

    fn scratch_root(&self) -> PathBuf {
        self.config.build_dir.join("install-root")
    }

    /// Package the staging tree and install the result into the live root.
    ///
    /// Returns the package archive path.
    pub fn install(&self, recipe: &Recipe) -> Result<PathBuf> {
        let archive = package::pack(self.config, recipe)?;

        let scratch = self.scratch_root();
        if scratch.exists() {
            fs::remove_dir_all(&scratch)?;
        }
        fs::create_dir_all(&scratch)?;
        package::extract(&archive, &scratch)?;

        info!("installing {} into {}", recipe.id(), self.config.root.display());
        self.elevator
            .mkdir_p(&self.config.root)
            .map_err(|e| Error::Install(format!("root {}: {e}", self.config.root.display())))?;
        let mut manifest = self.db.manifest_writer(&recipe.name, &recipe.version)?;

        for entry in WalkDir::new(&scratch).min_depth(1).sort_by_file_name() {
            let entry = entry
                .map_err(|e| Error::Install(format!("walking scratch root: {e}")))?;
            let rel = entry
                .path()
                .strip_prefix(&scratch)
                .expect("walkdir yields children of its root");
            let dest = self.config.root.join(rel);
            let recorded = format!("/{}", rel.display());

            if entry.path_is_symlink() {
                let target = fs::read_link(entry.path())?;
                self.elevator.symlink(&target, &dest).map_err(|e| {
                    Error::Install(format!("symlink {recorded}: {e}"))
                })?;
            } else if entry.file_type().is_dir() {
                self.elevator
                    .mkdir_p(&dest)
                    .map_err(|e| Error::Install(format!("mkdir {recorded}: {e}")))?;
            } else {
                self.elevator
                    .install_file(entry.path(), &dest)
                    .map_err(|e| Error::Install(format!("install {recorded}: {e}")))?;
            }

            debug!("installed {recorded}");
            manifest.record(&recorded)?;
        }

        self.db.mark_installed(&recipe.name, &recipe.version)?;
        info!("{} installed", recipe.id());
        Ok(archive)
    }

    /// Remove an installed package by replaying its manifest in reverse.
    ///
    /// A missing manifest is a reported no-op. A manifest with no flag
    /// (a partial install) is honored so the partial progress can be
    /// reversed.
    pub fn uninstall(&self, name: &str, version: &str) -> Result<()> {
        let Some(paths) = self.db.manifest(name, version)? else {
            info!("{name}-{version} has no manifest, nothing to remove");
            return Ok(());
        };

        info!("removing {name}-{version} ({} paths)", paths.len());
        for recorded in paths.iter().rev() {
            let dest = self.config.root.join(recorded.trim_start_matches('/'));
            match dest.symlink_metadata() {
                Ok(meta) if meta.is_dir() => self.elevator.remove_dir(&dest),
                Ok(_) => self.elevator.remove_file(&dest).map_err(|e| {
                    Error::Install(format!("remove {recorded}: {e}"))
                })?,
                // Already gone; removal stays idempotent.
                Err(_) => {}
            }
        }

        self.db.forget(name, version)?;
        Ok(())
    }

    pub fn db(&self) -> &PackageDb {
        &self.db
    }
}

/// Walk helper shared by tests: every path under `root`, root-relative,
/// sorted.
pub fn tree_paths(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.path().strip_prefix(root).unwrap().to_path_buf())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn staged_recipe(base: &Path) -> (Config, Recipe) {
        let config = Config::rooted_at(base);
        fs::create_dir_all(&config.root).unwrap();
        let recipe_dir = base.join("recipe-dir");
        fs::create_dir_all(&recipe_dir).unwrap();
        fs::write(recipe_dir.join("recipe"), "PKG_NAME=hello\nPKG_VERSION=1.0\n").unwrap();
        let recipe = crate::recipe::load(&recipe_dir, &config).unwrap();

        let bin = recipe.destdir.join("usr/local/bin");
        fs::create_dir_all(&bin).unwrap();
        fs::write(bin.join("hello"), b"#!/bin/sh\necho hello\n").unwrap();
        fs::set_permissions(bin.join("hello"), fs::Permissions::from_mode(0o755)).unwrap();
        std::os::unix::fs::symlink("hello", bin.join("hi")).unwrap();
        (config, recipe)
    }

    #[test]
    fn test_install_records_manifest_and_flag() {
        let tmp = tempfile::tempdir().unwrap();
        let (config, recipe) = staged_recipe(tmp.path());
        let installer = Installer::new(&config);

        let archive = installer.install(&recipe).unwrap();
        assert!(archive.is_file());

        assert!(config.root.join("usr/local/bin/hello").is_file());
        assert_eq!(
            fs::read_link(config.root.join("usr/local/bin/hi")).unwrap(),
            PathBuf::from("hello")
        );

        let db = installer.db();
        assert!(db.is_installed("hello", "1.0"));
        let manifest = db.manifest("hello", "1.0").unwrap().unwrap();
        assert!(manifest.contains(&"/usr/local/bin/hello".to_string()));
        assert!(manifest.contains(&"/usr/local/bin".to_string()));
        // Directories precede their contents in write order.
        let dir_pos = manifest.iter().position(|p| p == "/usr/local/bin").unwrap();
        let file_pos = manifest
            .iter()
            .position(|p| p == "/usr/local/bin/hello")
            .unwrap();
        assert!(dir_pos < file_pos);
    }

    #[test]
    fn test_uninstall_reverses_install() {
        let tmp = tempfile::tempdir().unwrap();
        let (config, recipe) = staged_recipe(tmp.path());
        let installer = Installer::new(&config);
        installer.install(&recipe).unwrap();

        installer.uninstall("hello", "1.0").unwrap();

        assert!(!config.root.join("usr/local/bin/hello").exists());
        // Directories that became empty were removed too.
        assert!(!config.root.join("usr/local").exists());
        let db = installer.db();
        assert!(!db.is_installed("hello", "1.0"));
        assert!(db.manifest("hello", "1.0").unwrap().is_none());
        assert!(tree_paths(&config.root).is_empty());
    }

    #[test]
    fn test_uninstall_without_manifest_is_noop() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::rooted_at(tmp.path());
        fs::create_dir_all(&config.root).unwrap();
        let installer = Installer::new(&config);
        installer.uninstall("ghost", "9.9").unwrap();
    }

    #[test]
    fn test_partial_manifest_without_flag_is_removable() {
        let tmp = tempfile::tempdir().unwrap();
        let (config, _) = staged_recipe(tmp.path());
        let installer = Installer::new(&config);

        // Simulate a crashed install: manifest written, no flag.
        fs::create_dir_all(config.root.join("usr")).unwrap();
        fs::write(config.root.join("usr/partial"), b"x").unwrap();
        let db = PackageDb::new(&config.db_dir);
        let mut w = db.manifest_writer("broken", "0.1").unwrap();
        w.record("/usr").unwrap();
        w.record("/usr/partial").unwrap();
        drop(w);
        assert!(!db.is_installed("broken", "0.1"));

        installer.uninstall("broken", "0.1").unwrap();
        assert!(!config.root.join("usr/partial").exists());
        assert!(!config.root.join("usr").exists());
    }

    #[test]
    fn test_shared_directories_survive_removal() {
        let tmp = tempfile::tempdir().unwrap();
        let (config, recipe) = staged_recipe(tmp.path());
        let installer = Installer::new(&config);
        installer.install(&recipe).unwrap();

        // Another package owns a file in the same directory.
        fs::write(config.root.join("usr/local/bin/other"), b"y").unwrap();

        installer.uninstall("hello", "1.0").unwrap();
        assert!(config.root.join("usr/local/bin/other").is_file());
        assert!(config.root.join("usr/local/bin").is_dir());
    }
}
