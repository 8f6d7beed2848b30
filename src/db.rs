// src/db.rs

//! The installed-package database.
//!
//! A flat directory of files keyed by `<name>-<version>`: a `.manifest`
//! listing every installed path in write order, and a `.installed` flag
//! holding the completion timestamp. The flag is the authoritative
//! "installed" signal; the manifest alone marks a partial install that
//! `remove` can still reverse. One package-manager invocation at a time,
//! no cross-process locking.

use crate::error::Result;
use crate::version;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct PackageDb {
    dir: PathBuf,
}

impl PackageDb {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    fn key(name: &str, ver: &str) -> String {
        format!("{name}-{ver}")
    }

    pub fn manifest_path(&self, name: &str, ver: &str) -> PathBuf {
        self.dir.join(format!("{}.manifest", Self::key(name, ver)))
    }

    pub fn flag_path(&self, name: &str, ver: &str) -> PathBuf {
        self.dir.join(format!("{}.installed", Self::key(name, ver)))
    }

    /// Flag existence is the installed signal.
    pub fn is_installed(&self, name: &str, ver: &str) -> bool {
        self.flag_path(name, ver).is_file()
    }

    /// Every installed `(name, version)`, sorted by name then natural
    /// version order.
    pub fn list_installed(&self) -> Result<Vec<(String, String)>> {
        let mut installed = Vec::new();
        let entries = match fs::read_dir(&self.dir) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(installed),
            Err(e) => return Err(e.into()),
        };

        for entry in entries.filter_map(|e| e.ok()) {
            let file_name = entry.file_name();
            let Some(stem) = file_name
                .to_str()
                .and_then(|n| n.strip_suffix(".installed"))
            else {
                continue;
            };
            if let Some((name, ver)) = split_key(stem) {
                installed.push((name.to_string(), ver.to_string()));
            }
        }

        installed.sort_by(|a, b| {
            a.0.cmp(&b.0)
                .then_with(|| version::compare(&a.1, &b.1))
        });
        Ok(installed)
    }

    /// Installed versions of one name, in natural version order.
    pub fn installed_versions(&self, name: &str) -> Result<Vec<String>> {
        Ok(self
            .list_installed()?
            .into_iter()
            .filter(|(n, _)| n == name)
            .map(|(_, v)| v)
            .collect())
    }

    /// The recorded path list, in install order. `None` when no manifest
    /// exists.
    pub fn manifest(&self, name: &str, ver: &str) -> Result<Option<Vec<String>>> {
        match fs::read_to_string(self.manifest_path(name, ver)) {
            Ok(text) => Ok(Some(
                text.lines()
                    .filter(|l| !l.is_empty())
                    .map(String::from)
                    .collect(),
            )),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Start a fresh manifest for an install in progress. Paths are
    /// flushed as they are recorded so the manifest always reflects what
    /// was actually written.
    pub fn manifest_writer(&self, name: &str, ver: &str) -> Result<ManifestWriter> {
        fs::create_dir_all(&self.dir)?;
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(self.manifest_path(name, ver))?;
        Ok(ManifestWriter { file })
    }

    /// Write the installed flag; only called after every path landed.
    pub fn mark_installed(&self, name: &str, ver: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let stamp = chrono::Utc::now().to_rfc3339();
        fs::write(self.flag_path(name, ver), format!("{stamp}\n"))?;
        Ok(())
    }

    /// Drop the manifest and flag after a removal.
    pub fn forget(&self, name: &str, ver: &str) -> Result<()> {
        for path in [
            self.manifest_path(name, ver),
            self.flag_path(name, ver),
        ] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

/// Incremental manifest writer used during installation.
pub struct ManifestWriter {
    file: File,
}

impl ManifestWriter {
    pub fn record(&mut self, path: &str) -> Result<()> {
        writeln!(self.file, "{path}")?;
        self.file.flush()?;
        Ok(())
    }
}

/// Split a `<name>-<version>` database key.
///
/// Names may themselves contain dashes, so the split point is the last
/// dash followed by a digit; a plain last-dash split is the fallback.
fn split_key(stem: &str) -> Option<(&str, &str)> {
    let bytes = stem.as_bytes();
    for i in (0..bytes.len().saturating_sub(1)).rev() {
        if bytes[i] == b'-' && bytes[i + 1].is_ascii_digit() {
            return Some((&stem[..i], &stem[i + 1..]));
        }
    }
    stem.rsplit_once('-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_key() {
        assert_eq!(split_key("hello-1.0"), Some(("hello", "1.0")));
        assert_eq!(split_key("foo-bar-2.1"), Some(("foo-bar", "2.1")));
        assert_eq!(split_key("git-master"), Some(("git", "master")));
        assert_eq!(split_key("nodash"), None);
    }

    #[test]
    fn test_install_lifecycle() {
        let tmp = tempfile::tempdir().unwrap();
        let db = PackageDb::new(tmp.path());

        assert!(!db.is_installed("hello", "1.0"));
        assert!(db.manifest("hello", "1.0").unwrap().is_none());

        let mut writer = db.manifest_writer("hello", "1.0").unwrap();
        writer.record("/usr/local").unwrap();
        writer.record("/usr/local/bin").unwrap();
        writer.record("/usr/local/bin/hello").unwrap();
        drop(writer);

        // Manifest exists but no flag yet: not installed.
        assert!(!db.is_installed("hello", "1.0"));
        assert_eq!(
            db.manifest("hello", "1.0").unwrap().unwrap(),
            vec!["/usr/local", "/usr/local/bin", "/usr/local/bin/hello"]
        );

        db.mark_installed("hello", "1.0").unwrap();
        assert!(db.is_installed("hello", "1.0"));
        let stamp = fs::read_to_string(db.flag_path("hello", "1.0")).unwrap();
        assert!(stamp.contains('T'), "expected ISO-8601 stamp, got {stamp}");

        db.forget("hello", "1.0").unwrap();
        assert!(!db.is_installed("hello", "1.0"));
        assert!(db.manifest("hello", "1.0").unwrap().is_none());
        // Forgetting twice is harmless.
        db.forget("hello", "1.0").unwrap();
    }

    #[test]
    fn test_list_and_versions_sorted_naturally() {
        let tmp = tempfile::tempdir().unwrap();
        let db = PackageDb::new(tmp.path());
        for (n, v) in [("zsh", "5.9"), ("lib-x", "1.10"), ("lib-x", "1.9")] {
            db.mark_installed(n, v).unwrap();
        }

        let list = db.list_installed().unwrap();
        assert_eq!(
            list,
            vec![
                ("lib-x".to_string(), "1.9".to_string()),
                ("lib-x".to_string(), "1.10".to_string()),
                ("zsh".to_string(), "5.9".to_string()),
            ]
        );
        assert_eq!(db.installed_versions("lib-x").unwrap(), vec!["1.9", "1.10"]);
        assert!(db.installed_versions("absent").unwrap().is_empty());
    }

    #[test]
    fn test_empty_db_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let db = PackageDb::new(&tmp.path().join("never-created"));
        assert!(db.list_installed().unwrap().is_empty());
    }
}
