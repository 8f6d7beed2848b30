// src/elevate.rs

//! The privilege boundary for live-root mutation.
//!
//! Every write to the live root filesystem funnels through [`Elevator`];
//! the rest of the engine never touches the root directly. With a prefix
//! configured (`sudo`, `fakeroot`) the operations shell out through it;
//! without one they run in process, which is what tests and scratch-root
//! installs use.

use crate::config::Config;
use crate::error::{Error, Result};
use std::fs;
use std::path::Path;
use std::process::Command;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct Elevator {
    /// Command prepended to each filesystem mutation, e.g. `sudo`.
    prefix: Option<String>,
}

impl Elevator {
    /// Select the elevation command from configuration; `fakeroot` wins
    /// over `sudo` when both are set.
    pub fn from_config(config: &Config) -> Self {
        Self {
            prefix: config.fakeroot.clone().or_else(|| config.sudo.clone()),
        }
    }

    /// In-process operations, no elevation.
    pub fn direct() -> Self {
        Self { prefix: None }
    }

    fn run(&self, prefix: &str, args: &[&str]) -> Result<std::process::ExitStatus> {
        debug!("elevated: {prefix} {}", args.join(" "));
        Command::new(prefix)
            .args(args)
            .status()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::MissingTool {
                        tool: prefix.to_string(),
                    }
                } else {
                    Error::Io(e)
                }
            })
    }

    /// Create a directory and any missing parents.
    pub fn mkdir_p(&self, path: &Path) -> Result<()> {
        match &self.prefix {
            None => Ok(fs::create_dir_all(path)?),
            Some(prefix) => {
                let p = path.to_string_lossy();
                let status = self.run(prefix, &["mkdir", "-p", p.as_ref()])?;
                if status.success() {
                    Ok(())
                } else {
                    Err(Error::Install(format!("mkdir -p {p} failed")))
                }
            }
        }
    }

    /// Install a regular file, best effort on mode: 0755, then 0644, then
    /// a plain preserving copy.
    pub fn install_file(&self, src: &Path, dest: &Path) -> Result<()> {
        match &self.prefix {
            None => {
                if dest.symlink_metadata().is_ok() {
                    fs::remove_file(dest)?;
                }
                fs::copy(src, dest)?;
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    let _ = fs::set_permissions(dest, fs::Permissions::from_mode(0o755))
                        .or_else(|_| {
                            fs::set_permissions(dest, fs::Permissions::from_mode(0o644))
                        });
                }
                Ok(())
            }
            Some(prefix) => {
                let s = src.to_string_lossy();
                let d = dest.to_string_lossy();
                for args in [
                    vec!["install", "-m755", s.as_ref(), d.as_ref()],
                    vec!["install", "-m644", s.as_ref(), d.as_ref()],
                    vec!["cp", "-P", "--preserve=mode", s.as_ref(), d.as_ref()],
                ] {
                    if self.run(prefix, &args)?.success() {
                        return Ok(());
                    }
                }
                Err(Error::Install(format!("could not install {d}")))
            }
        }
    }

    /// Recreate a symlink, replacing whatever sits at `dest`.
    pub fn symlink(&self, target: &Path, dest: &Path) -> Result<()> {
        match &self.prefix {
            None => {
                if dest.symlink_metadata().is_ok() {
                    fs::remove_file(dest)?;
                }
                std::os::unix::fs::symlink(target, dest)?;
                Ok(())
            }
            Some(prefix) => {
                let t = target.to_string_lossy();
                let d = dest.to_string_lossy();
                let status = self.run(prefix, &["ln", "-sfn", t.as_ref(), d.as_ref()])?;
                if status.success() {
                    Ok(())
                } else {
                    Err(Error::Install(format!("ln -sfn {t} {d} failed")))
                }
            }
        }
    }

    /// Remove a file or symlink; a missing path is not an error.
    pub fn remove_file(&self, path: &Path) -> Result<()> {
        match &self.prefix {
            None => match fs::remove_file(path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            },
            Some(prefix) => {
                let p = path.to_string_lossy();
                let status = self.run(prefix, &["rm", "-f", p.as_ref()])?;
                if status.success() {
                    Ok(())
                } else {
                    Err(Error::Install(format!("rm -f {p} failed")))
                }
            }
        }
    }

    /// Remove a directory if it is empty; non-empty and missing are both
    /// quietly tolerated (shared directories outlive their packages).
    pub fn remove_dir(&self, path: &Path) {
        match &self.prefix {
            None => {
                let _ = fs::remove_dir(path);
            }
            Some(prefix) => {
                let p = path.to_string_lossy();
                let _ = self.run(prefix, &["rmdir", p.as_ref()]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn test_direct_install_file_sets_mode() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        let dest = tmp.path().join("dest");
        fs::write(&src, b"payload").unwrap();

        let elevator = Elevator::direct();
        elevator.install_file(&src, &dest).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"payload");
        let mode = fs::metadata(&dest).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn test_direct_symlink_replaces_existing() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("link");
        let elevator = Elevator::direct();
        elevator.symlink(Path::new("a"), &dest).unwrap();
        elevator.symlink(Path::new("b"), &dest).unwrap();
        assert_eq!(fs::read_link(&dest).unwrap(), Path::new("b").to_path_buf());
    }

    #[test]
    fn test_remove_file_tolerates_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let elevator = Elevator::direct();
        elevator.remove_file(&tmp.path().join("ghost")).unwrap();
    }

    #[test]
    fn test_remove_dir_tolerates_non_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("d");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("f"), b"x").unwrap();
        let elevator = Elevator::direct();
        elevator.remove_dir(&dir);
        assert!(dir.exists());
        fs::remove_file(dir.join("f")).unwrap();
        elevator.remove_dir(&dir);
        assert!(!dir.exists());
    }
}
