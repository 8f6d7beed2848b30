// src/config.rs

//! Engine configuration, built once at startup from the environment.
//!
//! Every knob has a documented default; the environment overrides the
//! default, never the other way around. Recipes see the resulting values
//! through their own defaults (e.g. `make_opts` inherits `jobs`), so a
//! recipe load is a pure function of the recipe file plus this record.

use std::path::PathBuf;

/// Terminal color policy for log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn parse(s: &str) -> Self {
        match s {
            "always" => Self::Always,
            "never" => Self::Never,
            _ => Self::Auto,
        }
    }
}

/// Global engine configuration.
///
/// | Env var         | Default                          |
/// |-----------------|----------------------------------|
/// | `REPO`          | `/var/lib/smelter/repo`          |
/// | `ROOT`          | `/`                              |
/// | `BUILDDIR`      | `/var/tmp/smelter/build`         |
/// | `SRCDIR`        | `/var/cache/smelter/sources`     |
/// | `PKGDIR`        | `/var/cache/smelter/packages`    |
/// | `DBDIR`         | `/var/lib/smelter/db`            |
/// | `LOGDIR`        | `/var/log/smelter`               |
/// | `HOOKSD`        | `/etc/smelter/hooks`             |
/// | `JOBS`          | number of online CPUs            |
/// | `SUDO`          | `sudo` (empty string disables)   |
/// | `FAKEROOT`      | unset                            |
/// | `FETCH_RETRIES` | `3`                              |
/// | `COLOR`         | `auto`                           |
/// | `FORCE`         | `0`                              |
#[derive(Debug, Clone)]
pub struct Config {
    /// Recipe repository root.
    pub repo: PathBuf,
    /// Live root filesystem the installer mutates.
    pub root: PathBuf,
    /// Per-package build workspaces live under here.
    pub build_dir: PathBuf,
    /// Downloaded source cache.
    pub src_dir: PathBuf,
    /// Finished package archives.
    pub pkg_dir: PathBuf,
    /// Installed-package database (manifests and flags).
    pub db_dir: PathBuf,
    /// Per-package build logs.
    pub log_dir: PathBuf,
    /// Phase hook scripts.
    pub hooks_dir: PathBuf,
    /// Default build parallelism.
    pub jobs: u32,
    /// Privilege-elevation command for live-root mutation, if any.
    pub sudo: Option<String>,
    /// Fakeroot wrapper, takes precedence over `sudo` when set.
    pub fakeroot: Option<String>,
    /// HTTP fetch attempts before a source counts as unreachable.
    pub fetch_retries: u32,
    pub color: ColorMode,
    /// Rebuild/reinstall even when already installed or up to date.
    pub force: bool,
}

fn env_path(key: &str, default: &str) -> PathBuf {
    match std::env::var(key) {
        Ok(v) if !v.is_empty() => PathBuf::from(v),
        _ => PathBuf::from(default),
    }
}

fn detected_jobs() -> u32 {
    std::thread::available_parallelism()
        .map(|p| p.get() as u32)
        .unwrap_or(4)
}

impl Config {
    /// Build the configuration from the environment, falling back to the
    /// documented defaults for anything unset.
    pub fn from_env() -> Self {
        let jobs = std::env::var("JOBS")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|&j| j > 0)
            .unwrap_or_else(detected_jobs);

        // SUDO defaults to "sudo"; an explicitly empty value disables
        // elevation entirely (e.g. when already running as root).
        let sudo = match std::env::var("SUDO") {
            Ok(v) if v.is_empty() => None,
            Ok(v) => Some(v),
            Err(_) => Some("sudo".to_string()),
        };

        let fakeroot = std::env::var("FAKEROOT").ok().filter(|v| !v.is_empty());

        let fetch_retries = std::env::var("FETCH_RETRIES")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|&n| n > 0)
            .unwrap_or(3);

        let color = std::env::var("COLOR")
            .map(|v| ColorMode::parse(&v))
            .unwrap_or(ColorMode::Auto);

        let force = std::env::var("FORCE").map(|v| v == "1").unwrap_or(false);

        Self {
            repo: env_path("REPO", "/var/lib/smelter/repo"),
            root: env_path("ROOT", "/"),
            build_dir: env_path("BUILDDIR", "/var/tmp/smelter/build"),
            src_dir: env_path("SRCDIR", "/var/cache/smelter/sources"),
            pkg_dir: env_path("PKGDIR", "/var/cache/smelter/packages"),
            db_dir: env_path("DBDIR", "/var/lib/smelter/db"),
            log_dir: env_path("LOGDIR", "/var/log/smelter"),
            hooks_dir: env_path("HOOKSD", "/etc/smelter/hooks"),
            jobs,
            sudo,
            fakeroot,
            fetch_retries,
            color,
            force,
        }
    }

    /// A configuration rooted entirely under `base`, with elevation
    /// disabled. Used by tests and scratch-root experiments.
    pub fn rooted_at(base: &std::path::Path) -> Self {
        Self {
            repo: base.join("repo"),
            root: base.join("root"),
            build_dir: base.join("build"),
            src_dir: base.join("sources"),
            pkg_dir: base.join("packages"),
            db_dir: base.join("db"),
            log_dir: base.join("log"),
            hooks_dir: base.join("hooks"),
            jobs: detected_jobs(),
            sudo: None,
            fakeroot: None,
            fetch_retries: 3,
            color: ColorMode::Never,
            force: false,
        }
    }
}
