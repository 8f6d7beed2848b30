// src/repo.rs

//! Recipe repository: layout walking, target resolution, sync, search.
//!
//! The repository is a directory tree `REPO/<category>/<pkg>/<version>/recipe`
//! with categories treated as opaque. Enumeration is always sorted so that
//! "first match" answers are deterministic across runs.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::exec;
use crate::recipe::{self, Recipe};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Every directory under the repository containing a `recipe` file, sorted.
pub fn recipe_dirs(repo: &Path) -> Vec<PathBuf> {
    WalkDir::new(repo)
        .min_depth(1)
        .max_depth(4)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir() && e.path().join("recipe").is_file())
        .map(|e| e.into_path())
        .collect()
}

/// Load every recipe in the repository, skipping unparseable ones with a
/// warning. Order follows [`recipe_dirs`].
pub fn load_all(config: &Config) -> Vec<Recipe> {
    let mut recipes = Vec::new();
    for dir in recipe_dirs(&config.repo) {
        match recipe::load(&dir, config) {
            Ok(r) => recipes.push(r),
            Err(e) => tracing::warn!("skipping {}: {e}", dir.display()),
        }
    }
    recipes
}

/// Resolve a CLI target to a recipe directory.
///
/// Accepted forms, in order: an absolute path to a recipe directory, a
/// repository-relative path (`base/gcc/gcc-12.2.0`), or a shorter suffix
/// that matches exactly one recipe directory under the repository.
pub fn resolve_target(config: &Config, target: &str) -> Result<PathBuf> {
    let as_path = Path::new(target);
    if as_path.is_absolute() {
        if as_path.join("recipe").is_file() {
            return Ok(as_path.to_path_buf());
        }
        return Err(Error::Config(format!(
            "no recipe file in {target}"
        )));
    }

    let relative = config.repo.join(target);
    if relative.join("recipe").is_file() {
        return Ok(relative);
    }

    // Suffix search: `gcc-12.2.0` or `gcc/gcc-12.2.0` must match uniquely.
    let needle: Vec<&str> = target.split('/').filter(|s| !s.is_empty()).collect();
    let matches: Vec<PathBuf> = recipe_dirs(&config.repo)
        .into_iter()
        .filter(|dir| {
            let comps: Vec<String> = dir
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            comps.len() >= needle.len()
                && comps[comps.len() - needle.len()..]
                    .iter()
                    .zip(&needle)
                    .all(|(a, b)| a == b)
        })
        .collect();

    match matches.len() {
        0 => Err(Error::Config(format!(
            "target '{target}' not found under {}",
            config.repo.display()
        ))),
        1 => Ok(matches.into_iter().next().unwrap()),
        n => Err(Error::Config(format!(
            "target '{target}' is ambiguous ({n} matches under {})",
            config.repo.display()
        ))),
    }
}

/// Find the first recipe directory whose evaluated `PKG_NAME` is `name`.
///
/// "First" follows the sorted repository walk; when several versions of a
/// name coexist this picks the earliest directory, deliberately.
pub fn find_by_name(config: &Config, name: &str) -> Option<PathBuf> {
    for dir in recipe_dirs(&config.repo) {
        if let Ok(r) = recipe::load(&dir, config) {
            if r.name == name {
                return Some(dir);
            }
        }
    }
    None
}

/// All recipes whose name is `name`, for version selection.
pub fn versions_of(config: &Config, name: &str) -> Vec<Recipe> {
    load_all(config)
        .into_iter()
        .filter(|r| r.name == name)
        .collect()
}

/// Fast-forward pull the repository working copy from its upstream.
pub fn sync(config: &Config) -> Result<()> {
    info!("syncing repository at {}", config.repo.display());
    let repo = config.repo.to_string_lossy().into_owned();
    exec::run_checked("git", &["-C", repo.as_str(), "pull", "--ff-only"], None)
        .map_err(|e| match e {
            Error::MissingTool { .. } => e,
            other => Error::Fetch(format!("repository sync failed: {other}")),
        })?;
    Ok(())
}

/// Recipe directories whose repo-relative path matches `pattern`.
pub fn search(config: &Config, pattern: &regex::Regex) -> Vec<String> {
    recipe_dirs(&config.repo)
        .into_iter()
        .filter_map(|dir| {
            dir.strip_prefix(&config.repo)
                .ok()
                .map(|rel| rel.to_string_lossy().into_owned())
        })
        .filter(|rel| {
            let hit = pattern.is_match(rel);
            if hit {
                debug!("search hit: {rel}");
            }
            hit
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn seed_repo(base: &Path) -> Config {
        let config = Config::rooted_at(base);
        for (cat, pkg, ver) in [
            ("base", "gcc", "gcc-12.2.0"),
            ("base", "make", "make-4.4"),
            ("x11", "libx", "libx-1.8"),
        ] {
            let dir = config.repo.join(cat).join(pkg).join(ver);
            fs::create_dir_all(&dir).unwrap();
            let name = pkg;
            let version = ver.rsplit('-').next().unwrap();
            fs::write(
                dir.join("recipe"),
                format!("PKG_NAME={name}\nPKG_VERSION={version}\n"),
            )
            .unwrap();
        }
        config
    }

    #[test]
    fn test_recipe_dirs_sorted() {
        let tmp = tempfile::tempdir().unwrap();
        let config = seed_repo(tmp.path());
        let dirs = recipe_dirs(&config.repo);
        assert_eq!(dirs.len(), 3);
        assert!(dirs[0].ends_with("base/gcc/gcc-12.2.0"));
        assert!(dirs[2].ends_with("x11/libx/libx-1.8"));
    }

    #[test]
    fn test_resolve_relative_and_suffix() {
        let tmp = tempfile::tempdir().unwrap();
        let config = seed_repo(tmp.path());

        let full = resolve_target(&config, "base/gcc/gcc-12.2.0").unwrap();
        assert!(full.ends_with("base/gcc/gcc-12.2.0"));

        let suffix = resolve_target(&config, "gcc-12.2.0").unwrap();
        assert_eq!(suffix, full);

        let absolute = resolve_target(&config, full.to_str().unwrap()).unwrap();
        assert_eq!(absolute, full);
    }

    #[test]
    fn test_resolve_unknown_target() {
        let tmp = tempfile::tempdir().unwrap();
        let config = seed_repo(tmp.path());
        assert!(resolve_target(&config, "no/such/thing").is_err());
    }

    #[test]
    fn test_find_by_name() {
        let tmp = tempfile::tempdir().unwrap();
        let config = seed_repo(tmp.path());
        let dir = find_by_name(&config, "make").unwrap();
        assert!(dir.ends_with("base/make/make-4.4"));
        assert!(find_by_name(&config, "nonexistent").is_none());
    }

    #[test]
    fn test_search() {
        let tmp = tempfile::tempdir().unwrap();
        let config = seed_repo(tmp.path());
        let re = regex::Regex::new("^base/").unwrap();
        let hits = search(&config, &re);
        assert_eq!(hits.len(), 2);
    }
}
