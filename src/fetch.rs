// src/fetch.rs

//! Source acquisition into the download cache.
//!
//! HTTP(S) archives land in `SRCDIR/<name>-<version>/<basename>`; git
//! repositories clone into `SRCDIR/<name>-<version>/<repo>/`. Fetching is
//! idempotent: a file that already exists in the cache is never downloaded
//! again, and an existing clone is fast-forwarded instead of recloned.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::exec;
use crate::recipe::Recipe;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// The cache directory for one recipe's sources.
pub fn cache_dir(config: &Config, recipe: &Recipe) -> PathBuf {
    config.src_dir.join(recipe.id())
}

/// The cached path a URL's basename maps to.
pub fn cached_path(config: &Config, recipe: &Recipe, url: &str) -> PathBuf {
    cache_dir(config, recipe).join(basename(url))
}

fn basename(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

/// Fetch every source the recipe declares.
///
/// An unreachable URL after the configured retries is fatal for the
/// recipe; a cached file short-circuits without network I/O.
pub fn fetch_sources(config: &Config, recipe: &Recipe) -> Result<()> {
    let dir = cache_dir(config, recipe);
    fs::create_dir_all(&dir)?;

    for url in &recipe.source_urls {
        let dest = dir.join(basename(url));
        if dest.is_file() {
            debug!("cached: {}", dest.display());
            continue;
        }
        fetch_url(config, url, &dest)?;
    }

    if let Some(git_url) = &recipe.git_url {
        fetch_git(git_url, &dir)?;
    }

    Ok(())
}

/// Download one URL with follow-redirects and fail-on-HTTP-error
/// semantics, retrying before giving up.
fn fetch_url(config: &Config, url: &str, dest: &Path) -> Result<()> {
    let dest_str = dest.to_string_lossy().into_owned();
    // Download to a partial file so an interrupted transfer never
    // satisfies the cache check.
    let partial = format!("{dest_str}.part");

    let mut last_error = String::new();
    for attempt in 1..=config.fetch_retries {
        info!("fetching {url} (attempt {attempt}/{})", config.fetch_retries);
        let output = exec::run("curl", &["-fSL", "-o", partial.as_str(), url], None)?;
        if output.status.success() {
            fs::rename(&partial, dest)?;
            return Ok(());
        }
        last_error = String::from_utf8_lossy(&output.stderr).trim().to_string();
        warn!("fetch attempt {attempt} failed: {last_error}");
    }

    let _ = fs::remove_file(&partial);
    Err(Error::Fetch(format!(
        "{url} unreachable after {} attempts: {last_error}",
        config.fetch_retries
    )))
}

// Missing tools keep their own error kind; everything else becomes a
// fetch failure.
fn fetch_error(e: Error, context: String) -> Error {
    match e {
        Error::MissingTool { .. } => e,
        other => Error::Fetch(format!("{context}: {other}")),
    }
}

/// Clone a git repository into the cache, or fast-forward an existing
/// clone.
fn fetch_git(url: &str, cache: &Path) -> Result<()> {
    let repo_name = basename(url).trim_end_matches(".git");
    let clone_dir = cache.join(repo_name);

    let dir = clone_dir.to_string_lossy().into_owned();
    if clone_dir.is_dir() {
        info!("updating clone {}", clone_dir.display());
        exec::run_checked("git", &["-C", dir.as_str(), "pull", "--ff-only"], None)
            .map_err(|e| fetch_error(e, format!("git pull of {url} failed")))?;
    } else {
        info!("cloning {url}");
        exec::run_checked("git", &["clone", url, dir.as_str()], None)
            .map_err(|e| fetch_error(e, format!("git clone of {url} failed")))?;
    }
    Ok(())
}
