// src/unpack.rs

//! Build workspace preparation: extraction and patching.
//!
//! The workspace `BUILDDIR/<name>-<version>/` is destroyed and recreated on
//! every build, then populated from the source cache. Tar archives and zip
//! files are extracted with the system tools (the same tools the builds
//! themselves require); bare compressed files are decoded in process where
//! possible.

use crate::compression::{self, CompressionFormat};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::exec;
use crate::fetch;
use crate::recipe::Recipe;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// The workspace directory for one recipe.
pub fn workspace_dir(config: &Config, recipe: &Recipe) -> PathBuf {
    config.build_dir.join(recipe.id())
}

/// Clear and rebuild the workspace, extract all sources, apply patches.
///
/// Returns the effective source root: the single top-level directory when
/// extraction produced exactly one, otherwise the workspace itself.
pub fn prepare(config: &Config, recipe: &Recipe) -> Result<PathBuf> {
    let workspace = workspace_dir(config, recipe);
    if workspace.exists() {
        fs::remove_dir_all(&workspace)?;
    }
    fs::create_dir_all(&workspace)?;

    for url in &recipe.source_urls {
        let cached = fetch::cached_path(config, recipe, url);
        if !cached.is_file() {
            return Err(Error::NotFound(format!(
                "source {} is not in the cache (fetch first)",
                cached.display()
            )));
        }
        info!("extracting {}", cached.display());
        extract_into(&cached, &workspace)?;
    }

    if let Some(git_url) = &recipe.git_url {
        let repo_name = git_url
            .rsplit('/')
            .next()
            .unwrap_or(git_url)
            .trim_end_matches(".git");
        let clone = fetch::cache_dir(config, recipe).join(repo_name);
        if !clone.is_dir() {
            return Err(Error::NotFound(format!(
                "git clone {} is not in the cache (fetch first)",
                clone.display()
            )));
        }
        copy_tree(&clone, &workspace.join(repo_name))?;
    }

    let source_root = effective_source_root(&workspace)?;
    apply_patches(recipe, &source_root)?;
    Ok(source_root)
}

/// Extract one cached source into `dest`, dispatching on the filename
/// suffix. Unknown suffixes are fatal.
pub fn extract_into(archive: &Path, dest: &Path) -> Result<()> {
    let name = archive
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    let archive_str = archive.to_string_lossy().into_owned();
    let dest_str = dest.to_string_lossy().into_owned();

    let tar_args: Option<Vec<&str>> = if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        Some(vec!["-xzf", archive_str.as_str(), "-C", dest_str.as_str()])
    } else if name.ends_with(".tar.bz2") || name.ends_with(".tbz2") {
        Some(vec!["-xjf", archive_str.as_str(), "-C", dest_str.as_str()])
    } else if name.ends_with(".tar.xz") || name.ends_with(".txz") {
        Some(vec!["-xJf", archive_str.as_str(), "-C", dest_str.as_str()])
    } else if name.ends_with(".tar.zst") || name.ends_with(".tzst") {
        Some(vec!["--zstd", "-xf", archive_str.as_str(), "-C", dest_str.as_str()])
    } else {
        None
    };

    if let Some(args) = tar_args {
        exec::run_checked("tar", &args, None)
            .map_err(|e| unpack_error(e, format!("tar extraction of {name} failed")))?;
        return Ok(());
    }

    if name.ends_with(".zip") {
        exec::run_checked(
            "unzip",
            &["-q", archive_str.as_str(), "-d", dest_str.as_str()],
            None,
        )
        .map_err(|e| unpack_error(e, format!("unzip of {name} failed")))?;
        return Ok(());
    }

    // Bare compressed file: decompress with the suffix stripped.
    if let Some(format) = CompressionFormat::from_extension(&name) {
        let stripped = strip_last_suffix(&name);
        return compression::decompress_file(archive, &dest.join(stripped), format);
    }
    if name.ends_with(".bz2") {
        let stripped = strip_last_suffix(&name);
        let output = exec::run_checked("bzip2", &["-dc", archive_str.as_str()], None)
            .map_err(|e| unpack_error(e, format!("bzip2 decompression of {name} failed")))?;
        fs::write(dest.join(stripped), output.stdout)?;
        return Ok(());
    }

    Err(Error::Unpack(format!("unknown archive format: {name}")))
}

// Missing tools keep their own error kind; everything else becomes an
// unpack failure.
fn unpack_error(e: Error, context: String) -> Error {
    match e {
        Error::MissingTool { .. } => e,
        other => Error::Unpack(format!("{context}: {other}")),
    }
}

fn strip_last_suffix(name: &str) -> &str {
    name.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(name)
}

/// When extraction yields exactly one top-level directory, build inside it;
/// otherwise build in the workspace root.
pub fn effective_source_root(workspace: &Path) -> Result<PathBuf> {
    let entries: Vec<_> = fs::read_dir(workspace)?
        .filter_map(|e| e.ok())
        .collect();

    if entries.len() == 1 && entries[0].file_type().map(|t| t.is_dir()).unwrap_or(false) {
        let root = entries[0].path();
        debug!("source root: {}", root.display());
        return Ok(root);
    }
    Ok(workspace.to_path_buf())
}

/// Apply `patches/*.patch` in lexicographic order. A rejected patch is
/// fatal for the recipe.
fn apply_patches(recipe: &Recipe, source_root: &Path) -> Result<()> {
    let patches_dir = recipe.patches_dir();
    if !patches_dir.is_dir() {
        return Ok(());
    }

    let mut patches: Vec<PathBuf> = fs::read_dir(&patches_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|x| x.to_str()) == Some("patch"))
        .collect();
    patches.sort();

    let strip = format!("-p{}", recipe.patch_strip);
    for patch in patches {
        info!("applying {}", patch.display());
        let patch_str = patch.to_string_lossy().into_owned();
        exec::run_checked(
            "patch",
            &[strip.as_str(), "-i", patch_str.as_str()],
            Some(source_root),
        )
        .map_err(
            |e| match e {
                Error::MissingTool { .. } => e,
                other => Error::Patch(format!("{} did not apply: {other}", patch.display())),
            },
        )?;
    }
    Ok(())
}

/// Recursive tree copy preserving symlinks, for staging git clones into
/// the workspace.
fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry.map_err(|e| Error::Unpack(format!("walking {}: {e}", src.display())))?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .expect("walkdir yields children of its root");
        let target = dst.join(rel);

        if entry.path_is_symlink() {
            let link = fs::read_link(entry.path())?;
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            std::os::unix::fs::symlink(link, &target)?;
        } else if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_unknown_suffix_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("thing.rar");
        fs::write(&archive, b"x").unwrap();
        let err = extract_into(&archive, tmp.path()).unwrap_err();
        assert!(matches!(err, Error::Unpack(_)));
    }

    #[test]
    fn test_bare_gz_extracts_with_suffix_stripped() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("notes.txt.gz");
        let mut enc = flate2::write::GzEncoder::new(
            fs::File::create(&archive).unwrap(),
            flate2::Compression::default(),
        );
        enc.write_all(b"hello notes").unwrap();
        enc.finish().unwrap();

        let dest = tmp.path().join("out");
        fs::create_dir_all(&dest).unwrap();
        extract_into(&archive, &dest).unwrap();
        assert_eq!(fs::read(dest.join("notes.txt")).unwrap(), b"hello notes");
    }

    #[test]
    fn test_effective_source_root_single_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let inner = tmp.path().join("pkg-1.0");
        fs::create_dir_all(&inner).unwrap();
        assert_eq!(effective_source_root(tmp.path()).unwrap(), inner);
    }

    #[test]
    fn test_effective_source_root_multiple_entries() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("a")).unwrap();
        fs::write(tmp.path().join("b.txt"), b"x").unwrap();
        assert_eq!(
            effective_source_root(tmp.path()).unwrap(),
            tmp.path().to_path_buf()
        );
    }

    #[test]
    fn test_copy_tree_preserves_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(src.join("sub")).unwrap();
        fs::write(src.join("sub/file"), b"data").unwrap();
        std::os::unix::fs::symlink("sub/file", src.join("link")).unwrap();

        let dst = tmp.path().join("dst");
        copy_tree(&src, &dst).unwrap();
        assert_eq!(fs::read(dst.join("sub/file")).unwrap(), b"data");
        assert_eq!(
            fs::read_link(dst.join("link")).unwrap(),
            PathBuf::from("sub/file")
        );
    }
}
