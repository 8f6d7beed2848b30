// src/package.rs

//! Package archive creation and extraction.
//!
//! A package is a zstd-compressed POSIX tar of the staging tree with every
//! entry rooted at `./`. Headers carry numeric ownership only, with no
//! local user or group name resolution, so archives are byte-stable across
//! build hosts.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::recipe::Recipe;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::info;
use walkdir::WalkDir;

/// Compression level for package archives.
const ZSTD_LEVEL: i32 = 19;

/// The archive path a recipe packs to.
pub fn archive_path(config: &Config, recipe: &Recipe) -> PathBuf {
    config
        .pkg_dir
        .join(format!("{}.tar.zst", recipe.archive_stem()))
}

/// Pack the staging tree into `PKGDIR/<name>-<version>-<release>.tar.zst`.
///
/// Returns the archive path for the installer.
pub fn pack(config: &Config, recipe: &Recipe) -> Result<PathBuf> {
    let staging = &recipe.destdir;
    if !staging.is_dir() {
        return Err(Error::NotFound(format!(
            "staging tree {} does not exist (build first)",
            staging.display()
        )));
    }

    std::fs::create_dir_all(&config.pkg_dir)?;
    let output = archive_path(config, recipe);

    let file = File::create(&output)?;
    let encoder = zstd::Encoder::new(file, ZSTD_LEVEL)
        .map_err(|e| Error::Io(std::io::Error::other(format!("zstd encoder: {e}"))))?;
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);

    let mut count = 0usize;
    for entry in WalkDir::new(staging).min_depth(1).sort_by_file_name() {
        let entry =
            entry.map_err(|e| Error::Io(std::io::Error::other(format!("walking staging: {e}"))))?;
        let rel = entry
            .path()
            .strip_prefix(staging)
            .expect("walkdir yields children of its root");
        let name = Path::new(".").join(rel);

        if entry.file_type().is_dir() {
            builder.append_dir(&name, entry.path())?;
        } else {
            builder.append_path_with_name(entry.path(), &name)?;
        }
        count += 1;
    }

    let encoder = builder.into_inner()?;
    encoder.finish()?;

    info!("packaged {} ({count} entries)", output.display());
    Ok(output)
}

/// Extract a package archive into `dest`, preserving permissions.
pub fn extract(archive: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive)?;
    let decoder = zstd::Decoder::new(file)
        .map_err(|e| Error::Io(std::io::Error::other(format!("zstd decoder: {e}"))))?;
    let mut tar = tar::Archive::new(decoder);
    tar.set_preserve_permissions(true);
    tar.unpack(dest)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    fn staged_recipe(base: &Path) -> (Config, Recipe) {
        let config = Config::rooted_at(base);
        let recipe_dir = base.join("recipe-dir");
        fs::create_dir_all(&recipe_dir).unwrap();
        fs::write(recipe_dir.join("recipe"), "PKG_NAME=demo\nPKG_VERSION=2.0\n").unwrap();
        let recipe = crate::recipe::load(&recipe_dir, &config).unwrap();

        let bin = recipe.destdir.join("usr/bin");
        fs::create_dir_all(&bin).unwrap();
        fs::write(bin.join("demo"), b"#!/bin/sh\necho demo\n").unwrap();
        fs::set_permissions(bin.join("demo"), fs::Permissions::from_mode(0o755)).unwrap();
        std::os::unix::fs::symlink("demo", bin.join("demo-alias")).unwrap();
        (config, recipe)
    }

    #[test]
    fn test_pack_then_extract_preserves_file_set() {
        let tmp = tempfile::tempdir().unwrap();
        let (config, recipe) = staged_recipe(tmp.path());

        let archive = pack(&config, &recipe).unwrap();
        assert!(archive.ends_with("demo-2.0-1.tar.zst"));

        let out = tmp.path().join("extracted");
        fs::create_dir_all(&out).unwrap();
        extract(&archive, &out).unwrap();

        assert!(out.join("usr/bin/demo").is_file());
        let link = out.join("usr/bin/demo-alias");
        assert_eq!(fs::read_link(&link).unwrap(), PathBuf::from("demo"));
        let mode = fs::metadata(out.join("usr/bin/demo")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn test_entries_are_dot_rooted() {
        let tmp = tempfile::tempdir().unwrap();
        let (config, recipe) = staged_recipe(tmp.path());
        let archive = pack(&config, &recipe).unwrap();

        let file = File::open(&archive).unwrap();
        let decoder = zstd::Decoder::new(file).unwrap();
        let mut tar = tar::Archive::new(decoder);
        for entry in tar.entries().unwrap() {
            let entry = entry.unwrap();
            let path = entry.path().unwrap().into_owned();
            assert!(
                path.starts_with("./") || path == Path::new("."),
                "entry {path:?} not rooted at ./"
            );
        }
    }

    #[test]
    fn test_pack_without_staging_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::rooted_at(tmp.path());
        let recipe_dir = tmp.path().join("r");
        fs::create_dir_all(&recipe_dir).unwrap();
        fs::write(recipe_dir.join("recipe"), "PKG_NAME=x\nPKG_VERSION=1\n").unwrap();
        let recipe = crate::recipe::load(&recipe_dir, &config).unwrap();
        assert!(pack(&config, &recipe).is_err());
    }
}
