// src/recipe/mod.rs

//! Recipe loading and the evaluated recipe record.
//!
//! A recipe directory holds a `recipe` file of `KEY=VALUE` assignments with
//! shell-style substitution over previously assigned keys, plus an optional
//! `patches/` directory. Loading evaluates the file into an immutable
//! [`Recipe`] record; every load starts from defaults, so no state leaks
//! between loads.

mod parser;

pub use parser::load;

use std::path::PathBuf;

/// The evaluated contents of one recipe directory.
///
/// Identified by `(name, version)`. Defaults are applied at construction
/// from the engine configuration; the record never changes afterwards.
#[derive(Debug, Clone)]
pub struct Recipe {
    pub name: String,
    pub version: String,
    /// Release number for rebuilds of the same version.
    pub release: String,
    /// HTTP(S) source archives, in declaration order.
    pub source_urls: Vec<String>,
    /// Optional git repository to clone alongside the archives.
    pub git_url: Option<String>,
    /// Dependency package names (names only, unversioned).
    pub depends: Vec<String>,
    pub description: Option<String>,
    pub license: Option<String>,
    pub meson_opts: String,
    pub cmake_opts: String,
    pub configure_opts: String,
    /// Arguments for make/ninja; defaults to `-j<jobs>`.
    pub make_opts: String,
    /// Relative path inside the source tree where the build system lives.
    pub build_subdir: Option<String>,
    /// Strip level for patch application.
    pub patch_strip: u32,
    /// Staging tree the build installs into.
    pub destdir: PathBuf,
    /// The directory this recipe was loaded from.
    pub recipe_dir: PathBuf,
    /// Every assignment from the recipe file, in order, with substitution
    /// applied. Exported to hook scripts as their environment.
    pub variables: Vec<(String, String)>,
}

impl Recipe {
    /// `<name>-<version>`, the key for caches, workspaces, and the database.
    pub fn id(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }

    /// `<name>@<version>`, the dependency-graph node identity.
    pub fn node(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }

    /// `<name>-<version>-<release>`, the package archive stem.
    pub fn archive_stem(&self) -> String {
        format!("{}-{}-{}", self.name, self.version, self.release)
    }

    /// The patches directory beside the recipe file, if present.
    pub fn patches_dir(&self) -> PathBuf {
        self.recipe_dir.join("patches")
    }
}
