// src/build/system.rs

//! Build-system detection and step planning.
//!
//! The build system is a tagged variant selected by priority rules; the
//! driver dispatches over the variant instead of chaining presence tests.
//! Each variant plans a fixed list of steps (configure, compile, stage)
//! that the driver executes and logs.

use crate::recipe::Recipe;
use std::fmt;
use std::fs;
use std::path::Path;

/// The detected build system for a prepared source tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildSystem {
    Meson,
    CMake,
    Autoconf,
    Make,
    /// `build` script shipped in the recipe directory, the fallback
    /// extension point.
    RecipeProvided,
}

impl fmt::Display for BuildSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Meson => "meson",
            Self::CMake => "cmake",
            Self::Autoconf => "autoconf",
            Self::Make => "make",
            Self::RecipeProvided => "recipe-provided",
        };
        write!(f, "{name}")
    }
}

/// One external command of a build plan.
#[derive(Debug, Clone)]
pub struct Step {
    pub phase: &'static str,
    pub program: String,
    pub args: Vec<String>,
    /// Working directory relative to the source root, when not the root
    /// itself (out-of-source cmake builds).
    pub subdir: Option<&'static str>,
    pub env: Vec<(String, String)>,
}

impl Step {
    fn new(phase: &'static str, program: &str, args: Vec<String>) -> Self {
        Self {
            phase,
            program: program.to_string(),
            args,
            subdir: None,
            env: Vec::new(),
        }
    }

    fn in_subdir(mut self, subdir: &'static str) -> Self {
        self.subdir = Some(subdir);
        self
    }

    fn with_env(mut self, key: &str, value: String) -> Self {
        self.env.push((key.to_string(), value));
        self
    }

    /// The command line as it appears in the build log.
    pub fn render(&self) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

impl BuildSystem {
    /// Select the build system for `source_root`, in priority order.
    ///
    /// Non-empty `meson_opts`/`cmake_opts` force their system even when the
    /// marker file is absent (e.g. `build_subdir` points elsewhere).
    pub fn detect(source_root: &Path, recipe: &Recipe) -> Option<Self> {
        if source_root.join("meson.build").is_file() || !recipe.meson_opts.is_empty() {
            return Some(Self::Meson);
        }
        if source_root.join("CMakeLists.txt").is_file() || !recipe.cmake_opts.is_empty() {
            return Some(Self::CMake);
        }
        if source_root.join("configure").is_file() {
            return Some(Self::Autoconf);
        }
        if makefile_has_all_target(&source_root.join("Makefile")) {
            return Some(Self::Make);
        }
        if recipe.recipe_dir.join("build").is_file() {
            return Some(Self::RecipeProvided);
        }
        None
    }

    /// Plan the steps for this system.
    pub fn plan(&self, recipe: &Recipe) -> Vec<Step> {
        let destdir = recipe.destdir.to_string_lossy().into_owned();
        let make_opts = split(&recipe.make_opts);

        match self {
            Self::Meson => vec![
                Step::new(
                    "configure",
                    "meson",
                    with_prefix(&["setup", "build"], split(&recipe.meson_opts)),
                ),
                Step::new("build", "ninja", with_prefix(&["-C", "build"], make_opts)),
                Step::new(
                    "stage",
                    "ninja",
                    vec!["-C".into(), "build".into(), "install".into()],
                )
                .with_env("DESTDIR", destdir),
            ],
            Self::CMake => vec![
                Step::new(
                    "configure",
                    "cmake",
                    with_prefix(&[".."], split(&recipe.cmake_opts)),
                )
                .in_subdir("build"),
                Step::new("build", "make", make_opts).in_subdir("build"),
                Step::new(
                    "stage",
                    "make",
                    vec![format!("DESTDIR={destdir}"), "install".into()],
                )
                .in_subdir("build"),
            ],
            Self::Autoconf => vec![
                Step::new("configure", "./configure", split(&recipe.configure_opts)),
                Step::new("build", "make", make_opts),
                Step::new(
                    "stage",
                    "make",
                    vec![format!("DESTDIR={destdir}"), "install".into()],
                ),
            ],
            Self::Make => vec![
                Step::new("build", "make", make_opts),
                Step::new(
                    "stage",
                    "make",
                    vec![format!("DESTDIR={destdir}"), "install".into()],
                ),
            ],
            Self::RecipeProvided => vec![Step::new(
                "build",
                "sh",
                vec![recipe
                    .recipe_dir
                    .join("build")
                    .to_string_lossy()
                    .into_owned()],
            )
            .with_env("DESTDIR", destdir)
            .with_env("JOBS", jobs_of(&recipe.make_opts))],
        }
    }
}

fn split(opts: &str) -> Vec<String> {
    opts.split_whitespace().map(String::from).collect()
}

fn with_prefix(prefix: &[&str], rest: Vec<String>) -> Vec<String> {
    let mut args: Vec<String> = prefix.iter().map(|s| s.to_string()).collect();
    args.extend(rest);
    args
}

// Recover a plain job count from make_opts for scripts that take JOBS.
fn jobs_of(make_opts: &str) -> String {
    make_opts
        .split_whitespace()
        .find_map(|w| w.strip_prefix("-j").filter(|n| !n.is_empty()))
        .unwrap_or("1")
        .to_string()
}

fn makefile_has_all_target(path: &Path) -> bool {
    match fs::read_to_string(path) {
        Ok(text) => text.lines().any(|l| l.starts_with("all:") || l.starts_with("all :")),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn recipe_in(dir: &Path, extra: &str) -> Recipe {
        std::fs::write(
            dir.join("recipe"),
            format!("PKG_NAME=t\nPKG_VERSION=1\n{extra}"),
        )
        .unwrap();
        let config = Config::rooted_at(dir);
        crate::recipe::load(dir, &config).unwrap()
    }

    #[test]
    fn test_detect_priority() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        let recipe = recipe_in(tmp.path(), "");

        assert_eq!(BuildSystem::detect(&src, &recipe), None);

        std::fs::write(src.join("Makefile"), "all:\n\techo hi\n").unwrap();
        assert_eq!(BuildSystem::detect(&src, &recipe), Some(BuildSystem::Make));

        std::fs::write(src.join("configure"), "#!/bin/sh\n").unwrap();
        assert_eq!(
            BuildSystem::detect(&src, &recipe),
            Some(BuildSystem::Autoconf)
        );

        std::fs::write(src.join("CMakeLists.txt"), "project(t)\n").unwrap();
        assert_eq!(BuildSystem::detect(&src, &recipe), Some(BuildSystem::CMake));

        std::fs::write(src.join("meson.build"), "project('t')\n").unwrap();
        assert_eq!(BuildSystem::detect(&src, &recipe), Some(BuildSystem::Meson));
    }

    #[test]
    fn test_opts_force_detection() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        let recipe = recipe_in(tmp.path(), "PKG_MESON_OPTS=-Dfoo=bar\n");
        assert_eq!(BuildSystem::detect(&src, &recipe), Some(BuildSystem::Meson));
    }

    #[test]
    fn test_recipe_provided_fallback() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(tmp.path().join("build"), "#!/bin/sh\n").unwrap();
        let recipe = recipe_in(tmp.path(), "");
        assert_eq!(
            BuildSystem::detect(&src, &recipe),
            Some(BuildSystem::RecipeProvided)
        );
    }

    #[test]
    fn test_meson_plan_shape() {
        let tmp = tempfile::tempdir().unwrap();
        let recipe = recipe_in(tmp.path(), "PKG_MESON_OPTS=-Dx=y\nPKG_MAKE_OPTS=-j4\n");
        let steps = BuildSystem::Meson.plan(&recipe);
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0].render(), "meson setup build -Dx=y");
        assert_eq!(steps[1].render(), "ninja -C build -j4");
        assert_eq!(steps[2].render(), "ninja -C build install");
        let destdir = recipe.destdir.to_string_lossy().into_owned();
        assert!(steps[2].env.contains(&("DESTDIR".to_string(), destdir)));
    }

    #[test]
    fn test_cmake_plan_is_out_of_source() {
        let tmp = tempfile::tempdir().unwrap();
        let recipe = recipe_in(tmp.path(), "PKG_CMAKE_OPTS=-DCMAKE_BUILD_TYPE=Release\n");
        let steps = BuildSystem::CMake.plan(&recipe);
        assert!(steps.iter().all(|s| s.subdir == Some("build")));
        assert!(steps[0].render().contains("Release"));
        assert!(steps[2]
            .args
            .iter()
            .any(|a| a.starts_with("DESTDIR=") && a.ends_with("pkg")));
    }

    #[test]
    fn test_jobs_of() {
        assert_eq!(jobs_of("-j8"), "8");
        assert_eq!(jobs_of("V=1 -j2"), "2");
        assert_eq!(jobs_of(""), "1");
    }
}
