// src/ops.rs

//! High-level operations composing the pipeline.
//!
//! Everything here processes packages serially: the dependency engine
//! hands over an order and the first fatal error aborts the rest of the
//! queue. Per-package acknowledgments go to stdout, diagnostics to the
//! tracing log.

use crate::build::Driver;
use crate::config::Config;
use crate::db::PackageDb;
use crate::error::Result;
use crate::fetch;
use crate::graph::DependencyGraph;
use crate::install::Installer;
use crate::recipe::{self, Recipe};
use crate::repo;
use crate::revdep::{self, BrokenBinary};
use crate::version;
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Fetch, unpack, and build one recipe directory; the staging tree is
/// populated on success.
pub fn build_target(config: &Config, dir: &Path) -> Result<Recipe> {
    let recipe = recipe::load(dir, config)?;
    fetch::fetch_sources(config, &recipe)?;
    Driver::new(config).build(&recipe)?;
    Ok(recipe)
}

/// Build one recipe and install the result into the live root.
pub fn install_target(config: &Config, dir: &Path) -> Result<Recipe> {
    let recipe = build_target(config, dir)?;
    Installer::new(config).install(&recipe)?;
    Ok(recipe)
}

/// Expand targets through the dependency graph and install each node in
/// order, skipping nodes that are already installed unless forced.
pub fn install_deps(config: &Config, targets: &[PathBuf]) -> Result<()> {
    let recipes = expand_closure(config, targets)?;
    let graph = DependencyGraph::from_recipes(&recipes);
    let db = PackageDb::new(&config.db_dir);

    for node in graph.topo_order() {
        if db.is_installed(&node.name, &node.version) && !config.force {
            println!("{} already installed", node.label());
            continue;
        }
        install_target(config, &node.recipe_dir)?;
        println!("{} installed", node.label());
    }
    Ok(())
}

/// Load the targets and transitively pull in every dependency that has a
/// recipe under the repository. Unresolvable names are warnings.
fn expand_closure(config: &Config, targets: &[PathBuf]) -> Result<Vec<Recipe>> {
    let mut recipes: Vec<Recipe> = Vec::new();
    let mut seen_dirs: HashSet<PathBuf> = HashSet::new();
    let mut seen_names: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<PathBuf> = targets.iter().cloned().collect();

    while let Some(dir) = queue.pop_front() {
        if !seen_dirs.insert(dir.clone()) {
            continue;
        }
        let recipe = recipe::load(&dir, config)?;
        seen_names.insert(recipe.name.clone());

        for dep in &recipe.depends {
            if seen_names.contains(dep) {
                continue;
            }
            match repo::find_by_name(config, dep) {
                Some(dep_dir) => queue.push_back(dep_dir),
                None => warn!(
                    "{} depends on '{dep}' which has no recipe under {}",
                    recipe.node(),
                    config.repo.display()
                ),
            }
        }
        recipes.push(recipe);
    }

    // Declaration order of the expansion is depth-discovery order; the
    // graph's insertion-order tie-breaking keeps the result stable.
    Ok(recipes)
}

/// Rebuild and reinstall every recipe in the repository in dependency
/// order.
pub fn world(config: &Config) -> Result<()> {
    let recipes = repo::load_all(config);
    info!("world: {} recipes", recipes.len());
    let graph = DependencyGraph::from_recipes(&recipes);

    for node in graph.topo_order() {
        install_target(config, &node.recipe_dir)?;
        println!("{} installed", node.label());
    }
    Ok(())
}

/// Upgrade every installed package to the highest version available in
/// the repository.
pub fn upgrade(config: &Config) -> Result<()> {
    let db = PackageDb::new(&config.db_dir);

    for (name, installed_version) in db.list_installed()? {
        let candidates = repo::versions_of(config, &name);
        let Some(best) = candidates
            .iter()
            .max_by(|a, b| version::compare(&a.version, &b.version))
        else {
            warn!("{name} is installed but has no recipe in the repository");
            continue;
        };

        let differs =
            version::compare(&best.version, &installed_version) != std::cmp::Ordering::Equal;
        if differs || config.force {
            println!(
                "upgrading {name}: {installed_version} -> {}",
                best.version
            );
            install_deps(config, &[best.recipe_dir.clone()])?;
        } else {
            println!("{name}-{installed_version} is up to date");
        }
    }
    Ok(())
}

/// Installed packages no recipe in the repository depends on.
pub fn orphans(config: &Config) -> Result<Vec<String>> {
    let db = PackageDb::new(&config.db_dir);
    let mut depended_on: HashSet<String> = HashSet::new();
    for recipe in repo::load_all(config) {
        depended_on.extend(recipe.depends.iter().cloned());
    }

    Ok(db
        .list_installed()?
        .into_iter()
        .filter(|(name, _)| !depended_on.contains(name))
        .map(|(name, version)| format!("{name}@{version}"))
        .collect())
}

/// Scan for broken dynamic linking; a non-empty result triggers a world
/// rebuild at the caller's discretion.
pub fn revdep_scan(config: &Config) -> Result<Vec<BrokenBinary>> {
    revdep::scan(config)
}

/// Remove one installed package; with no version given, exactly one
/// installed version must exist.
pub fn remove(config: &Config, name: &str, version: Option<&str>) -> Result<()> {
    let installer = Installer::new(config);
    let db = PackageDb::new(&config.db_dir);

    let version = match version {
        Some(v) => v.to_string(),
        None => {
            let versions = db.installed_versions(name)?;
            match versions.len() {
                0 => {
                    return Err(crate::Error::NotFound(format!(
                        "{name} is not installed"
                    )))
                }
                1 => versions.into_iter().next().unwrap(),
                _ => {
                    return Err(crate::Error::Config(format!(
                        "multiple versions of {name} installed ({}); use {name}@<version>",
                        versions.join(", ")
                    )))
                }
            }
        }
    };

    installer.uninstall(name, &version)?;
    println!("{name}-{version} removed");
    Ok(())
}
