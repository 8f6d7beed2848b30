// src/commands/mod.rs
//! CLI command implementations: thin glue over the library operations.

use anyhow::{Context, Result};
use smelter::{ops, recipe, repo, Config};
use std::fs;
use std::path::PathBuf;

/// Resolve every CLI target to a recipe directory up front, so a typo in
/// the middle of a list fails before any work starts.
fn resolve_targets(config: &Config, targets: &[String]) -> Result<Vec<PathBuf>> {
    if targets.is_empty() {
        anyhow::bail!("no targets given");
    }
    targets
        .iter()
        .map(|t| {
            repo::resolve_target(config, t).with_context(|| format!("resolving target '{t}'"))
        })
        .collect()
}

pub fn cmd_sync(config: &Config) -> Result<()> {
    repo::sync(config)?;
    println!("repository synced");
    Ok(())
}

pub fn cmd_search(config: &Config, pattern: &str) -> Result<()> {
    let re = regex::Regex::new(pattern).with_context(|| format!("invalid pattern '{pattern}'"))?;
    for hit in repo::search(config, &re) {
        println!("{hit}");
    }
    Ok(())
}

pub fn cmd_info(config: &Config, targets: &[String]) -> Result<()> {
    for dir in resolve_targets(config, targets)? {
        let r = recipe::load(&dir, config)?;
        println!("Name:        {}", r.name);
        println!("Version:     {}", r.version);
        println!("Release:     {}", r.release);
        if let Some(desc) = &r.description {
            println!("Description: {desc}");
        }
        if let Some(license) = &r.license {
            println!("License:     {license}");
        }
        if !r.depends.is_empty() {
            println!("Depends:     {}", r.depends.join(" "));
        }
        for url in &r.source_urls {
            println!("Source:      {url}");
        }
        if let Some(git) = &r.git_url {
            println!("Git:         {git}");
        }
        println!("Recipe:      {}", r.recipe_dir.display());
        println!();
    }
    Ok(())
}

pub fn cmd_fetch(config: &Config, targets: &[String]) -> Result<()> {
    for dir in resolve_targets(config, targets)? {
        let r = recipe::load(&dir, config)?;
        smelter::fetch::fetch_sources(config, &r)?;
        println!("{} sources cached", r.id());
    }
    Ok(())
}

pub fn cmd_unpack(config: &Config, targets: &[String]) -> Result<()> {
    for dir in resolve_targets(config, targets)? {
        let r = recipe::load(&dir, config)?;
        smelter::fetch::fetch_sources(config, &r)?;
        let source_root = smelter::unpack::prepare(config, &r)?;
        println!("{} unpacked at {}", r.id(), source_root.display());
    }
    Ok(())
}

pub fn cmd_build(config: &Config, targets: &[String]) -> Result<()> {
    for dir in resolve_targets(config, targets)? {
        let r = ops::build_target(config, &dir)?;
        println!("{} built, staged at {}", r.id(), r.destdir.display());
    }
    Ok(())
}

pub fn cmd_package(config: &Config, targets: &[String]) -> Result<()> {
    for dir in resolve_targets(config, targets)? {
        let r = ops::build_target(config, &dir)?;
        let archive = smelter::package::pack(config, &r)?;
        println!("{}", archive.display());
    }
    Ok(())
}

pub fn cmd_install(config: &Config, targets: &[String]) -> Result<()> {
    for dir in resolve_targets(config, targets)? {
        let r = ops::install_target(config, &dir)?;
        println!("{} installed", r.node());
    }
    Ok(())
}

pub fn cmd_install_deps(config: &Config, targets: &[String]) -> Result<()> {
    let dirs = resolve_targets(config, targets)?;
    ops::install_deps(config, &dirs)?;
    Ok(())
}

pub fn cmd_remove(config: &Config, package: &str) -> Result<()> {
    let (name, version) = match package.split_once('@') {
        Some((n, v)) => (n, Some(v)),
        None => (package, None),
    };
    ops::remove(config, name, version)?;
    Ok(())
}

pub fn cmd_orphans(config: &Config) -> Result<()> {
    for orphan in ops::orphans(config)? {
        println!("{orphan}");
    }
    Ok(())
}

pub fn cmd_revdep(config: &Config) -> Result<()> {
    let broken = ops::revdep_scan(config)?;
    if broken.is_empty() {
        println!("no broken shared-library links found");
        return Ok(());
    }
    for b in &broken {
        println!("{}: missing {}", b.path.display(), b.missing.join(", "));
    }
    println!("{} broken object(s), rebuilding world", broken.len());
    ops::world(config)?;
    Ok(())
}

pub fn cmd_world(config: &Config) -> Result<()> {
    ops::world(config)?;
    Ok(())
}

pub fn cmd_upgrade(config: &Config) -> Result<()> {
    ops::upgrade(config)?;
    Ok(())
}

/// Write a recipe skeleton for a toolchain package.
pub fn cmd_mk_toolchain(config: &Config, package: &str, version: &str) -> Result<()> {
    let name = package
        .rsplit('/')
        .next()
        .filter(|n| !n.is_empty())
        .context("package must be a <category>/<name> path")?;

    let dir = config.repo.join(package).join(format!("{name}-{version}"));
    fs::create_dir_all(&dir)?;

    let recipe_path = dir.join("recipe");
    if recipe_path.exists() {
        anyhow::bail!("{} already exists", recipe_path.display());
    }
    fs::write(
        &recipe_path,
        format!(
            "PKG_NAME={name}\n\
             PKG_VERSION={version}\n\
             PKG_SOURCE_URLS=\"https://ftp.gnu.org/gnu/{name}/{name}-{version}.tar.xz\"\n\
             PKG_DEPENDS=\"\"\n\
             PKG_CONFIGURE_OPTS=\"--prefix=/usr --disable-multilib\"\n",
        ),
    )?;
    println!("{}", recipe_path.display());
    Ok(())
}
