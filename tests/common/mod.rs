// tests/common/mod.rs

//! Shared test fixture: a throwaway repository, scratch root, and
//! configuration, with script-built recipes that need nothing beyond sh.

#![allow(dead_code)]

use smelter::{Config, PackageDb};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

pub struct Fixture {
    // Keep the TempDir alive for the fixture's lifetime.
    pub tmp: TempDir,
    pub config: Config,
}

impl Fixture {
    pub fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::rooted_at(tmp.path());
        fs::create_dir_all(&config.root).unwrap();
        Self { tmp, config }
    }

    /// Add a recipe whose `build` script stages `/usr/bin/<name>` and logs
    /// the build into the fixture's build-order file.
    pub fn add_recipe(&self, category: &str, name: &str, version: &str, depends: &[&str]) -> PathBuf {
        let dir = self
            .config
            .repo
            .join(category)
            .join(name)
            .join(format!("{name}-{version}"));
        fs::create_dir_all(&dir).unwrap();

        fs::write(
            dir.join("recipe"),
            format!(
                "PKG_NAME={name}\nPKG_VERSION={version}\nPKG_DEPENDS=\"{}\"\n",
                depends.join(" ")
            ),
        )
        .unwrap();

        fs::write(
            dir.join("build"),
            format!(
                "mkdir -p \"$DESTDIR/usr/bin\"\n\
                 printf '%s\\n' '{name} {version}' > \"$DESTDIR/usr/bin/{name}\"\n\
                 chmod 755 \"$DESTDIR/usr/bin/{name}\"\n\
                 echo {name} >> {}\n",
                self.order_log().display()
            ),
        )
        .unwrap();

        dir
    }

    /// The order packages were built in, one name per line.
    pub fn build_order(&self) -> Vec<String> {
        match fs::read_to_string(self.order_log()) {
            Ok(text) => text.lines().map(String::from).collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn clear_build_order(&self) {
        let _ = fs::remove_file(self.order_log());
    }

    fn order_log(&self) -> PathBuf {
        self.tmp.path().join("build-order.log")
    }

    pub fn db(&self) -> PackageDb {
        PackageDb::new(&self.config.db_dir)
    }

    /// The installed path of a fixture package's staged binary.
    pub fn installed_bin(&self, name: &str) -> PathBuf {
        self.config.root.join("usr/bin").join(name)
    }
}
