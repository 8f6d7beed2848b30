// src/recipe/parser.rs

//! Evaluation of recipe files.
//!
//! The recipe format is a restricted shell subset: one `KEY=VALUE`
//! assignment per line, `#` comments, blank lines, and `$KEY` / `${KEY}`
//! substitution over previously assigned keys. Values may be quoted;
//! single quotes suppress substitution, double quotes do not. Anything
//! beyond that (commands, conditionals) is rejected as unparseable rather
//! than interpreted.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::recipe::Recipe;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Load and evaluate the recipe in `dir`.
///
/// Returns a fresh [`Recipe`] record with all defaults applied; a missing
/// or empty `PKG_NAME`/`PKG_VERSION` is fatal.
pub fn load(dir: &Path, config: &Config) -> Result<Recipe> {
    let recipe_file = dir.join("recipe");
    let text = fs::read_to_string(&recipe_file).map_err(|e| {
        Error::Config(format!(
            "cannot read recipe at {}: {e}",
            recipe_file.display()
        ))
    })?;

    let variables = evaluate(&text, &recipe_file)?;
    let lookup: HashMap<&str, &str> = variables
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();

    let get = |key: &str| lookup.get(key).copied().unwrap_or("").to_string();
    let get_opt = |key: &str| lookup.get(key).filter(|v| !v.is_empty()).map(|v| v.to_string());

    let name = get("PKG_NAME");
    let version = get("PKG_VERSION");
    if name.is_empty() || version.is_empty() {
        return Err(Error::Config(format!(
            "recipe at {} must set PKG_NAME and PKG_VERSION",
            dir.display()
        )));
    }

    let release = get_opt("PKG_RELEASE").unwrap_or_else(|| "1".to_string());

    let patch_strip = match lookup.get("PKG_PATCH_STRIP") {
        Some(v) if !v.is_empty() => v.parse().map_err(|_| {
            Error::Config(format!("invalid PKG_PATCH_STRIP '{v}' in {}", dir.display()))
        })?,
        _ => 1,
    };

    let destdir = match get_opt("PKG_DESTDIR") {
        Some(d) => d.into(),
        None => config
            .build_dir
            .join(format!("{name}-{version}"))
            .join("pkg"),
    };

    let make_opts =
        get_opt("PKG_MAKE_OPTS").unwrap_or_else(|| format!("-j{}", config.jobs));

    Ok(Recipe {
        source_urls: split_words(&get("PKG_SOURCE_URLS")),
        git_url: get_opt("PKG_GIT_URL"),
        depends: split_words(&get("PKG_DEPENDS")),
        description: get_opt("PKG_DESC"),
        license: get_opt("PKG_LICENSE"),
        meson_opts: get("PKG_MESON_OPTS"),
        cmake_opts: get("PKG_CMAKE_OPTS"),
        configure_opts: get("PKG_CONFIGURE_OPTS"),
        make_opts,
        build_subdir: get_opt("PKG_BUILD_SUBDIR"),
        patch_strip,
        destdir,
        recipe_dir: dir.to_path_buf(),
        name,
        version,
        release,
        variables,
    })
}

fn split_words(s: &str) -> Vec<String> {
    s.split_whitespace().map(String::from).collect()
}

/// Evaluate assignment lines into an ordered variable list.
fn evaluate(text: &str, origin: &Path) -> Result<Vec<(String, String)>> {
    let mut assigned: Vec<(String, String)> = Vec::new();
    let mut scope: HashMap<String, String> = HashMap::new();

    for (lineno, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (key, value) = line.split_once('=').ok_or_else(|| {
            Error::Config(format!(
                "{}:{}: not a KEY=VALUE assignment: '{line}'",
                origin.display(),
                lineno + 1
            ))
        })?;

        let key = key.trim_end();
        if !is_identifier(key) {
            return Err(Error::Config(format!(
                "{}:{}: invalid variable name '{key}'",
                origin.display(),
                lineno + 1
            )));
        }

        let value = unquote_and_substitute(value.trim_start(), &scope);
        scope.insert(key.to_string(), value.clone());
        // Later assignments to the same key shadow earlier ones but both
        // stay in the export list; the scope holds the final value.
        assigned.push((key.to_string(), value));
    }

    // Deduplicate the export list, keeping the final value of each key.
    let mut seen = std::collections::HashSet::new();
    let mut result: Vec<(String, String)> = Vec::new();
    for (key, _) in &assigned {
        if seen.insert(key.clone()) {
            result.push((key.clone(), scope[key].clone()));
        }
    }

    Ok(result)
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Strip one level of quoting and apply `$KEY`/`${KEY}` substitution.
fn unquote_and_substitute(value: &str, scope: &HashMap<String, String>) -> String {
    if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
        // Single quotes: literal, no substitution.
        return value[1..value.len() - 1].to_string();
    }

    let inner = if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        &value[1..value.len() - 1]
    } else {
        value
    };

    substitute(inner, scope)
}

fn substitute(input: &str, scope: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(input.len());
    let bytes = input.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'$' {
            // Copy everything up to the next dollar sign verbatim.
            let next = input[i..].find('$').map(|p| i + p).unwrap_or(bytes.len());
            out.push_str(&input[i..next]);
            i = next;
            continue;
        }

        // `${KEY}` form.
        if i + 1 < bytes.len() && bytes[i + 1] == b'{' {
            if let Some(end) = input[i + 2..].find('}') {
                let key = &input[i + 2..i + 2 + end];
                out.push_str(scope.get(key).map(String::as_str).unwrap_or(""));
                i += end + 3;
                continue;
            }
        }

        // `$KEY` form: longest identifier run after the dollar.
        let start = i + 1;
        let mut end = start;
        while end < bytes.len()
            && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_')
        {
            end += 1;
        }
        if end > start {
            let key = &input[start..end];
            out.push_str(scope.get(key).map(String::as_str).unwrap_or(""));
            i = end;
        } else {
            out.push('$');
            i += 1;
        }
    }

    out
}
