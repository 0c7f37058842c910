//! # Import Resolution
//!
//! Alias bookkeeping shared by the field mounter and the stub
//! synchronizer: reuse an existing binding when the path is already
//! imported, otherwise pick the path's last segment and bump it with a
//! numeric suffix until it collides with nothing in the file.
//!
//! Also hosts the module-path cache, an explicit memoized `go.mod` lookup
//! threaded through calls rather than hidden process state.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::parser::GoFile;
use crate::patcher::engine::SourceUnit;

/// Outcome of resolving an import path against one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasResolution {
    /// The path is already imported under this local name.
    Existing(String),
    /// The path is not imported yet; this free local name was chosen.
    New(String),
}

impl AliasResolution {
    /// The local package name either way.
    pub fn local_name(&self) -> &str {
        match self {
            AliasResolution::Existing(n) | AliasResolution::New(n) => n,
        }
    }
}

/// Resolves the local name `import_path` would have in this file.
pub fn resolve_alias(tree: &GoFile, import_path: &str) -> AliasResolution {
    if let Some(binding) = tree.import(import_path) {
        return AliasResolution::Existing(binding.local_name().to_string());
    }
    let base = import_path.rsplit('/').next().unwrap_or(import_path);
    let used: Vec<&str> = tree.imports.iter().map(|i| i.local_name()).collect();
    if !used.contains(&base) {
        return AliasResolution::New(base.to_string());
    }
    let mut n = 2;
    loop {
        let candidate = format!("{base}{n}");
        if !used.contains(&candidate.as_str()) {
            return AliasResolution::New(candidate);
        }
        n += 1;
    }
}

/// Adds an import for `path` (aliased when `alias` differs from the
/// path's last segment). Joins an existing import group when there is
/// one, otherwise appends a standalone `import` clause. Leaves the unit
/// dirty; the caller reparses.
pub fn add_import_edit(unit: &mut SourceUnit, path: &str, alias: Option<&str>) -> AppResult<()> {
    let nl = unit.newline();
    let tree = unit.tree()?;
    if tree.import(path).is_some() {
        return Ok(());
    }

    let base = path.rsplit('/').next().unwrap_or(path);
    let spec = match alias {
        Some(a) if a != base => format!("{a} \"{path}\""),
        _ => format!("\"{path}\""),
    };

    if let Some(close) = tree.import_group_close {
        let text = format!("\t{spec}{nl}");
        return unit.insert(close as usize, &text);
    }
    if let Some(end) = tree.last_import_end {
        let text = format!("{nl}import {spec}");
        return unit.insert(end as usize, &text);
    }
    if tree.package_clause_end == 0 {
        return Err(AppError::Malformed(format!(
            "{}: no package clause to anchor an import on",
            unit.path().display()
        )));
    }
    let at = tree.package_clause_end as usize;
    let text = format!("{nl}{nl}import {spec}");
    unit.insert(at, &text)
}

/// Memoized lookup of the Go module path governing a directory, read
/// from the nearest `go.mod` upward.
#[derive(Debug, Default)]
pub struct ModulePathCache {
    cached: Mutex<HashMap<PathBuf, Option<(PathBuf, String)>>>,
}

impl ModulePathCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The import path of the package in `dir`: the module path from the
    /// nearest `go.mod`, joined with the directory's path relative to the
    /// module root. `None` when no `go.mod` governs the directory.
    pub fn import_path_of(&self, dir: &Path) -> Option<String> {
        let (root, module) = self.module_of(dir)?;
        let rel = dir.strip_prefix(&root).ok()?;
        let mut out = module;
        for part in rel.components() {
            out.push('/');
            out.push_str(&part.as_os_str().to_string_lossy());
        }
        Some(out)
    }

    fn module_of(&self, dir: &Path) -> Option<(PathBuf, String)> {
        let key = dir.to_path_buf();
        if let Some(hit) = self.cached.lock().unwrap().get(&key) {
            return hit.clone();
        }
        let found = find_module(dir);
        if let Some((root, module)) = &found {
            debug!(dir = %dir.display(), module, root = %root.display(), "resolved module path");
        }
        self.cached.lock().unwrap().insert(key, found.clone());
        found
    }
}

fn find_module(dir: &Path) -> Option<(PathBuf, String)> {
    let mut cur = Some(dir);
    while let Some(d) = cur {
        let candidate = d.join("go.mod");
        if let Ok(content) = std::fs::read_to_string(&candidate) {
            let module = content.lines().find_map(|l| {
                l.trim().strip_prefix("module").and_then(|rest| {
                    let rest = rest.trim();
                    (!rest.is_empty()).then(|| rest.trim_matches('"').to_string())
                })
            })?;
            return Some((d.to_path_buf(), module));
        }
        cur = d.parent();
    }
    None
}
