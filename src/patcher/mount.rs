//! # Field Mounting
//!
//! Inserts a new field (and its import) into an existing struct. The
//! strategy is idempotent: mounting a type the struct already carries is
//! a no-op, and auto-derived field names are bumped with a numeric suffix
//! until they collide with nothing.

use std::path::Path;

use tracing::info;

use crate::error::AppResult;
use crate::parser::{StructDecl, TypeExpr};
use crate::patcher::engine::SourceUnit;
use crate::patcher::imports::{add_import_edit, resolve_alias, AliasResolution};
use crate::patcher::locate::locate_struct;

/// One field-mount directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountRequest {
    /// The struct to mount into.
    pub struct_name: String,
    /// The field type, optionally package-qualified (`pkg.Bar`).
    pub type_name: String,
    /// Explicit field name; derived from the type when absent.
    pub field_name: Option<String>,
    /// Import path backing the type's package qualifier, if any.
    pub import_path: Option<String>,
}

/// Reads `path`, mounts the requested field, and returns the patched
/// bytes. The file itself is not written.
pub fn mount_field(path: &Path, request: &MountRequest) -> AppResult<String> {
    let mut unit = SourceUnit::read(path)?;
    mount_into(&mut unit, request)?;
    Ok(unit.into_source())
}

/// Mounts the requested field into an already-loaded unit. Returns
/// `true` when the buffer changed.
pub fn mount_into(unit: &mut SourceUnit, request: &MountRequest) -> AppResult<bool> {
    let nl = unit.newline();
    let tree = unit.tree()?;
    let target = locate_struct(tree, &request.struct_name)?;

    // Rewrite the package prefix to whatever local name the import path
    // resolves to in this file.
    let (bare_pkg, base) = match request.type_name.split_once('.') {
        Some((p, b)) => (Some(p), b),
        None => (None, request.type_name.as_str()),
    };
    let resolution = request
        .import_path
        .as_deref()
        .map(|p| resolve_alias(tree, p));
    let pkg = match &resolution {
        Some(r) => Some(r.local_name().to_string()),
        None => bare_pkg.map(str::to_string),
    };
    let ty = TypeExpr::Named {
        pkg,
        name: base.to_string(),
    };
    let rendered = ty.render();

    if target.fields.iter().any(|f| f.ty.render() == rendered) {
        return Ok(false);
    }

    let field_name = free_field_name(
        target,
        request.field_name.as_deref().unwrap_or(base),
    );

    let indent = field_indent(unit.source(), target, nl);
    let insert_at = target.body_close as usize;
    let line = format!("{indent}{field_name} {rendered}{nl}");
    unit.insert(insert_at, &line)?;
    unit.reparse()?;

    if let (Some(path), Some(AliasResolution::New(alias))) =
        (request.import_path.as_deref(), &resolution)
    {
        add_import_edit(unit, path, Some(alias))?;
        unit.reparse()?;
    }

    info!(
        file = %unit.path().display(),
        target = %request.struct_name,
        field = %field_name,
        ty = %rendered,
        "mounted field"
    );
    Ok(true)
}

/// Picks a field name unused by both named fields and embedded type
/// names, appending `2`, `3`, ... to the wanted name until free.
fn free_field_name(target: &StructDecl, wanted: &str) -> String {
    let used: Vec<String> = target.fields.iter().map(|f| f.effective_name()).collect();
    if !used.iter().any(|u| u.as_str() == wanted) {
        return wanted.to_string();
    }
    let mut n = 2;
    loop {
        let candidate = format!("{wanted}{n}");
        if !used.iter().any(|u| u == &candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Indentation for the new field line: whatever the line holding the
/// closing brace uses plus one tab, or a single tab for gofmt-style
/// bodies.
// When the closing brace shares a line with the body opening, the
// field needs its own line first.
fn field_indent(source: &str, target: &StructDecl, nl: &str) -> String {
    let close = target.body_close as usize;
    let line_start = source[..close].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let before_close = &source[line_start..close];
    if before_close.chars().any(|c| !c.is_whitespace()) {
        return format!("{nl}\t");
    }
    format!("{before_close}\t")
}
