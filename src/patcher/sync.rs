//! # Interface Stub Synchronization
//!
//! Keeps an implementing type in step with its interface: drifted method
//! signatures get their parameter/result clause rewritten in place, and
//! missing methods are appended as failing stubs. Methods the interface
//! does not know about are never touched, so hand-written additions
//! survive every pass.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use heck::{ToSnakeCase, ToUpperCamelCase};
use indexmap::IndexMap;
use rayon::prelude::*;
use regex::Regex;
use tracing::info;

use crate::annotations::extract_annotations;
use crate::error::{AppError, AppResult};
use crate::parser::{parse_file, render_clause, MethodSig, Param, TypeDef};
use crate::patcher::engine::SourceUnit;
use crate::patcher::imports::{add_import_edit, ModulePathCache};
use crate::patcher::locate::locate_interface;
use crate::strategies::{write_formatted, SourceFormatter};

/// Skeleton used for the base declaration when no implementing type
/// exists yet. `{package}` and `{type}` are substituted.
pub const DEFAULT_SKELETON: &str =
    "package {package}\n\ntype {type} struct{}\n";

/// One interface-to-implementation sync job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRequest {
    /// File declaring the interface.
    pub interface_file: PathBuf,
    /// The interface name.
    pub interface_name: String,
    /// The implementing type name inside the target directory.
    pub impl_name: String,
    /// Directory holding (or receiving) the implementation.
    pub target_dir: PathBuf,
    /// Base declaration skeleton; [`DEFAULT_SKELETON`] when absent.
    pub skeleton: Option<String>,
}

/// What one sync pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Stub methods appended.
    pub added: usize,
    /// Existing method signatures rewritten.
    pub updated: usize,
}

/// Per-file result of the discovery scan.
struct FileScan {
    path: PathBuf,
    /// Pending methods this file implements, drained from the set.
    matched: Vec<MethodSig>,
    declares_impl: bool,
    package: String,
}

/// Synchronizes one interface against its implementation directory.
pub fn sync_interface(
    request: &SyncRequest,
    formatter: &dyn SourceFormatter,
    modules: &ModulePathCache,
) -> AppResult<SyncReport> {
    let iface_unit = SourceUnit::read(&request.interface_file)?;
    let (iface_pkg, methods) = {
        let tree = iface_unit.tree()?;
        let iface = locate_interface(tree, &request.interface_name)
            .map_err(|e| e.at_file(&request.interface_file))?;
        (tree.package.clone(), iface.methods.clone())
    };

    let iface_dir = request
        .interface_file
        .parent()
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(&request.target_dir)
        .map_err(|e| AppError::Io(e).at_file(&request.target_dir))?;
    let same_package = same_dir(iface_dir, &request.target_dir);
    let iface_import = if same_package {
        None
    } else {
        modules.import_path_of(iface_dir)
    };

    let pending: Mutex<IndexMap<String, MethodSig>> = Mutex::new(
        methods
            .into_iter()
            .map(|m| (m.name.clone(), m))
            .collect(),
    );

    // Matches explicit satisfaction assertions like
    // `var _ store.Store = (*SQLStore)(nil)`.
    let assertion_re = Regex::new(&format!(
        r"_\s+(?:[A-Za-z_]\w*\.)?{}\s*=",
        regex::escape(&request.interface_name)
    ))
    .map_err(|e| AppError::General(e.to_string()))?;

    let mut files: Vec<PathBuf> = std::fs::read_dir(&request.target_dir)
        .map_err(|e| AppError::Io(e).at_file(&request.target_dir))?
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file() && is_source_file(p))
        .collect();
    files.sort();

    let scans: Mutex<Vec<FileScan>> = Mutex::new(Vec::new());
    files.par_iter().try_for_each(|path| -> AppResult<()> {
        let source = std::fs::read_to_string(path).map_err(|e| AppError::Io(e).at_file(path))?;
        let tree = match parse_file(&source) {
            Ok(tree) => tree,
            Err(err) => return Err(err.at_file(path)),
        };

        let mut matched = Vec::new();
        {
            let mut pending = pending.lock().unwrap();
            for method in tree.methods_of(&request.impl_name) {
                if let Some(sig) = pending.shift_remove(&method.name) {
                    matched.push(sig);
                }
            }
        }
        let declares_impl = matches!(
            tree.decl(&request.impl_name),
            Some(d) if matches!(d.def, TypeDef::Struct(_))
        ) || assertion_re.is_match(&source);

        scans.lock().unwrap().push(FileScan {
            path: path.clone(),
            matched,
            declares_impl,
            package: tree.package,
        });
        Ok(())
    })?;
    let mut scans = scans.into_inner().unwrap();
    scans.sort_by(|a, b| a.path.cmp(&b.path));

    let mut report = SyncReport::default();

    // Signature drift: rewrite only the parameter/result clause, leave
    // bodies byte-identical.
    for scan in scans.iter().filter(|s| !s.matched.is_empty()) {
        let qualifier = if same_package {
            None
        } else {
            Some(iface_pkg.as_str())
        };
        report.updated += correct_drift(scan, request, formatter, qualifier, iface_import.as_deref())?;
    }

    let pending = pending.into_inner().unwrap();
    let package = scans
        .iter()
        .map(|s| s.package.clone())
        .next()
        .unwrap_or_else(|| dir_package_name(&request.target_dir));

    if !scans.iter().any(|s| s.declares_impl) {
        emit_base_declaration(request, formatter, &package)?;
    }

    for (name, sig) in pending {
        append_stub(
            request,
            formatter,
            &package,
            &name,
            sig,
            if same_package { None } else { Some(&iface_pkg) },
            iface_import.as_deref(),
        )?;
        report.added += 1;
    }

    info!(
        interface = %request.interface_name,
        implementation = %request.impl_name,
        added = report.added,
        updated = report.updated,
        "synchronized interface"
    );
    Ok(report)
}

/// Rewrites drifted signatures in one file. Returns the update count.
fn correct_drift(
    scan: &FileScan,
    request: &SyncRequest,
    formatter: &dyn SourceFormatter,
    qualifier: Option<&str>,
    iface_import: Option<&str>,
) -> AppResult<usize> {
    let mut unit = SourceUnit::read(&scan.path)?;
    let mut updated = 0;

    // Cross-package signatures qualify against whatever local name this
    // file imports the interface package under.
    let alias = match qualifier {
        Some(pkg) => {
            let tree = unit.tree()?;
            let local = iface_import
                .and_then(|p| tree.import(p))
                .map(|b| b.local_name().to_string());
            Some(local.unwrap_or_else(|| pkg.to_string()))
        }
        None => None,
    };

    for sig in &scan.matched {
        let expected = expected_clause(sig, alias.as_deref());
        let edit = {
            let tree = unit.tree()?;
            tree.methods_of(&request.impl_name)
                .find(|m| m.name == sig.name)
                .filter(|m| render_clause(&m.params, &m.results) != expected)
                .map(|m| m.clause_span.as_range())
        };
        let Some(range) = edit else { continue };
        unit.apply_edit(range, &expected)?;
        unit.reparse()?;
        updated += 1;

        if let (Some(alias), Some(import)) = (alias.as_deref(), iface_import) {
            if expected.contains(&format!("{alias}.")) && unit.tree()?.import(import).is_none() {
                add_import_edit(&mut unit, import, Some(alias))?;
                unit.reparse()?;
            }
        }
    }

    if updated > 0 {
        write_formatted(formatter, &scan.path, unit.source())?;
    }
    Ok(updated)
}

/// Writes the base type declaration from the configured skeleton.
fn emit_base_declaration(
    request: &SyncRequest,
    formatter: &dyn SourceFormatter,
    package: &str,
) -> AppResult<()> {
    let path = request
        .target_dir
        .join(format!("{}.go", request.impl_name.to_snake_case()));
    let skeleton = request.skeleton.as_deref().unwrap_or(DEFAULT_SKELETON);
    let content = skeleton
        .replace("{package}", package)
        .replace("{type}", &request.impl_name);

    if path.exists() {
        // A file with the expected name exists but declares nothing we
        // recognize; append only the declaration part.
        let existing =
            std::fs::read_to_string(&path).map_err(|e| AppError::Io(e).at_file(&path))?;
        let body: String = content
            .lines()
            .skip_while(|l| l.starts_with("package") || l.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        let merged = format!("{}\n{}\n", existing.trim_end_matches('\n'), body);
        return write_formatted(formatter, &path, &merged);
    }
    write_formatted(formatter, &path, &content)
}

/// Appends one stub method, creating its per-method file if needed.
fn append_stub(
    request: &SyncRequest,
    formatter: &dyn SourceFormatter,
    package: &str,
    name: &str,
    mut sig: MethodSig,
    qualifier: Option<&str>,
    iface_import: Option<&str>,
) -> AppResult<()> {
    let path = request.target_dir.join(format!("{}.go", name.to_snake_case()));
    let receiver = request
        .impl_name
        .to_lowercase()
        .chars()
        .next()
        .unwrap_or('x');

    if path.exists() {
        let mut unit = SourceUnit::read(&path)?;
        let alias = qualifier.map(|pkg| {
            iface_import
                .and_then(|p| unit.tree().ok()?.import(p).map(|b| b.local_name().to_string()))
                .unwrap_or_else(|| pkg.to_string())
        });
        let clause = qualified_clause(&mut sig, alias.as_deref());
        let stub = render_stub(&sig, receiver, &request.impl_name, name, &clause);

        if let (Some(alias), Some(import)) = (alias.as_deref(), iface_import) {
            if clause.contains(&format!("{alias}.")) && unit.tree()?.import(import).is_none() {
                add_import_edit(&mut unit, import, Some(alias))?;
                unit.reparse()?;
            }
        }
        let end = unit.source().len();
        let nl = unit.newline();
        let text = format!("{nl}{stub}");
        unit.insert(end, &text)?;
        unit.reparse()?;
        return write_formatted(formatter, &path, unit.source());
    }

    let clause = qualified_clause(&mut sig, qualifier);
    let stub = render_stub(&sig, receiver, &request.impl_name, name, &clause);
    let mut content = format!("package {package}\n");
    if let (Some(pkg), Some(import)) = (qualifier, iface_import) {
        if clause.contains(&format!("{pkg}.")) {
            let last = import.rsplit('/').next().unwrap_or(import);
            if last == pkg {
                content.push_str(&format!("\nimport \"{import}\"\n"));
            } else {
                content.push_str(&format!("\nimport {pkg} \"{import}\"\n"));
            }
        }
    }
    content.push_str(&format!("\n{stub}"));
    write_formatted(formatter, &path, &content)
}

fn render_stub(sig: &MethodSig, receiver: char, impl_name: &str, name: &str, clause: &str) -> String {
    let mut out = String::new();
    for line in &sig.doc {
        out.push_str(&line.text);
        out.push('\n');
    }
    out.push_str(&format!(
        "func ({receiver} *{impl_name}) {name}{clause} {{\n\tpanic(\"implement me\")\n}}\n"
    ));
    out
}

fn qualified_clause(sig: &mut MethodSig, alias: Option<&str>) -> String {
    if let Some(alias) = alias {
        qualify_all(&mut sig.params, alias);
        qualify_all(&mut sig.results, alias);
    }
    render_clause(&sig.params, &sig.results)
}

fn expected_clause(sig: &MethodSig, alias: Option<&str>) -> String {
    let mut sig = sig.clone();
    qualified_clause(&mut sig, alias)
}

fn qualify_all(params: &mut [Param], pkg: &str) {
    for p in params {
        p.ty.qualify(pkg);
    }
}

fn is_source_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(".go") && !n.ends_with("_test.go"))
}

fn same_dir(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn dir_package_name(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().to_snake_case())
        .unwrap_or_else(|| "main".to_string())
}

/// Runs one sync job per directive found under `scope`. Each directive
/// must sit on an interface declaration; the implementing type name is
/// its first argument when given, otherwise the marker name in
/// UpperCamelCase. Implementations land in
/// `<scope>/internal/<marker>_impls/<marker>_<interface>` (snake_case
/// throughout), which also becomes the generated package name; a `dir`
/// option overrides the directory, relative to the interface's own.
///
/// Interfaces are processed in parallel; the first failure aborts the
/// batch after in-flight jobs finish.
pub fn sync_annotated_interfaces(
    scope: &Path,
    marker: &str,
    skeleton: Option<&str>,
    formatter: &dyn SourceFormatter,
) -> AppResult<Vec<(String, SyncReport)>> {
    let annotations = extract_annotations(scope, marker)?;
    let modules = ModulePathCache::new();
    let marker_snake = marker.to_snake_case();
    let implements_root = scope
        .join("internal")
        .join(format!("{marker_snake}_impls"));

    let requests: Vec<SyncRequest> = annotations
        .iter()
        .map(|a| -> AppResult<SyncRequest> {
            let interface_name = a.target.clone().ok_or_else(|| {
                AppError::Malformed(format!(
                    "{}:{}: @{} directive is not attached to a declaration",
                    a.file.display(),
                    a.line,
                    a.marker
                ))
            })?;
            let impl_name = a
                .args
                .first()
                .cloned()
                .unwrap_or_else(|| marker.to_upper_camel_case());
            let target_dir = match a.options.get("dir") {
                Some(dir) => a
                    .file
                    .parent()
                    .unwrap_or_else(|| Path::new("."))
                    .join(dir),
                None => implements_root.join(format!(
                    "{marker_snake}_{}",
                    interface_name.to_snake_case()
                )),
            };
            Ok(SyncRequest {
                interface_file: a.file.clone(),
                interface_name,
                impl_name,
                target_dir,
                skeleton: skeleton.map(str::to_string),
            })
        })
        .collect::<AppResult<_>>()?;

    requests
        .par_iter()
        .map(|r| sync_interface(r, formatter, &modules).map(|rep| (r.interface_name.clone(), rep)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::PassthroughFormatter;
    use pretty_assertions::assert_eq;

    const IFACE: &str = "package store\n\ntype Store interface {\n\t// Get fetches one value.\n\tGet(id int64) (string, error)\n\tSet(id int64, v string) error\n}\n";

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn request(dir: &Path, target: &Path) -> SyncRequest {
        SyncRequest {
            interface_file: dir.join("store.go"),
            interface_name: "Store".to_string(),
            impl_name: "SQLStore".to_string(),
            target_dir: target.to_path_buf(),
            skeleton: None,
        }
    }

    #[test]
    fn test_appends_missing_method_as_stub() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        write(dir, "store.go", IFACE);
        write(
            dir,
            "sql.go",
            "package store\n\ntype SQLStore struct{}\n\nfunc (s *SQLStore) Get(id int64) (string, error) {\n\treturn \"\", nil\n}\n",
        );

        let report =
            sync_interface(&request(dir, dir), &PassthroughFormatter, &ModulePathCache::new())
                .unwrap();
        assert_eq!(report, SyncReport { added: 1, updated: 0 });

        let stub = std::fs::read_to_string(dir.join("set.go")).unwrap();
        assert_eq!(
            stub,
            "package store\n\nfunc (s *SQLStore) Set(id int64, v string) error {\n\tpanic(\"implement me\")\n}\n"
        );
        // The matching method is untouched.
        assert!(std::fs::read_to_string(dir.join("sql.go"))
            .unwrap()
            .contains("func (s *SQLStore) Get(id int64) (string, error) {\n\treturn \"\", nil\n}"));
    }

    #[test]
    fn test_additive_extra_methods_survive() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        write(dir, "store.go", IFACE);
        write(
            dir,
            "sql.go",
            "package store\n\ntype SQLStore struct{}\n\nfunc (s *SQLStore) Get(id int64) (string, error) {\n\treturn \"\", nil\n}\n\nfunc (s *SQLStore) Vacuum() error {\n\treturn nil\n}\n",
        );

        for _ in 0..3 {
            sync_interface(&request(dir, dir), &PassthroughFormatter, &ModulePathCache::new())
                .unwrap();
        }
        let sql = std::fs::read_to_string(dir.join("sql.go")).unwrap();
        assert!(sql.contains("func (s *SQLStore) Vacuum() error"));
    }

    #[test]
    fn test_drift_rewrites_clause_but_not_body() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        write(dir, "store.go", IFACE);
        write(
            dir,
            "sql.go",
            "package store\n\ntype SQLStore struct{}\n\nfunc (s *SQLStore) Get(id int32) (string, error) {\n\treturn \"\", nil\n}\n\nfunc (s *SQLStore) Set(id int64, v string) error {\n\treturn nil\n}\n",
        );

        let report =
            sync_interface(&request(dir, dir), &PassthroughFormatter, &ModulePathCache::new())
                .unwrap();
        assert_eq!(report, SyncReport { added: 0, updated: 1 });

        let sql = std::fs::read_to_string(dir.join("sql.go")).unwrap();
        assert!(sql.contains("func (s *SQLStore) Get(id int64) (string, error) {\n\treturn \"\", nil\n}"));
    }

    #[test]
    fn test_sync_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        write(dir, "store.go", IFACE);
        write(dir, "sql.go", "package store\n\ntype SQLStore struct{}\n");

        let first =
            sync_interface(&request(dir, dir), &PassthroughFormatter, &ModulePathCache::new())
                .unwrap();
        assert_eq!(first, SyncReport { added: 2, updated: 0 });
        let second =
            sync_interface(&request(dir, dir), &PassthroughFormatter, &ModulePathCache::new())
                .unwrap();
        assert_eq!(second, SyncReport::default());
    }

    #[test]
    fn test_missing_impl_gets_base_declaration() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        write(dir, "store.go", IFACE);

        sync_interface(&request(dir, dir), &PassthroughFormatter, &ModulePathCache::new())
            .unwrap();
        let base = std::fs::read_to_string(dir.join("sql_store.go")).unwrap();
        assert!(base.contains("type SQLStore struct{}"));
        assert!(dir.join("get.go").exists());
        assert!(dir.join("set.go").exists());
    }

    #[test]
    fn test_cross_package_stub_is_qualified_and_imported() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        std::fs::write(root.join("go.mod"), "module example.com/app\n").unwrap();
        let iface_dir = root.join("store");
        let impl_dir = root.join("sqlstore");
        std::fs::create_dir_all(&iface_dir).unwrap();
        std::fs::create_dir_all(&impl_dir).unwrap();
        write(
            &iface_dir,
            "store.go",
            "package store\n\ntype Store interface {\n\tGet(id int64) (*Record, error)\n}\n",
        );
        write(&impl_dir, "sql.go", "package sqlstore\n\ntype SQLStore struct{}\n");

        let req = SyncRequest {
            interface_file: iface_dir.join("store.go"),
            interface_name: "Store".to_string(),
            impl_name: "SQLStore".to_string(),
            target_dir: impl_dir.clone(),
            skeleton: None,
        };
        sync_interface(&req, &PassthroughFormatter, &ModulePathCache::new()).unwrap();

        let stub = std::fs::read_to_string(impl_dir.join("get.go")).unwrap();
        assert!(stub.contains("import \"example.com/app/store\""));
        assert!(stub.contains("(id int64) (*store.Record, error)"));
    }

    #[test]
    fn test_driver_derives_impl_package_from_marker_and_interface() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        write(
            dir,
            "store.go",
            "package store\n\n// Store is the persistence seam.\n// @impl(SQLStore)\ntype Store interface {\n\tGet(id int64) (string, error)\n}\n",
        );

        let reports =
            sync_annotated_interfaces(dir, "impl", None, &PassthroughFormatter).unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].0, "Store");
        assert_eq!(reports[0].1, SyncReport { added: 1, updated: 0 });

        let impl_dir = dir.join("internal").join("impl_impls").join("impl_store");
        let base = std::fs::read_to_string(impl_dir.join("sql_store.go")).unwrap();
        assert_eq!(base, "package impl_store\n\ntype SQLStore struct{}\n");
        let stub = std::fs::read_to_string(impl_dir.join("get.go")).unwrap();
        assert!(stub.starts_with("package impl_store\n"));
        assert!(stub.contains("func (s *SQLStore) Get(id int64) (string, error)"));
        assert!(!dir.join("get.go").exists());
    }

    #[test]
    fn test_driver_dir_option_and_default_impl_name() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        write(
            dir,
            "store.go",
            "package store\n\n// @impl(dir=stores)\ntype Store interface {\n\tGet(id int64) (string, error)\n}\n",
        );

        let reports =
            sync_annotated_interfaces(dir, "impl", None, &PassthroughFormatter).unwrap();
        assert_eq!(reports[0].1, SyncReport { added: 1, updated: 0 });

        let stub = std::fs::read_to_string(dir.join("stores").join("get.go")).unwrap();
        assert!(stub.starts_with("package stores\n"));
        assert!(stub.contains("func (i *Impl) Get(id int64) (string, error)"));
    }

    #[test]
    fn test_dashed_directory_yields_valid_package_name() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        write(dir, "store.go", IFACE);
        let target = dir.join("sql-store");

        sync_interface(&request(dir, &target), &PassthroughFormatter, &ModulePathCache::new())
            .unwrap();

        let base = std::fs::read_to_string(target.join("sql_store.go")).unwrap();
        assert!(base.starts_with("package sql_store\n"));
    }

    #[test]
    fn test_wrong_kind_target() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        write(dir, "store.go", "package store\n\ntype Store struct{}\n");
        let err =
            sync_interface(&request(dir, dir), &PassthroughFormatter, &ModulePathCache::new())
                .unwrap_err();
        assert!(matches!(err, AppError::WrongKind(_)));
    }
}
