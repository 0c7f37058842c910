#![deny(missing_docs)]

//! # Annotation Extraction
//!
//! Directives are embedded in doc comments as `@marker(args)`. A marker
//! may carry a scope qualifier (`ns:name`) and a leading `!` that inverts
//! the scope match. Arguments are comma-separated; `key=value` items land
//! in an ordered option map, everything else is positional.
//!
//! Extraction is lexical: the comment lines attached to a declaration are
//! run through a small state machine, independent of the rest of the
//! parser. The first non-directive line of a block becomes the free-text
//! title; a blank comment line resets the doc window for whatever
//! directive follows.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use indexmap::IndexMap;
use rayon::prelude::*;
use regex::Regex;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{AppError, AppResult};
use crate::parser::{parse_file, CommentLine};

static ANNOTATION_RE: OnceLock<Regex> = OnceLock::new();

fn annotation_re() -> &'static Regex {
    ANNOTATION_RE.get_or_init(|| Regex::new(r"@(!?[A-Za-z0-9_.:]+?)\((.+?)\)").unwrap())
}

/// One parsed directive, with the doc block context it appeared in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    /// Marker name with any scope qualifier and `!` stripped.
    pub marker: String,
    /// Scope qualifier, the `ns` of `ns:name`.
    pub namespace: Option<String>,
    /// Set when the marker was written `@!...`; inverts scope matching.
    pub negated: bool,
    /// Positional arguments in written order.
    pub args: Vec<String>,
    /// `key=value` arguments, insertion-ordered.
    pub options: IndexMap<String, String>,
    /// Free-text first line of the doc block, if it was not a directive.
    pub title: String,
    /// Non-directive comment lines accumulated before this directive.
    pub doc: Vec<String>,
    /// Name of the declaration or field the doc block was attached to,
    /// when extracted from a tree rather than a bare block.
    pub target: Option<String>,
    /// File the directive was found in.
    pub file: PathBuf,
    /// 1-based line number of the directive.
    pub line: u32,
    /// Byte offset of the directive's comment line.
    pub offset: u32,
}

impl Annotation {
    /// Scope matching: an unscoped directive matches everything; a scoped
    /// one matches when its namespace equals the requested one, inverted
    /// by the negation flag.
    pub fn matches_namespace(&self, namespace: Option<&str>) -> bool {
        match (self.namespace.as_deref(), namespace) {
            (None, _) => true,
            (Some(ns), Some(want)) => (ns == want) != self.negated,
            (Some(_), None) => self.negated,
        }
    }
}

/// Splits an argument list into positional arguments and keyed options.
///
/// Surrounding double quotes on values are stripped. An empty key, or an
/// item with more than one `=`, is [`AppError::Malformed`]; a repeated key
/// is [`AppError::Duplicate`].
pub fn parse_kv(raw: &str) -> AppResult<(Vec<String>, IndexMap<String, String>)> {
    let mut args = Vec::new();
    let mut options = IndexMap::new();

    for item in raw.split(',') {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        if !item.contains('=') {
            args.push(unquote(item).to_string());
            continue;
        }
        let parts: Vec<&str> = item.split('=').collect();
        if parts.len() != 2 {
            return Err(AppError::Malformed(format!(
                "annotation option `{item}` has more than one `=`"
            )));
        }
        let key = parts[0].trim();
        if key.is_empty() {
            return Err(AppError::Malformed(format!(
                "annotation option `{item}` has an empty key"
            )));
        }
        let value = unquote(parts[1].trim()).to_string();
        if options.insert(key.to_string(), value).is_some() {
            return Err(AppError::Duplicate(format!(
                "annotation option key `{key}` given twice"
            )));
        }
    }
    Ok((args, options))
}

fn unquote(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(s)
}

/// Parses the directives of one doc block.
///
/// A marker name repeated within the same block is [`AppError::Duplicate`].
pub fn parse_doc_block(
    lines: &[CommentLine],
    source: &str,
    file: &Path,
) -> AppResult<Vec<Annotation>> {
    let mut title = String::new();
    let mut doc: Vec<String> = Vec::new();
    let mut seen: Vec<String> = Vec::new();
    let mut out = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        let content = line.content();
        let Some(caps) = annotation_re().captures(content) else {
            if content.is_empty() {
                doc.clear();
            } else {
                if idx == 0 {
                    title = content.to_string();
                }
                doc.push(content.to_string());
            }
            continue;
        };

        let raw_marker = &caps[1];
        let (negated, qualified) = match raw_marker.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, raw_marker),
        };
        let (namespace, marker) = match qualified.split_once(':') {
            Some((ns, name)) => (Some(ns.to_string()), name.to_string()),
            None => (None, qualified.to_string()),
        };
        if seen.iter().any(|m| m == qualified) {
            return Err(AppError::Duplicate(format!(
                "marker `@{qualified}` appears twice in one doc block ({})",
                file.display()
            )));
        }
        seen.push(qualified.to_string());

        let (args, options) = parse_kv(&caps[2])?;
        let offset = line.span.start;
        let line_no = source[..offset as usize].matches('\n').count() as u32 + 1;
        out.push(Annotation {
            marker,
            namespace,
            negated,
            args,
            options,
            title: title.clone(),
            doc: doc.clone(),
            target: None,
            file: file.to_path_buf(),
            line: line_no,
            offset,
        });
    }
    Ok(out)
}

pub(crate) fn is_scannable(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.ends_with(".go")
        && !name.ends_with("_test.go")
        && !path.components().any(|c| c.as_os_str() == "vendor")
}

/// Scans every non-test source file under `scope` for directives with the
/// given marker name.
///
/// Files fan out over the thread pool; the first failing file aborts the
/// scan, and siblings already running finish without rollback. Results
/// come back sorted by file path and byte offset.
pub fn extract_annotations(scope: &Path, marker: &str) -> AppResult<Vec<Annotation>> {
    let files: Vec<PathBuf> = WalkDir::new(scope)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| is_scannable(p))
        .collect();

    let found: Mutex<Vec<Annotation>> = Mutex::new(Vec::new());
    files.par_iter().try_for_each(|path| -> AppResult<()> {
        let source = std::fs::read_to_string(path)?;
        let tree = match parse_file(&source) {
            Ok(tree) => tree,
            Err(err) => return Err(err.at_file(path)),
        };

        let mut local = Vec::new();
        for decl in &tree.decls {
            let mut found =
                parse_doc_block(&decl.doc, &source, path).map_err(|e| e.at_file(path))?;
            for a in &mut found {
                a.target = Some(decl.name.clone());
            }
            local.append(&mut found);

            for field in decl.struct_fields() {
                let mut found =
                    parse_doc_block(&field.doc, &source, path).map_err(|e| e.at_file(path))?;
                for a in &mut found {
                    a.target = Some(field.effective_name());
                }
                local.append(&mut found);
            }
        }

        local.retain(|a| a.marker == marker);
        if !local.is_empty() {
            debug!(file = %path.display(), count = local.len(), "found annotations");
            found.lock().unwrap().extend(local);
        }
        Ok(())
    })?;

    let mut out = found.into_inner().unwrap();
    out.sort_by(|a, b| (&a.file, a.offset).cmp(&(&b.file, b.offset)));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Span;
    use pretty_assertions::assert_eq;

    fn lines(texts: &[&str]) -> Vec<CommentLine> {
        let mut offset = 0;
        texts
            .iter()
            .map(|t| {
                let line = CommentLine {
                    text: format!("// {t}"),
                    span: Span::new(offset, offset + t.len() + 3),
                };
                offset += t.len() + 4;
                line
            })
            .collect()
    }

    fn source_for(lines: &[CommentLine]) -> String {
        lines
            .iter()
            .map(|l| l.text.clone())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_positional_and_keyed_args() {
        let (args, opts) = parse_kv(r#"user, path="/a", method=GET"#).unwrap();
        assert_eq!(args, vec!["user"]);
        assert_eq!(opts.get("path").unwrap(), "/a");
        assert_eq!(opts.get("method").unwrap(), "GET");
    }

    #[test]
    fn test_duplicate_option_key() {
        let err = parse_kv("x=1,x=2").unwrap_err();
        assert!(matches!(err, AppError::Duplicate(_)));
    }

    #[test]
    fn test_empty_key_is_malformed() {
        let err = parse_kv("=x").unwrap_err();
        assert!(matches!(err, AppError::Malformed(_)));
    }

    #[test]
    fn test_double_equals_is_malformed() {
        let err = parse_kv("a=b=c").unwrap_err();
        assert!(matches!(err, AppError::Malformed(_)));
    }

    #[test]
    fn test_doc_block_title_and_doc() {
        let ls = lines(&["User is an account.", "Extra context.", "@model(user)"]);
        let src = source_for(&ls);
        let anns = parse_doc_block(&ls, &src, Path::new("user.go")).unwrap();
        assert_eq!(anns.len(), 1);
        assert_eq!(anns[0].marker, "model");
        assert_eq!(anns[0].title, "User is an account.");
        assert_eq!(anns[0].doc, vec!["User is an account.", "Extra context."]);
        assert_eq!(anns[0].args, vec!["user"]);
    }

    #[test]
    fn test_blank_line_resets_doc_window() {
        let ls = lines(&["stale", "", "fresh", "@model(user)"]);
        let src = source_for(&ls);
        let anns = parse_doc_block(&ls, &src, Path::new("user.go")).unwrap();
        assert_eq!(anns[0].doc, vec!["fresh"]);
        assert_eq!(anns[0].title, "stale");
    }

    #[test]
    fn test_repeated_marker_in_block() {
        let ls = lines(&["@model(a)", "@model(b)"]);
        let src = source_for(&ls);
        let err = parse_doc_block(&ls, &src, Path::new("user.go")).unwrap_err();
        assert!(matches!(err, AppError::Duplicate(_)));
    }

    #[test]
    fn test_scoped_and_negated_markers() {
        let ls = lines(&["@api:route(p)", "@!api:hidden(p)"]);
        let src = source_for(&ls);
        let anns = parse_doc_block(&ls, &src, Path::new("user.go")).unwrap();
        assert_eq!(anns[0].namespace.as_deref(), Some("api"));
        assert!(!anns[0].negated);
        assert!(anns[0].matches_namespace(Some("api")));
        assert!(!anns[0].matches_namespace(Some("db")));

        assert!(anns[1].negated);
        assert!(!anns[1].matches_namespace(Some("api")));
        assert!(anns[1].matches_namespace(Some("db")));
        assert!(anns[1].matches_namespace(None));
    }

    #[test]
    fn test_unscoped_matches_everything() {
        let ls = lines(&["@model(user)"]);
        let src = source_for(&ls);
        let anns = parse_doc_block(&ls, &src, Path::new("user.go")).unwrap();
        assert!(anns[0].matches_namespace(None));
        assert!(anns[0].matches_namespace(Some("api")));
    }

    #[test]
    fn test_scan_surfaces_failing_file_path() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("ok.go"),
            "package p\n\n// @route(users)\ntype User struct{}\n",
        )
        .unwrap();
        std::fs::write(tmp.path().join("broken.go"), "package\n").unwrap();

        let err = extract_annotations(tmp.path(), "route").unwrap_err();
        assert!(matches!(err, AppError::Parse(_)));
        assert!(err.to_string().contains("broken.go"));
    }
}
