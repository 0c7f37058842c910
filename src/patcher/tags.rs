//! # Tag Synthesis
//!
//! Rewrites struct field tags according to configured strategies. The
//! rewrite preserves the original key order, appends new keys at the end,
//! and drops keys whose final value comes back empty, so repeated runs
//! over unchanged input are byte-stable.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use heck::{ToLowerCamelCase, ToSnakeCase};
use indexmap::IndexMap;
use rayon::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;
use walkdir::WalkDir;

use crate::annotations::is_scannable;
use crate::error::{AppError, AppResult};
use crate::parser::TypeDef;
use crate::patcher::engine::SourceUnit;
use crate::strategies::{write_formatted, SourceFormatter};

static TAG_PAIR_RE: OnceLock<Regex> = OnceLock::new();

fn tag_pair_re() -> &'static Regex {
    TAG_PAIR_RE.get_or_init(|| Regex::new(r#"(\S+?):"(.*?)""#).unwrap())
}

/// How a tag value is derived from the field name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingMode {
    /// `UserName` becomes `userName`.
    Camel,
    /// `UserName` becomes `user_name`.
    Snake,
}

impl NamingMode {
    /// Applies the mode to a field name.
    pub fn apply(&self, field_name: &str) -> String {
        match self {
            NamingMode::Camel => field_name.to_lower_camel_case(),
            NamingMode::Snake => field_name.to_snake_case(),
        }
    }
}

/// Post-processing hook: receives the declaring type name, the field
/// name, the newly computed value and the old value, and returns the
/// final value. Returning an empty string deletes the key.
pub type AugmentFn = Arc<dyn Fn(&str, &str, &str, &str) -> String + Send + Sync>;

/// One tag rewrite strategy.
#[derive(Clone, Serialize, Deserialize)]
pub struct TagStrategy {
    /// The tag key this strategy owns, e.g. `json`.
    pub key: String,
    /// Value derivation mode.
    pub mode: NamingMode,
    /// Recompute the value when the key already exists.
    pub cover: bool,
    /// Add the key to fields that already carry an unrelated tag.
    pub edit: bool,
    /// Optional value post-processor.
    #[serde(skip)]
    pub augment: Option<AugmentFn>,
}

impl std::fmt::Debug for TagStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TagStrategy")
            .field("key", &self.key)
            .field("mode", &self.mode)
            .field("cover", &self.cover)
            .field("edit", &self.edit)
            .field("augment", &self.augment.as_ref().map(|_| "fn"))
            .finish()
    }
}

impl TagStrategy {
    /// A strategy that adds missing keys but leaves existing ones alone.
    pub fn additive(key: &str, mode: NamingMode) -> Self {
        TagStrategy {
            key: key.to_string(),
            mode,
            cover: false,
            edit: true,
            augment: None,
        }
    }

    fn final_value(&self, type_name: &str, field_name: &str, old: &str) -> String {
        let computed = self.mode.apply(field_name);
        match &self.augment {
            Some(f) => f(type_name, field_name, &computed, old),
            None => computed,
        }
    }
}

/// Loads strategies from a JSON array, e.g.
/// `[{"key":"json","mode":"snake","cover":false,"edit":true}]`.
/// Augment hooks cannot be configured this way; they are attached in
/// code afterwards.
pub fn strategies_from_json(raw: &str) -> AppResult<Vec<TagStrategy>> {
    serde_json::from_str(raw)
        .map_err(|e| AppError::Malformed(format!("tag strategy config: {e}")))
}

/// Parses a raw tag body (without backticks) into ordered pairs.
pub fn parse_tag(raw: &str) -> IndexMap<String, String> {
    let mut pairs = IndexMap::new();
    for caps in tag_pair_re().captures_iter(raw) {
        pairs.insert(caps[1].trim().to_string(), caps[2].to_string());
    }
    pairs
}

/// Renders ordered pairs back into a tag body.
pub fn render_tag(pairs: &IndexMap<String, String>) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{k}:\"{v}\""))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Reads `path`, applies the strategies to every struct in it, and
/// returns the patched bytes plus whether anything changed. The file
/// itself is not written.
pub fn synthesize_tags(path: &Path, strategies: &[TagStrategy]) -> AppResult<(String, bool)> {
    let mut unit = SourceUnit::read(path)?;
    let changed = synthesize_into(&mut unit, strategies)?;
    Ok((unit.into_source(), changed))
}

/// Applies the strategies to every non-test `.go` file under `scope`,
/// writing the files whose tag content changed back through the
/// formatter. Returns the changed paths, sorted. The first failing file
/// aborts the run; siblings already in flight finish without rollback.
pub fn synthesize_tags_in_dir(
    scope: &Path,
    strategies: &[TagStrategy],
    formatter: &dyn SourceFormatter,
) -> AppResult<Vec<PathBuf>> {
    let files: Vec<PathBuf> = WalkDir::new(scope)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| is_scannable(p))
        .collect();

    let changed: Mutex<Vec<PathBuf>> = Mutex::new(Vec::new());
    files.par_iter().try_for_each(|path| -> AppResult<()> {
        let (patched, dirty) = synthesize_tags(path, strategies)?;
        if dirty {
            write_formatted(formatter, path, &patched)?;
            changed.lock().unwrap().push(path.clone());
        }
        Ok(())
    })?;

    let mut changed = changed.into_inner().unwrap();
    changed.sort();
    Ok(changed)
}

/// Applies the strategies to every exported field of every struct in the
/// unit, one edit-and-reparse step per touched field. Returns whether
/// any field's tag content changed (compared case-insensitively).
pub fn synthesize_into(unit: &mut SourceUnit, strategies: &[TagStrategy]) -> AppResult<bool> {
    let mut dirty = false;
    let mut decl_idx = 0;
    loop {
        let struct_count = unit
            .tree()?
            .decls
            .iter()
            .filter(|d| matches!(d.def, TypeDef::Struct(_)))
            .count();
        if decl_idx >= struct_count {
            break;
        }
        let mut field_idx = 0;
        loop {
            let Some(edit) = plan_field_edit(unit, strategies, decl_idx, field_idx)? else {
                break;
            };
            field_idx += 1;
            let Some((range, replacement, was_dirty)) = edit else {
                continue;
            };
            dirty |= was_dirty;
            unit.apply_edit(range, &replacement)?;
            unit.reparse()?;
        }
        decl_idx += 1;
    }
    Ok(dirty)
}

type PlannedEdit = Option<(std::ops::Range<usize>, String, bool)>;

/// Computes the tag edit for the `field_idx`-th field of the
/// `decl_idx`-th struct. Outer `None` means the field index is past the
/// end; inner `None` means the field needs no edit.
fn plan_field_edit(
    unit: &SourceUnit,
    strategies: &[TagStrategy],
    decl_idx: usize,
    field_idx: usize,
) -> AppResult<Option<PlannedEdit>> {
    let tree = unit.tree()?;
    let Some(decl) = tree
        .decls
        .iter()
        .filter(|d| matches!(d.def, TypeDef::Struct(_)))
        .nth(decl_idx)
    else {
        return Ok(None);
    };
    let TypeDef::Struct(body) = &decl.def else {
        return Ok(None);
    };
    let Some(field) = body.fields.get(field_idx) else {
        return Ok(None);
    };

    let field_name = field.effective_name();
    if !field_name.chars().next().is_some_and(|c| c.is_uppercase()) {
        return Ok(Some(None));
    }

    let original = field.tag.as_ref().map(|t| t.raw.clone()).unwrap_or_default();
    let had_tag = field.tag.is_some();
    let mut pairs = parse_tag(&original);

    for strategy in strategies {
        match pairs.get(&strategy.key).cloned() {
            Some(old) => {
                if !strategy.cover {
                    continue;
                }
                let value = strategy.final_value(&decl.name, &field_name, &old);
                if value.is_empty() {
                    pairs.shift_remove(&strategy.key);
                } else {
                    pairs.insert(strategy.key.clone(), value);
                }
            }
            None => {
                if had_tag && !strategy.edit {
                    continue;
                }
                let value = strategy.final_value(&decl.name, &field_name, "");
                if !value.is_empty() {
                    pairs.insert(strategy.key.clone(), value);
                }
            }
        }
    }

    let rebuilt = render_tag(&pairs);
    let was_dirty = !rebuilt.eq_ignore_ascii_case(&original);

    let edit = match (&field.tag, rebuilt.is_empty()) {
        // Tag content unchanged byte-for-byte, leave the bytes alone.
        (Some(tag), _) if tag.raw == rebuilt => None,
        (Some(tag), false) => Some((tag.span.as_range(), format!("`{rebuilt}`"), was_dirty)),
        (Some(tag), true) => {
            // Dropping the whole tag takes its separating space with it.
            let mut range = tag.span.as_range();
            if unit.source()[..range.start].ends_with(' ') {
                range.start -= 1;
            }
            Some((range, String::new(), was_dirty))
        }
        (None, true) => None,
        (None, false) => {
            let at = field.ty_span.end as usize;
            Some((at..at, format!(" `{rebuilt}`"), was_dirty))
        }
    };

    if edit.is_some() {
        debug!(
            file = %unit.path().display(),
            decl = %decl.name,
            field = %field_name,
            tag = %rebuilt,
            "rewriting tag"
        );
    }
    Ok(Some(edit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn unit(src: &str) -> SourceUnit {
        SourceUnit::from_source(Path::new("t.go"), src.to_string()).unwrap()
    }

    fn snake_json() -> TagStrategy {
        TagStrategy::additive("json", NamingMode::Snake)
    }

    #[test]
    fn test_tag_parsing_keeps_order() {
        let pairs = parse_tag(r#"json:"id" gorm:"column:id""#);
        assert_eq!(
            pairs.keys().collect::<Vec<_>>(),
            vec!["json", "gorm"]
        );
        assert_eq!(pairs["gorm"], "column:id");
    }

    #[test]
    fn test_append_tag_to_untagged_field() {
        let mut u = unit("package p\n\ntype T struct {\n\tUserName string\n}\n");
        let changed = synthesize_into(&mut u, &[snake_json()]).unwrap();
        assert!(changed);
        assert_eq!(
            u.source(),
            "package p\n\ntype T struct {\n\tUserName string `json:\"user_name\"`\n}\n"
        );
    }

    #[test]
    fn test_second_run_is_byte_stable() {
        let mut u = unit("package p\n\ntype T struct {\n\tUserName string\n\tID int64\n}\n");
        assert!(synthesize_into(&mut u, &[snake_json()]).unwrap());
        let once = u.source().to_string();
        assert!(!synthesize_into(&mut u, &[snake_json()]).unwrap());
        assert_eq!(u.source(), once);
    }

    #[test]
    fn test_cover_false_leaves_existing_value() {
        let mut u = unit("package p\n\ntype T struct {\n\tUserName string `json:\"legacy\"`\n}\n");
        let changed = synthesize_into(&mut u, &[snake_json()]).unwrap();
        assert!(!changed);
        assert!(u.source().contains("`json:\"legacy\"`"));
    }

    #[test]
    fn test_cover_true_recomputes_value() {
        let mut u = unit("package p\n\ntype T struct {\n\tUserName string `json:\"legacy\"`\n}\n");
        let strategy = TagStrategy {
            cover: true,
            ..snake_json()
        };
        assert!(synthesize_into(&mut u, &[strategy]).unwrap());
        assert!(u.source().contains("`json:\"user_name\"`"));
    }

    #[test]
    fn test_edit_false_skips_already_tagged_fields() {
        let mut u = unit(
            "package p\n\ntype T struct {\n\tA string `gorm:\"column:a\"`\n\tB string\n}\n",
        );
        let strategy = TagStrategy {
            edit: false,
            ..snake_json()
        };
        synthesize_into(&mut u, &[strategy]).unwrap();
        assert!(u.source().contains("`gorm:\"column:a\"`\n"));
        assert!(!u.source().contains("gorm:\"column:a\" json"));
        assert!(u.source().contains("\tB string `json:\"b\"`\n"));
    }

    #[test]
    fn test_new_key_appends_after_retained_keys() {
        let mut u = unit("package p\n\ntype T struct {\n\tUserID int64 `gorm:\"column:user_id\"`\n}\n");
        synthesize_into(&mut u, &[snake_json()]).unwrap();
        assert!(u
            .source()
            .contains("`gorm:\"column:user_id\" json:\"user_id\"`"));
    }

    #[test]
    fn test_augment_can_delete_key() {
        let mut u = unit("package p\n\ntype T struct {\n\tSecret string `json:\"secret\"`\n}\n");
        let strategy = TagStrategy {
            cover: true,
            augment: Some(Arc::new(|_, field, computed, _| {
                if field == "Secret" {
                    String::new()
                } else {
                    computed.to_string()
                }
            })),
            ..snake_json()
        };
        assert!(synthesize_into(&mut u, &[strategy]).unwrap());
        assert_eq!(u.source(), "package p\n\ntype T struct {\n\tSecret string\n}\n");
    }

    #[test]
    fn test_augment_sees_old_value() {
        let mut u = unit("package p\n\ntype T struct {\n\tName string `json:\"legacy\"`\n}\n");
        let strategy = TagStrategy {
            cover: true,
            augment: Some(Arc::new(|ty, _, computed, old| {
                assert_eq!(ty, "T");
                assert_eq!(old, "legacy");
                format!("{computed},omitempty")
            })),
            ..snake_json()
        };
        synthesize_into(&mut u, &[strategy]).unwrap();
        assert!(u.source().contains("`json:\"name,omitempty\"`"));
    }

    #[test]
    fn test_unexported_fields_untouched() {
        let mut u = unit("package p\n\ntype T struct {\n\tinternal string\n\tName string\n}\n");
        synthesize_into(&mut u, &[snake_json()]).unwrap();
        assert!(u.source().contains("\tinternal string\n"));
        assert!(u.source().contains("\tName string `json:\"name\"`\n"));
    }

    #[test]
    fn test_case_only_difference_is_not_dirty() {
        let mut u = unit("package p\n\ntype T struct {\n\tName string `json:\"NAME\"`\n}\n");
        let strategy = TagStrategy {
            cover: true,
            ..snake_json()
        };
        // Bytes change but content only differs by case.
        let changed = synthesize_into(&mut u, &[strategy]).unwrap();
        assert!(!changed);
        assert!(u.source().contains("`json:\"name\"`"));
    }

    #[test]
    fn test_strategies_from_json() {
        let strategies = strategies_from_json(
            r#"[{"key":"json","mode":"snake","cover":false,"edit":true},
                {"key":"form","mode":"camel","cover":true,"edit":false}]"#,
        )
        .unwrap();
        assert_eq!(strategies.len(), 2);
        assert_eq!(strategies[0].key, "json");
        assert_eq!(strategies[1].mode, NamingMode::Camel);
        assert!(strategies[1].augment.is_none());

        let err = strategies_from_json("not json").unwrap_err();
        assert!(matches!(err, crate::error::AppError::Malformed(_)));
    }

    #[test]
    fn test_camel_mode() {
        let mut u = unit("package p\n\ntype T struct {\n\tUserName string\n}\n");
        synthesize_into(&mut u, &[TagStrategy::additive("json", NamingMode::Camel)]).unwrap();
        assert!(u.source().contains("`json:\"userName\"`"));
    }

    #[test]
    fn test_dir_walk_patches_only_changed_files() {
        use crate::strategies::PassthroughFormatter;

        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.go");
        let b = dir.path().join("b.go");
        let skipped = dir.path().join("a_test.go");
        std::fs::write(&a, "package p\n\ntype A struct {\n\tUserName string\n}\n").unwrap();
        std::fs::write(
            &b,
            "package p\n\ntype B struct {\n\tID int `json:\"id\"`\n}\n",
        )
        .unwrap();
        std::fs::write(&skipped, "package p\n\ntype C struct {\n\tName string\n}\n").unwrap();

        let changed =
            synthesize_tags_in_dir(dir.path(), &[snake_json()], &PassthroughFormatter).unwrap();
        assert_eq!(changed, vec![a.clone()]);

        let patched = std::fs::read_to_string(&a).unwrap();
        assert!(patched.contains("UserName string `json:\"user_name\"`"));
        let untouched = std::fs::read_to_string(&skipped).unwrap();
        assert!(!untouched.contains('`'));
    }

    #[test]
    fn test_dir_walk_surfaces_failing_path() {
        use crate::strategies::PassthroughFormatter;

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("ok.go"),
            "package p\n\ntype T struct {\n\tUserName string\n}\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("broken.go"), "package\n").unwrap();

        let err = synthesize_tags_in_dir(dir.path(), &[snake_json()], &PassthroughFormatter)
            .unwrap_err();
        assert!(matches!(err, AppError::Parse(_)));
        assert!(err.to_string().contains("broken.go"));
    }
}
