#![deny(missing_docs)]

//! # Strategy Module
//!
//! External collaborator seams: the source formatter invoked after every
//! write, and the schema metadata providers that feed field mounting.
//! The patch engine core depends only on these traits, never on a
//! specific formatter binary or database dialect.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AppError, AppResult};

/// A source formatter and import organizer run over every buffer before
/// it is written back to disk.
pub trait SourceFormatter: Sync {
    /// Formats a complete source buffer, returning the replacement text.
    ///
    /// Implementations typically shell out to the toolchain formatter;
    /// they reorder and deduplicate imports and normalize whitespace.
    fn format(&self, path: &Path, source: &str) -> AppResult<String>;
}

/// A formatter that returns its input unchanged. Used in tests and when
/// no toolchain formatter is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughFormatter;

impl SourceFormatter for PassthroughFormatter {
    fn format(&self, _path: &Path, source: &str) -> AppResult<String> {
        Ok(source.to_string())
    }
}

/// Formats `source` and writes it to `path`. Formatter and filesystem
/// failures both surface as write failures carrying the path.
pub fn write_formatted(
    formatter: &dyn SourceFormatter,
    path: &Path,
    source: &str,
) -> AppResult<()> {
    let formatted = formatter
        .format(path, source)
        .map_err(|e| AppError::Write(format!("{}: formatting failed: {e}", path.display())))?;
    std::fs::write(path, formatted).map_err(|e| AppError::Io(e).at_file(path))?;
    debug!(file = %path.display(), "wrote patched source");
    Ok(())
}

/// Column metadata reported by a schema backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMeta {
    /// Column name as stored.
    pub name: String,
    /// Backend-specific type name.
    pub data_type: String,
    /// Whether the column accepts NULL.
    pub nullable: bool,
    /// Whether the column is part of the primary key.
    pub primary: bool,
    /// Column comment, if the backend tracks one.
    #[serde(default)]
    pub comment: Option<String>,
}

/// Index metadata reported by a schema backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMeta {
    /// Index name.
    pub name: String,
    /// Indexed column names in index order.
    pub columns: Vec<String>,
    /// Whether the index enforces uniqueness.
    pub unique: bool,
}

/// Table metadata reported by a schema backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMeta {
    /// Table name as stored.
    pub name: String,
    /// Table comment, if the backend tracks one.
    #[serde(default)]
    pub comment: Option<String>,
}

/// A pluggable schema introspection backend. One implementation per
/// dialect, entirely outside the patch engine core.
pub trait MetadataProvider {
    /// Lists the tables visible to the connection.
    fn get_tables(&self) -> AppResult<Vec<TableMeta>>;

    /// Lists the columns of one table in declaration order.
    fn get_columns(&self, table: &str) -> AppResult<Vec<ColumnMeta>>;

    /// Lists the indexes of one table.
    fn get_indexes(&self, table: &str) -> AppResult<Vec<IndexMeta>>;

    /// Maps a backend type name to a Go type expression string.
    fn type_mapping(&self, data_type: &str, nullable: bool) -> String;
}
