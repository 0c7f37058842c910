#![deny(missing_docs)]

//! # annopatch
//!
//! An annotation-driven source patch engine for Go codebases. Directives
//! embedded in doc comments (`@marker(args)`) drive surgical, idempotent
//! edits against the raw source bytes: mounting struct fields, keeping
//! field tags in step with naming conventions, and synchronizing
//! interface implementations with failing stubs for whatever is missing.
//!
//! Edits never re-render a file. Each strategy computes byte-range
//! splices from a span-preserving parse, applies them, and reparses
//! before the next lookup, so hand-written code and formatting survive
//! untouched.

/// Shared error types.
pub mod error;

/// Go source tokenization.
pub mod lexer;

/// Span-preserving declaration parsing.
pub mod parser;

/// Identifier canonicalization.
pub mod canonical;

/// Directive extraction from doc comments.
pub mod annotations;

/// The edit engine and patch strategies.
pub mod patcher;

/// External collaborator seams (formatter, schema metadata).
pub mod strategies;

pub use annotations::{extract_annotations, parse_doc_block, parse_kv, Annotation};
pub use canonical::{canonical_field_name, fmt_field_name, stringify_leading_digit};
pub use error::{AppError, AppResult};
pub use patcher::{
    mount_field, sync_annotated_interfaces, sync_interface, synthesize_tags,
    synthesize_tags_in_dir, MountRequest, NamingMode, SourceUnit, SyncReport, SyncRequest,
    TagStrategy,
};
pub use strategies::{
    write_formatted, ColumnMeta, IndexMeta, MetadataProvider, PassthroughFormatter,
    SourceFormatter, TableMeta,
};
