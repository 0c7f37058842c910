#![deny(missing_docs)]

//! # Go Source Parser
//!
//! A span-preserving parser for the subset of Go declarations the patch
//! engine rewrites. Every model node records the byte range it came from,
//! so edits are applied to the original buffer rather than re-rendering
//! the file.

mod decls;
mod models;
mod types;

pub use decls::parse_file;
pub use models::{
    CommentLine, Declaration, Field, FuncDecl, GoFile, ImportBinding, InterfaceDecl, MethodSig,
    Param, Receiver, StructDecl, TagLit, TypeDef,
};
pub use types::{render_clause, render_params, render_results, ChanDir, TypeExpr};
