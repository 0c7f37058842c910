//! # Structural Locator
//!
//! Name-and-kind lookup over a parsed tree, with typed errors so callers
//! can distinguish "no such declaration" from "declared, but not what the
//! directive expects".

use crate::error::{AppError, AppResult};
use crate::parser::{Declaration, GoFile, InterfaceDecl, StructDecl, TypeDef};

/// The declaration category a lookup expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    /// A struct type declaration.
    Struct,
    /// An interface type declaration.
    Interface,
}

impl std::fmt::Display for DeclKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeclKind::Struct => write!(f, "struct"),
            DeclKind::Interface => write!(f, "interface"),
        }
    }
}

/// Finds the declaration `name` of the given kind.
pub fn locate<'t>(tree: &'t GoFile, name: &str, kind: DeclKind) -> AppResult<&'t Declaration> {
    let decl = tree
        .decl(name)
        .ok_or_else(|| AppError::NotFound(format!("declaration `{name}` not found")))?;
    let actual = match decl.def {
        TypeDef::Struct(_) => DeclKind::Struct,
        TypeDef::Interface(_) => DeclKind::Interface,
    };
    if actual != kind {
        return Err(AppError::WrongKind(format!(
            "`{name}` is a {actual}, expected a {kind}"
        )));
    }
    Ok(decl)
}

/// Finds the struct `name`, returning its body.
pub fn locate_struct<'t>(tree: &'t GoFile, name: &str) -> AppResult<&'t StructDecl> {
    match &locate(tree, name, DeclKind::Struct)?.def {
        TypeDef::Struct(s) => Ok(s),
        TypeDef::Interface(_) => unreachable!(),
    }
}

/// Finds the interface `name`, returning its body.
pub fn locate_interface<'t>(tree: &'t GoFile, name: &str) -> AppResult<&'t InterfaceDecl> {
    match &locate(tree, name, DeclKind::Interface)?.def {
        TypeDef::Interface(i) => Ok(i),
        TypeDef::Struct(_) => unreachable!(),
    }
}
