//! # Type Expressions
//!
//! Structured Go type expressions with deterministic rendering and
//! package-qualification. Rendering is canonical: both sides of a
//! signature comparison go through the same printer, so formatting noise
//! in the source never causes spurious drift.

use crate::parser::models::Param;

/// Channel directionality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChanDir {
    /// `chan T`
    Both,
    /// `<-chan T`
    Recv,
    /// `chan<- T`
    Send,
}

/// A Go type expression, covering the declaration-level subset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExpr {
    /// A possibly package-qualified named type.
    Named {
        /// Package qualifier, e.g. `pkg` in `pkg.Bar`.
        pkg: Option<String>,
        /// The type name.
        name: String,
    },
    /// `*T`
    Pointer(Box<TypeExpr>),
    /// `[]T`
    Slice(Box<TypeExpr>),
    /// `[N]T` with the length kept as raw text.
    Array {
        /// Raw length expression text.
        len: String,
        /// Element type.
        elem: Box<TypeExpr>,
    },
    /// `map[K]V`
    Map {
        /// Key type.
        key: Box<TypeExpr>,
        /// Value type.
        value: Box<TypeExpr>,
    },
    /// `chan T` and its directed forms.
    Chan {
        /// Directionality.
        dir: ChanDir,
        /// Element type.
        elem: Box<TypeExpr>,
    },
    /// `func(...) ...`
    Func {
        /// Parameters.
        params: Vec<Param>,
        /// Results.
        results: Vec<Param>,
    },
    /// Anything the subset does not model structurally (anonymous structs,
    /// inline interfaces, generic instantiations), kept verbatim.
    Verbatim(String),
}

impl TypeExpr {
    /// Renders the expression in canonical form.
    pub fn render(&self) -> String {
        match self {
            TypeExpr::Named { pkg: Some(p), name } => format!("{}.{}", p, name),
            TypeExpr::Named { pkg: None, name } => name.clone(),
            TypeExpr::Pointer(inner) => format!("*{}", inner.render()),
            TypeExpr::Slice(inner) => format!("[]{}", inner.render()),
            TypeExpr::Array { len, elem } => format!("[{}]{}", len, elem.render()),
            TypeExpr::Map { key, value } => {
                format!("map[{}]{}", key.render(), value.render())
            }
            TypeExpr::Chan { dir, elem } => match dir {
                ChanDir::Both => format!("chan {}", elem.render()),
                ChanDir::Recv => format!("<-chan {}", elem.render()),
                ChanDir::Send => format!("chan<- {}", elem.render()),
            },
            TypeExpr::Func { params, results } => {
                format!("func{}", render_clause(params, results))
            }
            TypeExpr::Verbatim(raw) => raw.clone(),
        }
    }

    /// The trailing identifier of the type, used to derive default field
    /// names: `pkg.Bar` and `*Bar` both yield `Bar`.
    pub fn trailing_ident(&self) -> Option<&str> {
        match self {
            TypeExpr::Named { name, .. } => Some(name),
            TypeExpr::Pointer(inner) => inner.trailing_ident(),
            _ => None,
        }
    }

    /// Qualifies every exported, unqualified named type with `pkg`.
    ///
    /// Generated code lives in a different package than the interface it
    /// implements, so locally visible names must be rewritten relative to
    /// the declaring package. Lowercase (unexported) names stay untouched.
    pub fn qualify(&mut self, pkg: &str) {
        match self {
            TypeExpr::Named { pkg: qual, name } => {
                if qual.is_none() && name.chars().next().is_some_and(|c| c.is_uppercase()) {
                    *qual = Some(pkg.to_string());
                }
            }
            TypeExpr::Pointer(inner) | TypeExpr::Slice(inner) => inner.qualify(pkg),
            TypeExpr::Array { elem, .. } | TypeExpr::Chan { elem, .. } => elem.qualify(pkg),
            TypeExpr::Map { key, value } => {
                key.qualify(pkg);
                value.qualify(pkg);
            }
            TypeExpr::Func { params, results } => {
                for p in params.iter_mut().chain(results.iter_mut()) {
                    p.ty.qualify(pkg);
                }
            }
            TypeExpr::Verbatim(_) => {}
        }
    }
}

/// Renders a parameter list, e.g. `(id int, v string)`.
pub fn render_params(params: &[Param]) -> String {
    let items: Vec<String> = params
        .iter()
        .map(|p| {
            let ty = if p.variadic {
                format!("...{}", p.ty.render())
            } else {
                p.ty.render()
            };
            if p.names.is_empty() {
                ty
            } else {
                format!("{} {}", p.names.join(", "), ty)
            }
        })
        .collect();
    format!("({})", items.join(", "))
}

/// Renders a result list the way gofmt prints it: nothing, ` T` for a
/// single unnamed result, ` (...)` otherwise.
pub fn render_results(results: &[Param]) -> String {
    match results {
        [] => String::new(),
        [single] if single.names.is_empty() => format!(" {}", single.ty.render()),
        _ => format!(" {}", render_params(results)),
    }
}

/// Renders a full parameter/result clause, e.g. `(id int) (string, error)`.
pub fn render_clause(params: &[Param], results: &[Param]) -> String {
    format!("{}{}", render_params(params), render_results(results))
}
