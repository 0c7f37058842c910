//! # Data Models
//!
//! Intermediate representation for parsed Go declarations. Every node a
//! patch strategy edits carries the byte span needed to compute the edit.

use crate::lexer::Span;
use crate::parser::types::TypeExpr;

/// A single `//` comment line with its span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentLine {
    /// Raw comment text including the `//` prefix.
    pub text: String,
    /// Byte span of the comment.
    pub span: Span,
}

impl CommentLine {
    /// The comment content with the `//` marker and one leading space removed.
    pub fn content(&self) -> &str {
        let text = self.text.strip_prefix("//").unwrap_or(&self.text);
        text.strip_prefix(' ').unwrap_or(text)
    }
}

/// One import binding visible in a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportBinding {
    /// The quoted import path, without quotes.
    pub path: String,
    /// Explicit alias, if any.
    pub alias: Option<String>,
    /// Span of the whole import spec line.
    pub span: Span,
}

impl ImportBinding {
    /// The package name this binding is referenced by: the alias when
    /// present, the last path segment otherwise.
    pub fn local_name(&self) -> &str {
        match &self.alias {
            Some(a) => a,
            None => self.path.rsplit('/').next().unwrap_or(&self.path),
        }
    }
}

/// A field tag literal, e.g. `` `json:"id"` ``.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagLit {
    /// Tag content without the surrounding backticks/quotes.
    pub raw: String,
    /// Span including the surrounding quotes.
    pub span: Span,
}

/// A struct field (or embedded type when `names` is empty).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Field names; empty for embedded fields.
    pub names: Vec<String>,
    /// The field type.
    pub ty: TypeExpr,
    /// Span of the type expression.
    pub ty_span: Span,
    /// The raw tag, if present.
    pub tag: Option<TagLit>,
    /// Doc comment lines directly above the field.
    pub doc: Vec<CommentLine>,
    /// Trailing comment on the same line, if any.
    pub trailing: Option<CommentLine>,
}

impl Field {
    /// The name this field is addressed by: the concatenated explicit names,
    /// or for embedded fields the trailing identifier of the type.
    pub fn effective_name(&self) -> String {
        if self.names.is_empty() {
            self.ty.trailing_ident().unwrap_or_default().to_string()
        } else {
            self.names.concat()
        }
    }
}

/// A struct type definition body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructDecl {
    /// Ordered fields.
    pub fields: Vec<Field>,
    /// Byte offset of the opening `{`.
    pub body_open: u32,
    /// Byte offset of the closing `}`.
    pub body_close: u32,
}

/// One parameter or result entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    /// Parameter names; empty when the list is unnamed.
    pub names: Vec<String>,
    /// Whether this is a variadic `...T` parameter.
    pub variadic: bool,
    /// The parameter type.
    pub ty: TypeExpr,
}

/// A method signature inside an interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSig {
    /// Method name.
    pub name: String,
    /// Doc comment lines directly above the method.
    pub doc: Vec<CommentLine>,
    /// Parameters.
    pub params: Vec<Param>,
    /// Results.
    pub results: Vec<Param>,
}

/// An interface type definition body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceDecl {
    /// Ordered method signatures.
    pub methods: Vec<MethodSig>,
    /// Embedded interface names (rendered), left untouched by strategies.
    pub embedded: Vec<TypeExpr>,
    /// Byte offset of the opening `{`.
    pub body_open: u32,
    /// Byte offset of the closing `}`.
    pub body_close: u32,
}

/// The body of a named type declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDef {
    /// A struct type.
    Struct(StructDecl),
    /// An interface type.
    Interface(InterfaceDecl),
}

/// A named type declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// The declared type name.
    pub name: String,
    /// Doc comment lines directly above the declaration.
    pub doc: Vec<CommentLine>,
    /// Struct or interface body.
    pub def: TypeDef,
    /// Span of the whole declaration.
    pub span: Span,
}

impl Declaration {
    /// The struct fields of this declaration, empty for interfaces.
    pub fn struct_fields(&self) -> &[Field] {
        match &self.def {
            TypeDef::Struct(s) => &s.fields,
            TypeDef::Interface(_) => &[],
        }
    }
}

/// A method receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receiver {
    /// Receiver variable name, if named.
    pub name: Option<String>,
    /// The receiver's base type name.
    pub type_name: String,
    /// Whether the receiver is a pointer.
    pub pointer: bool,
}

/// A top-level function or method declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncDecl {
    /// Function name.
    pub name: String,
    /// Receiver for methods, `None` for plain functions.
    pub receiver: Option<Receiver>,
    /// Parameters.
    pub params: Vec<Param>,
    /// Results.
    pub results: Vec<Param>,
    /// Span from the parameter list `(` through the end of the results.
    /// Replacing exactly this range rewrites a signature without touching
    /// the body.
    pub clause_span: Span,
    /// Span of the whole declaration including the body.
    pub span: Span,
}

/// A parsed Go file at declaration granularity.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GoFile {
    /// The package name.
    pub package: String,
    /// Byte offset just past the package clause identifier.
    pub package_clause_end: u32,
    /// All import bindings in source order.
    pub imports: Vec<ImportBinding>,
    /// Byte offset of the `)` closing the last grouped import block, if any.
    pub import_group_close: Option<u32>,
    /// Byte offset just past the last import declaration, if any.
    pub last_import_end: Option<u32>,
    /// Struct and interface declarations in source order.
    pub decls: Vec<Declaration>,
    /// Function and method declarations in source order.
    pub funcs: Vec<FuncDecl>,
}

impl GoFile {
    /// Looks up a type declaration by name.
    pub fn decl(&self, name: &str) -> Option<&Declaration> {
        self.decls.iter().find(|d| d.name == name)
    }

    /// Looks up an import binding by path.
    pub fn import(&self, path: &str) -> Option<&ImportBinding> {
        self.imports.iter().find(|i| i.path == path)
    }

    /// Methods declared on the given receiver base type.
    pub fn methods_of<'f>(&'f self, type_name: &'f str) -> impl Iterator<Item = &'f FuncDecl> + 'f {
        self.funcs.iter().filter(move |f| {
            f.receiver
                .as_ref()
                .is_some_and(|r| r.type_name == type_name)
        })
    }
}
