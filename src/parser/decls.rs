//! # Declaration Parser
//!
//! Recursive descent over the token stream, covering the declaration
//! surface the patch strategies need: package clause, imports, struct and
//! interface type declarations, and functions with receivers. Function
//! bodies and unrelated declarations are skipped with balanced-delimiter
//! scanning, so arbitrary Go files parse as long as their declarations fit
//! the subset.

use crate::error::{AppError, AppResult};
use crate::lexer::{lex, Span, Tok, Token};
use crate::parser::models::{
    CommentLine, Declaration, Field, FuncDecl, GoFile, ImportBinding, InterfaceDecl, MethodSig,
    Param, Receiver, StructDecl, TagLit, TypeDef,
};
use crate::parser::types::{ChanDir, TypeExpr};

/// Parses a Go source buffer into a [`GoFile`].
pub fn parse_file(source: &str) -> AppResult<GoFile> {
    let tokens = lex(source)?;
    let mut p = Parser {
        src: source,
        toks: tokens,
        pos: 0,
    };
    p.file()
}

struct Parser<'a> {
    src: &'a str,
    toks: Vec<Token>,
    pos: usize,
}

/// One element of a parameter list before named/unnamed resolution.
enum ParamElement {
    /// A bare identifier: a name in named mode, a type otherwise.
    Ambiguous(String),
    /// `name Type`, closing any pending name group.
    Named {
        name: String,
        variadic: bool,
        ty: TypeExpr,
    },
    /// A type with no name.
    Type { variadic: bool, ty: TypeExpr },
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<Token> {
        self.toks.get(self.pos).copied()
    }

    fn kind(&self) -> Option<Tok> {
        self.peek().map(|t| t.kind)
    }

    fn bump(&mut self) -> Option<Token> {
        let t = self.peek();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn at(&self, kind: Tok) -> bool {
        self.kind() == Some(kind)
    }

    fn eat(&mut self, kind: Tok) -> Option<Token> {
        if self.at(kind) {
            self.bump()
        } else {
            None
        }
    }

    fn expect(&mut self, kind: Tok, what: &str) -> AppResult<Token> {
        match self.peek() {
            Some(t) if t.kind == kind => {
                self.pos += 1;
                Ok(t)
            }
            Some(t) => Err(AppError::Parse(format!(
                "expected {} at byte {}, found {:?}",
                what, t.span.start, t.kind
            ))),
            None => Err(AppError::Parse(format!(
                "expected {} at end of file",
                what
            ))),
        }
    }

    fn text(&self, tok: Token) -> &'a str {
        &self.src[tok.span.as_range()]
    }

    /// Skips newlines, semicolons and comments, accumulating `//` lines as
    /// a doc block. A blank line resets the accumulated block, matching Go
    /// doc-comment attachment.
    fn skip_terminators(&mut self, docs: &mut Vec<CommentLine>) {
        let mut last_was_newline = false;
        while let Some(tok) = self.peek() {
            match tok.kind {
                Tok::LineComment => {
                    docs.push(CommentLine {
                        text: self.text(tok).to_string(),
                        span: tok.span,
                    });
                    last_was_newline = false;
                    self.pos += 1;
                }
                Tok::BlockComment => {
                    last_was_newline = false;
                    self.pos += 1;
                }
                Tok::Newline => {
                    if last_was_newline {
                        docs.clear();
                    }
                    last_was_newline = true;
                    self.pos += 1;
                }
                Tok::Semi => {
                    last_was_newline = false;
                    self.pos += 1;
                }
                _ => break,
            }
        }
    }

    /// Skips newlines and comments without doc bookkeeping; used inside
    /// parenthesized lists where line breaks are free.
    fn skip_space(&mut self) {
        while matches!(
            self.kind(),
            Some(Tok::Newline | Tok::Semi | Tok::LineComment | Tok::BlockComment)
        ) {
            self.pos += 1;
        }
    }

    /// Consumes tokens up to (not including) the next newline or semicolon
    /// at zero delimiter depth.
    fn skip_logical_line(&mut self) {
        let (mut parens, mut bracks, mut braces) = (0i32, 0i32, 0i32);
        while let Some(tok) = self.peek() {
            match tok.kind {
                Tok::Newline | Tok::Semi if parens == 0 && bracks == 0 && braces == 0 => break,
                Tok::LParen => parens += 1,
                Tok::RParen => parens = (parens - 1).max(0),
                Tok::LBrack => bracks += 1,
                Tok::RBrack => bracks = (bracks - 1).max(0),
                Tok::LBrace => braces += 1,
                Tok::RBrace => braces = (braces - 1).max(0),
                _ => {}
            }
            self.pos += 1;
        }
    }

    /// Consumes a balanced delimiter pair starting at the current token.
    /// Returns the closing token.
    fn skip_balanced(&mut self, open: Tok, close: Tok) -> AppResult<Token> {
        self.expect(open, "opening delimiter")?;
        let mut depth = 1;
        while let Some(tok) = self.bump() {
            if tok.kind == open {
                depth += 1;
            } else if tok.kind == close {
                depth -= 1;
                if depth == 0 {
                    return Ok(tok);
                }
            }
        }
        Err(AppError::Parse("unbalanced delimiters".into()))
    }

    fn file(&mut self) -> AppResult<GoFile> {
        let mut file = GoFile::default();
        let mut docs = Vec::new();

        loop {
            self.skip_terminators(&mut docs);
            let Some(tok) = self.peek() else { break };
            match tok.kind {
                Tok::KwPackage => {
                    self.bump();
                    let name = self.expect(Tok::Ident, "package name")?;
                    file.package = self.text(name).to_string();
                    file.package_clause_end = name.span.end;
                    docs.clear();
                }
                Tok::KwImport => {
                    self.import_decl(&mut file)?;
                    docs.clear();
                }
                Tok::KwType => {
                    self.type_decl(&mut file, std::mem::take(&mut docs))?;
                }
                Tok::KwFunc => {
                    self.func_decl(&mut file)?;
                    docs.clear();
                }
                Tok::KwConst | Tok::KwVar => {
                    self.bump();
                    if self.at(Tok::LParen) {
                        self.skip_balanced(Tok::LParen, Tok::RParen)?;
                    } else {
                        self.skip_logical_line();
                    }
                    docs.clear();
                }
                _ => {
                    self.skip_logical_line();
                    docs.clear();
                }
            }
        }

        Ok(file)
    }

    fn import_decl(&mut self, file: &mut GoFile) -> AppResult<()> {
        self.bump(); // `import`
        if self.eat(Tok::LParen).is_some() {
            loop {
                self.skip_space();
                if let Some(close) = self.eat(Tok::RParen) {
                    file.import_group_close = Some(close.span.start);
                    file.last_import_end = Some(close.span.end);
                    return Ok(());
                }
                self.import_spec(file)?;
            }
        }
        self.import_spec(file)?;
        file.last_import_end = Some(file.imports.last().map(|i| i.span.end).unwrap_or(0));
        Ok(())
    }

    fn import_spec(&mut self, file: &mut GoFile) -> AppResult<()> {
        let start = self.peek().map(|t| t.span.start).unwrap_or(0);
        let alias = if let Some(tok) = self.eat(Tok::Ident) {
            Some(self.text(tok).to_string())
        } else if self.eat(Tok::Dot).is_some() {
            Some(".".to_string())
        } else {
            None
        };
        let path_tok = match self.kind() {
            Some(Tok::String | Tok::RawString) => self.bump().unwrap(),
            _ => return Err(AppError::Parse("expected import path string".into())),
        };
        let raw = self.text(path_tok);
        file.imports.push(ImportBinding {
            path: raw[1..raw.len() - 1].to_string(),
            alias,
            span: Span::new(start as usize, path_tok.span.end as usize),
        });
        Ok(())
    }

    fn type_decl(&mut self, file: &mut GoFile, docs: Vec<CommentLine>) -> AppResult<()> {
        self.bump(); // `type`
        if self.eat(Tok::LParen).is_some() {
            let mut group_docs = docs;
            loop {
                self.skip_terminators(&mut group_docs);
                if self.eat(Tok::RParen).is_some() {
                    return Ok(());
                }
                self.type_spec(file, std::mem::take(&mut group_docs))?;
            }
        }
        self.type_spec(file, docs)
    }

    fn type_spec(&mut self, file: &mut GoFile, docs: Vec<CommentLine>) -> AppResult<()> {
        let name_tok = self.expect(Tok::Ident, "type name")?;
        let name = self.text(name_tok).to_string();

        match self.kind() {
            Some(Tok::KwStruct) => {
                let body = self.struct_body()?;
                let span = Span::new(name_tok.span.start as usize, body.body_close as usize + 1);
                file.decls.push(Declaration {
                    name,
                    doc: docs,
                    def: TypeDef::Struct(body),
                    span,
                });
            }
            Some(Tok::KwInterface) => {
                let body = self.interface_body()?;
                let span = Span::new(name_tok.span.start as usize, body.body_close as usize + 1);
                file.decls.push(Declaration {
                    name,
                    doc: docs,
                    def: TypeDef::Interface(body),
                    span,
                });
            }
            _ => {
                // Aliases, defined non-composite types, generic headers:
                // not patch targets, skip the rest of the spec.
                self.skip_logical_line();
            }
        }
        Ok(())
    }

    fn struct_body(&mut self) -> AppResult<StructDecl> {
        self.expect(Tok::KwStruct, "`struct`")?;
        let open = self.expect(Tok::LBrace, "`{`")?;
        let mut fields = Vec::new();
        let mut docs = Vec::new();

        loop {
            self.skip_terminators(&mut docs);
            if let Some(close) = self.eat(Tok::RBrace) {
                return Ok(StructDecl {
                    fields,
                    body_open: open.span.start,
                    body_close: close.span.start,
                });
            }
            let field = self.field(std::mem::take(&mut docs))?;
            fields.push(field);
        }
    }

    fn field(&mut self, doc: Vec<CommentLine>) -> AppResult<Field> {
        let mut names = Vec::new();
        let (ty, ty_span) = if self.at(Tok::Ident) {
            let first = self.bump().unwrap();
            match self.kind() {
                // `pkg.Name` embedded field.
                Some(Tok::Dot) => self.finish_named(first)?,
                // Name list, definitely a named field.
                Some(Tok::Comma) => {
                    names.push(self.text(first).to_string());
                    while self.eat(Tok::Comma).is_some() {
                        let n = self.expect(Tok::Ident, "field name")?;
                        names.push(self.text(n).to_string());
                    }
                    self.type_expr()?
                }
                // End of the field entry: a plain embedded type.
                Some(
                    Tok::Newline
                    | Tok::Semi
                    | Tok::RawString
                    | Tok::String
                    | Tok::LineComment
                    | Tok::BlockComment
                    | Tok::RBrace,
                )
                | None => {
                    let span = first.span;
                    (
                        TypeExpr::Named {
                            pkg: None,
                            name: self.text(first).to_string(),
                        },
                        span,
                    )
                }
                // Single name followed by a type.
                _ => {
                    names.push(self.text(first).to_string());
                    self.type_expr()?
                }
            }
        } else {
            // Embedded pointer or other non-ident-led type.
            self.type_expr()?
        };

        let tag = match self.kind() {
            Some(Tok::RawString | Tok::String) => {
                let tok = self.bump().unwrap();
                let raw = self.text(tok);
                Some(TagLit {
                    raw: raw[1..raw.len() - 1].to_string(),
                    span: tok.span,
                })
            }
            _ => None,
        };

        let trailing = self.eat(Tok::LineComment).map(|tok| CommentLine {
            text: self.text(tok).to_string(),
            span: tok.span,
        });

        Ok(Field {
            names,
            ty,
            ty_span,
            tag,
            doc,
            trailing,
        })
    }

    fn interface_body(&mut self) -> AppResult<InterfaceDecl> {
        self.expect(Tok::KwInterface, "`interface`")?;
        let open = self.expect(Tok::LBrace, "`{`")?;
        let mut methods = Vec::new();
        let mut embedded = Vec::new();
        let mut docs = Vec::new();

        loop {
            self.skip_terminators(&mut docs);
            if let Some(close) = self.eat(Tok::RBrace) {
                return Ok(InterfaceDecl {
                    methods,
                    embedded,
                    body_open: open.span.start,
                    body_close: close.span.start,
                });
            }
            let name_tok = self.expect(Tok::Ident, "method or embedded interface name")?;
            if self.at(Tok::LParen) {
                let (params, _) = self.param_list()?;
                let (results, _) = self.result_list()?;
                methods.push(MethodSig {
                    name: self.text(name_tok).to_string(),
                    doc: std::mem::take(&mut docs),
                    params,
                    results,
                });
            } else {
                let (ty, _) = self.finish_named(name_tok)?;
                embedded.push(ty);
                docs.clear();
            }
        }
    }

    fn func_decl(&mut self, file: &mut GoFile) -> AppResult<()> {
        let kw = self.bump().unwrap(); // `func`
        let receiver = if self.at(Tok::LParen) {
            Some(self.receiver()?)
        } else {
            None
        };
        let name_tok = self.expect(Tok::Ident, "function name")?;
        if self.at(Tok::LBrack) {
            // Type parameter list.
            self.skip_balanced(Tok::LBrack, Tok::RBrack)?;
        }
        let (params, params_span) = self.param_list()?;
        let (results, results_end) = self.result_list()?;
        let clause_span = Span::new(
            params_span.start as usize,
            results_end.unwrap_or(params_span.end) as usize,
        );

        let mut end = clause_span.end;
        if self.at(Tok::LBrace) {
            let close = self.skip_balanced(Tok::LBrace, Tok::RBrace)?;
            end = close.span.end;
        }

        file.funcs.push(FuncDecl {
            name: self.text(name_tok).to_string(),
            receiver,
            params,
            results,
            clause_span,
            span: Span::new(kw.span.start as usize, end as usize),
        });
        Ok(())
    }

    fn receiver(&mut self) -> AppResult<Receiver> {
        self.expect(Tok::LParen, "`(`")?;
        let first = self.eat(Tok::Ident);
        let pointer = self.eat(Tok::Star).is_some();
        let second = self.eat(Tok::Ident);
        if self.at(Tok::LBrack) {
            // Generic receiver type arguments.
            self.skip_balanced(Tok::LBrack, Tok::RBrack)?;
        }
        self.expect(Tok::RParen, "`)`")?;

        let (name, type_tok) = match (first, second) {
            (Some(n), Some(t)) => (Some(n), t),
            (Some(t), None) if !pointer => (None, t),
            (None, Some(t)) => (None, t),
            _ => return Err(AppError::Parse("invalid method receiver".into())),
        };
        Ok(Receiver {
            name: name.map(|t| self.text(t).to_string()),
            type_name: self.text(type_tok).to_string(),
            pointer,
        })
    }

    fn param_list(&mut self) -> AppResult<(Vec<Param>, Span)> {
        let open = self.expect(Tok::LParen, "`(`")?;
        let mut elements = Vec::new();
        let close;

        loop {
            self.skip_space();
            if let Some(tok) = self.eat(Tok::RParen) {
                close = tok;
                break;
            }
            elements.push(self.param_element()?);
            self.skip_space();
            if self.eat(Tok::Comma).is_some() {
                continue;
            }
            if !self.at(Tok::RParen) {
                return Err(AppError::Parse(
                    "expected `,` or `)` in parameter list".into(),
                ));
            }
        }

        let params = resolve_param_elements(elements)?;
        Ok((
            params,
            Span::new(open.span.start as usize, close.span.end as usize),
        ))
    }

    fn param_element(&mut self) -> AppResult<ParamElement> {
        if self.eat(Tok::Ellipsis).is_some() {
            let (ty, _) = self.type_expr()?;
            return Ok(ParamElement::Type { variadic: true, ty });
        }
        if self.at(Tok::Ident) {
            let id = self.bump().unwrap();
            return match self.kind() {
                Some(Tok::Comma | Tok::RParen) => {
                    Ok(ParamElement::Ambiguous(self.text(id).to_string()))
                }
                Some(Tok::Dot) => {
                    let (ty, _) = self.finish_named(id)?;
                    Ok(ParamElement::Type {
                        variadic: false,
                        ty,
                    })
                }
                Some(Tok::Ellipsis) => {
                    self.bump();
                    let (ty, _) = self.type_expr()?;
                    Ok(ParamElement::Named {
                        name: self.text(id).to_string(),
                        variadic: true,
                        ty,
                    })
                }
                Some(k) if starts_type(k) => {
                    let (ty, _) = self.type_expr()?;
                    Ok(ParamElement::Named {
                        name: self.text(id).to_string(),
                        variadic: false,
                        ty,
                    })
                }
                _ => Err(AppError::Parse(format!(
                    "unsupported parameter syntax near byte {}",
                    id.span.start
                ))),
            };
        }
        let (ty, _) = self.type_expr()?;
        Ok(ParamElement::Type {
            variadic: false,
            ty,
        })
    }

    fn result_list(&mut self) -> AppResult<(Vec<Param>, Option<u32>)> {
        // Results must start on the signature line; a newline means none.
        match self.kind() {
            Some(Tok::LParen) => {
                let (params, span) = self.param_list()?;
                Ok((params, Some(span.end)))
            }
            Some(k) if starts_type(k) => {
                let (ty, span) = self.type_expr()?;
                Ok((
                    vec![Param {
                        names: vec![],
                        variadic: false,
                        ty,
                    }],
                    Some(span.end),
                ))
            }
            _ => Ok((vec![], None)),
        }
    }

    fn type_expr(&mut self) -> AppResult<(TypeExpr, Span)> {
        let tok = self
            .peek()
            .ok_or_else(|| AppError::Parse("expected type expression at end of file".into()))?;
        match tok.kind {
            Tok::Star => {
                self.bump();
                let (inner, sp) = self.type_expr()?;
                Ok((
                    TypeExpr::Pointer(Box::new(inner)),
                    Span::new(tok.span.start as usize, sp.end as usize),
                ))
            }
            Tok::LBrack => {
                self.bump();
                if self.eat(Tok::RBrack).is_some() {
                    let (elem, sp) = self.type_expr()?;
                    return Ok((
                        TypeExpr::Slice(Box::new(elem)),
                        Span::new(tok.span.start as usize, sp.end as usize),
                    ));
                }
                // Array length: raw text up to the matching `]`.
                let len_start = self.peek().map(|t| t.span.start).unwrap_or(tok.span.end);
                let mut depth = 1;
                let mut len_end = len_start;
                while let Some(t) = self.bump() {
                    match t.kind {
                        Tok::LBrack => depth += 1,
                        Tok::RBrack => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                    len_end = t.span.end;
                }
                let len = self.src[len_start as usize..len_end as usize].trim().to_string();
                let (elem, sp) = self.type_expr()?;
                Ok((
                    TypeExpr::Array {
                        len,
                        elem: Box::new(elem),
                    },
                    Span::new(tok.span.start as usize, sp.end as usize),
                ))
            }
            Tok::KwMap => {
                self.bump();
                self.expect(Tok::LBrack, "`[` after `map`")?;
                let (key, _) = self.type_expr()?;
                self.expect(Tok::RBrack, "`]` after map key")?;
                let (value, sp) = self.type_expr()?;
                Ok((
                    TypeExpr::Map {
                        key: Box::new(key),
                        value: Box::new(value),
                    },
                    Span::new(tok.span.start as usize, sp.end as usize),
                ))
            }
            Tok::Arrow => {
                self.bump();
                self.expect(Tok::KwChan, "`chan` after `<-`")?;
                let (elem, sp) = self.type_expr()?;
                Ok((
                    TypeExpr::Chan {
                        dir: ChanDir::Recv,
                        elem: Box::new(elem),
                    },
                    Span::new(tok.span.start as usize, sp.end as usize),
                ))
            }
            Tok::KwChan => {
                self.bump();
                let dir = if self.eat(Tok::Arrow).is_some() {
                    ChanDir::Send
                } else {
                    ChanDir::Both
                };
                let (elem, sp) = self.type_expr()?;
                Ok((
                    TypeExpr::Chan {
                        dir,
                        elem: Box::new(elem),
                    },
                    Span::new(tok.span.start as usize, sp.end as usize),
                ))
            }
            Tok::KwFunc => {
                self.bump();
                let (params, psp) = self.param_list()?;
                let (results, rend) = self.result_list()?;
                let end = rend.unwrap_or(psp.end);
                Ok((
                    TypeExpr::Func { params, results },
                    Span::new(tok.span.start as usize, end as usize),
                ))
            }
            Tok::KwStruct | Tok::KwInterface => {
                self.bump();
                let close = self.skip_balanced(Tok::LBrace, Tok::RBrace)?;
                let span = Span::new(tok.span.start as usize, close.span.end as usize);
                Ok((
                    TypeExpr::Verbatim(self.src[span.as_range()].to_string()),
                    span,
                ))
            }
            Tok::Ident => {
                let id = self.bump().unwrap();
                self.finish_named(id)
            }
            _ => Err(AppError::Parse(format!(
                "unsupported type expression at byte {}",
                tok.span.start
            ))),
        }
    }

    /// Completes a type that begins with an identifier: plain name,
    /// `pkg.Name` selector, or a generic instantiation kept verbatim.
    fn finish_named(&mut self, id: Token) -> AppResult<(TypeExpr, Span)> {
        let (pkg, name, mut end) = if self.eat(Tok::Dot).is_some() {
            let n = self.expect(Tok::Ident, "type name after `.`")?;
            (
                Some(self.text(id).to_string()),
                self.text(n).to_string(),
                n.span.end,
            )
        } else {
            (None, self.text(id).to_string(), id.span.end)
        };

        if self.at(Tok::LBrack) {
            let close = self.skip_balanced(Tok::LBrack, Tok::RBrack)?;
            end = close.span.end;
            let span = Span::new(id.span.start as usize, end as usize);
            return Ok((
                TypeExpr::Verbatim(self.src[span.as_range()].to_string()),
                span,
            ));
        }

        Ok((
            TypeExpr::Named { pkg, name },
            Span::new(id.span.start as usize, end as usize),
        ))
    }
}

fn starts_type(kind: Tok) -> bool {
    matches!(
        kind,
        Tok::Ident
            | Tok::Star
            | Tok::LBrack
            | Tok::KwMap
            | Tok::KwChan
            | Tok::Arrow
            | Tok::KwFunc
            | Tok::KwStruct
            | Tok::KwInterface
    )
}

/// Applies the named/unnamed parameter list rule: if any element carries a
/// name and a type, single identifiers are pending names grouped with the
/// next typed element; otherwise every element is a type.
fn resolve_param_elements(elements: Vec<ParamElement>) -> AppResult<Vec<Param>> {
    let named_mode = elements
        .iter()
        .any(|e| matches!(e, ParamElement::Named { .. }));
    let mut params = Vec::new();
    let mut pending: Vec<String> = Vec::new();

    for element in elements {
        match element {
            ParamElement::Ambiguous(ident) => {
                if named_mode {
                    pending.push(ident);
                } else {
                    params.push(Param {
                        names: vec![],
                        variadic: false,
                        ty: TypeExpr::Named {
                            pkg: None,
                            name: ident,
                        },
                    });
                }
            }
            ParamElement::Named { name, variadic, ty } => {
                pending.push(name);
                params.push(Param {
                    names: std::mem::take(&mut pending),
                    variadic,
                    ty,
                });
            }
            ParamElement::Type { variadic, ty } => {
                if !pending.is_empty() {
                    return Err(AppError::Parse(
                        "mixed named and unnamed parameters".into(),
                    ));
                }
                params.push(Param {
                    names: vec![],
                    variadic,
                    ty,
                });
            }
        }
    }

    if !pending.is_empty() {
        return Err(AppError::Parse("parameter names missing a type".into()));
    }
    Ok(params)
}
