#![deny(missing_docs)]

//! # Lexer Module
//!
//! Tokenizes the Go declaration subset the patch engine operates on.
//! Newlines and comments are kept as tokens: newlines terminate fields and
//! method signatures, and comments carry the annotations the extractor
//! scans. All other whitespace is discarded.

use crate::error::{AppError, AppResult};
use logos::Logos;

/// Token kinds for the Go declaration subset.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tok {
    /// Horizontal whitespace, skipped.
    #[regex(r"[\t\x0C\v ]+", logos::skip)]
    _Ws,

    /// Newlines are kept to terminate fields and signatures.
    #[regex(r"\r\n|\n|\r")]
    Newline,

    /// A `//` line comment (newline excluded).
    #[regex(r"//[^\n\r]*")]
    LineComment,

    /// A `/* */` block comment. Can contain newlines.
    #[regex(r"/\*[^*]*\*+([^/*][^*]*\*+)*/")]
    BlockComment,

    /// The `package` keyword.
    #[token("package")]
    KwPackage,
    /// The `import` keyword.
    #[token("import")]
    KwImport,
    /// The `type` keyword.
    #[token("type")]
    KwType,
    /// The `struct` keyword.
    #[token("struct")]
    KwStruct,
    /// The `interface` keyword.
    #[token("interface")]
    KwInterface,
    /// The `func` keyword.
    #[token("func")]
    KwFunc,
    /// The `map` keyword.
    #[token("map")]
    KwMap,
    /// The `chan` keyword.
    #[token("chan")]
    KwChan,
    /// The `const` keyword.
    #[token("const")]
    KwConst,
    /// The `var` keyword.
    #[token("var")]
    KwVar,

    /// An identifier (keywords take priority).
    #[regex(r"[_\p{XID_Start}][_\p{XID_Continue}]*")]
    Ident,

    /// Raw string literal (backquoted). Carries field tags.
    #[regex(r"`[^`]*`")]
    RawString,

    /// Interpreted string literal.
    #[regex(r#""([^"\\\n\r]|\\.)*""#)]
    String,

    /// Rune literal.
    #[regex(r"'([^'\\\n\r]|\\.)+'")]
    Rune,

    /// Numeric literal (integers, prefixed forms; good enough to skip over).
    #[regex(r"[0-9][0-9_a-fA-F]*")]
    #[regex(r"0[xXbBoO][0-9a-fA-F_]+")]
    Int,

    /// `(`
    #[token("(")]
    LParen,
    /// `)`
    #[token(")")]
    RParen,
    /// `{`
    #[token("{")]
    LBrace,
    /// `}`
    #[token("}")]
    RBrace,
    /// `[`
    #[token("[")]
    LBrack,
    /// `]`
    #[token("]")]
    RBrack,
    /// `,`
    #[token(",")]
    Comma,
    /// `;`
    #[token(";")]
    Semi,
    /// `.`
    #[token(".")]
    Dot,
    /// `*`
    #[token("*")]
    Star,
    /// `...`
    #[token("...")]
    Ellipsis,
    /// `<-` (channel direction).
    #[token("<-")]
    Arrow,

    /// Any other operator character. Only balance-relevant tokens matter
    /// outside declarations, so operators never need finer distinction.
    #[regex(r"[-+/%&|^<>=!:~?@#$\\]")]
    Op,
}

/// Compact byte span. Positions are `u32`, limiting files to 4GiB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// Start byte offset (inclusive).
    pub start: u32,
    /// End byte offset (exclusive).
    pub end: u32,
}

impl Span {
    /// Creates a new span from usize positions.
    #[inline]
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(end <= u32::MAX as usize);
        Self {
            start: start as u32,
            end: end as u32,
        }
    }

    /// Converts to a range usable for slicing and edits.
    #[inline]
    pub fn as_range(&self) -> std::ops::Range<usize> {
        self.start as usize..self.end as usize
    }
}

/// A token paired with its source span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    /// The token kind.
    pub kind: Tok,
    /// Byte span in the source buffer.
    pub span: Span,
}

/// Tokenizes `source`, failing with `Parse` on any unrecognized input.
pub fn lex(source: &str) -> AppResult<Vec<Token>> {
    let mut lexer = Tok::lexer(source);
    let mut tokens = Vec::new();

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        match result {
            Ok(kind) => tokens.push(Token {
                kind,
                span: Span::new(span.start, span.end),
            }),
            Err(()) => {
                let upto = span.end.min(span.start + 8).min(source.len());
                let snippet = source.get(span.start..upto).unwrap_or("<non-utf8 boundary>");
                return Err(AppError::Parse(format!(
                    "unrecognized input at byte {}: {:?}",
                    span.start, snippet
                )));
            }
        }
    }

    Ok(tokens)
}
