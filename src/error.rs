#![deny(missing_docs)]

//! # Error Handling
//!
//! Provides the unified `AppError` enum used across the crate.

use derive_more::{Display, From};

/// The Global Error Enum.
///
/// We use `derive_more` for boilerplate.
/// Note: String errors default to `General`.
#[derive(Debug, Display, From)]
pub enum AppError {
    /// Wrapper for standard IO errors.
    #[display("IO Error: {_0}")]
    Io(std::io::Error),

    /// A declaration or file could not be found.
    #[from(ignore)]
    #[display("Not Found: {_0}")]
    NotFound(String),

    /// A name resolved to a declaration of the wrong category.
    #[from(ignore)]
    #[display("Wrong Kind: {_0}")]
    WrongKind(String),

    /// An annotation marker or option key was repeated.
    #[from(ignore)]
    #[display("Duplicate: {_0}")]
    Duplicate(String),

    /// Annotation argument syntax was invalid.
    #[from(ignore)]
    #[display("Malformed: {_0}")]
    Malformed(String),

    /// A source buffer failed to parse. Aborts only that file's task.
    #[from(ignore)]
    #[display("Parse Error: {_0}")]
    Parse(String),

    /// Post-edit formatting or disk write failed. Aborts that file's task.
    #[from(ignore)]
    #[display("Write Error: {_0}")]
    Write(String),

    /// Generic errors.
    #[display("General Error: {_0}")]
    General(String),
}

/// Manual implementation of the standard Error trait.
impl std::error::Error for AppError {}

/// Helper type alias for Result using AppError.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Attaches a file path to the error message so group scans surface
    /// enough context to act on.
    pub fn at_file(self, path: &std::path::Path) -> AppError {
        match self {
            AppError::Io(e) => AppError::Write(format!("{}: {}", path.display(), e)),
            AppError::NotFound(m) => AppError::NotFound(format!("{}: {}", path.display(), m)),
            AppError::WrongKind(m) => AppError::WrongKind(format!("{}: {}", path.display(), m)),
            AppError::Duplicate(m) => AppError::Duplicate(format!("{}: {}", path.display(), m)),
            AppError::Malformed(m) => AppError::Malformed(format!("{}: {}", path.display(), m)),
            AppError::Parse(m) => AppError::Parse(format!("{}: {}", path.display(), m)),
            AppError::Write(m) => AppError::Write(format!("{}: {}", path.display(), m)),
            AppError::General(m) => AppError::General(format!("{}: {}", path.display(), m)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};
    use std::path::Path;

    #[test]
    fn test_io_conversion() {
        let io_err = Error::new(ErrorKind::Other, "test");
        let app_err: AppError = io_err.into();
        assert!(matches!(app_err, AppError::Io(_)));
    }

    #[test]
    fn test_string_conversion() {
        // Test that String defaults to General, not a specific kind
        let msg = String::from("something wrong");
        let app_err: AppError = msg.into();
        match app_err {
            AppError::General(s) => assert_eq!(s, "something wrong"),
            _ => panic!("String should convert to AppError::General"),
        }
    }

    #[test]
    fn test_kind_display() {
        let err = AppError::WrongKind("Foo is an interface".into());
        assert_eq!(format!("{}", err), "Wrong Kind: Foo is an interface");
    }

    #[test]
    fn test_at_file_keeps_kind() {
        let err = AppError::Parse("unexpected token".into()).at_file(Path::new("a/b.go"));
        match err {
            AppError::Parse(m) => assert!(m.starts_with("a/b.go")),
            _ => panic!("kind should be preserved"),
        }
    }
}
