//! # Edit Engine
//!
//! The shared edit/reparse loop. A [`SourceUnit`] owns a file's byte
//! buffer and its parsed tree, and tracks whether the tree still matches
//! the buffer. Every edit invalidates the tree; the unit refuses to hand
//! out positions until it is reparsed. Edits splice the raw buffer, so
//! untouched regions survive byte-for-byte.

use std::ops::Range;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};
use crate::parser::{parse_file, GoFile};

/// Whether the parsed tree reflects the current buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnitState {
    /// Tree and buffer agree; positions are valid.
    Clean,
    /// Buffer was edited since the last parse; positions are stale.
    Dirty,
}

/// One source file under patching: raw bytes plus the current tree.
#[derive(Debug)]
pub struct SourceUnit {
    path: PathBuf,
    buffer: String,
    tree: GoFile,
    state: UnitState,
}

impl SourceUnit {
    /// Reads and parses a file from disk.
    pub fn read(path: &Path) -> AppResult<Self> {
        let buffer = std::fs::read_to_string(path).map_err(|e| AppError::Io(e).at_file(path))?;
        Self::from_source(path, buffer)
    }

    /// Parses an in-memory buffer, keeping `path` for error context.
    pub fn from_source(path: &Path, buffer: String) -> AppResult<Self> {
        let tree = parse_file(&buffer).map_err(|e| e.at_file(path))?;
        Ok(SourceUnit {
            path: path.to_path_buf(),
            buffer,
            tree,
            state: UnitState::Clean,
        })
    }

    /// The file this unit was read from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The current buffer contents.
    pub fn source(&self) -> &str {
        &self.buffer
    }

    /// Consumes the unit, returning the final buffer.
    pub fn into_source(self) -> String {
        self.buffer
    }

    /// The parsed tree. Fails if the buffer was edited without a
    /// [`reparse`](Self::reparse), since every stored span would then
    /// point into stale bytes.
    pub fn tree(&self) -> AppResult<&GoFile> {
        match self.state {
            UnitState::Clean => Ok(&self.tree),
            UnitState::Dirty => Err(AppError::General(format!(
                "{}: tree accessed after edit without reparse",
                self.path.display()
            ))),
        }
    }

    /// Replaces a byte range of the buffer. All previously computed
    /// positions are invalid afterwards.
    pub fn apply_edit(&mut self, range: Range<usize>, replacement: &str) -> AppResult<()> {
        if range.start > range.end || range.end > self.buffer.len() {
            return Err(AppError::General(format!(
                "{}: edit range {}..{} out of bounds (len {})",
                self.path.display(),
                range.start,
                range.end,
                self.buffer.len()
            )));
        }
        self.buffer.replace_range(range, replacement);
        self.state = UnitState::Dirty;
        Ok(())
    }

    /// Inserts text at a byte offset. Invalidates positions like
    /// [`apply_edit`](Self::apply_edit).
    pub fn insert(&mut self, at: usize, text: &str) -> AppResult<()> {
        if at > self.buffer.len() {
            return Err(AppError::General(format!(
                "{}: insert offset {} out of bounds (len {})",
                self.path.display(),
                at,
                self.buffer.len()
            )));
        }
        self.buffer.insert_str(at, text);
        self.state = UnitState::Dirty;
        Ok(())
    }

    /// Re-parses the buffer, making positions valid again.
    pub fn reparse(&mut self) -> AppResult<()> {
        self.tree = parse_file(&self.buffer).map_err(|e| e.at_file(&self.path))?;
        self.state = UnitState::Clean;
        Ok(())
    }

    /// The newline sequence this buffer uses.
    pub fn newline(&self) -> &'static str {
        if self.buffer.contains("\r\n") {
            "\r\n"
        } else {
            "\n"
        }
    }
}
