//! Locations used to stamp taint traces and match results.
//!
//! Grounded on `program_structure::file_definition` (FileID/FileLocation):
//! we keep the same two-piece shape (an opaque file identifier plus a byte
//! range) but drop the `codespan`-backed source map, since rendering
//! diagnostics against source text is reporting-UI territory and out of
//! scope for the engine.

use std::fmt;

/// Opaque identifier for a source file, assigned by the collaborator that
/// builds the CFG. The engine never resolves this to a path or contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub u32);

/// A byte range `[start, end)` within the file identified by `file_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceLocation {
    pub file_id: FileId,
    pub start: usize,
    pub end: usize,
}

impl SourceLocation {
    pub fn new(file_id: FileId, start: usize, end: usize) -> SourceLocation {
        SourceLocation { file_id, start, end }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}..{}", self.file_id.0, self.start, self.end)
    }
}
