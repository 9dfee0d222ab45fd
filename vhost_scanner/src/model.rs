use std::ops::Range;
use thiserror::Error;

/// Inclusive line range of a block, 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRegion {
    pub start: usize,
    pub end: usize,
}

impl BlockRegion {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Number of lines covered, opener and closer included.
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    pub fn contains(&self, index: usize) -> bool {
        self.start <= index && index <= self.end
    }

    /// Lines strictly between the opener and the closer.
    pub fn interior(&self) -> Range<usize> {
        self.start + 1..self.end
    }

    /// 1-based `(first, last)` for messages.
    pub fn display_lines(&self) -> (usize, usize) {
        (self.start + 1, self.end + 1)
    }
}

/// Structural errors. Line numbers are 1-based.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("line {line}: unmatched '}}' with no open block, please fix the file by hand")]
    UnmatchedCloser { line: usize },

    #[error("line {line}: block is never closed, please fix the file by hand")]
    UnclosedBlock { line: usize },
}

/// One expected line of a marker run.
#[derive(Debug, Clone, Copy)]
pub struct RunDirective {
    pub name: &'static str,
    pub optional: bool,
}

impl RunDirective {
    pub const fn required(name: &'static str) -> Self {
        Self { name, optional: false }
    }

    pub const fn optional(name: &'static str) -> Self {
        Self { name, optional: true }
    }

    /// `name` must be the first word of the trimmed line.
    pub fn matches(&self, line: &str) -> bool {
        let trimmed = line.trim_start();
        match trimmed.strip_prefix(self.name) {
            Some(rest) => rest.starts_with(char::is_whitespace) || rest.starts_with(';'),
            None => false,
        }
    }
}
