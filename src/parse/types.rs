use std::fmt;
use thiserror::Error;

//===========================================================================//

/// A location within an input file.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SrcLoc {
    /// The line number within the file.  The file starts on line 1.
    pub line: u32,
    /// The column number within the line.  Each line starts at column 0.
    pub column: usize,
}

impl SrcLoc {
    /// Constructs the location for the start of the given line.
    pub fn line_start(line: u32) -> SrcLoc {
        SrcLoc { line, column: 0 }
    }
}

impl fmt::Display for SrcLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

//===========================================================================//

/// An error encountered while parsing an input file.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[error("{location}: {message}")]
pub struct ParseError {
    /// The location in the file where the error occurred.
    pub location: SrcLoc,
    /// The error message to report to the user.
    pub message: String,
}

impl ParseError {
    /// Constructs a parse error at the given location.
    pub fn new(location: SrcLoc, message: String) -> ParseError {
        ParseError { location, message }
    }
}

//===========================================================================//

#[cfg(test)]
mod tests {
    use super::{ParseError, SrcLoc};

    #[test]
    fn display() {
        let location = SrcLoc { line: 3, column: 7 };
        let error = ParseError::new(location, "bad row".to_string());
        assert_eq!(error.to_string(), "3:7: bad row");
        assert_eq!(SrcLoc::line_start(9).to_string(), "9:0");
    }
}

//===========================================================================//
