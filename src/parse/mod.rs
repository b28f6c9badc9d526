//! Facilities for parsing request files and ROM content files.

mod atom;
mod csv;
mod lex;
mod rom;
mod types;

pub use csv::parse_requests;
pub use lex::{
    Token, TokenLexer, TokenValue, parse_int_literal, parse_u64_literal,
};
pub use rom::parse_rom_content;
pub use types::{ParseError, SrcLoc};

use crate::bus::MemoryRequest;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

//===========================================================================//

/// An error encountered while loading an input file.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The file could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Io {
        /// The file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },
    /// The file contents were malformed.
    #[error("{}:{error}", path.display())]
    Parse {
        /// The file that was malformed.
        path: PathBuf,
        /// The first problem found in the file.
        #[source]
        error: ParseError,
    },
}

fn read_file(path: &Path) -> Result<String, LoadError> {
    fs::read_to_string(path)
        .map_err(|source| LoadError::Io { path: path.to_path_buf(), source })
}

/// Reads and parses a request file.
pub fn load_requests(path: &Path) -> Result<Vec<MemoryRequest>, LoadError> {
    let source = read_file(path)?;
    parse_requests(&source)
        .map_err(|error| LoadError::Parse { path: path.to_path_buf(), error })
}

/// Reads and parses a ROM content file for a ROM of `rom_size` bytes.
pub fn load_rom_content(
    path: &Path,
    rom_size: u32,
) -> Result<Vec<u32>, LoadError> {
    let source = read_file(path)?;
    parse_rom_content(&source, rom_size)
        .map_err(|error| LoadError::Parse { path: path.to_path_buf(), error })
}

//===========================================================================//

#[cfg(test)]
mod tests {
    use super::{LoadError, load_requests};
    use std::path::Path;

    #[test]
    fn missing_file() {
        let path = Path::new("/nonexistent/requests.csv");
        match load_requests(path) {
            Err(error @ LoadError::Io { .. }) => {
                let message = error.to_string();
                assert!(message.starts_with("cannot read /nonexistent/"));
            }
            other => panic!("expected an I/O error, got {other:?}"),
        }
    }
}

//===========================================================================//
