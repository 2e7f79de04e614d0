//! Program loading.
//!
//! A [`Program`] is the immutable instruction sequence an engine runs. Loading
//! keeps only the eight Brainfuck symbols `><+-.,[]`; everything else
//! (whitespace, comments, stray punctuation) is dropped so positions reported
//! by the engines index into the filtered sequence.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// The recognized instruction symbols.
pub const SYMBOLS: &[u8; 8] = b"><+-.,[]";

/// Returns `true` if `byte` is one of the eight instruction symbols.
pub fn is_symbol(byte: u8) -> bool {
    SYMBOLS.contains(&byte)
}

/// Errors raised while loading a program.
#[derive(Debug, thiserror::Error)]
pub enum ProgramError {
    /// The program file could not be read.
    #[error("failed to read program file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// An immutable, indexed sequence of instruction symbols.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    code: Vec<u8>,
}

impl Program {
    /// Build a program from raw source bytes, discarding non-instruction bytes.
    pub fn parse(source: impl AsRef<[u8]>) -> Self {
        let code = source
            .as_ref()
            .iter()
            .copied()
            .filter(|b| is_symbol(*b))
            .collect();
        Self { code }
    }

    /// Build a program from bytes taken verbatim, without filtering.
    ///
    /// Engines treat bytes outside the instruction set as no-ops, so this is
    /// mostly useful for callers that already hold a filtered sequence.
    pub fn from_raw(code: Vec<u8>) -> Self {
        Self { code }
    }

    /// Read and parse the program stored at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProgramError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| ProgramError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let program = Self::parse(&bytes);
        log::debug!(
            "loaded {} ({} bytes, {} instructions)",
            path.display(),
            bytes.len(),
            program.len()
        );
        Ok(program)
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// The instruction at position `ip`, if any.
    pub fn get(&self, ip: usize) -> Option<u8> {
        self.code.get(ip).copied()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.code
    }
}

impl From<&str> for Program {
    fn from(source: &str) -> Self {
        Self::parse(source)
    }
}

impl FromStr for Program {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Every byte is ASCII when built through `parse`; raw programs may not be.
        write!(f, "{}", String::from_utf8_lossy(&self.code))
    }
}
