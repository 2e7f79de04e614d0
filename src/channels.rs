//! Byte-level input and output channels used by `,` and `.`.

use std::io::{self, ErrorKind, Read, Write};

use serde::Deserialize;

use crate::tape::Cell;

/// What `,` does when the input source is exhausted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EofPolicy {
    /// Raise `InputExhausted`.
    #[default]
    Fault,
    /// Store 0 in the current cell.
    Zero,
}

/// The input source and output sink of one engine.
pub struct Channels<R, W> {
    input: R,
    output: W,
    flush_on_write: bool,
    eof: EofPolicy,
}

impl<R: Read, W: Write> Channels<R, W> {
    pub fn new(input: R, output: W, flush_on_write: bool, eof: EofPolicy) -> Self {
        Self {
            input,
            output,
            flush_on_write,
            eof,
        }
    }

    /// Read one byte. `Ok(None)` means the input is exhausted and the policy is
    /// to fault.
    pub fn read_cell(&mut self) -> io::Result<Option<Cell>> {
        let mut buf = [0u8; 1];
        loop {
            match self.input.read(&mut buf) {
                Ok(0) => {
                    return Ok(match self.eof {
                        EofPolicy::Fault => None,
                        EofPolicy::Zero => Some(0),
                    });
                }
                Ok(_) => return Ok(Some(Cell::from(buf[0]))),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Write the low byte of `value`, flushing if configured to.
    pub fn write_cell(&mut self, value: Cell) -> io::Result<()> {
        let byte = value.rem_euclid(256) as u8;
        self.output.write_all(&[byte])?;
        if self.flush_on_write {
            self.output.flush()?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.output.flush()
    }

    pub fn output(&self) -> &W {
        &self.output
    }

    pub fn into_output(self) -> W {
        self.output
    }
}
