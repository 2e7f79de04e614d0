//! The interpreting engine.
//!
//! [`Machine`] executes a [`Program`] one symbol at a time. Loops are matched
//! lazily: entering a loop pushes the position of its `[` on the loop-return
//! stack, and skipping a loop whose guard is zero scans forward for the
//! matching `]` once, then remembers the target in a dense skip-memo so every
//! later skip from the same `[` is O(1).
//!
//! ```
//! use bfvm::{Engine, Machine, MachineConfig, Program};
//!
//! let program = Program::parse("++>+++++[<+>-]<.");
//! let mut machine = Machine::new(program, MachineConfig::default(), std::io::empty(), Vec::new());
//! machine.run().unwrap();
//! assert_eq!(machine.output(), &vec![7u8]);
//! ```

use std::io::{Read, Write};

use crate::channels::Channels;
use crate::config::MachineConfig;
use crate::engine::{Engine, Step};
use crate::error::MachineError;
use crate::program::Program;
use crate::tape::{Cell, Tape};

pub struct Machine<R, W> {
    program: Program,
    tape: Tape,
    channels: Channels<R, W>,
    /// Instruction pointer.
    cptr: usize,
    /// Cell pointer; may go negative, see [`Tape::resolve`].
    mptr: isize,
    /// Positions of the `[` of every loop currently entered.
    stack: Vec<usize>,
    /// `skip_memo[p]` is the position just past the `]` matching the `[` at `p - 1`.
    skip_memo: Vec<Option<usize>>,
    steps: u64,
    halted: bool,
}

impl<R: Read, W: Write> Machine<R, W> {
    pub fn new(program: Program, config: MachineConfig, input: R, output: W) -> Self {
        log::debug!(
            "machine: {} instructions, {} cells, modulus {}, eof {:?}, pointer {:?}, flush_on_write {}",
            program.len(),
            config.memory_size,
            config.modulus.map_or_else(|| "none".to_string(), |m| m.to_string()),
            config.eof,
            config.pointer,
            config.flush_on_write,
        );
        let skip_memo = vec![None; program.len() + 1];
        Self {
            program,
            tape: Tape::new(config.memory_size, config.modulus, config.pointer),
            channels: Channels::new(input, output, config.flush_on_write, config.eof),
            cptr: 0,
            mptr: 0,
            stack: Vec::new(),
            skip_memo,
            steps: 0,
            halted: false,
        }
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Position of the next instruction.
    pub fn ip(&self) -> usize {
        self.cptr
    }

    /// The cell pointer.
    pub fn pointer(&self) -> isize {
        self.mptr
    }

    pub fn tape(&self) -> &[Cell] {
        self.tape.cells()
    }

    /// Value of the current cell, or `None` if the pointer is off the tape.
    pub fn current_cell(&self) -> Option<Cell> {
        self.tape.get(self.mptr)
    }

    /// Number of loops currently entered.
    pub fn loop_depth(&self) -> usize {
        self.stack.len()
    }

    /// The memoized skip target for a skip that started at `start`.
    pub fn skip_target(&self, start: usize) -> Option<usize> {
        self.skip_memo.get(start).copied().flatten()
    }

    pub fn output(&self) -> &W {
        self.channels.output()
    }

    pub fn into_output(self) -> W {
        self.channels.into_output()
    }

    /// Read the current cell; `ip` is the instruction being executed.
    fn cell(&self, ip: usize) -> Result<Cell, MachineError> {
        self.tape
            .get(self.mptr)
            .ok_or(MachineError::TapeIndexOutOfRange { ip, ptr: self.mptr })
    }

    fn add(&mut self, ip: usize, delta: Cell) -> Result<Cell, MachineError> {
        self.tape
            .add(self.mptr, delta)
            .ok_or(MachineError::TapeIndexOutOfRange { ip, ptr: self.mptr })
    }

    /// Position just past the `]` matching the `[` at `start - 1`.
    fn skip_block(&mut self, start: usize) -> Result<usize, MachineError> {
        if let Some(target) = self.skip_memo[start] {
            return Ok(target);
        }

        let code = self.program.as_bytes();
        let mut depth = 1usize;
        let mut pos = start;
        while depth > 0 {
            let Some(&instr) = code.get(pos) else {
                return Err(MachineError::UnmatchedOpenBracket { ip: start - 1 });
            };
            match instr {
                b'[' => depth += 1,
                b']' => depth -= 1,
                _ => {}
            }
            pos += 1;
        }

        log::debug!("skip memo: [{} -> {}", start - 1, pos);
        self.skip_memo[start] = Some(pos);
        Ok(pos)
    }

    fn halt(&mut self) -> Result<Step, MachineError> {
        if !self.halted {
            self.halted = true;
            if !self.stack.is_empty() {
                log::warn!(
                    "program ended inside {} unclosed loop(s); innermost '[' at instruction {}",
                    self.stack.len(),
                    self.stack[self.stack.len() - 1]
                );
            }
            log::debug!("halted after {} steps", self.steps);
            self.flush_output()?;
        }
        Ok(Step::Halted)
    }
}

impl<R: Read, W: Write> Engine for Machine<R, W> {
    fn step(&mut self) -> Result<Step, MachineError> {
        let ip = self.cptr;
        let Some(instr) = self.program.get(ip) else {
            return self.halt();
        };

        if log::log_enabled!(log::Level::Trace) {
            log::trace!(
                "step {} | ip {} | ptr {} | cell {:?} | {}",
                self.steps,
                ip,
                self.mptr,
                self.current_cell(),
                instr as char
            );
        }

        match instr {
            b'>' => self.mptr += 1,
            b'<' => self.mptr -= 1,
            b'+' => {
                self.add(ip, 1)?;
            }
            b'-' => {
                self.add(ip, -1)?;
            }
            b'.' => {
                let value = self.cell(ip)?;
                self.channels
                    .write_cell(value)
                    .map_err(|source| MachineError::Io { ip, source })?;
            }
            b',' => {
                self.cell(ip)?;
                let value = self
                    .channels
                    .read_cell()
                    .map_err(|source| MachineError::Io { ip, source })?
                    .ok_or(MachineError::InputExhausted { ip })?;
                self.tape.set(self.mptr, value);
            }
            b'[' => {
                if self.cell(ip)? != 0 {
                    self.stack.push(ip);
                } else {
                    self.cptr = self.skip_block(ip + 1)?;
                    self.steps += 1;
                    return Ok(Step::Continue);
                }
            }
            b']' => {
                let Some(&ret) = self.stack.last() else {
                    return Err(MachineError::UnmatchedCloseBracket { ip });
                };
                let guard = self.cell(ip)?;
                self.stack.pop();
                if guard != 0 {
                    // Resume at the `[` so its guard is evaluated again.
                    self.cptr = ret;
                    self.steps += 1;
                    return Ok(Step::Continue);
                }
            }
            // Stray symbols are no-ops.
            _ => {}
        }

        self.cptr = ip + 1;
        self.steps += 1;
        Ok(Step::Continue)
    }

    fn is_finished(&self) -> bool {
        self.cptr >= self.program.len()
    }

    fn flush_output(&mut self) -> Result<(), MachineError> {
        self.channels.flush().map_err(|source| MachineError::Io {
            ip: self.cptr,
            source,
        })
    }

    fn steps(&self) -> u64 {
        self.steps
    }
}
