//! Run-length folding and the folded engine.
//!
//! [`fold`] contracts runs of identical `+`, `-`, `>` and `<` into single
//! counted operations and resolves every bracket to a jump target up front.
//! [`CompiledMachine`] executes the result over the same tape and channels as
//! [`Machine`](crate::Machine), so both engines produce the same output and
//! final tape for well-formed programs.
//!
//! Unlike the interpreter, folding rejects an unmatched bracket anywhere in
//! the program before anything runs.

use std::fmt;
use std::io::{Read, Write};

use crate::channels::Channels;
use crate::config::MachineConfig;
use crate::engine::{Engine, Step};
use crate::error::MachineError;
use crate::program::Program;
use crate::tape::{Cell, Tape};

/// A folded operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// Add to the current cell (negative for a run of `-`).
    Add(Cell),
    /// Move the cell pointer (negative for a run of `<`).
    Move(isize),
    Output,
    Input,
    /// If the current cell is 0, continue at the op after the matching `JumpUnlessZero`.
    JumpIfZero(usize),
    /// If the current cell is not 0, continue at the first op of the loop body.
    JumpUnlessZero(usize),
}

/// An [`Op`] and the program position of the first symbol it was folded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FoldedOp {
    pub op: Op,
    pub ip: usize,
}

/// The folded form of a [`Program`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldedProgram {
    ops: Vec<FoldedOp>,
    source_len: usize,
    max_depth: usize,
}

impl FoldedProgram {
    pub fn ops(&self) -> &[FoldedOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn stats(&self) -> FoldStats {
        let longest_jump = self
            .ops
            .iter()
            .enumerate()
            .filter_map(|(i, folded)| match folded.op {
                Op::JumpIfZero(target) => Some(target - i),
                _ => None,
            })
            .max()
            .unwrap_or(0);
        FoldStats {
            instructions: self.source_len,
            ops: self.ops.len(),
            max_depth: self.max_depth,
            longest_jump,
        }
    }
}

/// Size and shape of a folded program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FoldStats {
    /// Instructions in the source program.
    pub instructions: usize,
    /// Operations after folding.
    pub ops: usize,
    /// Deepest loop nesting.
    pub max_depth: usize,
    /// Longest forward jump, in operations.
    pub longest_jump: usize,
}

impl fmt::Display for FoldStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "instructions: {}", self.instructions)?;
        writeln!(f, "folded ops:   {}", self.ops)?;
        writeln!(f, "max depth:    {}", self.max_depth)?;
        write!(f, "longest jump: {}", self.longest_jump)
    }
}

/// Fold `program` into counted operations with resolved jumps.
pub fn fold(program: &Program) -> Result<FoldedProgram, MachineError> {
    let code = program.as_bytes();
    let mut ops: Vec<FoldedOp> = Vec::new();
    let mut open: Vec<(usize, usize)> = Vec::new(); // (op index, program ip)
    let mut max_depth = 0;
    let mut ip = 0;

    while ip < code.len() {
        let instr = code[ip];
        let start = ip;
        ip += 1;

        let op = match instr {
            b'+' | b'-' | b'>' | b'<' => {
                while ip < code.len() && code[ip] == instr {
                    ip += 1;
                }
                let count = (ip - start) as isize;
                match instr {
                    b'+' => Op::Add(count as Cell),
                    b'-' => Op::Add(-(count as Cell)),
                    b'>' => Op::Move(count),
                    _ => Op::Move(-count),
                }
            }
            b'.' => Op::Output,
            b',' => Op::Input,
            b'[' => {
                open.push((ops.len(), start));
                max_depth = max_depth.max(open.len());
                // Patched once the matching `]` is seen.
                Op::JumpIfZero(usize::MAX)
            }
            b']' => {
                let Some((open_idx, _)) = open.pop() else {
                    return Err(MachineError::UnmatchedCloseBracket { ip: start });
                };
                let close_idx = ops.len();
                ops[open_idx].op = Op::JumpIfZero(close_idx + 1);
                Op::JumpUnlessZero(open_idx + 1)
            }
            _ => continue,
        };
        ops.push(FoldedOp { op, ip: start });
    }

    if let Some(&(_, open_ip)) = open.last() {
        return Err(MachineError::UnmatchedOpenBracket { ip: open_ip });
    }

    let folded = FoldedProgram {
        ops,
        source_len: code.len(),
        max_depth,
    };
    log::debug!(
        "folded {} instructions into {} ops",
        folded.source_len,
        folded.ops.len()
    );
    Ok(folded)
}

/// Engine that runs a [`FoldedProgram`].
pub struct CompiledMachine<R, W> {
    program: FoldedProgram,
    tape: Tape,
    channels: Channels<R, W>,
    pc: usize,
    mptr: isize,
    steps: u64,
    halted: bool,
}

impl<R: Read, W: Write> CompiledMachine<R, W> {
    /// Fold `program` and build an engine over it.
    pub fn new(program: &Program, config: MachineConfig, input: R, output: W) -> Result<Self, MachineError> {
        Ok(Self::from_folded(fold(program)?, config, input, output))
    }

    pub fn from_folded(program: FoldedProgram, config: MachineConfig, input: R, output: W) -> Self {
        Self {
            program,
            tape: Tape::new(config.memory_size, config.modulus, config.pointer),
            channels: Channels::new(input, output, config.flush_on_write, config.eof),
            pc: 0,
            mptr: 0,
            steps: 0,
            halted: false,
        }
    }

    pub fn folded(&self) -> &FoldedProgram {
        &self.program
    }

    /// Program position of the next op, or `None` once halted.
    pub fn ip(&self) -> Option<usize> {
        self.program.ops.get(self.pc).map(|folded| folded.ip)
    }

    pub fn pointer(&self) -> isize {
        self.mptr
    }

    pub fn tape(&self) -> &[Cell] {
        self.tape.cells()
    }

    pub fn output(&self) -> &W {
        self.channels.output()
    }

    pub fn into_output(self) -> W {
        self.channels.into_output()
    }

    fn cell(&self, ip: usize) -> Result<Cell, MachineError> {
        self.tape
            .get(self.mptr)
            .ok_or(MachineError::TapeIndexOutOfRange { ip, ptr: self.mptr })
    }
}

impl<R: Read, W: Write> Engine for CompiledMachine<R, W> {
    fn step(&mut self) -> Result<Step, MachineError> {
        let Some(&FoldedOp { op, ip }) = self.program.ops.get(self.pc) else {
            if !self.halted {
                self.halted = true;
                log::debug!("halted after {} steps", self.steps);
                self.flush_output()?;
            }
            return Ok(Step::Halted);
        };

        log::trace!("step {} | pc {} | ip {} | ptr {} | {:?}", self.steps, self.pc, ip, self.mptr, op);

        let mut next = self.pc + 1;
        match op {
            Op::Add(delta) => {
                self.tape
                    .add(self.mptr, delta)
                    .ok_or(MachineError::TapeIndexOutOfRange { ip, ptr: self.mptr })?;
            }
            Op::Move(delta) => self.mptr += delta,
            Op::Output => {
                let value = self.cell(ip)?;
                self.channels
                    .write_cell(value)
                    .map_err(|source| MachineError::Io { ip, source })?;
            }
            Op::Input => {
                self.cell(ip)?;
                let value = self
                    .channels
                    .read_cell()
                    .map_err(|source| MachineError::Io { ip, source })?
                    .ok_or(MachineError::InputExhausted { ip })?;
                self.tape.set(self.mptr, value);
            }
            Op::JumpIfZero(target) => {
                if self.cell(ip)? == 0 {
                    next = target;
                }
            }
            Op::JumpUnlessZero(target) => {
                if self.cell(ip)? != 0 {
                    next = target;
                }
            }
        }

        self.pc = next;
        self.steps += 1;
        Ok(Step::Continue)
    }

    fn is_finished(&self) -> bool {
        self.pc >= self.program.ops.len()
    }

    fn flush_output(&mut self) -> Result<(), MachineError> {
        let ip = self.ip().unwrap_or(self.program.source_len);
        self.channels
            .flush()
            .map_err(|source| MachineError::Io { ip, source })
    }

    fn steps(&self) -> u64 {
        self.steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Machine;
    use crate::tape::Modulus;
    use proptest::prelude::*;
    use std::io::{self, Cursor};

    fn ops(code: &str) -> Vec<Op> {
        fold(&Program::parse(code))
            .unwrap()
            .ops()
            .iter()
            .map(|folded| folded.op)
            .collect()
    }

    #[test]
    fn folds_runs_of_repeated_operators() {
        assert_eq!(
            ops("+++-->>><.,"),
            vec![
                Op::Add(3),
                Op::Add(-2),
                Op::Move(3),
                Op::Move(-1),
                Op::Output,
                Op::Input,
            ]
        );
    }

    #[test]
    fn output_and_input_are_never_folded() {
        assert_eq!(ops("..,,"), vec![Op::Output, Op::Output, Op::Input, Op::Input]);
    }

    #[test]
    fn brackets_resolve_to_targets() {
        // 0: Add(2)  1: [ -> 6  2: Add(-1)  3: [ -> 5  4: ] -> 4  5: ] -> 2
        let got = ops("++[-[]]");
        assert_eq!(
            got,
            vec![
                Op::Add(2),
                Op::JumpIfZero(6),
                Op::Add(-1),
                Op::JumpIfZero(5),
                Op::JumpUnlessZero(4),
                Op::JumpUnlessZero(2),
            ]
        );
    }

    #[test]
    fn folded_ops_remember_source_positions() {
        let folded = fold(&Program::parse("++>>.")).unwrap();
        let ips: Vec<usize> = folded.ops().iter().map(|f| f.ip).collect();
        assert_eq!(ips, vec![0, 2, 4]);
    }

    #[test]
    fn unmatched_brackets_are_rejected_at_fold_time() {
        assert!(matches!(
            fold(&Program::parse("+[[]")),
            Err(MachineError::UnmatchedOpenBracket { ip: 1 })
        ));
        assert!(matches!(
            fold(&Program::parse("+]")),
            Err(MachineError::UnmatchedCloseBracket { ip: 1 })
        ));
    }

    #[test]
    fn stats_describe_the_fold() {
        let folded = fold(&Program::parse("++++[>+++[>+<-]<-]")).unwrap();
        let stats = folded.stats();
        assert_eq!(stats.instructions, 18);
        assert_eq!(stats.ops, 13);
        assert_eq!(stats.max_depth, 2);
        assert_eq!(stats.longest_jump, 12);
    }

    #[test]
    fn runs_transfer_loop() {
        let program = Program::parse("++>+++++[<+>-]<.");
        let config = MachineConfig::default().with_memory_size(2);
        let mut m = CompiledMachine::new(&program, config, io::empty(), Vec::new()).unwrap();
        m.run().unwrap();
        assert_eq!(m.output(), &vec![7]);
        assert_eq!(m.tape(), &[7, 0]);
    }

    #[test]
    fn folded_add_faults_at_first_symbol_of_run() {
        let program = Program::parse(">>+++");
        let config = MachineConfig::default().with_memory_size(2);
        let mut m = CompiledMachine::new(&program, config, io::empty(), Vec::new()).unwrap();
        assert!(matches!(m.run(), Err(MachineError::TapeIndexOutOfRange { ip: 2, ptr: 2 })));
    }

    #[test]
    fn exhausted_input_faults() {
        let program = Program::parse(",");
        let mut m = CompiledMachine::new(&program, MachineConfig::default(), io::empty(), Vec::new()).unwrap();
        assert!(matches!(m.run(), Err(MachineError::InputExhausted { ip: 0 })));
    }

    #[test]
    fn halts_and_keeps_reporting_halt() {
        let program = Program::parse("+");
        let mut m = CompiledMachine::new(&program, MachineConfig::default(), io::empty(), Vec::new()).unwrap();
        assert_eq!(m.step().unwrap(), Step::Continue);
        assert_eq!(m.ip(), None);
        assert_eq!(m.step().unwrap(), Step::Halted);
        assert_eq!(m.step().unwrap(), Step::Halted);
    }

    proptest! {
        #[test]
        fn folded_and_interpreted_runs_agree(
            count in 0usize..5,
            body in prop::collection::vec(
                prop_oneof![
                    Just("+"), Just("++"), Just("-"), Just("---"), Just("[-]"),
                    Just(">+<"), Just("[>++<-]"), Just("."), Just(">>.<<"), Just(","),
                ],
                0..10,
            ),
            input in prop::collection::vec(any::<u8>(), 0..8),
        ) {
            let code = format!("{}[>{}<-]>.", "+".repeat(count), body.concat());
            let program = Program::parse(&code);
            let config = MachineConfig::default()
                .with_memory_size(4)
                .with_modulus(Some(Modulus::U8))
                .with_eof(crate::EofPolicy::Zero);

            let mut interpreted = Machine::new(program.clone(), config, Cursor::new(input.clone()), Vec::new());
            let mut compiled = CompiledMachine::new(&program, config, Cursor::new(input), Vec::new()).unwrap();
            interpreted.run().unwrap();
            compiled.run().unwrap();

            prop_assert_eq!(interpreted.tape(), compiled.tape());
            prop_assert_eq!(interpreted.pointer(), compiled.pointer());
            prop_assert_eq!(interpreted.into_output(), compiled.into_output());
        }
    }
}
