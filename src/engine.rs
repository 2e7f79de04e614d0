use crate::error::MachineError;

/// Outcome of a successful single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// An instruction was executed; more may follow.
    Continue,
    /// The instruction pointer is past the end of the program.
    Halted,
}

/// Common driving interface of the interpreting and folded engines.
pub trait Engine {
    /// Execute one instruction.
    ///
    /// Once the program is exhausted every call returns `Ok(Step::Halted)`.
    fn step(&mut self) -> Result<Step, MachineError>;

    /// `true` once no instruction is left to execute.
    fn is_finished(&self) -> bool;

    /// Flush any output still held by the sink.
    fn flush_output(&mut self) -> Result<(), MachineError>;

    /// Number of instructions executed so far.
    fn steps(&self) -> u64;

    /// Run until the program halts or faults.
    ///
    /// Output is flushed before returning in both cases.
    fn run(&mut self) -> Result<(), MachineError> {
        loop {
            match self.step() {
                Ok(Step::Continue) => {}
                Ok(Step::Halted) => return self.flush_output(),
                Err(err) => {
                    // The fault is what the caller needs to see.
                    let _ = self.flush_output();
                    return Err(err);
                }
            }
        }
    }
}
