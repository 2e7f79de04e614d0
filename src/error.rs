use std::fmt;

/// Faults raised while executing a program.
///
/// Every variant is fatal: the engine stops and the run cannot be resumed.
/// `ip` is the position, in the loaded [`Program`](crate::Program), of the
/// instruction that faulted.
#[derive(Debug, thiserror::Error)]
pub enum MachineError {
    /// A `]` was executed with an empty loop-return stack.
    #[error("Unmatched bracket {kind} at instruction {ip}", kind = BracketKind::Close)]
    UnmatchedCloseBracket { ip: usize },

    /// A `[` has no matching `]` before the end of the program.
    #[error("Unmatched bracket {kind} at instruction {ip}", kind = BracketKind::Open)]
    UnmatchedOpenBracket { ip: usize },

    /// A cell was accessed through a pointer outside the tape.
    #[error("Tape index out of range at instruction {ip} (ptr={ptr})")]
    TapeIndexOutOfRange { ip: usize, ptr: isize },

    /// `,` found no more input and no fallback is configured.
    #[error("Input exhausted at instruction {ip}")]
    InputExhausted { ip: usize },

    /// The host input or output failed.
    #[error("I/O error at instruction {ip}: {source}")]
    Io {
        ip: usize,
        #[source]
        source: std::io::Error,
    },
}

impl MachineError {
    /// Position of the faulting instruction.
    pub fn ip(&self) -> usize {
        match self {
            MachineError::UnmatchedCloseBracket { ip }
            | MachineError::UnmatchedOpenBracket { ip }
            | MachineError::TapeIndexOutOfRange { ip, .. }
            | MachineError::InputExhausted { ip }
            | MachineError::Io { ip, .. } => *ip,
        }
    }
}

/// Which side of a loop was unmatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BracketKind {
    Open,
    Close,
}

impl fmt::Display for BracketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BracketKind::Open => write!(f, "'['"),
            BracketKind::Close => write!(f, "']'"),
        }
    }
}
