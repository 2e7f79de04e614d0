//! A small Brainfuck virtual machine.
//!
//! The crate runs programs written in the eight-symbol Brainfuck instruction
//! set on a fixed-length tape of integer cells (100,000 by default).
//!
//! Features and behaviors:
//! - Loading keeps only `><+-.,[]`; every other byte is a comment.
//! - Cells are `i64`. An optional [`Modulus`] (256, 65536 or 2^32) makes `+`
//!   and `-` wrap; without one, arithmetic wraps at the `i64` boundary.
//! - Moving the pointer never fails. Accessing a cell past the end of the tape
//!   is a fault; a negative pointer aliases cells from the end of the tape
//!   unless [`PointerMode::Strict`] is configured.
//! - `.` writes the low byte of the current cell and flushes by default.
//! - `,` reads one byte; end of input is a fault unless [`EofPolicy::Zero`]
//!   is configured.
//! - Loops are matched lazily, with skip targets memoized per `[`.
//! - Every fault is a [`MachineError`] carrying the faulting instruction's
//!   position.
//!
//! Two engines implement [`Engine`]: the interpreting [`Machine`] and the
//! run-length folding [`CompiledMachine`].
//!
//! Quick start:
//!
//! ```
//! use bfvm::{Engine, Machine, MachineConfig, Program};
//!
//! // Classic "Hello World!" in Brainfuck
//! let code = "++++++++++[>+++++++>++++++++++>+++>+<<<<-]>++.>+.+++++++..+++.>++.<<+++++++++++++++.>.+++.------.--------.>+.>.";
//! let mut bf = Machine::new(Program::parse(code), MachineConfig::default(), std::io::empty(), Vec::new());
//! bf.run().expect("program should run");
//! assert_eq!(bf.output().as_slice(), b"Hello World!\n");
//! ```

pub mod channels;
pub mod compiled;
pub mod config;
pub mod engine;
pub mod error;
pub mod machine;
pub mod program;
pub mod tape;

pub use channels::EofPolicy;
pub use compiled::{CompiledMachine, FoldStats, FoldedProgram, Op, fold};
pub use config::{ConfigError, MachineConfig, Settings};
pub use engine::{Engine, Step};
pub use error::{BracketKind, MachineError};
pub use machine::Machine;
pub use program::{Program, ProgramError};
pub use tape::{Cell, DEFAULT_MEMORY_SIZE, Modulus, PointerMode};
