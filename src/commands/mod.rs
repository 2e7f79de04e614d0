use std::io::{self, Write};
use std::path::PathBuf;

use bfvm::Program;
use clap::Args;

pub mod check;
pub mod run;

/// Where the program text comes from: positional parts or `--file`.
#[derive(Args, Debug)]
pub struct SourceArgs {
    /// Read Brainfuck code from PATH instead of positional "<code>"
    #[arg(short = 'f', long = "file", value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Concatenated Brainfuck code parts; code starting with '-' goes after "--"
    #[arg(value_name = "code")]
    pub code: Vec<String>,
}

/// Outcome of resolving [`SourceArgs`] into a program.
pub enum Source {
    Loaded(Program),
    /// Neither or both of positional code and `--file` were given.
    Usage,
    /// The program file could not be read; the message was printed.
    Failed,
}

impl SourceArgs {
    pub fn load(self, program_name: &str) -> Source {
        let SourceArgs { file, code } = self;
        match (file, code.is_empty()) {
            (None, true) => Source::Usage,
            (Some(_), false) => {
                eprintln!("{program_name}: cannot use positional code together with --file");
                Source::Usage
            }
            (Some(path), true) => match Program::load(&path) {
                Ok(program) => Source::Loaded(program),
                Err(e) => {
                    eprintln!("{program_name}: {e}");
                    let _ = io::stderr().flush();
                    Source::Failed
                }
            },
            (None, false) => Source::Loaded(Program::parse(code.join(""))),
        }
    }
}
