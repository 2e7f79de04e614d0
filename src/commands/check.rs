use std::io::{self, Write};

use bfvm::fold;
use clap::Args;

use super::{Source, SourceArgs};
use crate::cli_util::print_machine_error;

#[derive(Args, Debug)]
#[command(disable_help_flag = true)]
pub struct CheckArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Show this help
    #[arg(short = 'h', long = "help", action = clap::ArgAction::SetTrue)]
    pub help: bool,
}

pub fn run(program_name: &str, args: CheckArgs) -> i32 {
    if args.help {
        usage_and_exit(program_name, 0);
    }

    let program = match args.source.load(program_name) {
        Source::Loaded(p) => p,
        Source::Usage => usage_and_exit(program_name, 2),
        Source::Failed => return 1,
    };

    match fold(&program) {
        Ok(folded) => {
            let stats = folded.stats();
            println!("{stats}");
            let _ = io::stdout().flush();
            0
        }
        Err(err) => {
            print_machine_error(Some(program_name), &program.to_string(), &err);
            1
        }
    }
}

fn usage_and_exit(program: &str, code: i32) -> ! {
    eprintln!(
        r#"Usage:
  {0} check "<code>"
  {0} check --file <PATH>

Options:
  --file,  -f <PATH>  Read Brainfuck code from PATH instead of positional "<code>"
  --help,  -h         Show this help

Description:
  Folds runs of repeated +-<> and resolves every loop without running the
  program, then prints the instruction count, folded op count, deepest loop
  nesting and longest jump. Unmatched brackets are reported with their
  position and the command exits with status 1.
"#,
        program
    );
    let _ = io::stderr().flush();
    std::process::exit(code);
}
