use std::env;
use std::io::{self, Write};

use clap::{Parser, Subcommand};

mod cli_util;
mod commands;

use commands::check::CheckArgs;
use commands::run::RunArgs;

/// Environment variable holding the `env_logger` filter.
const LOG_ENV: &str = "BF_LOG";

fn print_top_usage_and_exit(program: &str, code: i32) -> ! {
    eprintln!(
        r#"Usage:
  {0} run   [OPTIONS] "<code>"      # Run Brainfuck code (args are concatenated)
  {0} run   [OPTIONS] --file <PATH> # Run Brainfuck code loaded from file
  {0} check "<code>"                # Validate loops and report folding statistics
  {0} check --file <PATH>

Global options:
  --verbose, -v   Log to stderr (-v debug, -vv per-instruction trace; or set BF_LOG)

Run "{0} <subcommand> --help" for more info.
"#,
        program
    );
    let _ = io::stderr().flush();
    std::process::exit(code);
}

#[derive(Parser, Debug)]
#[command(name = "bf", disable_help_flag = true, disable_help_subcommand = true)]
struct Cli {
    /// Show this help
    #[arg(short = 'h', long = "help", action = clap::ArgAction::SetTrue)]
    help: bool,

    /// Increase log verbosity
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    Run(RunArgs),
    Check(CheckArgs),
}

fn init_logging(verbose: u8) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().filter_or(LOG_ENV, "warn"));
    match verbose {
        0 => {}
        1 => {
            builder.filter_level(log::LevelFilter::Debug);
        }
        _ => {
            builder.filter_level(log::LevelFilter::Trace);
        }
    }
    builder
        .format_timestamp(None)
        .target(env_logger::Target::Stderr)
        .init();
}

fn main() {
    // We still pull the program name for help rendering consistency
    let program = env::args().next().unwrap_or_else(|| String::from("bf"));

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let Some(command) = cli.command else {
        print_top_usage_and_exit(&program, if cli.help { 0 } else { 2 });
    };
    if cli.help {
        print_top_usage_and_exit(&program, 0);
    }

    let code = match command {
        Command::Run(args) => commands::run::run(&program, args),
        Command::Check(args) => commands::check::run(&program, args),
    };

    std::process::exit(code);
}
