use std::io::{self, BufWriter, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;

use bfvm::{
    CompiledMachine, Engine, EofPolicy, Machine, MachineConfig, MachineError, Modulus,
    PointerMode, Program, Settings, Step,
};
use clap::Args;

use super::{Source, SourceArgs};
use crate::cli_util::print_machine_error;

pub const MAX_STEPS_ENV: &str = "BF_MAX_STEPS";
pub const TIMEOUT_ENV: &str = "BF_TIMEOUT_MS";

/// Exit status used when SIGINT stops a run.
const INTERRUPTED_EXIT: i32 = 130;

/// How long the SIGINT handler waits for the worker to flush before exiting.
const INTERRUPT_GRACE: Duration = Duration::from_millis(200);

#[derive(Args, Debug)]
#[command(disable_help_flag = true)]
pub struct RunArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Number of tape cells (default 100000)
    #[arg(short = 'm', long = "memory", value_name = "CELLS")]
    pub memory: Option<usize>,

    /// Cell wraparound: 256, 65536, 4294967296 or "none"
    #[arg(long = "modulus", value_name = "N", value_parser = parse_modulus)]
    pub modulus: Option<ModulusArg>,

    /// Flush output only when the run ends (also on fault, abort and ctrl+c)
    #[arg(short = 'b', long = "buffered")]
    pub buffered: bool,

    /// Behavior of ',' at end of input
    #[arg(long = "eof", value_enum, value_name = "POLICY")]
    pub eof: Option<EofPolicy>,

    /// Treat a negative cell pointer as out of range
    #[arg(long = "strict-pointer")]
    pub strict_pointer: bool,

    /// Run the run-length folded program instead of interpreting
    #[arg(short = 'c', long = "compiled")]
    pub compiled: bool,

    /// Maximum instructions before abort (fallback BF_MAX_STEPS; default unlimited)
    #[arg(long = "max-steps", value_name = "N")]
    pub max_steps: Option<u64>,

    /// Wall-clock timeout in milliseconds (fallback BF_TIMEOUT_MS; default unlimited)
    #[arg(long = "timeout", value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Show this help
    #[arg(short = 'h', long = "help", action = clap::ArgAction::SetTrue)]
    pub help: bool,
}

/// `--modulus` value; `None` is "none".
#[derive(Debug, Clone, Copy)]
pub struct ModulusArg(pub Option<Modulus>);

fn parse_modulus(s: &str) -> Result<ModulusArg, String> {
    if s.eq_ignore_ascii_case("none") {
        return Ok(ModulusArg(None));
    }
    let value: u64 = s
        .parse()
        .map_err(|_| format!("expected 256, 65536, 4294967296 or none, got '{s}'"))?;
    Modulus::try_from(value)
        .map(|m| ModulusArg(Some(m)))
        .map_err(|e| e.to_string())
}

/// Reasons a run ended without completing.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Machine(#[from] MachineError),

    #[error("Execution aborted: step limit exceeded ({limit})")]
    StepLimitExceeded { limit: u64 },

    #[error("Execution aborted: wall-clock timeout exceeded ({ms} ms)")]
    TimedOut { ms: u128 },

    #[error("Execution aborted: cancelled")]
    Canceled,

    #[error("Execution aborted: engine thread stopped unexpectedly")]
    WorkerLost,
}

/// Caller-side limits on one run.
#[derive(Debug, Clone, Copy, Default)]
pub struct Limits {
    pub max_steps: Option<u64>,
    pub timeout: Option<Duration>,
}

pub fn run(program_name: &str, args: RunArgs) -> i32 {
    if args.help {
        usage_and_exit(program_name, 0);
    }

    let settings = match Settings::load() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{program_name}: {e}");
            let _ = io::stderr().flush();
            return 1;
        }
    };

    let config = resolve_config(&args, &settings);
    if let Err(e) = config.validate() {
        eprintln!("{program_name}: {e}");
        usage_and_exit(program_name, 2);
    }
    let limits = resolve_limits(&args, &settings);
    let compiled = args.compiled;

    let program = match args.source.load(program_name) {
        Source::Loaded(p) => p,
        Source::Usage => usage_and_exit(program_name, 2),
        Source::Failed => return 1,
    };
    let code_str = program.to_string();

    // SIGINT (ctrl+c) cancels the worker so it flushes its sink; if it is
    // blocked on input the handler exits on its own after a grace period.
    let cancel = Arc::new(AtomicBool::new(false));
    let interrupted = Arc::new(AtomicBool::new(false));
    let handler_cancel = cancel.clone();
    let handler_interrupted = interrupted.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        handler_interrupted.store(true, Ordering::SeqCst);
        handler_cancel.store(true, Ordering::SeqCst);
        thread::sleep(INTERRUPT_GRACE);
        let _ = io::stdout().flush();
        let _ = io::stderr().flush();
        std::process::exit(INTERRUPTED_EXIT);
    }) {
        eprintln!("{program_name}: failed to set ctrl+c handler: {e}");
        let _ = io::stderr().flush();
        return 1;
    }

    let engine = match build_engine(&program, config, compiled) {
        Ok(engine) => engine,
        Err(err) => {
            print_machine_error(Some(program_name), &code_str, &err);
            return 1;
        }
    };

    let result = execute(engine, limits, cancel);
    if interrupted.load(Ordering::SeqCst) {
        let _ = io::stdout().flush();
        return INTERRUPTED_EXIT;
    }
    match result {
        Ok(steps) => {
            log::debug!("run completed in {steps} steps");
            0
        }
        Err(RunError::Machine(err)) => {
            print_machine_error(Some(program_name), &code_str, &err);
            1
        }
        Err(err) => {
            eprintln!("{err}");
            let _ = io::stderr().flush();
            1
        }
    }
}

/// Flags, then the settings file, then defaults.
pub fn resolve_config(args: &RunArgs, settings: &Settings) -> MachineConfig {
    let mut config = settings.machine_config(MachineConfig::default());
    if let Some(memory) = args.memory {
        config.memory_size = memory;
    }
    if let Some(ModulusArg(modulus)) = args.modulus {
        config.modulus = modulus;
    }
    if args.buffered {
        config.flush_on_write = false;
    }
    if let Some(eof) = args.eof {
        config.eof = eof;
    }
    if args.strict_pointer {
        config.pointer = PointerMode::Strict;
    }
    config
}

/// Flags, then environment, then the settings file.
pub fn resolve_limits(args: &RunArgs, settings: &Settings) -> Limits {
    let env_u64 = |key: &str| std::env::var(key).ok().and_then(|s| s.parse::<u64>().ok());

    let max_steps = args
        .max_steps
        .or_else(|| env_u64(MAX_STEPS_ENV))
        .or(settings.limits.max_steps);
    let timeout_ms = args
        .timeout_ms
        .or_else(|| env_u64(TIMEOUT_ENV))
        .or(settings.limits.timeout_ms);

    Limits {
        max_steps,
        timeout: timeout_ms.map(Duration::from_millis),
    }
}

type BoxedEngine = Box<dyn Engine + Send>;

fn build_engine(program: &Program, config: MachineConfig, compiled: bool) -> Result<BoxedEngine, MachineError> {
    let output: Box<dyn Write + Send> = if config.flush_on_write {
        Box::new(io::stdout())
    } else {
        Box::new(BufWriter::new(io::stdout()))
    };

    if compiled {
        let engine = CompiledMachine::new(program, config, io::stdin(), output)?;
        log::debug!("{}", engine.folded().stats().to_string().replace('\n', ", "));
        Ok(Box::new(engine))
    } else {
        Ok(Box::new(Machine::new(program.clone(), config, io::stdin(), output)))
    }
}

/// Run `engine` on a worker thread, enforcing `limits`. Returns the step count.
fn execute(mut engine: BoxedEngine, limits: Limits, cancel: Arc<AtomicBool>) -> Result<u64, RunError> {
    let (tx, rx) = mpsc::channel::<Result<u64, RunError>>();
    let cancel_clone = cancel.clone();

    thread::spawn(move || {
        let res = drive(engine.as_mut(), limits.max_steps, &cancel_clone);
        let _ = tx.send(res);
    });

    let Some(timeout) = limits.timeout else {
        return rx.recv().unwrap_or(Err(RunError::WorkerLost));
    };

    match rx.recv_timeout(timeout) {
        Ok(res) => res,
        Err(mpsc::RecvTimeoutError::Timeout) => {
            cancel.store(true, Ordering::Relaxed);
            // Give the worker a moment to flush buffered output; it may be
            // blocked on input, so don't wait for it indefinitely.
            let _ = rx.recv_timeout(Duration::from_millis(100));
            Err(RunError::TimedOut {
                ms: timeout.as_millis(),
            })
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(RunError::WorkerLost),
    }
}

/// Step `engine` until it halts, faults, exceeds `max_steps` or is cancelled.
pub fn drive(engine: &mut dyn Engine, max_steps: Option<u64>, cancel: &AtomicBool) -> Result<u64, RunError> {
    let result = loop {
        // Cooperative cancellation check
        if cancel.load(Ordering::Relaxed) {
            break Err(RunError::Canceled);
        }

        if let Some(limit) = max_steps {
            if !engine.is_finished() && engine.steps() >= limit {
                break Err(RunError::StepLimitExceeded { limit });
            }
        }

        match engine.step() {
            Ok(Step::Continue) => {}
            Ok(Step::Halted) => break Ok(engine.steps()),
            Err(err) => break Err(RunError::Machine(err)),
        }
    };

    if result.is_err() {
        let _ = engine.flush_output();
    }
    result
}

fn usage_and_exit(program: &str, code: i32) -> ! {
    eprintln!(
        r#"Usage:
  {0} run [OPTIONS] "<code>"
  {0} run [OPTIONS] --file <PATH>

Options:
  --file,  -f <PATH>   Read Brainfuck code from PATH instead of positional "<code>"
  --memory, -m <CELLS> Number of tape cells (default 100000)
  --modulus <N>        Cell wraparound: 256, 65536, 4294967296 or none (default none)
  --buffered, -b       Flush output only when the run ends
  --eof <POLICY>       ',' at end of input: fault (default) or zero
  --strict-pointer     Treat a negative cell pointer as out of range
  --compiled, -c       Run the run-length folded program
  --max-steps <N>      Abort after N instructions (fallback BF_MAX_STEPS)
  --timeout <MS>       Abort after MS milliseconds (fallback BF_TIMEOUT_MS)
  --verbose, -v        Log to stderr; repeat for per-instruction tracing
  --help,  -h          Show this help

Notes:
- Only ><+-.,[] are instructions; every other character is ignored.
- Input (`,`) reads a single byte from stdin.
- Without --modulus, cells are signed 64-bit integers.
- Defaults can be set in $BF_CONFIG or <config home>/bfvm.toml.

Examples:
- Load Brainfuck code from a file:
    {0} run --file ./program.bf
- Read bytes from a file as stdin (`,` will consume file input):
    {0} run --eof zero ",[.,]" < input.txt
"#,
        program
    );
    let _ = io::stderr().flush();
    std::process::exit(code);
}
