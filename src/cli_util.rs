use std::io::{self, Write};

use bfvm::MachineError;

/// Pretty-print a [`MachineError`] with caret positioning.
/// If `program` is `Some("bf")`, messages are prefixed with "bf: ...".
pub fn print_machine_error(program: Option<&str>, code: &str, err: &MachineError) {
    let prefix_program = |msg: &str| {
        if let Some(p) = program {
            format!("{p}: {msg}")
        } else {
            msg.to_string()
        }
    };

    let msg = match err {
        MachineError::UnmatchedCloseBracket { .. } => {
            prefix_program("Parse error: unmatched bracket ']'")
        }
        MachineError::UnmatchedOpenBracket { .. } => {
            prefix_program("Parse error: unmatched bracket '['")
        }
        MachineError::TapeIndexOutOfRange { ptr, .. } => {
            prefix_program(&format!("Runtime error: tape index out of range (ptr={ptr})"))
        }
        MachineError::InputExhausted { .. } => prefix_program("Runtime error: input exhausted"),
        MachineError::Io { source, .. } => prefix_program(&format!("I/O error: {source}")),
    };
    print_error_with_context(&msg, code, err.ip());
}

/// Print a concise error with instruction index and a caret context window.
///
/// `code` is the filtered program text, so `pos` indexes it directly.
pub fn print_error_with_context(prefix: &str, code: &str, pos: usize) {
    eprintln!("{prefix} at instruction {pos}");

    // Show a short window around the position for context
    const WINDOW_CHARS: usize = 32;

    let total_chars = code.chars().count();
    let start_char = pos.saturating_sub(WINDOW_CHARS);
    let end_char = (pos + WINDOW_CHARS + 1).min(total_chars);
    if start_char >= end_char {
        let _ = io::stderr().flush();
        return;
    }

    let slice: String = code.chars().skip(start_char).take(end_char - start_char).collect();
    eprintln!("  {slice}");

    let caret_offset_chars = pos - start_char;
    eprintln!("  {}^", " ".repeat(caret_offset_chars));
    let _ = io::stderr().flush();
}
