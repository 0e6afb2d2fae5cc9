//! Output helpers shared by subcommands.
//!
//! Global flags are passed through the environment so every command sees
//! the same settings without threading them through each signature.

use serde::Serialize;

pub fn is_json() -> bool {
    std::env::var_os("PITCHKIT_JSON").is_some()
}

pub fn is_quiet() -> bool {
    std::env::var_os("PITCHKIT_QUIET").is_some()
}

/// Pretty-print a value as JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("  Error: failed to serialize output: {e}"),
    }
}

/// Status line on stderr, suppressed by `--quiet` and `--json`.
pub fn note(msg: &str) {
    if !is_quiet() && !is_json() {
        eprintln!("  {msg}");
    }
}
