//! Foreground supervisor for the anonymity daemon.
//!
//! Delegates to [`torvisord::run`], which parses arguments, starts the
//! daemon, waits for bootstrap and stops it again on a termination signal.

use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stderr = io::stderr().lock();
    torvisord::run(std::env::args_os(), &mut stderr)
}
