//! Binary entrypoint for the Chatify terminal chat.

use std::process::ExitCode;

use chatify::start_chatify;

/// Collect or load the profile, index it, then chat on stdin/stdout.
fn main() -> ExitCode {
    start_chatify::run()
}
