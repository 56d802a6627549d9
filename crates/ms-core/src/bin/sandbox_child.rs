//! Demo sandbox child host.
//!
//! Drivers point `child_program` (or `MOCK_SANDBOX_CHILD`) at this binary to
//! run commands against the demo catalog.

use std::process::ExitCode;

fn main() -> ExitCode {
    ms_core::child::host_main(ms_core::fixtures::demo_catalog())
}
