//! Process control for the collaborators under test
//!
//! Spawns the client and server executables, exposes their output streams,
//! waits on them with deadlines and tears them down.

mod handle;
mod readiness;

pub use handle::{exit_code, resolve_program, OutputDrain, ProcessHandle, Signal};
pub use readiness::wait_for_listener;
