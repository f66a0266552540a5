//! Shared utilities: Arrow column access, atomic file replacement, logging,
//! console output and progress reporting.

pub mod arrow;
pub mod io;
pub mod logging;
