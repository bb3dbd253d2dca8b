//! Utilities: logging setup for host applications and tests

pub mod logging;
pub mod testing;
