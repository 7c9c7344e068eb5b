//! Command implementations for the kiln CLI.
//!
//! - [`dev`] - Watch, rebuild and reload
//! - [`test`] - One-shot browser test run
//!
//! Each command exposes an `execute` function taking its parsed arguments.

pub mod dev;
pub(crate) mod utils;

pub use dev::execute as dev_execute;
pub use test::execute as test_execute;
