mod rsync_simulator;
mod test_doubles;
mod test_helpers;

pub use test_helpers::{RunContext, run_context};
