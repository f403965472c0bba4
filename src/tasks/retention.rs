pub mod runner;

pub use runner::{start, sweep, SweepOutcome};
