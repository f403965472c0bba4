pub mod runner;

pub use runner::{run_tick, start, DigestReport, FiredSlots};
