pub mod runner;

pub use runner::{run_cycle, start, IngestReport};
