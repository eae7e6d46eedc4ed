mod command;
mod runner;

pub use command::Command;
pub use runner::{OutputMode, run, run_with_format};
