pub mod check;
pub mod commands;
pub mod import;
pub mod output;
pub mod sebi;
pub mod serve;

pub use commands::{Cli, Commands};
