pub mod builder;
pub mod loader;

pub use builder::{deterministic_seed, PromptBuilder};
pub use loader::{PromptLoader, PromptVariables};
