pub mod resolver;

pub use resolver::{RequirementResolver, RequirementScope};
