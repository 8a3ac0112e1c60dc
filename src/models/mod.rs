pub mod analysis;
pub mod audit;
pub mod catalog;
pub mod checklist;
pub mod evidence;
pub mod finding;
pub mod mapping;

pub use analysis::*;
pub use audit::*;
pub use catalog::*;
pub use checklist::*;
pub use evidence::*;
pub use finding::*;
pub use mapping::*;
