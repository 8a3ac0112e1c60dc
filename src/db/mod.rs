pub mod connection;
pub mod schema;
pub mod catalog;
pub mod audits;
pub mod evidence;
pub mod checklist;
pub mod findings;
pub mod mappings;

pub use connection::Database;
