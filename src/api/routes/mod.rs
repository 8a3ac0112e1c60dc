pub mod audits;
pub mod documents;
pub mod fanout;
pub mod health;
pub mod sebi;
