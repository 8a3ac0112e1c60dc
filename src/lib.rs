pub mod api;
pub mod cli;
pub mod config;
pub mod db;
pub mod enrichment;
pub mod errors;
pub mod evaluation;
pub mod extract;
pub mod fanout;
pub mod ingest;
pub mod jobs;
pub mod llm;
pub mod models;
pub mod notify;
pub mod prompts;
pub mod requirements;
pub mod sebi;
pub mod utils;
