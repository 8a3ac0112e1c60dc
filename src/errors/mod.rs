pub mod types;
pub mod classification;
pub mod retry;

pub use types::AttestError;
pub use classification::ErrorClassification;
pub use retry::{retry_write, RetryConfig, with_retry};
