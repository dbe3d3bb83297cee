pub mod config;
pub mod retry;

pub use config::Config;
pub use retry::{retry_on_throttle, RetryPolicy};
