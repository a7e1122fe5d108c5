mod retry;
mod urls;

pub use retry::{retry_with_backoff, RetryPolicy, TransientError};
pub use urls::{absolute_http_url, flatten_metadata};
