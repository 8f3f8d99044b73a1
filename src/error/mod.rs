mod flags;

pub use flags::FlagsError;
pub use gmsflags_schema::{ApiErrorBody, ApiErrorObject};

pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}
