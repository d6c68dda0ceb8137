//! Utility modules: deadlines and cancellation.

pub mod timeout;

pub use timeout::{until_cancelled, with_optional_timeout, with_timeout};
