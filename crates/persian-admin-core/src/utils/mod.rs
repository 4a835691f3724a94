//! Utility functions for string formatting.

pub mod format;

pub use format::{email_local_part, format_remaining, format_timestamp_millis, truncate_string};
