//! Utility functions for string formatting.

pub mod format;

pub use format::{format_date, format_optional, format_remaining, mask_secret, truncate_string};
