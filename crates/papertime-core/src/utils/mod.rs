//! Utility functions for display formatting.

pub mod format;

// Re-export commonly used functions at module level
pub use format::{format_countdown, format_date, format_elapsed, truncate_string};
