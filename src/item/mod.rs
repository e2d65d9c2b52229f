/// Composite readers and writers: fan several sources into one stream, fan
/// one chunk out to several destinations.
pub mod composite;

#[cfg(feature = "csv")]
/// This module provides a CSV item reader and writer.
pub mod csv;

#[cfg(feature = "json")]
/// This module provides a JSON item reader and writer.
pub mod json;

#[cfg(feature = "logger")]
/// This module provides a log-backed item writer, useful for debugging.
pub mod logger;
