//! Logging infrastructure
//!
//! Structured logging using tracing and tracing-subscriber:
//! - Pretty or JSON console output on stderr
//! - Rolling JSON log files via tracing-appender
//! - A `Logger` port implementation for services

pub mod logger;
pub mod tracing_logger;

pub use logger::LoggerImpl;
pub use tracing_logger::TracingLogger;
