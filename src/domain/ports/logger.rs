use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

/// Log level enumeration for structured logging
///
/// Levels are ordered from most verbose (Debug) to most severe (Error).
///
/// # Examples
///
/// ```
/// use knowledge_sync::domain::ports::Level;
///
/// assert!(Level::Error > Level::Info);
/// assert_eq!(Level::Warn.as_str(), "WARN");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

impl Level {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

/// Structured logging capability injected into services.
///
/// Services receive an `Arc<dyn Logger>` at construction instead of reaching
/// for a process-wide logger, so tests can capture what a reconciliation
/// pass reported.
///
/// # Field Guidelines
///
/// - `source`: name of the knowledge source being reconciled
/// - `thread`: name of the companion thread
/// - `run`: run identifier of the active task
/// - `error`: error details for warn/error logs
#[async_trait]
pub trait Logger: Send + Sync {
    /// Log a message with a specific level and structured fields
    async fn log(&self, level: Level, message: &str, fields: HashMap<String, Value>);

    async fn debug(&self, message: &str) {
        self.log(Level::Debug, message, HashMap::new()).await;
    }

    async fn info(&self, message: &str) {
        self.log(Level::Info, message, HashMap::new()).await;
    }

    async fn warn(&self, message: &str) {
        self.log(Level::Warn, message, HashMap::new()).await;
    }

    async fn error(&self, message: &str) {
        self.log(Level::Error, message, HashMap::new()).await;
    }
}

/// Build a field map from `key => value` pairs.
#[macro_export]
macro_rules! log_fields {
    ($($key:expr => $value:expr),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut fields = ::std::collections::HashMap::<String, ::serde_json::Value>::new();
        $(fields.insert($key.to_string(), ::serde_json::json!($value));)*
        fields
    }};
}
