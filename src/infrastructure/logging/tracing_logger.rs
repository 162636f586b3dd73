//! `Logger` port backed by the global tracing subscriber.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::domain::ports::{Level, Logger};

/// Forwards structured log calls to `tracing`, with the field map rendered
/// as a single JSON `fields` value.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl TracingLogger {
    pub fn new() -> Self {
        Self
    }
}

fn render_fields(fields: HashMap<String, Value>) -> String {
    let mut sorted: Vec<_> = fields.into_iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));
    Value::Object(sorted.into_iter().collect::<Map<String, Value>>()).to_string()
}

#[async_trait]
impl Logger for TracingLogger {
    async fn log(&self, level: Level, message: &str, fields: HashMap<String, Value>) {
        if fields.is_empty() {
            match level {
                Level::Debug => tracing::debug!("{message}"),
                Level::Info => tracing::info!("{message}"),
                Level::Warn => tracing::warn!("{message}"),
                Level::Error => tracing::error!("{message}"),
            }
            return;
        }

        let fields = render_fields(fields);
        match level {
            Level::Debug => tracing::debug!(fields = %fields, "{message}"),
            Level::Info => tracing::info!(fields = %fields, "{message}"),
            Level::Warn => tracing::warn!(fields = %fields, "{message}"),
            Level::Error => tracing::error!(fields = %fields, "{message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_fields;

    #[test]
    fn test_fields_render_in_key_order() {
        let rendered = render_fields(log_fields!("source" => "docs", "error" => "boom"));
        assert_eq!(rendered, r#"{"error":"boom","source":"docs"}"#);
    }

    #[tokio::test]
    async fn test_log_without_subscriber_is_noop() {
        let logger = TracingLogger::new();
        logger.log(Level::Info, "hello", log_fields!("n" => 1)).await;
        logger.warn("plain").await;
    }
}
