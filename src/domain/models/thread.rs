//! Workspace and thread domain models.
//!
//! Each knowledge source owns exactly one workspace (durable, never deleted
//! here) and one companion thread that runs the data source task. Threads
//! may be deleted by anyone at any time and are recreated on demand.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::naming;

/// Backing storage for a source's ingested content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub name: String,
    pub source_name: String,
    /// Backing storage location, assigned when provisioning completes
    pub workspace_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Workspace {
    pub fn for_source(source_name: &str) -> Self {
        Self {
            name: naming::workspace_name(source_name),
            source_name: source_name.to_string(),
            workspace_id: None,
            created_at: Utc::now(),
        }
    }
}

/// Execution context bound to a single knowledge source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    pub name: String,
    pub source_name: String,
    pub workspace_name: String,
    /// System threads are not shown to users
    pub system_task: bool,
    /// Backing workspace id, populated once the thread is ready
    pub workspace_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Thread {
    pub fn for_source(source_name: &str, workspace_name: &str) -> Self {
        Self {
            name: naming::thread_name(source_name),
            source_name: source_name.to_string(),
            workspace_name: workspace_name.to_string(),
            system_task: true,
            workspace_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.workspace_id.as_deref().is_some_and(|id| !id.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_for_source_is_deterministic() {
        let a = Thread::for_source("docs", "w1-docs");
        let b = Thread::for_source("docs", "w1-docs");
        assert_eq!(a.name, b.name);
        assert!(a.system_task);
        assert!(!a.is_ready());
    }

    #[test]
    fn test_empty_workspace_id_is_not_ready() {
        let mut thread = Thread::for_source("docs", "w1-docs");
        thread.workspace_id = Some(String::new());
        assert!(!thread.is_ready());
        thread.workspace_id = Some("/data/workspaces/w1-docs".to_string());
        assert!(thread.is_ready());
    }
}
