//! Audit logging for served requests
//!
//! Records every authorized request the bunker dispatches and every
//! response it publishes to a local log file for security review.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// Audit log entry
#[derive(Debug, Serialize)]
struct AuditEntry {
    timestamp: String,
    operation: String,
    details: String,
}

/// Append-only audit log for bunker operations
pub struct AuditLog {
    path: PathBuf,
    enabled: bool,
}

impl AuditLog {
    /// Create an audit log next to the given config path
    pub fn new(config_path: &Path) -> Self {
        let path = config_path.with_extension("audit.jsonl");
        Self {
            path,
            enabled: true,
        }
    }

    /// Create a disabled audit log (for testing)
    pub fn disabled() -> Self {
        Self {
            path: PathBuf::from("/dev/null"),
            enabled: false,
        }
    }

    /// Record an audit event
    pub fn record(&mut self, operation: &str, details: &str) {
        if !self.enabled {
            return;
        }

        let entry = AuditEntry {
            timestamp: chrono::Utc::now().to_rfc3339(),
            operation: operation.to_string(),
            details: details.to_string(),
        };

        // Best-effort append — don't fail the request if audit logging fails
        if let Ok(json) = serde_json::to_string(&entry) {
            if let Ok(mut file) = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
            {
                let _ = writeln!(file, "{}", json);
            }
        }
    }

    /// Get the audit log file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}
