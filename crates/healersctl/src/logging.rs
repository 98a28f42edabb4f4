//! Invocation log for healersctl
//!
//! One JSON line per command, appended to an XDG state file.

use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

const LOG_DIR: &str = "highway-healers";
const LOG_FILE: &str = "ctl.jsonl";

/// Log entry for each healersctl invocation
#[derive(Debug, Serialize, Deserialize)]
pub struct LogEntry {
    /// ISO 8601 timestamp
    pub ts: String,

    /// Request ID (UUID)
    pub req_id: String,

    /// Command name
    pub command: String,

    /// Command arguments
    #[serde(default)]
    pub args: Vec<String>,

    pub exit_code: i32,

    pub duration_ms: u64,

    pub ok: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetails>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Error kind, e.g. "configuration" or "validation"
    pub code: String,
    pub message: String,
}

impl LogEntry {
    pub fn new(command: &str, args: Vec<String>) -> Self {
        Self {
            ts: Self::now(),
            req_id: Self::generate_req_id(),
            command: command.to_string(),
            args,
            exit_code: 0,
            duration_ms: 0,
            ok: true,
            error: None,
        }
    }

    /// Record how the command ended
    pub fn finish(mut self, exit_code: i32, duration_ms: u64, error: Option<ErrorDetails>) -> Self {
        self.exit_code = exit_code;
        self.duration_ms = duration_ms;
        self.ok = exit_code == 0;
        self.error = error;
        self
    }

    /// Discover log file path with fallback chain
    ///
    /// Priority:
    /// 1. $HEALERSCTL_LOG_FILE (explicit override)
    /// 2. $XDG_STATE_HOME/highway-healers/ctl.jsonl
    /// 3. ~/.local/state/highway-healers/ctl.jsonl
    pub fn discover_log_path<F>(lookup: F) -> Option<PathBuf>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("HEALERSCTL_LOG_FILE") {
            return Some(PathBuf::from(path));
        }

        if let Some(xdg_state) = lookup("XDG_STATE_HOME") {
            return Some(Path::new(&xdg_state).join(LOG_DIR).join(LOG_FILE));
        }

        lookup("HOME").map(|home| {
            Path::new(&home)
                .join(".local/state")
                .join(LOG_DIR)
                .join(LOG_FILE)
        })
    }

    /// Append to the log file found through `lookup`. Logging never fails
    /// the command; if the file cannot be written the line is dropped with a
    /// debug trace.
    pub fn write<F>(&self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let Some(path) = Self::discover_log_path(lookup) else {
            return;
        };
        if let Err(e) = self.write_to(&path) {
            tracing::debug!("Could not write invocation log {}: {}", path.display(), e);
        }
    }

    pub fn write_to(&self, path: &Path) -> Result<(), std::io::Error> {
        let json = serde_json::to_string(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", json)?;
        Ok(())
    }

    pub fn generate_req_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    pub fn now() -> String {
        chrono::Utc::now().to_rfc3339()
    }
}
