//! JSON run store.
//!
//! Every finished run is written twice under the runs directory:
//! - `<run_id>.json`: the pretty-printed [`RunTrace`].
//! - `runs.jsonl`: one compact line per run, `{"ts": <unix secs>, ...trace}`.
//!
//! The directory is created on first write. Appends are serialized through
//! a mutex so concurrent runs sharing one store never interleave lines.

use anyhow::{Context, Result};
use research_brief_core::{RunTrace, TraceSink};
use serde_json::{Map, Value};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// File name of the append-only run log.
pub const RUN_LOG: &str = "runs.jsonl";

pub struct JsonRunStore {
    dir: PathBuf,
    log_lock: Mutex<()>,
}

impl JsonRunStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            log_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn log_line(trace: &RunTrace) -> Result<String> {
        let mut line = Map::new();
        line.insert("ts".to_string(), Value::from(chrono::Utc::now().timestamp()));
        if let Value::Object(fields) = serde_json::to_value(trace)? {
            line.extend(fields);
        }
        Ok(serde_json::to_string(&Value::Object(line))?)
    }
}

impl TraceSink for JsonRunStore {
    fn persist(&self, trace: &RunTrace) -> Result<String> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create runs directory: {}", self.dir.display()))?;

        let path = self.dir.join(format!("{}.json", trace.run_id));
        let pretty = serde_json::to_string_pretty(trace)?;
        std::fs::write(&path, pretty)
            .with_context(|| format!("Failed to write trace: {}", path.display()))?;

        let line = Self::log_line(trace)?;
        let log_path = self.dir.join(RUN_LOG);
        {
            let _guard = self
                .log_lock
                .lock()
                .map_err(|_| anyhow::anyhow!("run log lock poisoned"))?;
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_path)
                .with_context(|| format!("Failed to open run log: {}", log_path.display()))?;
            writeln!(file, "{}", line)?;
        }

        tracing::debug!(run_id = %trace.run_id, path = %path.display(), "trace persisted");
        Ok(path.display().to_string())
    }
}
