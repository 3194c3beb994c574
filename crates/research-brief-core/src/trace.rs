//! Per-run tracing: named, timed spans plus run-level metadata.
//!
//! One [`Tracer`] belongs to one run. Spans are opened and closed
//! explicitly; [`Tracer::stage`] wraps a fallible closure so its span is
//! closed on both the success and the error path, with the error text
//! stored under the span's `error` key. [`Tracer::finish`] closes anything
//! still open, so a finalized [`RunTrace`] never has a pending span.

use std::fmt::Display;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Key under which a failed span records its error.
pub const ERROR_KEY: &str = "error";

/// One timed step of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub name: String,
    pub started_at: DateTime<Utc>,
    /// `None` only while the span is open.
    pub ended_at: Option<DateTime<Utc>>,
    pub elapsed_ms: f64,
    #[serde(default)]
    pub meta: Map<String, Value>,
}

impl Span {
    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }

    pub fn error(&self) -> Option<&str> {
        self.meta.get(ERROR_KEY).and_then(Value::as_str)
    }
}

/// Finalized record of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunTrace {
    pub run_id: String,
    pub topic: String,
    pub spans: Vec<Span>,
    #[serde(default)]
    pub meta: Map<String, Value>,
}

impl RunTrace {
    pub fn span(&self, name: &str) -> Option<&Span> {
        self.spans.iter().find(|s| s.name == name)
    }
}

/// Handle to an open span, returned by [`Tracer::begin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanId(usize);

/// Collects spans and metadata for a single run.
#[derive(Debug)]
pub struct Tracer {
    run_id: String,
    topic: String,
    spans: Vec<Span>,
    clocks: Vec<Instant>,
    meta: Map<String, Value>,
}

impl Tracer {
    /// New tracer with a fresh UUID v4 run id.
    pub fn new(topic: &str) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            topic: topic.to_string(),
            spans: Vec::new(),
            clocks: Vec::new(),
            meta: Map::new(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    /// Open a span named `name`.
    pub fn begin(&mut self, name: &str) -> SpanId {
        self.spans.push(Span {
            name: name.to_string(),
            started_at: Utc::now(),
            ended_at: None,
            elapsed_ms: 0.0,
            meta: Map::new(),
        });
        self.clocks.push(Instant::now());
        SpanId(self.spans.len() - 1)
    }

    /// Close a span. Closing an already closed span is a no-op.
    pub fn end(&mut self, id: SpanId) {
        let (Some(span), Some(clock)) = (self.spans.get_mut(id.0), self.clocks.get(id.0)) else {
            return;
        };
        if span.ended_at.is_none() {
            span.ended_at = Some(Utc::now());
            span.elapsed_ms = clock.elapsed().as_secs_f64() * 1000.0;
        }
    }

    /// Record `error` on a span and close it.
    pub fn fail(&mut self, id: SpanId, error: &dyn Display) {
        if let Some(span) = self.spans.get_mut(id.0) {
            span.meta
                .insert(ERROR_KEY.to_string(), Value::String(error.to_string()));
        }
        self.end(id);
    }

    /// Mutable metadata of a span.
    pub fn span_meta(&mut self, id: SpanId) -> Option<&mut Map<String, Value>> {
        self.spans.get_mut(id.0).map(|s| &mut s.meta)
    }

    /// Run `f` inside a span named `name`.
    ///
    /// `f` receives the span's metadata map. The span is closed whether `f`
    /// succeeds or fails; on failure the error (with its context chain) is
    /// recorded before it is returned.
    pub fn stage<T, F>(&mut self, name: &str, f: F) -> anyhow::Result<T>
    where
        F: FnOnce(&mut Map<String, Value>) -> anyhow::Result<T>,
    {
        let id = self.begin(name);
        let mut meta = Map::new();
        let result = f(&mut meta);
        if let Some(span_meta) = self.span_meta(id) {
            span_meta.extend(meta);
        }
        match result {
            Ok(value) => {
                self.end(id);
                Ok(value)
            }
            Err(err) => {
                self.fail(id, &format!("{:#}", err));
                Err(err)
            }
        }
    }

    /// Set a run-level metadata entry.
    pub fn set_meta(&mut self, key: &str, value: impl Into<Value>) {
        self.meta.insert(key.to_string(), value.into());
    }

    pub fn meta(&self) -> &Map<String, Value> {
        &self.meta
    }

    /// Close any open spans and produce the final trace.
    pub fn finish(mut self) -> RunTrace {
        for i in 0..self.spans.len() {
            self.end(SpanId(i));
        }
        RunTrace {
            run_id: self.run_id,
            topic: self.topic,
            spans: self.spans,
            meta: self.meta,
        }
    }
}
