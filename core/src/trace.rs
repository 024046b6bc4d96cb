//! C9 — pipeline trace. Opt-in per-stage timer and summary, embedded in the
//! response when enabled (spec.md §4.8). The no-op path and the recording
//! path share one interface so enabling tracing is a construction decision,
//! not a cross-cutting rewrite (§9 design note).

use std::time::Instant;

use models::{PipelineTrace, StageTrace};

pub trait Trace: Send {
    fn stage(&mut self, name: &str) -> StageHandle<'_>;
    fn into_pipeline_trace(self: Box<Self>) -> Option<PipelineTrace>;
}

pub struct StageHandle<'a> {
    name: String,
    started: Instant,
    summary: Option<serde_json::Value>,
    warnings: Vec<String>,
    sink: &'a mut Vec<StageTrace>,
    enabled: bool,
}

impl<'a> StageHandle<'a> {
    pub fn record_summary(&mut self, summary: serde_json::Value) {
        if self.enabled {
            self.summary = Some(summary);
        }
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        if self.enabled {
            self.warnings.push(message.into());
        }
    }
}

impl<'a> Drop for StageHandle<'a> {
    fn drop(&mut self) {
        if !self.enabled {
            return;
        }
        let duration_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        self.sink.push(StageTrace {
            name: std::mem::take(&mut self.name),
            duration_ms,
            summary: self.summary.take(),
            warnings: std::mem::take(&mut self.warnings),
        });
    }
}

/// Records real timings and summaries.
#[derive(Default)]
pub struct RecordingTrace {
    stages: Vec<StageTrace>,
}

impl Trace for RecordingTrace {
    fn stage(&mut self, name: &str) -> StageHandle<'_> {
        StageHandle {
            name: name.to_string(),
            started: Instant::now(),
            summary: None,
            warnings: Vec::new(),
            sink: &mut self.stages,
            enabled: true,
        }
    }

    fn into_pipeline_trace(self: Box<Self>) -> Option<PipelineTrace> {
        Some(PipelineTrace { stages: self.stages })
    }
}

/// All operations are no-ops; used when the request didn't opt in.
#[derive(Default)]
pub struct NoopTrace {
    discard: Vec<StageTrace>,
}

impl Trace for NoopTrace {
    fn stage(&mut self, name: &str) -> StageHandle<'_> {
        StageHandle {
            name: name.to_string(),
            started: Instant::now(),
            summary: None,
            warnings: Vec::new(),
            sink: &mut self.discard,
            enabled: false,
        }
    }

    fn into_pipeline_trace(self: Box<Self>) -> Option<PipelineTrace> {
        None
    }
}

pub fn new_trace(enabled: bool) -> Box<dyn Trace> {
    if enabled {
        Box::new(RecordingTrace::default())
    } else {
        Box::new(NoopTrace::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_trace_attaches_stages() {
        let mut trace = new_trace(true);
        {
            let mut stage = trace.stage("fetch-neighborhood");
            stage.record_summary(serde_json::json!({"nodes": 3}));
        }
        let pipeline = trace.into_pipeline_trace().unwrap();
        assert_eq!(pipeline.stages.len(), 1);
        assert_eq!(pipeline.stages[0].name, "fetch-neighborhood");
        assert!(pipeline.stages[0].summary.is_some());
    }

    #[test]
    fn noop_trace_attaches_nothing() {
        let mut trace = new_trace(false);
        {
            let mut stage = trace.stage("fetch-neighborhood");
            stage.record_summary(serde_json::json!({"nodes": 3}));
        }
        assert!(trace.into_pipeline_trace().is_none());
    }
}
