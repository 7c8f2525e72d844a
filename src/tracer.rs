//! Observability surface (AMBIENT).
//!
//! No `tracing`/`log` dependency: a hand-rolled `Tracer` trait with
//! default no-op methods plus `NoopTracer`/`StderrTracer`/
//! `RecordingTracer`/`ProfilingTracer` implementations, narrowed to the
//! events this evaluator actually raises: member force, amend, and error.

use std::collections::HashMap;

/// One traced event (§4.B force, §4.F amend, §7 error).
#[derive(Debug, Clone)]
pub enum TraceEvent {
    Force { owner_object: u32, key: String, depth: usize },
    Amend { parent_object: u32, overlay_members: usize },
    Error { message: String },
}

/// Hook points a `Tracer` implementation observes during evaluation.
/// Default no-op bodies mean [`NoopTracer`] costs nothing.
pub trait Tracer: std::fmt::Debug {
    #[inline(always)]
    fn on_force(&mut self, _owner_object: u32, _key: &str, _depth: usize) {}

    #[inline(always)]
    fn on_amend(&mut self, _parent_object: u32, _overlay_members: usize) {}

    #[inline(always)]
    fn on_error(&mut self, _message: &str) {}
}

/// Production default: zero overhead.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl Tracer for NoopTracer {}

/// Human-readable log to stderr, for interactive debugging.
#[derive(Debug, Default)]
pub struct StderrTracer;

impl StderrTracer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Tracer for StderrTracer {
    fn on_force(&mut self, owner_object: u32, key: &str, depth: usize) {
        eprintln!("force  obj={owner_object} key={key} depth={depth}");
    }

    fn on_amend(&mut self, parent_object: u32, overlay_members: usize) {
        eprintln!("amend  parent={parent_object} overlay_members={overlay_members}");
    }

    fn on_error(&mut self, message: &str) {
        eprintln!("error  {message}");
    }
}

/// Per-key force counters, for finding hot members in a slow evaluation.
#[derive(Debug, Default)]
pub struct ProfilingTracer {
    force_counts: HashMap<String, u64>,
    max_depth: usize,
    amend_count: u64,
}

impl ProfilingTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn report(&self) -> ProfilingReport {
        let mut force_counts: Vec<_> = self.force_counts.iter().map(|(k, &v)| (k.clone(), v)).collect();
        force_counts.sort_by(|a, b| b.1.cmp(&a.1));
        ProfilingReport { force_counts, max_depth: self.max_depth, amend_count: self.amend_count }
    }
}

#[derive(Debug)]
pub struct ProfilingReport {
    pub force_counts: Vec<(String, u64)>,
    pub max_depth: usize,
    pub amend_count: u64,
}

impl Tracer for ProfilingTracer {
    fn on_force(&mut self, _owner_object: u32, key: &str, depth: usize) {
        *self.force_counts.entry(key.to_string()).or_insert(0) += 1;
        self.max_depth = self.max_depth.max(depth);
    }

    fn on_amend(&mut self, _parent_object: u32, _overlay_members: usize) {
        self.amend_count += 1;
    }
}

/// Full event log, for deterministic post-mortem analysis.
#[derive(Debug, Default)]
pub struct RecordingTracer {
    events: Vec<TraceEvent>,
}

impl RecordingTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    #[must_use]
    pub fn into_events(self) -> Vec<TraceEvent> {
        self.events
    }
}

impl Tracer for RecordingTracer {
    fn on_force(&mut self, owner_object: u32, key: &str, depth: usize) {
        self.events.push(TraceEvent::Force { owner_object, key: key.to_string(), depth });
    }

    fn on_amend(&mut self, parent_object: u32, overlay_members: usize) {
        self.events.push(TraceEvent::Amend { parent_object, overlay_members });
    }

    fn on_error(&mut self, message: &str) {
        self.events.push(TraceEvent::Error { message: message.to_string() });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_tracer_captures_events_in_order() {
        let mut tracer = RecordingTracer::new();
        tracer.on_force(1, "name", 0);
        tracer.on_amend(1, 2);
        assert_eq!(tracer.events().len(), 2);
    }

    #[test]
    fn profiling_tracer_counts_per_key() {
        let mut tracer = ProfilingTracer::new();
        tracer.on_force(1, "name", 0);
        tracer.on_force(1, "name", 1);
        let report = tracer.report();
        assert_eq!(report.force_counts[0], ("name".to_string(), 2));
    }
}
