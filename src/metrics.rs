use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing coaching activity since startup.
#[derive(Default)]
pub struct CoachMetrics {
    cvs_parsed: AtomicU64,
    questions_answered: AtomicU64,
    videos_analyzed: AtomicU64,
    pipeline_failures: AtomicU64,
}

impl CoachMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a parsed CV.
    pub fn record_cv(&self) {
        self.cvs_parsed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record answers produced by the retrieval pipeline.
    pub fn record_answers(&self, count: u64) {
        self.questions_answered.fetch_add(count, Ordering::Relaxed);
    }

    /// Record a completed video analysis.
    pub fn record_video(&self) {
        self.videos_analyzed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a pipeline invocation that ended with a user-facing error.
    pub fn record_failure(&self) {
        self.pipeline_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            cvs_parsed: self.cvs_parsed.load(Ordering::Relaxed),
            questions_answered: self.questions_answered.load(Ordering::Relaxed),
            videos_analyzed: self.videos_analyzed.load(Ordering::Relaxed),
            pipeline_failures: self.pipeline_failures.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of the coaching counters used for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// CVs parsed successfully.
    pub cvs_parsed: u64,
    /// Questions answered (generated and custom).
    pub questions_answered: u64,
    /// Videos analyzed to completion.
    pub videos_analyzed: u64,
    /// Pipeline invocations that returned an error outcome.
    pub pipeline_failures: u64,
}
