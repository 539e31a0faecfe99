// src/pipeline/metrics.rs
//
// Counters for the frame loop and the HTTP sink. Cloned handles share the
// same atomics, so spawned upload tasks can report back without locks.

use super::orchestrator::FrameOutput;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct PipelineMetrics {
    pub total_frames: Arc<AtomicU64>,
    pub frames_with_detections: Arc<AtomicU64>,
    pub detections: Arc<AtomicU64>,
    pub projection_failures: Arc<AtomicU64>,
    pub batches_sent: Arc<AtomicU64>,
    pub http_successes: Arc<AtomicU64>,
    pub http_failures: Arc<AtomicU64>,
    /// Last frame processing time
    pub frame_time_us: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            total_frames: Arc::new(AtomicU64::new(0)),
            frames_with_detections: Arc::new(AtomicU64::new(0)),
            detections: Arc::new(AtomicU64::new(0)),
            projection_failures: Arc::new(AtomicU64::new(0)),
            batches_sent: Arc::new(AtomicU64::new(0)),
            http_successes: Arc::new(AtomicU64::new(0)),
            http_failures: Arc::new(AtomicU64::new(0)),
            frame_time_us: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }

    pub fn inc(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_timing(&self, counter: &AtomicU64, duration_us: u64) {
        counter.store(duration_us, Ordering::Relaxed);
    }

    pub fn record_frame(&self, output: &FrameOutput, elapsed: Duration) {
        self.inc(&self.total_frames);
        if !output.detections.is_empty() {
            self.inc(&self.frames_with_detections);
        }
        self.detections
            .fetch_add(output.detections.len() as u64, Ordering::Relaxed);
        self.projection_failures
            .fetch_add(output.dropped as u64, Ordering::Relaxed);
        self.set_timing(&self.frame_time_us, elapsed.as_micros() as u64);
    }

    pub fn fps(&self) -> f64 {
        let frames = self.total_frames.load(Ordering::Relaxed);
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed > 0.01 {
            frames as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_frames: self.total_frames.load(Ordering::Relaxed),
            fps: self.fps(),
            frames_with_detections: self.frames_with_detections.load(Ordering::Relaxed),
            detections: self.detections.load(Ordering::Relaxed),
            projection_failures: self.projection_failures.load(Ordering::Relaxed),
            batches_sent: self.batches_sent.load(Ordering::Relaxed),
            http_successes: self.http_successes.load(Ordering::Relaxed),
            http_failures: self.http_failures.load(Ordering::Relaxed),
            last_frame_us: self.frame_time_us.load(Ordering::Relaxed),
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSummary {
    pub total_frames: u64,
    pub fps: f64,
    pub frames_with_detections: u64,
    pub detections: u64,
    pub projection_failures: u64,
    pub batches_sent: u64,
    pub http_successes: u64,
    pub http_failures: u64,
    pub last_frame_us: u64,
    pub elapsed_secs: f64,
}
