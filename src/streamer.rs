// src/streamer.rs
//
// Fire-and-forget HTTP sink for localized potholes.
//
// Each frame with at least one detection becomes one JSON POST to the
// dashboard webhook, or one POST per detection in `per_detection` mode.
// Requests run on spawned tokio tasks with a short timeout. The frame loop
// never waits on them; callers drain the handles once a recording ends.
// Delivery failures only show up in logs and metrics.

use anyhow::{Context, Result};
use serde::Serialize;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::pipeline::{FrameOutput, PipelineMetrics, PotholeDetection};
use crate::types::{StreamConfig, StreamMode};

// ============================================================================
// PAYLOADS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchPayload {
    pub frame: u64,
    pub theta_deg: f64,
    pub detections: Vec<BatchEntry>,
    pub timestamp_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchEntry {
    pub id: i64,
    pub d: f64,
    pub x: f64,
    pub size: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionPayload {
    pub track_id: i64,
    pub distance_m: f64,
    pub lateral_m: f64,
    pub frame: u64,
    pub theta_deg: f64,
    pub timestamp_ms: i64,
}

fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}

impl BatchPayload {
    /// `None` for frames with nothing to report.
    pub fn from_output(output: &FrameOutput) -> Option<Self> {
        let theta_deg = output.theta_deg?;
        let first = output.detections.first()?;
        Some(Self {
            frame: output.frame,
            theta_deg: round_to(theta_deg, 2),
            detections: output
                .detections
                .iter()
                .map(|d| BatchEntry {
                    id: d.track_id,
                    d: round_to(d.distance_m, 2),
                    x: round_to(d.lateral_m, 2),
                    size: round_to(d.size_m2, 4),
                })
                .collect(),
            timestamp_ms: first.timestamp_ms,
        })
    }
}

impl From<&PotholeDetection> for DetectionPayload {
    fn from(d: &PotholeDetection) -> Self {
        Self {
            track_id: d.track_id,
            distance_m: round_to(d.distance_m, 2),
            lateral_m: round_to(d.lateral_m, 2),
            frame: d.frame,
            theta_deg: round_to(d.theta_deg, 2),
            timestamp_ms: d.timestamp_ms,
        }
    }
}

// ============================================================================
// STREAMER
// ============================================================================

pub struct DistanceStreamer {
    http_client: reqwest::Client,
    endpoint: String,
    enabled: bool,
    mode: StreamMode,
    timeout: Duration,
    metrics: PipelineMetrics,
}

impl DistanceStreamer {
    pub fn new(config: &StreamConfig, metrics: PipelineMetrics) -> Result<Self> {
        let timeout = Duration::from_millis(config.timeout_ms);
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        if config.enabled {
            info!(
                "📡 Streaming detections to {} ({:?})",
                config.endpoint, config.mode
            );
        } else {
            info!("📡 Streaming disabled");
        }

        Ok(Self {
            http_client,
            endpoint: config.endpoint.clone(),
            enabled: config.enabled,
            mode: config.mode,
            timeout,
            metrics,
        })
    }

    /// Upload a frame's detections according to the configured mode. Must be
    /// called from within a tokio runtime. Returns the spawned tasks.
    pub fn send_frame(&self, output: &FrameOutput) -> Vec<JoinHandle<()>> {
        match self.mode {
            StreamMode::Batch => self.send_batch(output).into_iter().collect(),
            StreamMode::PerDetection => output
                .detections
                .iter()
                .filter_map(|d| self.send_detection(d))
                .collect(),
        }
    }

    /// Post every detection of the frame as one batch.
    pub fn send_batch(&self, output: &FrameOutput) -> Option<JoinHandle<()>> {
        if !self.enabled {
            return None;
        }
        let payload = BatchPayload::from_output(output)?;
        self.metrics.inc(&self.metrics.batches_sent);
        Some(self.post(payload))
    }

    /// Post a single detection.
    pub fn send_detection(&self, detection: &PotholeDetection) -> Option<JoinHandle<()>> {
        if !self.enabled {
            return None;
        }
        Some(self.post(DetectionPayload::from(detection)))
    }

    /// Wait for in-flight uploads, giving up after one request timeout.
    /// Returns how many were still running at the deadline.
    pub async fn drain(&self, handles: Vec<JoinHandle<()>>) -> usize {
        let deadline = tokio::time::Instant::now() + self.timeout;
        let mut abandoned = 0;
        for handle in handles {
            if tokio::time::timeout_at(deadline, handle).await.is_err() {
                abandoned += 1;
            }
        }
        if abandoned > 0 {
            warn!("{} upload(s) still in flight after {:?}", abandoned, self.timeout);
        }
        abandoned
    }

    fn post<T>(&self, payload: T) -> JoinHandle<()>
    where
        T: Serialize + Send + 'static,
    {
        let client = self.http_client.clone();
        let url = self.endpoint.clone();
        let metrics = self.metrics.clone();

        tokio::spawn(async move {
            match client.post(&url).json(&payload).send().await {
                Ok(response) if response.status().is_success() => {
                    metrics.inc(&metrics.http_successes);
                }
                Ok(response) => {
                    debug!("Stream endpoint returned {}", response.status());
                    metrics.inc(&metrics.http_failures);
                }
                Err(e) => {
                    debug!("Stream request failed: {}", e);
                    metrics.inc(&metrics.http_failures);
                }
            }
        })
    }
}
