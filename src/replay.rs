// src/replay.rs
//
// Replays recorded tracker logs through the orchestrator.
//
// A recording is a JSONL file, one `FrameRecord` per line, as written by the
// capture rig: tracker boxes with persistent IDs plus optional IMU and vision
// front-end readings. Each file is processed with a fresh orchestrator.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::estimation::InertialSample;
use crate::pipeline::{FrameInput, FrameOrchestrator, PipelineMetrics, PotholeDetection};
use crate::streamer::DistanceStreamer;
use crate::types::{Config, TrackedBox};
use crate::vision_pitch::VisionObservation;

// ============================================================================
// RECORD FORMAT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub frame: u64,
    pub timestamp_ms: i64,
    #[serde(default)]
    pub image_width: u32,
    pub image_height: u32,
    #[serde(default)]
    pub tracks: Vec<TrackedBox>,
    #[serde(default)]
    pub imu: Option<InertialSample>,
    #[serde(default)]
    pub vision: Option<VisionObservation>,
}

pub fn find_recordings(input_dir: &str) -> Result<Vec<PathBuf>> {
    let mut recordings = Vec::new();

    for entry in WalkDir::new(input_dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(ext) = path.extension() {
            if ext.eq_ignore_ascii_case("jsonl") {
                recordings.push(path.to_path_buf());
            }
        }
    }

    recordings.sort();
    info!("Found {} recording(s) in {}", recordings.len(), input_dir);
    Ok(recordings)
}

pub fn read_records(path: &Path) -> Result<Vec<FrameRecord>> {
    let file =
        File::open(path).with_context(|| format!("Failed to open recording {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: FrameRecord = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: malformed frame record", path.display(), idx + 1))?;
        records.push(record);
    }
    Ok(records)
}

// ============================================================================
// OUTPUT
// ============================================================================

/// Appends one JSON detection per line.
pub struct JsonlRecorder {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl JsonlRecorder {
    pub fn create(output_dir: &Path, stem: &str) -> Result<Self> {
        fs::create_dir_all(output_dir)
            .with_context(|| format!("Failed to create {}", output_dir.display()))?;
        let path = output_dir.join(format!("{}_potholes.jsonl", stem));
        let file =
            File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;
        Ok(Self {
            writer: BufWriter::new(file),
            path,
        })
    }

    pub fn write(&mut self, detection: &PotholeDetection) -> Result<()> {
        let json_line = serde_json::to_string(detection)?;
        writeln!(self.writer, "{}", json_line)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

// ============================================================================
// DRIVER
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct ReplayStats {
    pub total_frames: u64,
    pub frames_with_detections: u64,
    pub detections: u64,
    pub failed_projections: u64,
    pub duration_secs: f64,
    pub output_path: Option<PathBuf>,
}

impl ReplayStats {
    pub fn fps(&self) -> f64 {
        if self.duration_secs > 0.0 {
            self.total_frames as f64 / self.duration_secs
        } else {
            0.0
        }
    }
}

/// Run one recording end to end, then wait for its uploads.
pub async fn process_recording(
    path: &Path,
    config: &Config,
    streamer: Option<&DistanceStreamer>,
    metrics: &PipelineMetrics,
) -> Result<ReplayStats> {
    let records = read_records(path)?;
    let mut orchestrator =
        FrameOrchestrator::new(config).context("Failed to build frame orchestrator")?;

    let mut recorder = if config.replay.save_jsonl {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("recording");
        Some(JsonlRecorder::create(Path::new(&config.replay.output_dir), stem)?)
    } else {
        None
    };

    let mut stats = ReplayStats::default();
    let mut uploads: Vec<JoinHandle<()>> = Vec::new();
    let clock = Instant::now();

    for record in &records {
        let frame_start = Instant::now();

        // Wall-clock mode behaves like a live feed: intervals from the
        // monotonic clock, stamps from the system clock.
        let (timestamp_s, timestamp_ms) = if config.replay.use_wall_clock {
            (
                clock.elapsed().as_secs_f64(),
                chrono::Utc::now().timestamp_millis(),
            )
        } else {
            (record.timestamp_ms as f64 / 1000.0, record.timestamp_ms)
        };

        let output = orchestrator.process_frame(&FrameInput {
            frame: record.frame,
            timestamp_s,
            timestamp_ms,
            image_height: record.image_height,
            tracks: &record.tracks,
            imu: record.imu,
            vision: record.vision,
        });

        stats.total_frames += 1;
        stats.detections += output.detections.len() as u64;
        stats.failed_projections += output.dropped as u64;
        if !output.detections.is_empty() {
            stats.frames_with_detections += 1;
        }

        if let Some(rec) = recorder.as_mut() {
            for det in &output.detections {
                rec.write(det)?;
            }
        }
        if let Some(s) = streamer {
            uploads.retain(|h| !h.is_finished());
            uploads.extend(s.send_frame(&output));
        }
        metrics.record_frame(&output, frame_start.elapsed());

        if stats.total_frames % 30 == 0 {
            let theta = output
                .theta_deg
                .map(|t| format!("{:.2}°", t))
                .unwrap_or_else(|| "uninitialized".to_string());
            info!(
                "Progress: {}/{} frames ({:.1} fps) | θ={} | {} pothole(s) this frame",
                stats.total_frames,
                records.len(),
                stats.total_frames as f64 / clock.elapsed().as_secs_f64().max(1e-6),
                theta,
                output.detections.len()
            );
        }
    }

    if let Some(mut rec) = recorder {
        rec.flush()?;
        info!("💾 Detections saved to {}", rec.path().display());
        stats.output_path = Some(rec.path().to_path_buf());
    }
    if let Some(s) = streamer {
        s.drain(uploads).await;
    }
    if orchestrator.is_waiting_for_dwell() {
        warn!(
            "Recording {} ended before the stationary dwell completed",
            path.display()
        );
    }

    stats.duration_secs = clock.elapsed().as_secs_f64();
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "pothole_localizer_{}_{}",
            name,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    const RECORDING: &str = r#"{"frame":0,"timestamp_ms":1000,"image_width":640,"image_height":480,"tracks":[{"id":4,"x1":299.6,"y1":380.2,"x2":339.7,"y2":409.9}]}

{"frame":1,"timestamp_ms":1033,"image_width":640,"image_height":480,"tracks":[],"imu":{"gyro_pitch_rate":0.0,"stationary":false,"accel_reliable":false}}
{"frame":2,"timestamp_ms":1066,"image_height":480,"tracks":[{"id":4,"x1":300,"y1":10,"x2":340,"y2":40}],"vision":{"horizon_row":80.0,"confidence":0.5}}
"#;

    #[test]
    fn test_parses_records_with_optional_sections() {
        let dir = scratch_dir("parse");
        let path = dir.join("drive.jsonl");
        fs::write(&path, RECORDING).unwrap();

        let records = read_records(&path).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].tracks[0].bbox().y, 380);
        assert!(records[0].imu.is_none());
        assert_eq!(records[1].imu.unwrap().theta_abs, None);
        assert_eq!(records[2].image_width, 0);
        assert_eq!(records[2].vision.unwrap().horizon_row, Some(80.0));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_malformed_line_reports_location() {
        let dir = scratch_dir("malformed");
        let path = dir.join("bad.jsonl");
        fs::write(&path, "{\"frame\": 0}\n").unwrap();
        let err = read_records(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("bad.jsonl:1"));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_find_recordings_filters_extension() {
        let dir = scratch_dir("find");
        fs::create_dir_all(dir.join("day2")).unwrap();
        fs::write(dir.join("a.jsonl"), "").unwrap();
        fs::write(dir.join("day2").join("b.JSONL"), "").unwrap();
        fs::write(dir.join("notes.txt"), "").unwrap();

        let found = find_recordings(dir.to_str().unwrap()).unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|p| p
            .extension()
            .map(|e| e.eq_ignore_ascii_case("jsonl"))
            .unwrap_or(false)));
        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_process_recording_writes_detections() {
        let dir = scratch_dir("process");
        let path = dir.join("drive.jsonl");
        fs::write(&path, RECORDING).unwrap();

        let mut config = Config::default();
        config.replay.output_dir = dir.join("out").to_string_lossy().into_owned();
        let metrics = PipelineMetrics::new();

        let stats = process_recording(&path, &config, None, &metrics)
            .await
            .unwrap();
        assert_eq!(stats.total_frames, 3);
        assert_eq!(stats.detections, 1);
        assert_eq!(stats.failed_projections, 1);
        assert_eq!(stats.frames_with_detections, 1);

        let out_path = stats.output_path.unwrap();
        assert!(out_path.ends_with("drive_potholes.jsonl"));
        let written = fs::read_to_string(&out_path).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 1);
        let det: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(det["track_id"], 4);
        assert_eq!(det["frame"], 0);
        assert_eq!(det["timestamp_ms"], 1000);

        assert_eq!(metrics.summary().total_frames, 3);
        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_process_recording_waits_for_uploads() {
        let dir = scratch_dir("uploads");
        let path = dir.join("drive.jsonl");
        fs::write(&path, RECORDING).unwrap();

        let mut config = Config::default();
        config.replay.save_jsonl = false;
        config.stream.endpoint = "http://127.0.0.1:9/webhook".to_string();
        config.stream.timeout_ms = 500;
        let metrics = PipelineMetrics::new();
        let streamer = DistanceStreamer::new(&config.stream, metrics.clone()).unwrap();

        let stats = process_recording(&path, &config, Some(&streamer), &metrics)
            .await
            .unwrap();
        assert!(stats.output_path.is_none());

        // Returned only after the single batch upload settled.
        let summary = metrics.summary();
        assert_eq!(summary.batches_sent, 1);
        assert_eq!(summary.http_successes + summary.http_failures, 1);
        let _ = fs::remove_dir_all(&dir);
    }
}
