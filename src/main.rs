// src/main.rs

use anyhow::Result;
use pothole_localizer::pipeline::PipelineMetrics;
use pothole_localizer::replay::{find_recordings, process_recording};
use pothole_localizer::streamer::DistanceStreamer;
use pothole_localizer::Config;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "pothole_localizer=info,reqwest=warn";

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path =
        std::env::var("POTHOLE_CONFIG").unwrap_or_else(|_| "config.yaml".to_string());
    let mut config = Config::from_file(&config_path)?;

    init_tracing(&config.logging.level);

    info!("🕳️  Pothole Localizer Starting");
    config.apply_env_overrides();
    config.validate()?;
    info!("✓ Configuration loaded from {}", config_path);
    info!(
        "Camera: fx={:.1} fy={:.1} cx={:.1} cy={:.1} H={:.2}m | θ_init={:.1}° α={:.3} | init={:?}",
        config.camera.fx,
        config.camera.fy,
        config.camera.cx,
        config.camera.cy,
        config.camera.height_m,
        config.pitch.theta_init_deg,
        config.pitch.alpha,
        config.pitch.init_mode
    );

    let metrics = PipelineMetrics::new();
    let streamer = DistanceStreamer::new(&config.stream, metrics.clone())?;

    let recordings = find_recordings(&config.replay.input_dir)?;
    if recordings.is_empty() {
        error!("No recordings found in {}", config.replay.input_dir);
        return Ok(());
    }

    for (idx, path) in recordings.iter().enumerate() {
        info!("\n========================================");
        info!(
            "Processing recording {}/{}: {}",
            idx + 1,
            recordings.len(),
            path.display()
        );
        info!("========================================\n");

        match process_recording(path, &config, Some(&streamer), &metrics).await {
            Ok(stats) => {
                info!("\n✓ Recording processed successfully!");
                info!("  Total frames: {}", stats.total_frames);
                info!(
                    "  Frames with potholes: {} ({:.1}%)",
                    stats.frames_with_detections,
                    100.0 * stats.frames_with_detections as f64
                        / stats.total_frames.max(1) as f64
                );
                info!("  Detections: {}", stats.detections);
                info!("  Failed projections: {}", stats.failed_projections);
                info!(
                    "  Duration: {:.2}s ({:.1} fps)",
                    stats.duration_secs,
                    stats.fps()
                );
            }
            Err(e) => {
                error!("Failed to process {}: {:#}", path.display(), e);
            }
        }
    }

    let summary = metrics.summary();
    info!(
        "📊 Summary: {}",
        serde_json::to_string(&summary).unwrap_or_default()
    );

    Ok(())
}
