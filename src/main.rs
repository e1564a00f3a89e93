// src/main.rs
//
// Batch binary: discover exported recordings under the input directory,
// run one pipeline per recording, write an analysis JSON per recording.
// A recording is a directory holding a frame sequence (numbered images
// plus sequence.yaml) and the backend's detections.json. Failures are
// per-recording: one bad video never stops the batch.

use anyhow::{Context, Result};
use clap::Parser;
use footyvision::cache::Fingerprint;
use footyvision::detection::{DetectionSource, JsonDetectionFile};
use footyvision::video::{ImageSequenceSource, SEQUENCE_META_FILE};
use footyvision::{Config, Pipeline};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use walkdir::WalkDir;

const DETECTIONS_FILE: &str = "detections.json";

#[derive(Parser, Debug)]
#[command(name = "footyvision", about = "Football video tracking analysis")]
struct Args {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "config.yaml")]
    config: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(&args.config)
        .with_context(|| format!("loading configuration from {}", args.config))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.logging.level.clone()),
        )
        .init();

    info!("⚽ footyvision starting");

    let recordings = find_recordings(&config.video.input_dir)?;
    if recordings.is_empty() {
        error!("No recordings found in {}", config.video.input_dir);
        return Ok(());
    }
    info!("Found {} recording(s) to process", recordings.len());

    std::fs::create_dir_all(&config.video.output_dir)?;
    let output_dir = PathBuf::from(&config.video.output_dir);
    let pipeline = Pipeline::new(config);

    let mut failures = 0usize;
    for (idx, recording_dir) in recordings.iter().enumerate() {
        info!(
            "Processing recording {}/{}: {}",
            idx + 1,
            recordings.len(),
            recording_dir.display()
        );

        match process_recording(&pipeline, recording_dir, &output_dir) {
            Ok(output_path) => {
                info!("✓ Analysis written to {}", output_path.display());
            }
            Err(err) => {
                failures += 1;
                error!("Failed to process {}: {:#}", recording_dir.display(), err);
            }
        }
    }

    if failures > 0 {
        warn!("{} of {} recording(s) failed", failures, recordings.len());
    }
    Ok(())
}

/// A recording directory is any directory containing both the sequence
/// metadata file and the detections export.
fn find_recordings(input_dir: &str) -> Result<Vec<PathBuf>> {
    let mut recordings = Vec::new();
    for entry in WalkDir::new(input_dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if path.is_dir()
            && path.join(SEQUENCE_META_FILE).is_file()
            && path.join(DETECTIONS_FILE).is_file()
        {
            recordings.push(path.to_path_buf());
        }
    }
    recordings.sort();
    Ok(recordings)
}

fn process_recording(
    pipeline: &Pipeline,
    recording_dir: &Path,
    output_dir: &Path,
) -> Result<PathBuf> {
    let name = recording_dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("recording")
        .to_string();

    let detections_path = recording_dir.join(DETECTIONS_FILE);
    let detections = JsonDetectionFile::new(&detections_path)
        .detections()
        .with_context(|| format!("reading {}", detections_path.display()))?;

    // The detections export is the identity the track-store artifact
    // keys on; the camera artifact keys on frame content instead.
    let fingerprint = Fingerprint::of_file(&detections_path)
        .with_context(|| format!("fingerprinting {}", detections_path.display()))?;

    let mut source = ImageSequenceSource::open(recording_dir)
        .with_context(|| format!("opening frame sequence in {}", recording_dir.display()))?;

    let output = pipeline
        .run(&name, &mut source, &detections, &fingerprint)
        .with_context(|| format!("running pipeline for {}", name))?;

    let streak1 = output.streaks.team1_seconds(output.summary.fps);
    let streak2 = output.streaks.team2_seconds(output.summary.fps);
    info!(
        "  Possession: {:.1}% / {:.1}% (longest streak {:.1}s / {:.1}s)",
        output.summary.team1.possession_pct,
        output.summary.team2.possession_pct,
        streak1,
        streak2
    );
    if output.summary.quality.ball_track_empty {
        warn!("  ⚠ No ball detected in the whole recording");
    }

    let output_path = output_dir.join(format!("analysis_{}.json", name));
    let json = serde_json::to_string_pretty(&output.summary)?;
    std::fs::write(&output_path, json)?;
    Ok(output_path)
}
