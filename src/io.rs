use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use csv::Writer;

use crate::batch::{BatchResult, BatchSummary};
use crate::points::PointSet;
use crate::SynthError;

pub const OBSERVATIONS_FILE: &str = "observations.csv";
pub const POINTS_FILE: &str = "points.csv";
pub const SUMMARY_FILE: &str = "summary.json";

/// Creates `<output_root>/<UTC timestamp>`, suffixed `-NN` when taken.
pub fn create_timestamped_output_dir(output_root: &Path) -> Result<PathBuf, SynthError> {
    fs::create_dir_all(output_root)?;

    let timestamp = Utc::now().format("%Y-%m-%dT%H-%M-%SZ").to_string();
    let mut output_dir = output_root.join(&timestamp);
    let mut counter = 1_u32;

    while output_dir.exists() {
        output_dir = output_root.join(format!("{timestamp}-{counter:02}"));
        counter += 1;
    }

    fs::create_dir_all(&output_dir)?;
    Ok(output_dir)
}

fn ensure_len(context: &'static str, expected: usize, actual: usize) -> Result<(), SynthError> {
    if expected == actual {
        return Ok(());
    }

    Err(SynthError::LengthMismatch {
        context,
        expected,
        got: actual,
    })
}

fn fmt_f64(value: f64) -> String {
    format!("{value:.10}")
}

/// One row per curve sample: `observation,kind,x,y`.
pub fn write_observations_csv(path: &Path, result: &BatchResult) -> Result<(), SynthError> {
    let mut writer = Writer::from_path(path)?;
    writer.write_record(["observation", "kind", "x", "y"])?;

    for (index, observation) in &result.observations {
        ensure_len(
            "observation y_values",
            observation.x_values().len(),
            observation.y_values().len(),
        )?;
        let id = index.to_string();
        let kind = observation.kind().to_string();
        for (x, y) in observation.x_values().iter().zip(observation.y_values()) {
            writer.write_record([id.clone(), kind.clone(), x.to_string(), fmt_f64(*y)])?;
        }
    }

    writer.flush()?;
    Ok(())
}

/// Final control points per observation: `observation,kind,point,x,y`.
pub fn write_points_csv(path: &Path, result: &BatchResult) -> Result<(), SynthError> {
    let mut writer = Writer::from_path(path)?;
    writer.write_record(["observation", "kind", "point", "x", "y"])?;

    for (index, observation) in &result.observations {
        let id = index.to_string();
        let kind = observation.kind().to_string();
        for (point_index, point) in observation.points().iter().enumerate() {
            writer.write_record([
                id.clone(),
                kind.clone(),
                PointSet::label(point_index),
                point.x.to_string(),
                fmt_f64(point.y),
            ])?;
        }
    }

    writer.flush()?;
    Ok(())
}

pub fn write_summary_json(path: &Path, summary: &BatchSummary) -> Result<(), SynthError> {
    let payload = serde_json::to_string_pretty(summary)?;
    fs::write(path, payload)?;
    Ok(())
}

/// Writes observations, points and summary into `outdir`.
pub fn write_batch(
    outdir: &Path,
    result: &BatchResult,
    summary: &BatchSummary,
) -> Result<(), SynthError> {
    fs::create_dir_all(outdir)?;
    write_observations_csv(&outdir.join(OBSERVATIONS_FILE), result)?;
    write_points_csv(&outdir.join(POINTS_FILE), result)?;
    write_summary_json(&outdir.join(SUMMARY_FILE), summary)?;
    Ok(())
}
