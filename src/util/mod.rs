use crate::config::EvaluationConfig;
use crate::evaluation::{MatchStatistics, ReprojectionSummary};
use crate::matching::{CandidateMatch, Keypoint, Neighbor};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

#[derive(thiserror::Error, Debug)]
pub enum UtilError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Ensure the parent directory of `path` exists
pub fn ensure_parent_dir(path: &str) -> Result<(), UtilError> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Load an image from file as 8-bit RGB
///
/// # Arguments
///
/// * `image_path` - Path to the image file
///
/// # Returns
///
/// * `Result<RgbImage, UtilError>` - Loaded RGB image
pub fn load_image(image_path: &str) -> Result<RgbImage, UtilError> {
    let img = image::open(image_path)?;
    Ok(img.to_rgb8())
}

/// Save an image, creating the output directory when needed
pub fn save_image(image: &RgbImage, path: &str) -> Result<(), UtilError> {
    ensure_parent_dir(path)?;
    image.save(path)?;
    Ok(())
}

/// Read keypoints from CSV with the header `x,y,size`
pub fn read_keypoints<R: Read>(reader: R) -> Result<Vec<Keypoint>, UtilError> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut keypoints = Vec::new();
    for record in csv_reader.deserialize() {
        keypoints.push(record?);
    }
    Ok(keypoints)
}

pub fn load_keypoints(path: &str) -> Result<Vec<Keypoint>, UtilError> {
    read_keypoints(File::open(path)?)
}

/// One row of the candidate match CSV.
#[derive(Debug, Deserialize)]
struct CandidateRecord {
    query_index: usize,
    best_index: usize,
    best_distance: f64,
    second_index: Option<usize>,
    second_distance: Option<f64>,
}

impl From<CandidateRecord> for CandidateMatch {
    fn from(record: CandidateRecord) -> Self {
        let mut neighbors = vec![Neighbor {
            reference_index: record.best_index,
            distance: record.best_distance,
        }];
        if let (Some(reference_index), Some(distance)) =
            (record.second_index, record.second_distance)
        {
            neighbors.push(Neighbor {
                reference_index,
                distance,
            });
        }
        CandidateMatch {
            query_index: record.query_index,
            neighbors,
        }
    }
}

/// Read ranked candidate matches from CSV.
///
/// The header is `query_index,best_index,best_distance,second_index,second_distance`.
/// The two `second_*` columns may be left empty for queries with a single neighbor.
pub fn read_candidate_matches<R: Read>(reader: R) -> Result<Vec<CandidateMatch>, UtilError> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut matches = Vec::new();
    for record in csv_reader.deserialize::<CandidateRecord>() {
        matches.push(record?.into());
    }
    Ok(matches)
}

pub fn load_candidate_matches(path: &str) -> Result<Vec<CandidateMatch>, UtilError> {
    read_candidate_matches(File::open(path)?)
}

/// Stage timings of one evaluation run, in milliseconds
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageTimings {
    pub matching_ms: f64,
    pub verification_ms: f64,
    pub visualization_ms: Option<f64>,
}

/// Summary of one evaluation run, exported as JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub keypoints1: usize,
    pub keypoints_n: usize,
    pub statistics: MatchStatistics,
    pub inlier_reprojection: Option<ReprojectionSummary>,
    pub timings: StageTimings,
    pub config: EvaluationConfig,
}

/// Print the results table
pub fn display_report(report: &EvaluationReport) {
    println!("Matching Results");
    println!("*******************************");
    println!("{:<38}\t{}", "# Keypoints 1:", report.keypoints1);
    println!("{:<38}\t{}", "# Keypoints N:", report.keypoints_n);
    println!("{}", report.statistics);
    if let Some(summary) = &report.inlier_reprojection {
        println!("{:<38}\t{:.4}", "Inlier Reprojection Mean (px):", summary.mean);
        println!("{:<38}\t{:.4}", "Inlier Reprojection RMSE (px):", summary.rmse);
    }
    println!("{:<38}\t{:.3}", "Time Matching (ms):", report.timings.matching_ms);
    println!(
        "{:<38}\t{:.3}",
        "Time Verification (ms):", report.timings.verification_ms
    );
    if let Some(ms) = report.timings.visualization_ms {
        println!("{:<38}\t{:.3}", "Time Visualization (ms):", ms);
    }
    println!();
}

/// Export the report as pretty-printed JSON
///
/// # Arguments
///
/// * `report` - Evaluation summary
/// * `path` - Output file; missing parent directories are created
///
/// # Returns
///
/// * `Result<(), UtilError>` - Success or error
pub fn export_report(report: &EvaluationReport, path: &str) -> Result<(), UtilError> {
    ensure_parent_dir(path)?;
    let mut file = File::create(path)?;
    let json = serde_json::to_string_pretty(report)?;
    writeln!(file, "{json}")?;
    Ok(())
}
