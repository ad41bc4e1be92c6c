//! Ground-truth match evaluation tool
//!
//! Evaluates ranked descriptor matches between two images of a planar scene
//! against the known homography relating them, mirroring the classic
//! detector/descriptor benchmark programs.
//!
//! Usage:
//! ```bash
//! cargo run --release -- \
//!   --image1 img1.ppm --image-n img3.ppm --homography H1to3p \
//!   --keypoints1 kpts1.csv --keypoints-n kpts3.csv --matches knn.csv \
//!   --output output/inliers.png --report output/report.json
//! ```

use clap::Parser;
use flexi_logger::{colored_detailed_format, detailed_format, Duplicate, FileSpec, Logger};
use log::{info, warn};
use match_eval::util::{self, EvaluationReport, StageTimings};
use match_eval::{
    classify_inliers, compose_side_by_side, compute_stats, filter_nndr, mark_keypoints,
    EvaluationConfig, Homography, ReprojectionSummary,
};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Homography-based match evaluation tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Reference image (image 1)
    #[arg(long)]
    image1: PathBuf,

    /// Transformed image (image N)
    #[arg(long)]
    image_n: PathBuf,

    /// Ground-truth homography from image 1 to image N
    #[arg(short = 'H', long)]
    homography: PathBuf,

    /// Keypoints of image 1 (CSV: x,y,size)
    #[arg(long)]
    keypoints1: PathBuf,

    /// Keypoints of image N (CSV: x,y,size)
    #[arg(long)]
    keypoints_n: PathBuf,

    /// Ranked candidate matches (CSV)
    #[arg(short = 'm', long)]
    matches: PathBuf,

    /// Evaluation settings (YAML)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Override the NNDR ratio
    #[arg(long)]
    nndr: Option<f64>,

    /// Override the inlier tolerance in pixels
    #[arg(long)]
    max_error: Option<f64>,

    /// Where to write the inlier visualization
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Where to write the JSON report
    #[arg(short = 'r', long)]
    report: Option<PathBuf>,

    /// Log level specification
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn path_str(path: &Path) -> Result<&str, Box<dyn std::error::Error>> {
    Ok(path
        .to_str()
        .ok_or_else(|| format!("Invalid path string: {path:?}"))?)
}

fn load_config(cli: &Cli) -> Result<EvaluationConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => {
            info!("Loading evaluation config from: {:?}", path);
            EvaluationConfig::load_from_yaml(path_str(path)?)?
        }
        None => EvaluationConfig::default(),
    };
    if let Some(ratio) = cli.nndr {
        config.nndr_ratio = ratio;
    }
    if let Some(max_error) = cli.max_error {
        config.max_pixel_error = max_error;
    }
    config.validate()?;
    Ok(config)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    Logger::try_with_str(&cli.log_level)?
        .log_to_file(
            FileSpec::default()
                .directory("logs")
                .suppress_timestamp()
                .suffix("log"),
        )
        .duplicate_to_stdout(Duplicate::Info)
        .format_for_files(detailed_format)
        .format_for_stdout(colored_detailed_format)
        .start()?;

    let config = load_config(&cli)?;
    info!("Evaluation config: {:?}", config);

    let homography = Homography::load_from_file(path_str(&cli.homography)?)?;
    info!("Ground-truth homography: {}", homography.matrix());

    let keypoints1 = util::load_keypoints(path_str(&cli.keypoints1)?)?;
    let keypoints_n = util::load_keypoints(path_str(&cli.keypoints_n)?)?;
    let candidates = util::load_candidate_matches(path_str(&cli.matches)?)?;
    info!(
        "Loaded {} / {} keypoints and {} candidate matches",
        keypoints1.len(),
        keypoints_n.len(),
        candidates.len()
    );

    let t = Instant::now();
    let putative = filter_nndr(&keypoints1, &keypoints_n, &candidates, config.nndr_ratio)?;
    let matching_ms = t.elapsed().as_secs_f64() * 1000.0;

    let t = Instant::now();
    let inliers = classify_inliers(&putative, &homography, config.max_pixel_error)?;
    let verification_ms = t.elapsed().as_secs_f64() * 1000.0;

    let statistics = compute_stats(&putative, &inliers)?;
    let inlier_reprojection = if inliers.is_empty() {
        warn!("No inliers found, skipping reprojection summary");
        None
    } else {
        let summary = ReprojectionSummary::from_correspondences(&inliers, &homography)?;
        info!("{:?}", summary);
        Some(summary)
    };

    let mut timings = StageTimings {
        matching_ms,
        verification_ms,
        visualization_ms: None,
    };

    if let Some(output) = &cli.output {
        let mut image1 = util::load_image(path_str(&cli.image1)?)?;
        let mut image_n = util::load_image(path_str(&cli.image_n)?)?;

        let t = Instant::now();
        mark_keypoints(&mut image1, &keypoints1, &config.palette);
        mark_keypoints(&mut image_n, &keypoints_n, &config.palette);
        let canvas = compose_side_by_side(
            &image1,
            &image_n,
            &inliers,
            config.resize_to_first,
            &config.palette,
        );
        timings.visualization_ms = Some(t.elapsed().as_secs_f64() * 1000.0);

        let output = path_str(output)?;
        util::save_image(&canvas, output)?;
        info!("Saved inlier visualization: {}", output);
    }

    let report = EvaluationReport {
        keypoints1: keypoints1.len(),
        keypoints_n: keypoints_n.len(),
        statistics,
        inlier_reprojection,
        timings,
        config,
    };
    util::display_report(&report);

    if let Some(path) = &cli.report {
        let path = path_str(path)?;
        util::export_report(&report, path)?;
        info!("Exported report: {}", path);
    }

    Ok(())
}
