//! Match Evaluation Library
//!
//! Evaluates keypoint correspondences produced by an external feature
//! detector and matcher against a known ground-truth homography:
//! - Homography loading and normalization
//! - Nearest-neighbor distance ratio (NNDR) filtering of ranked matches
//! - Inlier classification by reprojection error
//! - Match statistics
//! - Side-by-side visualization of inlier correspondences
//!
//! Detection, description, descriptor matching and homography estimation are
//! left to the caller.

pub mod config;
pub mod evaluation;
pub mod homography;
pub mod matching;
pub mod util;
pub mod visualization;

// Re-export commonly used types
pub use config::{ConfigError, EvaluationConfig};
pub use evaluation::{
    classify_inliers, compute_stats, EvaluationError, MatchStatistics, ReprojectionSummary,
};
pub use homography::{load_homography, Homography, HomographyError};
pub use matching::{
    filter_nndr, CandidateMatch, Correspondences, Keypoint, MatchingError, Neighbor,
};
pub use visualization::{compose_side_by_side, mark_keypoints, Palette, SideBySideLayout};
