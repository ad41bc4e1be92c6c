//! Geometric verification of putative correspondences against a known homography.

use crate::homography::Homography;
use crate::matching::Correspondences;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(thiserror::Error, Debug)]
pub enum EvaluationError {
    #[error("Degenerate reprojection at pair {pair_index}: point maps to the line at infinity")]
    DegenerateTransform { pair_index: usize },
    #[error("Inlier ratio is undefined for zero putative matches")]
    UndefinedRatio,
    #[error("Inlier count {inliers} exceeds putative match count {matches}")]
    InlierCountExceedsMatches { inliers: usize, matches: usize },
    #[error("No reprojection errors to summarize")]
    Empty,
    #[error("Pixel tolerance must be finite and non-negative, got {0}")]
    InvalidTolerance(f64),
}

/// Per-pair distance between the reprojected image-1 point and its image-N match.
///
/// # Errors
///
/// * [`EvaluationError::DegenerateTransform`] if an image-1 point is mapped to
///   the line at infinity or the reprojection is not finite.
pub fn reprojection_errors(
    correspondences: &Correspondences,
    homography: &Homography,
) -> Result<Vec<f64>, EvaluationError> {
    correspondences
        .pairs()
        .enumerate()
        .map(|(pair_index, (first, other))| {
            homography
                .project(first)
                .map(|projected| nalgebra::distance(&projected, other))
                .filter(|error| error.is_finite())
                .ok_or(EvaluationError::DegenerateTransform { pair_index })
        })
        .collect()
}

/// Keeps the pairs whose reprojection error is at most `max_pixel_error`.
///
/// The surviving pairs keep their relative order. Applying the classifier to
/// its own output returns the same set.
///
/// # Arguments
///
/// * `correspondences` - Putative pairs, image-1 point first.
/// * `homography` - Ground-truth transform from image 1 to image N.
/// * `max_pixel_error` - Tolerance in pixels, typically `2.5`.
///
/// # Errors
///
/// * [`EvaluationError::InvalidTolerance`] if `max_pixel_error` is negative or
///   not finite.
/// * [`EvaluationError::DegenerateTransform`] if an image-1 point is mapped to
///   the line at infinity or the reprojection is not finite.
pub fn classify_inliers(
    correspondences: &Correspondences,
    homography: &Homography,
    max_pixel_error: f64,
) -> Result<Correspondences, EvaluationError> {
    if !(max_pixel_error >= 0.0 && max_pixel_error.is_finite()) {
        return Err(EvaluationError::InvalidTolerance(max_pixel_error));
    }

    let errors = reprojection_errors(correspondences, homography)?;

    let inliers: Correspondences = correspondences
        .pairs()
        .zip(errors)
        .filter(|(_, error)| *error <= max_pixel_error)
        .map(|((first, other), _)| (*first, *other))
        .collect();

    debug!(
        "Inlier classification (max error {} px): {} of {} pairs kept",
        max_pixel_error,
        inliers.len_pairs(),
        correspondences.len_pairs()
    );

    Ok(inliers)
}

/// Match counts of one evaluation run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchStatistics {
    pub match_count: usize,
    pub inlier_count: usize,
    pub outlier_count: usize,
    pub inlier_ratio_percent: f64,
}

impl fmt::Display for MatchStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<38}\t{}", "# Matches:", self.match_count)?;
        writeln!(f, "{:<38}\t{}", "# Inliers:", self.inlier_count)?;
        writeln!(f, "{:<38}\t{}", "# Outliers:", self.outlier_count)?;
        write!(
            f,
            "{:<38}\t{:.2}",
            "Inliers Ratio (%):", self.inlier_ratio_percent
        )
    }
}

/// Derives match, inlier and outlier counts and the inlier ratio.
///
/// # Errors
///
/// * [`EvaluationError::UndefinedRatio`] if `putative` is empty.
/// * [`EvaluationError::InlierCountExceedsMatches`] if `inliers` holds more
///   pairs than `putative`.
pub fn compute_stats(
    putative: &Correspondences,
    inliers: &Correspondences,
) -> Result<MatchStatistics, EvaluationError> {
    let match_count = putative.len_pairs();
    let inlier_count = inliers.len_pairs();

    if match_count == 0 {
        return Err(EvaluationError::UndefinedRatio);
    }
    if inlier_count > match_count {
        return Err(EvaluationError::InlierCountExceedsMatches {
            inliers: inlier_count,
            matches: match_count,
        });
    }

    Ok(MatchStatistics {
        match_count,
        inlier_count,
        outlier_count: match_count - inlier_count,
        inlier_ratio_percent: 100.0 * inlier_count as f64 / match_count as f64,
    })
}

/// Distribution of reprojection errors, in pixels.
#[derive(Clone, Serialize, Deserialize)]
pub struct ReprojectionSummary {
    pub rmse: f64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub stddev: f64,
    pub median: f64,
}

impl fmt::Debug for ReprojectionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Reprojection Error [ rmse: {}, min: {}, max: {}, mean: {}, stddev: {}, median: {} ]",
            self.rmse, self.min, self.max, self.mean, self.stddev, self.median
        )
    }
}

impl ReprojectionSummary {
    /// Summarizes a set of reprojection errors.
    ///
    /// # Errors
    ///
    /// * [`EvaluationError::Empty`] if `errors` is empty.
    pub fn from_errors(errors: &[f64]) -> Result<Self, EvaluationError> {
        if errors.is_empty() {
            return Err(EvaluationError::Empty);
        }

        let n = errors.len() as f64;
        let mean = errors.iter().sum::<f64>() / n;
        let variance = errors.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        let rmse = (errors.iter().map(|x| x.powi(2)).sum::<f64>() / n).sqrt();
        let min = errors.iter().fold(f64::INFINITY, |a, &b| a.min(b));
        let max = errors.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));

        let mut sorted = errors.to_vec();
        sorted.sort_by(f64::total_cmp);
        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        };

        Ok(ReprojectionSummary {
            rmse,
            min,
            max,
            mean,
            stddev: variance.sqrt(),
            median,
        })
    }

    /// Summarizes the reprojection errors of `correspondences` under `homography`.
    pub fn from_correspondences(
        correspondences: &Correspondences,
        homography: &Homography,
    ) -> Result<Self, EvaluationError> {
        let errors = reprojection_errors(correspondences, homography)?;
        Self::from_errors(&errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Matrix3, Point2};

    fn pairs(list: &[((f64, f64), (f64, f64))]) -> Correspondences {
        list.iter()
            .map(|&((ax, ay), (bx, by))| (Point2::new(ax, ay), Point2::new(bx, by)))
            .collect()
    }

    #[test]
    fn test_identity_inlier_and_outlier() {
        let h = Homography::identity();
        let putative = pairs(&[((10.0, 10.0), (11.0, 10.0)), ((10.0, 10.0), (14.0, 10.0))]);

        let inliers = classify_inliers(&putative, &h, 2.5).unwrap();
        assert_eq!(inliers.len_pairs(), 1);
        assert_eq!(inliers.points()[0], Point2::new(10.0, 10.0));
        assert_eq!(inliers.points()[1], Point2::new(11.0, 10.0));
    }

    #[test]
    fn test_tolerance_is_inclusive() {
        let h = Homography::identity();
        let putative = pairs(&[((0.0, 0.0), (3.0, 4.0))]);

        assert_eq!(classify_inliers(&putative, &h, 5.0).unwrap().len_pairs(), 1);
        assert!(classify_inliers(&putative, &h, 4.99).unwrap().is_empty());
    }

    #[test]
    fn test_projective_reprojection() {
        // x' = (2x + 1) / (0.01x + 1), y' = (2y) / (0.01x + 1)
        let m = Matrix3::new(2.0, 0.0, 1.0, 0.0, 2.0, 0.0, 0.01, 0.0, 1.0);
        let h = Homography::from_matrix(m).unwrap();
        let putative = pairs(&[
            ((100.0, 50.0), (100.5, 50.0)),
            ((0.0, 10.0), (1.0, 20.0)),
            ((0.0, 10.0), (1.0, 25.0)),
        ]);

        let errors = reprojection_errors(&putative, &h).unwrap();
        assert_relative_eq!(errors[0], 0.0);
        assert_relative_eq!(errors[1], 0.0);
        assert_relative_eq!(errors[2], 5.0);

        let inliers = classify_inliers(&putative, &h, 2.5).unwrap();
        assert_eq!(inliers.len_pairs(), 2);
        assert_eq!(inliers.points()[2], Point2::new(0.0, 10.0));
        assert_eq!(inliers.points()[3], Point2::new(1.0, 20.0));
    }

    #[test]
    fn test_classifier_is_idempotent() {
        let m = Matrix3::new(1.1, 0.05, 3.0, -0.02, 0.9, -4.0, 0.0001, 0.0002, 1.0);
        let h = Homography::from_matrix(m).unwrap();
        let mut putative = Correspondences::new();
        for i in 0..20 {
            let a = Point2::new(10.0 * i as f64, 7.0 * i as f64);
            let b = h.project(&a).unwrap();
            let offset = (i % 5) as f64;
            putative.push_pair(a, Point2::new(b.x + offset, b.y));
        }

        let once = classify_inliers(&putative, &h, 2.5).unwrap();
        let twice = classify_inliers(&once, &h, 2.5).unwrap();
        assert_eq!(once, twice);
        assert_eq!(once.len_pairs(), 12);
        assert_eq!(once.points().len() % 2, 0);
    }

    #[test]
    fn test_degenerate_reprojection() {
        let m = Matrix3::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0);
        let h = Homography::from_matrix(m).unwrap();
        let putative = pairs(&[((1.0, 1.0), (0.5, 0.5)), ((-1.0, 3.0), (0.0, 0.0))]);

        assert!(matches!(
            classify_inliers(&putative, &h, 2.5),
            Err(EvaluationError::DegenerateTransform { pair_index: 1 })
        ));
    }

    #[test]
    fn test_non_finite_point_is_degenerate() {
        let h = Homography::identity();
        let putative = pairs(&[((1.0, 1.0), (1.0, 1.0)), ((f64::NAN, 1.0), (1.0, 1.0))]);

        assert!(matches!(
            classify_inliers(&putative, &h, 2.5),
            Err(EvaluationError::DegenerateTransform { pair_index: 1 })
        ));

        let putative = pairs(&[((1.0, 1.0), (f64::INFINITY, 1.0))]);
        assert!(matches!(
            reprojection_errors(&putative, &h),
            Err(EvaluationError::DegenerateTransform { pair_index: 0 })
        ));
    }

    #[test]
    fn test_invalid_tolerance() {
        let h = Homography::identity();
        let putative = pairs(&[((1.0, 1.0), (1.0, 1.0))]);

        for tolerance in [f64::NAN, -1.0, f64::INFINITY] {
            assert!(matches!(
                classify_inliers(&putative, &h, tolerance),
                Err(EvaluationError::InvalidTolerance(_))
            ));
        }
        assert_eq!(classify_inliers(&putative, &h, 0.0).unwrap().len_pairs(), 1);
    }

    #[test]
    fn test_empty_classification() {
        let inliers = classify_inliers(&Correspondences::new(), &Homography::identity(), 2.5);
        assert!(inliers.unwrap().is_empty());
    }

    #[test]
    fn test_compute_stats() {
        let putative: Correspondences = (0..10)
            .map(|i| (Point2::new(i as f64, 0.0), Point2::new(i as f64, 0.0)))
            .collect();
        let inliers: Correspondences = putative.pairs().take(7).map(|(a, b)| (*a, *b)).collect();

        let stats = compute_stats(&putative, &inliers).unwrap();
        assert_eq!(stats.match_count, 10);
        assert_eq!(stats.inlier_count, 7);
        assert_eq!(stats.outlier_count, 3);
        assert_relative_eq!(stats.inlier_ratio_percent, 70.0);
    }

    #[test]
    fn test_compute_stats_zero_matches() {
        let empty = Correspondences::new();
        assert!(matches!(
            compute_stats(&empty, &empty),
            Err(EvaluationError::UndefinedRatio)
        ));
    }

    #[test]
    fn test_compute_stats_inliers_exceed_matches() {
        let putative = pairs(&[((0.0, 0.0), (0.0, 0.0))]);
        let inliers = pairs(&[((0.0, 0.0), (0.0, 0.0)), ((1.0, 1.0), (1.0, 1.0))]);
        assert!(matches!(
            compute_stats(&putative, &inliers),
            Err(EvaluationError::InlierCountExceedsMatches {
                inliers: 2,
                matches: 1
            })
        ));
    }

    #[test]
    fn test_stats_display() {
        let stats = MatchStatistics {
            match_count: 4,
            inlier_count: 3,
            outlier_count: 1,
            inlier_ratio_percent: 75.0,
        };
        let text = stats.to_string();
        assert!(text.contains("# Matches:"));
        assert!(text.ends_with("75.00"));
    }

    #[test]
    fn test_reprojection_summary() {
        let summary = ReprojectionSummary::from_errors(&[3.0, 1.0, 4.0, 0.0]).unwrap();

        assert_relative_eq!(summary.mean, 2.0);
        assert_relative_eq!(summary.median, 2.0);
        assert_relative_eq!(summary.min, 0.0);
        assert_relative_eq!(summary.max, 4.0);
        assert_relative_eq!(summary.rmse, 6.5_f64.sqrt());
        assert_relative_eq!(summary.stddev, 2.5_f64.sqrt());

        assert!(matches!(
            ReprojectionSummary::from_errors(&[]),
            Err(EvaluationError::Empty)
        ));
    }
}
