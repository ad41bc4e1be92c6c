//! Putative correspondences from ranked descriptor matches.
//!
//! The detector and matcher live outside this crate. They hand over
//! [`Keypoint`]s for both images and, for every query keypoint, a
//! [`CandidateMatch`] listing its nearest reference keypoints by ascending
//! descriptor distance. [`filter_nndr`] turns those lists into
//! [`Correspondences`] using the nearest-neighbor distance ratio test.

use log::{debug, trace};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(thiserror::Error, Debug)]
pub enum MatchingError {
    #[error("NNDR ratio must be in (0, 1], got {0}")]
    InvalidRatio(f64),
    #[error("{kind} keypoint index {index} out of range ({len} keypoints)")]
    IndexOutOfRange {
        kind: KeypointSet,
        index: usize,
        len: usize,
    },
    #[error("Correspondence sequence must have even length, got {0} points")]
    OddLength(usize),
}

/// Identifies which keypoint list an index refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeypointSet {
    Query,
    Reference,
}

impl fmt::Display for KeypointSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeypointSet::Query => write!(f, "Query"),
            KeypointSet::Reference => write!(f, "Reference"),
        }
    }
}

/// A detected keypoint: image location and scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f64,
    pub y: f64,
    /// Diameter of the meaningful keypoint neighborhood, in pixels.
    pub size: f64,
}

impl Keypoint {
    pub fn new(x: f64, y: f64, size: f64) -> Self {
        Keypoint { x, y, size }
    }

    pub fn pt(&self) -> Point2<f64> {
        Point2::new(self.x, self.y)
    }
}

/// One ranked neighbor of a query descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub reference_index: usize,
    pub distance: f64,
}

/// Ranked neighbors of a single query keypoint, best first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateMatch {
    pub query_index: usize,
    pub neighbors: Vec<Neighbor>,
}

impl CandidateMatch {
    /// Builds the usual k = 2 candidate from a best and second-best neighbor.
    pub fn new(query_index: usize, best: Neighbor, second: Neighbor) -> Self {
        CandidateMatch {
            query_index,
            neighbors: vec![best, second],
        }
    }
}

/// Flat list of point pairs: index `2k` lies in image 1, `2k + 1` in image N.
///
/// The sequence only ever grows by whole pairs, so its length is always even.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Correspondences {
    points: Vec<Point2<f64>>,
}

impl Correspondences {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an existing flat point list.
    ///
    /// # Errors
    ///
    /// * [`MatchingError::OddLength`] if `points` does not hold whole pairs.
    pub fn from_points(points: Vec<Point2<f64>>) -> Result<Self, MatchingError> {
        if points.len() % 2 != 0 {
            return Err(MatchingError::OddLength(points.len()));
        }
        Ok(Correspondences { points })
    }

    pub fn push_pair(&mut self, first: Point2<f64>, other: Point2<f64>) {
        self.points.push(first);
        self.points.push(other);
    }

    /// The flat, even-length point list.
    pub fn points(&self) -> &[Point2<f64>] {
        &self.points
    }

    /// Iterates `(image-1 point, image-N point)` pairs in order.
    pub fn pairs(&self) -> impl Iterator<Item = (&Point2<f64>, &Point2<f64>)> + '_ {
        self.points.chunks_exact(2).map(|pair| (&pair[0], &pair[1]))
    }

    /// Number of pairs, i.e. half the number of points.
    pub fn len_pairs(&self) -> usize {
        self.points.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn into_points(self) -> Vec<Point2<f64>> {
        self.points
    }
}

impl FromIterator<(Point2<f64>, Point2<f64>)> for Correspondences {
    fn from_iter<I: IntoIterator<Item = (Point2<f64>, Point2<f64>)>>(iter: I) -> Self {
        let mut correspondences = Correspondences::new();
        for (first, other) in iter {
            correspondences.push_pair(first, other);
        }
        correspondences
    }
}

fn keypoint_at(
    keypoints: &[Keypoint],
    index: usize,
    kind: KeypointSet,
) -> Result<&Keypoint, MatchingError> {
    keypoints.get(index).ok_or(MatchingError::IndexOutOfRange {
        kind,
        index,
        len: keypoints.len(),
    })
}

/// Keeps the candidates that pass the nearest-neighbor distance ratio test.
///
/// A candidate is accepted when `best.distance < ratio * second.distance`.
/// For each accepted candidate the query keypoint location and the location of
/// its best reference keypoint are appended as one pair. Candidates with fewer
/// than two neighbors carry no ratio information and are skipped.
///
/// # Arguments
///
/// * `query_keypoints` - Keypoints of image 1, indexed by `CandidateMatch::query_index`.
/// * `reference_keypoints` - Keypoints of image N, indexed by `Neighbor::reference_index`.
/// * `candidate_matches` - Ranked neighbors, one entry per query keypoint.
/// * `ratio` - Acceptance threshold in `(0, 1]`; lower is stricter. Typically `0.8`.
///
/// # Errors
///
/// * [`MatchingError::InvalidRatio`] if `ratio` is outside `(0, 1]`.
/// * [`MatchingError::IndexOutOfRange`] if an accepted candidate references a
///   missing keypoint.
pub fn filter_nndr(
    query_keypoints: &[Keypoint],
    reference_keypoints: &[Keypoint],
    candidate_matches: &[CandidateMatch],
    ratio: f64,
) -> Result<Correspondences, MatchingError> {
    if !(ratio > 0.0 && ratio <= 1.0) {
        return Err(MatchingError::InvalidRatio(ratio));
    }

    let mut correspondences = Correspondences::new();
    for candidate in candidate_matches {
        let (best, second) = match candidate.neighbors.as_slice() {
            [best, second, ..] => (best, second),
            _ => {
                trace!(
                    "Skipping query keypoint {}: {} neighbor(s)",
                    candidate.query_index,
                    candidate.neighbors.len()
                );
                continue;
            }
        };

        if best.distance < ratio * second.distance {
            let query = keypoint_at(query_keypoints, candidate.query_index, KeypointSet::Query)?;
            let reference = keypoint_at(
                reference_keypoints,
                best.reference_index,
                KeypointSet::Reference,
            )?;
            correspondences.push_pair(query.pt(), reference.pt());
        }
    }

    debug!(
        "NNDR filter (ratio {}): {} of {} candidates accepted",
        ratio,
        correspondences.len_pairs(),
        candidate_matches.len()
    );

    Ok(correspondences)
}
