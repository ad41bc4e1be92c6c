//! Ground-truth planar homography.
//!
//! This module provides the [`Homography`] type used to verify correspondences
//! between a reference image and a transformed view of the same planar scene.
//! Homographies are read from the plain text format used by the classic
//! Oxford affine-covariant benchmark: three lines, each holding one matrix row
//! of three whitespace separated numbers.
//!
//! ```text
//! 8.7976964e-01   3.1245438e-01  -3.9430589e+01
//! -1.8389418e-01   9.3847198e-01   1.5315784e+02
//! 1.9641425e-04  -1.6015275e-05   1.0000000e+00
//! ```

use log::debug;
use nalgebra::{Matrix3, Point2, Vector3};
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};

#[derive(thiserror::Error, Debug)]
pub enum HomographyError {
    #[error("Failed to parse homography at line {line}: {reason}")]
    Parse { line: usize, reason: String },
    #[error("Degenerate homography: coefficients must be finite and the bottom-right one non-zero")]
    DegenerateTransform,
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
}

/// A 3x3 projective transform from image-1 coordinates to image-N coordinates.
///
/// The matrix is always normalized so that its bottom-right coefficient is
/// exactly `1.0`. Instances can only be created through the normalizing
/// constructors, so callers never need to renormalize.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography {
    matrix: Matrix3<f64>,
}

impl Homography {
    /// The identity transform.
    pub fn identity() -> Self {
        Homography {
            matrix: Matrix3::identity(),
        }
    }

    /// Normalizes `matrix` by its bottom-right coefficient.
    ///
    /// # Errors
    ///
    /// * [`HomographyError::DegenerateTransform`] if `matrix[(2, 2)]` is zero or
    ///   any coefficient, before or after normalization, is not finite.
    pub fn from_matrix(matrix: Matrix3<f64>) -> Result<Self, HomographyError> {
        let h33 = matrix[(2, 2)];
        if h33 == 0.0 || matrix.iter().any(|c| !c.is_finite()) {
            return Err(HomographyError::DegenerateTransform);
        }

        let normalized = matrix / h33;
        if normalized.iter().any(|c| !c.is_finite()) {
            return Err(HomographyError::DegenerateTransform);
        }

        Ok(Homography { matrix: normalized })
    }

    /// Loads a homography from a text file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to a file in the three-row text format.
    ///
    /// # Errors
    ///
    /// * [`HomographyError::Io`] if the file cannot be opened or read.
    /// * Any error returned by [`load_homography`].
    pub fn load_from_file(path: &str) -> Result<Self, HomographyError> {
        let file = File::open(path)?;
        let homography = load_homography(BufReader::new(file))?;
        debug!("Loaded homography from {}: {}", path, homography.matrix);
        Ok(homography)
    }

    /// The normalized matrix.
    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }

    /// Maps a point through the transform.
    ///
    /// With `s = h31 * x + h32 * y + h33`, the image is
    /// `((h11 * x + h12 * y + h13) / s, (h21 * x + h22 * y + h23) / s)`.
    /// Returns `None` when `s` is zero, i.e. the point is sent to the line at
    /// infinity, or when `s` is not finite.
    pub fn project(&self, point: &Point2<f64>) -> Option<Point2<f64>> {
        let mapped = self.matrix * Vector3::new(point.x, point.y, 1.0);
        if mapped.z == 0.0 || !mapped.z.is_finite() {
            return None;
        }
        Some(Point2::new(mapped.x / mapped.z, mapped.y / mapped.z))
    }
}

/// Parses a homography from three text rows and normalizes it.
///
/// Each of the first three lines must start with three floating point values;
/// anything after the third value, and any line after the third, is ignored.
///
/// # Errors
///
/// * [`HomographyError::Parse`] if fewer than three lines are present, a line
///   is not valid UTF-8, or a line does not start with three numeric tokens.
/// * [`HomographyError::DegenerateTransform`] if the raw bottom-right element is zero
///   or a coefficient is not finite.
/// * [`HomographyError::Io`] if reading from `reader` fails.
pub fn load_homography<R: BufRead>(mut reader: R) -> Result<Homography, HomographyError> {
    let mut matrix = Matrix3::zeros();
    let mut line = String::new();

    for row in 0..3 {
        line.clear();
        let read = reader.read_line(&mut line).map_err(|e| match e.kind() {
            ErrorKind::InvalidData => HomographyError::Parse {
                line: row + 1,
                reason: format!("invalid text: {e}"),
            },
            _ => HomographyError::Io(e),
        })?;
        if read == 0 {
            return Err(HomographyError::Parse {
                line: row + 1,
                reason: format!("expected 3 rows, found {row}"),
            });
        }

        let mut tokens = line.split_whitespace();
        for col in 0..3 {
            let token = tokens.next().ok_or_else(|| HomographyError::Parse {
                line: row + 1,
                reason: format!("expected 3 values, found {col}"),
            })?;
            matrix[(row, col)] = token.parse::<f64>().map_err(|e| HomographyError::Parse {
                line: row + 1,
                reason: format!("invalid value '{token}': {e}"),
            })?;
        }
    }

    Homography::from_matrix(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_load_normalizes_by_bottom_right() {
        let text = "2 0 0\n0 2 0\n0 0 2\n";
        let h = load_homography(text.as_bytes()).unwrap();

        assert_eq!(*h.matrix(), Matrix3::identity());
    }

    #[test]
    fn test_load_general_matrix() {
        let text = "1.0 0.5 10\n-0.25 2.0 4.0\n0.001 0.002 4.0\n";
        let h = load_homography(text.as_bytes()).unwrap();
        let m = h.matrix();

        assert_relative_eq!(m[(0, 0)], 0.25);
        assert_relative_eq!(m[(0, 1)], 0.125);
        assert_relative_eq!(m[(0, 2)], 2.5);
        assert_relative_eq!(m[(1, 0)], -0.0625);
        assert_relative_eq!(m[(2, 0)], 0.00025);
        assert_relative_eq!(m[(2, 2)], 1.0);
    }

    #[test]
    fn test_load_ignores_trailing_content() {
        let text = "1 0 0 trailing\n0 1 0 99\n0 0 1\nextra line\n";
        let h = load_homography(text.as_bytes()).unwrap();

        assert_eq!(*h.matrix(), Matrix3::identity());
    }

    #[test]
    fn test_load_scientific_notation_and_tabs() {
        let text = "1.0e+00\t0.0e+00\t5.0e-01\n0 1 0\n0 0 1";
        let h = load_homography(text.as_bytes()).unwrap();

        assert_relative_eq!(h.matrix()[(0, 2)], 0.5);
    }

    #[test]
    fn test_load_missing_line() {
        let text = "1 0 0\n0 1 0\n";
        match load_homography(text.as_bytes()) {
            Err(HomographyError::Parse { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_load_blank_row_is_rejected() {
        let text = "1 0 0\n\n0 1 0\n0 0 1\n";
        match load_homography(text.as_bytes()) {
            Err(HomographyError::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_load_short_row() {
        let text = "1 0 0\n0 1\n0 0 1\n";
        assert!(matches!(
            load_homography(text.as_bytes()),
            Err(HomographyError::Parse { line: 2, .. })
        ));
    }

    #[test]
    fn test_load_non_numeric_token() {
        let text = "1 0 0\n0 1 0\n0 x 1\n";
        assert!(matches!(
            load_homography(text.as_bytes()),
            Err(HomographyError::Parse { line: 3, .. })
        ));
    }

    #[test]
    fn test_load_zero_bottom_right() {
        let text = "1 0 0\n0 1 0\n0 0 0\n";
        assert!(matches!(
            load_homography(text.as_bytes()),
            Err(HomographyError::DegenerateTransform)
        ));
    }

    #[test]
    fn test_load_non_finite_coefficient() {
        for text in [
            "nan 0 0\n0 1 0\n0 0 1\n",
            "1 0 0\n0 inf 0\n0 0 1\n",
            "1 0 0\n0 1 0\n-inf 0 1\n",
        ] {
            assert!(
                matches!(
                    load_homography(text.as_bytes()),
                    Err(HomographyError::DegenerateTransform)
                ),
                "accepted non-finite coefficient in {text:?}"
            );
        }
    }

    #[test]
    fn test_from_matrix_overflow_after_normalization() {
        let m = Matrix3::new(1e300, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1e-300);
        assert!(matches!(
            Homography::from_matrix(m),
            Err(HomographyError::DegenerateTransform)
        ));
    }

    #[test]
    fn test_load_invalid_utf8_is_parse_error() {
        let bytes: &[u8] = b"1 0 0\n0 \xff 0\n0 0 1\n";
        assert!(matches!(
            load_homography(bytes),
            Err(HomographyError::Parse { line: 2, .. })
        ));
    }

    #[test]
    fn test_load_from_file() {
        let h = Homography::load_from_file("samples/H1to2_scale").unwrap();

        assert_relative_eq!(h.matrix()[(0, 0)], 0.5);
        assert_relative_eq!(h.matrix()[(1, 1)], 0.5);
        assert_relative_eq!(h.matrix()[(2, 2)], 1.0);
    }

    #[test]
    fn test_load_from_missing_file() {
        assert!(matches!(
            Homography::load_from_file("samples/does_not_exist"),
            Err(HomographyError::Io(_))
        ));
    }

    #[test]
    fn test_project() {
        let m = Matrix3::new(2.0, 0.0, 1.0, 0.0, 2.0, -1.0, 0.0, 0.0, 1.0);
        let h = Homography::from_matrix(m).unwrap();
        let p = h.project(&Point2::new(3.0, 4.0)).unwrap();

        assert_relative_eq!(p.x, 7.0);
        assert_relative_eq!(p.y, 7.0);
    }

    #[test]
    fn test_project_to_infinity() {
        // Row 3 is (1, 0, 1): x = -1 maps to the line at infinity.
        let m = Matrix3::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0);
        let h = Homography::from_matrix(m).unwrap();

        assert!(h.project(&Point2::new(-1.0, 5.0)).is_none());
        assert!(h.project(&Point2::new(1.0, 5.0)).is_some());
    }

    #[test]
    fn test_project_non_finite_point() {
        let h = Homography::identity();
        assert!(h.project(&Point2::new(f64::NAN, 1.0)).is_none());
    }
}
