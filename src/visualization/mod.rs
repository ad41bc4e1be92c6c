//! Drawing of keypoints and inlier correspondences.
//!
//! [`compose_side_by_side`] places image 1 on the left and image N on the
//! right of a single canvas and connects every inlier pair with a line.
//! [`mark_keypoints`] overlays detected keypoints on an image in place.

use crate::matching::{Correspondences, Keypoint};
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_circle_mut, draw_line_segment_mut};
use log::{debug, warn};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Colours used for the overlays, as RGB triplets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Palette {
    /// Keypoint scale ring.
    pub ring: [u8; 3],
    /// Keypoint centre dot.
    pub center: [u8; 3],
    /// Inlier correspondence line.
    pub line: [u8; 3],
}

impl Default for Palette {
    fn default() -> Self {
        Palette {
            ring: [0, 255, 0],
            center: [0, 0, 255],
            line: [255, 255, 0],
        }
    }
}

/// Draws every keypoint as a ring of radius `2.5 * size / 2` with a centre dot.
///
/// Markers partially outside the image are clipped.
pub fn mark_keypoints(image: &mut RgbImage, keypoints: &[Keypoint], palette: &Palette) {
    for keypoint in keypoints {
        let center = (keypoint.x.round() as i32, keypoint.y.round() as i32);
        let radius = (2.5 * keypoint.size / 2.0).round() as i32;
        draw_hollow_circle_mut(image, center, radius, Rgb(palette.ring));
        draw_filled_circle_mut(image, center, 1, Rgb(palette.center));
    }
}

/// Placement of the two images on the side-by-side canvas.
///
/// Image 1 always sits unscaled at the origin. Image N occupies the region
/// starting at `x = offset_x`; `ufactor` and `vfactor` map image-N pixel
/// coordinates into that region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SideBySideLayout {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub offset_x: u32,
    pub right_width: u32,
    pub right_height: u32,
    pub ufactor: f64,
    pub vfactor: f64,
}

impl SideBySideLayout {
    /// Computes the layout for images of size `first` and `other` (width, height).
    ///
    /// With `resize_to_first` image N is stretched to the size of image 1;
    /// otherwise it is placed unscaled and both factors are `1.0`. An empty
    /// image N has no pixel scale; it is logged and its factors are left at
    /// the region size.
    pub fn new(first: (u32, u32), other: (u32, u32), resize_to_first: bool) -> Self {
        if other.0 == 0 || other.1 == 0 {
            warn!(
                "Image N is empty ({}x{}), correspondence lines cannot be scaled",
                other.0, other.1
            );
        }
        let (width1, height1) = first;
        let (right_width, right_height) = if resize_to_first { first } else { other };

        SideBySideLayout {
            canvas_width: width1 + right_width,
            canvas_height: height1.max(right_height),
            offset_x: width1,
            right_width,
            right_height,
            ufactor: right_width as f64 / other.0.max(1) as f64,
            vfactor: right_height as f64 / other.1.max(1) as f64,
        }
    }

    /// Canvas pixel of an image-1 point.
    pub fn map_first(&self, point: &Point2<f64>) -> (i32, i32) {
        (point.x.round() as i32, point.y.round() as i32)
    }

    /// Canvas pixel of an image-N point.
    pub fn map_other(&self, point: &Point2<f64>) -> (i32, i32) {
        (
            (point.x * self.ufactor + self.offset_x as f64).round() as i32,
            (point.y * self.vfactor).round() as i32,
        )
    }
}

/// Builds the side-by-side canvas and draws one line per inlier pair.
///
/// # Arguments
///
/// * `image1` - Left image; inlier points at even indices live in its frame.
/// * `image_n` - Right image; inlier points at odd indices live in its frame.
/// * `inliers` - Verified correspondences.
/// * `resize_to_first` - Stretch `image_n` to the size of `image1` with linear
///   interpolation. Both images are assumed to share the same aspect ratio.
/// * `palette` - Line colour is taken from `palette.line`.
///
/// # Returns
///
/// A new canvas of `image1.width() + right_width` by the larger height. Areas
/// not covered by either image are black.
pub fn compose_side_by_side(
    image1: &RgbImage,
    image_n: &RgbImage,
    inliers: &Correspondences,
    resize_to_first: bool,
    palette: &Palette,
) -> RgbImage {
    let layout = SideBySideLayout::new(image1.dimensions(), image_n.dimensions(), resize_to_first);
    debug!("Side-by-side layout: {:?}", layout);

    let mut canvas = RgbImage::new(layout.canvas_width, layout.canvas_height);
    imageops::replace(&mut canvas, image1, 0, 0);

    if resize_to_first {
        let aspect1 = image1.width() as f64 / image1.height().max(1) as f64;
        let aspect_n = image_n.width() as f64 / image_n.height().max(1) as f64;
        if (aspect1 - aspect_n).abs() > 0.01 * aspect1 {
            warn!(
                "Images have different aspect ratios ({:.3} vs {:.3}), image N will be distorted",
                aspect1, aspect_n
            );
        }
        let resized = imageops::resize(
            image_n,
            layout.right_width,
            layout.right_height,
            FilterType::Triangle,
        );
        imageops::replace(&mut canvas, &resized, layout.offset_x as i64, 0);
    } else {
        imageops::replace(&mut canvas, image_n, layout.offset_x as i64, 0);
    }

    for (first, other) in inliers.pairs() {
        let (x1, y1) = layout.map_first(first);
        let (xn, yn) = layout.map_other(other);
        draw_line_segment_mut(
            &mut canvas,
            (x1 as f32, y1 as f32),
            (xn as f32, yn as f32),
            Rgb(palette.line),
        );
    }

    canvas
}
