//! Perspective transformation of the source image
//!
//! This module implements the perspective (homography) transformation that
//! maps the source image's own rectangle onto the user-dragged quadrilateral,
//! and the inverse-mapping resampler that produces the warped frame.

use image::{Rgb, RgbImage};
use nalgebra::{Matrix3, SMatrix, SVector};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::geometry::{reference_corners, Point};

/// Ratio of smallest to largest singular value below which the
/// correspondence system is treated as singular
const CONDITION_EPS: f64 = 1e-12;
/// Relative determinant below which the homography is treated as non-invertible
const DETERMINANT_EPS: f64 = 1e-10;
/// Homogeneous weights smaller than this map to infinity
const W_EPS: f64 = 1e-10;
/// Largest accepted `|A*h - b|`, relative to `1 + |b|`
const RESIDUAL_EPS: f64 = 1e-6;

/// Resampling policy for the inverse mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    #[default]
    Bilinear,
    Nearest,
}

/// How a warp samples and fills
#[derive(Debug, Clone, Copy)]
pub struct WarpSettings {
    pub interpolation: Interpolation,
    pub background: Rgb<u8>,
}

impl Default for WarpSettings {
    fn default() -> Self {
        Self {
            interpolation: Interpolation::Bilinear,
            background: Rgb([0, 0, 0]),
        }
    }
}

/// Perspective transformation matrix (3x3 homography)
#[derive(Debug, Clone)]
pub struct PerspectiveTransform {
    /// Forward mapping, reference rectangle to target quadrilateral
    matrix: Matrix3<f64>,
    /// Inverse matrix for reverse mapping (used for warping)
    inverse: Matrix3<f64>,
    /// Set when either solve needed a least-squares fallback
    degenerate: bool,
}

impl PerspectiveTransform {
    /// Map the rectangle of a `width` x `height` image onto `corners`.
    ///
    /// A one-pixel axis has coincident reference corners, so both sides get
    /// a unit extent along it; corners on that axis then keep their offset.
    pub fn from_corners(corners: &[Point; 4], width: u32, height: u32) -> Self {
        let mut src = reference_corners(width, height).map(Point::to_f64);
        let mut dst = corners.map(Point::to_f64);

        if width <= 1 {
            for i in [1, 2] {
                src[i].0 += 1.0;
                dst[i].0 += 1.0;
            }
        }
        if height <= 1 {
            for i in [2, 3] {
                src[i].1 += 1.0;
                dst[i].1 += 1.0;
            }
        }

        Self::compute(src, dst)
    }

    /// Compute the perspective transform from 4 source points to 4 destination points
    pub fn compute(src: [(f64, f64); 4], dst: [(f64, f64); 4]) -> Self {
        let (matrix, exact) = compute_homography(src, dst);
        let (inverse, invertible) = invert_homography(&matrix);

        Self {
            matrix,
            inverse,
            degenerate: !(exact && invertible),
        }
    }

    /// Whether the corners made the solve ill-conditioned
    pub fn is_degenerate(&self) -> bool {
        self.degenerate
    }

    /// Transform a point from source to destination coordinates.
    /// Returns `None` for points on the line at infinity.
    #[cfg(test)]
    pub fn transform_point(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        apply_homography(&self.matrix, x, y)
    }

    /// Transform a point from destination to source coordinates (inverse)
    #[inline]
    pub fn inverse_transform_point(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        apply_homography(&self.inverse, x, y)
    }

    /// Resample `source` through the inverse mapping into a same-sized image
    pub fn warp_image(&self, source: &RgbImage, settings: &WarpSettings) -> RgbImage {
        let (width, height) = source.dimensions();
        let mut output = RgbImage::new(width, height);
        if width == 0 || height == 0 {
            return output;
        }

        let src = source.as_raw().as_slice();
        let stride = width as usize * 3;
        let dst: &mut [u8] = &mut output;

        dst.par_chunks_mut(stride)
            .enumerate()
            .for_each(|(dst_y, row)| {
                for (dst_x, pixel) in row.chunks_exact_mut(3).enumerate() {
                    // Map destination pixel to source coordinates
                    let value = self
                        .inverse_transform_point(dst_x as f64, dst_y as f64)
                        .and_then(|(sx, sy)| {
                            sample(src, width as usize, height as usize, sx, sy, settings.interpolation)
                        })
                        .unwrap_or(settings.background.0);
                    pixel.copy_from_slice(&value);
                }
            });

        output
    }
}

/// Warp `source` so its rectangle lands on `corners`
pub fn warp(source: &RgbImage, corners: &[Point; 4], settings: &WarpSettings) -> RgbImage {
    let transform = PerspectiveTransform::from_corners(corners, source.width(), source.height());
    if transform.is_degenerate() {
        debug!(
            "Degenerate corner configuration {:?}, using fallback matrix {:?}",
            corners, transform.matrix
        );
    }
    transform.warp_image(source, settings)
}

/// Compute a 3x3 homography matrix from 4 point correspondences.
///
/// The boolean is false when the system was singular and the minimum-norm
/// least-squares solution (or the identity) was used instead.
fn compute_homography(src: [(f64, f64); 4], dst: [(f64, f64); 4]) -> (Matrix3<f64>, bool) {
    // For each correspondence (x,y) -> (x',y') with h33 = 1:
    //   x*h1 + y*h2 + h3 - x'*x*h7 - x'*y*h8 = x'
    //   x*h4 + y*h5 + h6 - y'*x*h7 - y'*y*h8 = y'
    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();

    for i in 0..4 {
        let (x, y) = src[i];
        let (xp, yp) = dst[i];

        let row1 = i * 2;
        let row2 = i * 2 + 1;

        a[(row1, 0)] = x;
        a[(row1, 1)] = y;
        a[(row1, 2)] = 1.0;
        a[(row1, 6)] = -xp * x;
        a[(row1, 7)] = -xp * y;
        b[row1] = xp;

        a[(row2, 3)] = x;
        a[(row2, 4)] = y;
        a[(row2, 5)] = 1.0;
        a[(row2, 6)] = -yp * x;
        a[(row2, 7)] = -yp * y;
        b[row2] = yp;
    }

    let svd = a.svd(true, true);
    let max_sv = svd.singular_values.max();
    let min_sv = svd.singular_values.min();

    if max_sv > 0.0 && min_sv / max_sv > CONDITION_EPS {
        if let Some(h) = a.lu().solve(&b) {
            if residual_ok(&a, &h, &b) {
                return (to_matrix(&h), true);
            }
        }
    }

    match svd.solve(&b, max_sv * CONDITION_EPS) {
        Ok(h) if h.iter().all(|v| v.is_finite()) => (to_matrix(&h), false),
        _ => (Matrix3::identity(), false),
    }
}

/// Whether `h` is a finite solution of `a * h = b` up to rounding
fn residual_ok(a: &SMatrix<f64, 8, 8>, h: &SVector<f64, 8>, b: &SVector<f64, 8>) -> bool {
    if !h.iter().all(|v| v.is_finite()) {
        return false;
    }
    let residual = (a * h - b).norm();
    residual.is_finite() && residual <= RESIDUAL_EPS * (1.0 + b.norm())
}

fn to_matrix(h: &SVector<f64, 8>) -> Matrix3<f64> {
    Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0)
}

/// Invert a homography, falling back to the pseudo-inverse when singular
fn invert_homography(m: &Matrix3<f64>) -> (Matrix3<f64>, bool) {
    let scale = m.abs().max().max(f64::MIN_POSITIVE);
    let det = m.determinant();

    if det.is_finite() && det.abs() / scale.powi(3) > DETERMINANT_EPS {
        if let Some(inv) = m.try_inverse() {
            if inv.iter().all(|v| v.is_finite()) {
                return (inv, true);
            }
        }
    }

    match m.pseudo_inverse(scale * DETERMINANT_EPS) {
        Ok(inv) if inv.iter().all(|v| v.is_finite()) => (inv, false),
        _ => (Matrix3::identity(), false),
    }
}

/// Apply a homography matrix to a point
#[inline]
fn apply_homography(h: &Matrix3<f64>, x: f64, y: f64) -> Option<(f64, f64)> {
    let w = h[(2, 0)] * x + h[(2, 1)] * y + h[(2, 2)];
    if !w.is_finite() || w.abs() < W_EPS {
        return None;
    }
    let xp = (h[(0, 0)] * x + h[(0, 1)] * y + h[(0, 2)]) / w;
    let yp = (h[(1, 0)] * x + h[(1, 1)] * y + h[(1, 2)]) / w;
    if xp.is_finite() && yp.is_finite() {
        Some((xp, yp))
    } else {
        None
    }
}

/// Sample an RGB pixel if (x, y) falls on the source image.
/// A pixel covers half a unit on each side of its centre.
#[inline]
fn sample(
    src: &[u8],
    width: usize,
    height: usize,
    x: f64,
    y: f64,
    interpolation: Interpolation,
) -> Option<[u8; 3]> {
    let max_x = (width - 1) as f64;
    let max_y = (height - 1) as f64;
    if x < -0.5 || y < -0.5 || x > max_x + 0.5 || y > max_y + 0.5 {
        return None;
    }

    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);

    Some(match interpolation {
        Interpolation::Bilinear => bilinear_sample(src, width, height, x, y),
        Interpolation::Nearest => nearest_sample(src, width, height, x, y),
    })
}

/// Bilinear interpolation sampling (coordinates already clamped)
#[inline]
fn bilinear_sample(src: &[u8], width: usize, height: usize, x: f64, y: f64) -> [u8; 3] {
    let stride = width * 3;

    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);

    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let mut result = [0u8; 3];

    for (c, out) in result.iter_mut().enumerate() {
        let p00 = src.get(y0 * stride + x0 * 3 + c).copied().unwrap_or(0) as f64;
        let p10 = src.get(y0 * stride + x1 * 3 + c).copied().unwrap_or(0) as f64;
        let p01 = src.get(y1 * stride + x0 * 3 + c).copied().unwrap_or(0) as f64;
        let p11 = src.get(y1 * stride + x1 * 3 + c).copied().unwrap_or(0) as f64;

        let value = p00 * (1.0 - fx) * (1.0 - fy)
            + p10 * fx * (1.0 - fy)
            + p01 * (1.0 - fx) * fy
            + p11 * fx * fy;

        *out = value.round().clamp(0.0, 255.0) as u8;
    }

    result
}

/// Nearest-neighbor sampling (coordinates already clamped)
#[inline]
fn nearest_sample(src: &[u8], width: usize, height: usize, x: f64, y: f64) -> [u8; 3] {
    let x = (x.round() as usize).min(width - 1);
    let y = (y.round() as usize).min(height - 1);

    let offset = (y * width + x) * 3;
    let mut result = [0u8; 3];

    for (c, out) in result.iter_mut().enumerate() {
        *out = src.get(offset + c).copied().unwrap_or(0);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 255 / width) as u8, (y * 255 / height) as u8, ((x + y) % 256) as u8])
        })
    }

    fn mean_abs_diff(a: &RgbImage, b: &RgbImage) -> f64 {
        let total: u64 = a
            .as_raw()
            .iter()
            .zip(b.as_raw().iter())
            .map(|(&p, &q)| (p as i64 - q as i64).unsigned_abs())
            .sum();
        total as f64 / a.as_raw().len() as f64
    }

    #[test]
    fn test_identity_transform() {
        let src = [(0.0, 0.0), (100.0, 0.0), (100.0, 100.0), (0.0, 100.0)];
        let transform = PerspectiveTransform::compute(src, src);

        let (x, y) = transform.transform_point(50.0, 50.0).unwrap();
        assert!((x - 50.0).abs() < 0.01);
        assert!((y - 50.0).abs() < 0.01);
        assert!(!transform.is_degenerate());
    }

    #[test]
    fn test_simple_transform() {
        let src = [(10.0, 10.0), (90.0, 10.0), (90.0, 90.0), (10.0, 90.0)];
        let dst = [(0.0, 0.0), (100.0, 0.0), (100.0, 100.0), (0.0, 100.0)];

        let transform = PerspectiveTransform::compute(src, dst);

        let (x, y) = transform.transform_point(10.0, 10.0).unwrap();
        assert!(x.abs() < 1.0);
        assert!(y.abs() < 1.0);

        let (x, y) = transform.inverse_transform_point(100.0, 100.0).unwrap();
        assert!((x - 90.0).abs() < 1e-6);
        assert!((y - 90.0).abs() < 1e-6);
    }

    #[test]
    fn test_corners_map_onto_targets() {
        let corners = [
            Point::new(20, 20),
            Point::new(99, 0),
            Point::new(80, 90),
            Point::new(5, 99),
        ];
        let transform = PerspectiveTransform::from_corners(&corners, 100, 100);
        let reference = reference_corners(100, 100);

        for (r, c) in reference.iter().zip(corners.iter()) {
            let (x, y) = transform.transform_point(r.x as f64, r.y as f64).unwrap();
            assert!((x - c.x as f64).abs() < 1e-6);
            assert!((y - c.y as f64).abs() < 1e-6);
        }
    }

    #[test]
    fn test_identity_warp_reproduces_source() {
        let source = gradient(64, 48);
        let corners = reference_corners(64, 48);

        let bilinear = warp(&source, &corners, &WarpSettings::default());
        assert!(mean_abs_diff(&source, &bilinear) <= 1.0);

        let settings = WarpSettings {
            interpolation: Interpolation::Nearest,
            ..WarpSettings::default()
        };
        let nearest = warp(&source, &corners, &settings);
        assert_eq!(nearest, source);
    }

    #[test]
    fn test_dimensions_preserved() {
        let source = gradient(37, 23);
        let configs = [
            reference_corners(37, 23),
            [Point::new(5, 5), Point::new(30, 2), Point::new(36, 22), Point::new(0, 20)],
            [Point::new(36, 22), Point::new(0, 22), Point::new(0, 0), Point::new(36, 0)],
            [Point::new(-50, -50), Point::new(500, 0), Point::new(10, 10), Point::new(0, 300)],
        ];

        for corners in configs.iter() {
            let out = warp(&source, corners, &WarpSettings::default());
            assert_eq!(out.dimensions(), (37, 23));
        }
    }

    #[test]
    fn test_outside_quad_is_background() {
        let source = RgbImage::from_pixel(100, 100, Rgb([255, 255, 255]));
        let corners = [
            Point::new(20, 20),
            Point::new(99, 0),
            Point::new(99, 99),
            Point::new(0, 99),
        ];
        let settings = WarpSettings {
            background: Rgb([10, 20, 30]),
            ..WarpSettings::default()
        };

        let out = warp(&source, &corners, &settings);
        assert_eq!(out.get_pixel(5, 5), &Rgb([10, 20, 30]));
        assert_eq!(out.get_pixel(60, 60), &Rgb([255, 255, 255]));
    }

    #[test]
    fn test_collinear_corners_do_not_panic() {
        let source = gradient(100, 100);
        let corners = [
            Point::new(0, 0),
            Point::new(50, 0),
            Point::new(100, 0),
            Point::new(0, 100),
        ];

        let out = warp(&source, &corners, &WarpSettings::default());
        assert_eq!(out.dimensions(), (100, 100));
    }

    #[test]
    fn test_coincident_corners_flagged_degenerate() {
        let corners = [Point::new(0, 0); 4];
        let transform = PerspectiveTransform::from_corners(&corners, 100, 100);
        assert!(transform.is_degenerate());

        let source = gradient(100, 100);
        let out = transform.warp_image(&source, &WarpSettings::default());
        assert_eq!(out.dimensions(), (100, 100));
    }

    #[test]
    fn test_single_pixel_image() {
        let source = RgbImage::from_pixel(1, 1, Rgb([7, 8, 9]));
        let corners = reference_corners(1, 1);
        let transform = PerspectiveTransform::from_corners(&corners, 1, 1);
        assert!(!transform.is_degenerate());

        let out = warp(&source, &corners, &WarpSettings::default());
        assert_eq!(out.dimensions(), (1, 1));
        assert_eq!(out.get_pixel(0, 0), &Rgb([7, 8, 9]));
    }

    #[test]
    fn test_identity_warp_single_column_and_row() {
        for (width, height) in [(1, 10), (10, 1)] {
            let source = gradient(width, height);
            let corners = reference_corners(width, height);

            let transform = PerspectiveTransform::from_corners(&corners, width, height);
            assert!(!transform.is_degenerate());

            let out = warp(&source, &corners, &WarpSettings::default());
            assert!(mean_abs_diff(&source, &out) <= 1.0, "{}x{}", width, height);
        }
    }

    #[test]
    fn test_residual_rejects_wrong_solution() {
        let a = SMatrix::<f64, 8, 8>::identity() * 2.0;
        let b = SVector::<f64, 8>::from_element(4.0);

        assert!(residual_ok(&a, &SVector::from_element(2.0), &b));
        assert!(!residual_ok(&a, &SVector::zeros(), &b));
        assert!(!residual_ok(&a, &SVector::from_element(f64::NAN), &b));
    }

    #[test]
    fn test_warp_is_deterministic() {
        let source = gradient(50, 40);
        let corners = [
            Point::new(10, 3),
            Point::new(45, 8),
            Point::new(40, 39),
            Point::new(2, 30),
        ];
        let first = warp(&source, &corners, &WarpSettings::default());
        let second = warp(&source, &corners, &WarpSettings::default());
        assert_eq!(first, second);
    }
}
