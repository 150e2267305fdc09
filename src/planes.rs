// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Contains the PlaneMapper struct, which describes a relationship
//! between the pixel grid of an image, with an origin at 0,0, and a
//! rectangle on the complex plane (the "viewport") defined by its
//! left-lower and right-upper corners.
use num::{Complex, Float};

use crate::errors::{JuliaError, Result};

/// Describes the width and height of an integral plane that is assumed to start at
/// 0,0 and all values are assumed to be non-negative integers.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct IntegralPlane(pub u32, pub u32);

/// Describes the lower-left corner and upper-right corner of the
/// Complex plane, treating the real part of each value as the
/// x-component and the imaginary part of each value as the
/// y-component.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ComplexPlane(pub Complex<f64>, pub Complex<f64>);

/// The column and row of a pixel.  Only ever constructed for pixels
/// known to be inside the image.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Pixel(pub u32, pub u32);

/// Maps pixels of an image onto the viewport.  Column 0 lands on the
/// left edge of the viewport and row 0 on its lower edge; the far edges
/// are never reached, as in any half-open pixel grid.
#[derive(Debug)]
pub struct PlaneMapper {
    /// The size of the image, in pixels.
    pub integral_plane: IntegralPlane,
    /// The two coordinates defining the viewport, left-lower and
    /// right-upper
    pub complex_plane: ComplexPlane,
}

/// The float widths a viewport can be sampled in.  The corners are
/// kept as `f64` and narrowed before any arithmetic, so an `f32`
/// sample is computed entirely in single precision.
pub trait Real: Float {
    /// Narrow a double constant to this width.
    fn narrow(value: f64) -> Self;
    /// Widen back to a double.
    fn widen(self) -> f64;
    /// A pixel index, image size or iteration count.
    fn count(n: u32) -> Self;
}

impl Real for f32 {
    fn narrow(value: f64) -> f32 {
        value as f32
    }
    fn widen(self) -> f64 {
        f64::from(self)
    }
    fn count(n: u32) -> f32 {
        n as f32
    }
}

impl Real for f64 {
    fn narrow(value: f64) -> f64 {
        value
    }
    fn widen(self) -> f64 {
        self
    }
    fn count(n: u32) -> f64 {
        f64::from(n)
    }
}

impl PlaneMapper {
    /// Takes the size of the image and the two corners of the viewport.
    /// Fails if the viewport is empty or inside-out.
    pub fn new(
        width: u32,
        height: u32,
        leftlower: Complex<f64>,
        rightupper: Complex<f64>,
    ) -> Result<PlaneMapper> {
        if !(rightupper.re > leftlower.re) {
            return Err(JuliaError::InvalidViewport(
                "The left lower corner is not to the left of the right upper corner.".to_string(),
            ));
        }

        if !(rightupper.im > leftlower.im) {
            return Err(JuliaError::InvalidViewport(
                "The left lower corner is not lower than the right upper corner".to_string(),
            ));
        }

        Ok(PlaneMapper {
            integral_plane: IntegralPlane(width, height),
            complex_plane: ComplexPlane(leftlower, rightupper),
        })
    }

    /// Checks a signed coordinate against the image bounds, handing
    /// back a Pixel only when it is inside.
    pub fn pixel(&self, x: i64, y: i64) -> Option<Pixel> {
        if x < 0
            || y < 0
            || x >= i64::from(self.integral_plane.0)
            || y >= i64::from(self.integral_plane.1)
        {
            return None;
        }
        Some(Pixel(x as u32, y as u32))
    }

    /// Given a pixel on the integral cartesian plane, return the point
    /// on the viewport it stands for, computed in `T`.
    pub fn pixel_to_point<T: Real>(&self, pixel: &Pixel) -> Complex<T> {
        let ComplexPlane(leftlower, rightupper) = self.complex_plane;
        let (left, lower) = (T::narrow(leftlower.re), T::narrow(leftlower.im));
        let width = T::narrow(rightupper.re) - left;
        let height = T::narrow(rightupper.im) - lower;
        Complex::new(
            width * T::count(pixel.0) / T::count(self.integral_plane.0) + left,
            height * T::count(pixel.1) / T::count(self.integral_plane.1) + lower,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planemapper_fails_on_bad_shape() {
        let pm = PlaneMapper::new(4, 4, Complex::new(-1.0, 1.0), Complex::new(1.0, -1.0));
        assert!(pm.is_err());
    }

    #[test]
    fn planemapper_fails_on_flat_viewport() {
        let pm = PlaneMapper::new(4, 4, Complex::new(-1.0, 0.0), Complex::new(1.0, 0.0));
        assert!(pm.is_err());
    }

    #[test]
    fn planemapper_passes_on_good_shape() {
        let pm = PlaneMapper::new(4, 4, Complex::new(-1.0, -1.0), Complex::new(1.0, 1.0));
        assert!(pm.is_ok());
    }

    #[test]
    fn pixel_to_point_on_positive_planes() {
        let pm = PlaneMapper::new(5, 5, Complex::new(0.0, 0.0), Complex::new(5.0, 5.0)).unwrap();
        assert_eq!(pm.pixel_to_point::<f64>(&Pixel(0, 0)), Complex::new(0.0, 0.0));
        assert_eq!(pm.pixel_to_point::<f64>(&Pixel(2, 2)), Complex::new(2.0, 2.0));
        assert_eq!(pm.pixel_to_point::<f64>(&Pixel(4, 4)), Complex::new(4.0, 4.0));
    }

    #[test]
    fn pixel_to_points_on_mixed_planes() {
        let pm = PlaneMapper::new(4, 4, Complex::new(-2.0, -2.0), Complex::new(2.0, 2.0)).unwrap();
        assert_eq!(pm.pixel_to_point::<f64>(&Pixel(2, 2)), Complex::new(0.0, 0.0));
        assert_eq!(pm.pixel_to_point::<f64>(&Pixel(0, 0)), Complex::new(-2.0, -2.0));
        assert_eq!(pm.pixel_to_point::<f64>(&Pixel(3, 1)), Complex::new(1.0, -1.0));
    }

    #[test]
    fn pixel_checks_bounds() {
        let pm = PlaneMapper::new(8, 4, Complex::new(-1.6, -0.9), Complex::new(1.6, 0.9)).unwrap();
        assert_eq!(pm.pixel(0, 0), Some(Pixel(0, 0)));
        assert_eq!(pm.pixel(7, 3), Some(Pixel(7, 3)));
        assert_eq!(pm.pixel(-1, 0), None);
        assert_eq!(pm.pixel(8, 0), None);
        assert_eq!(pm.pixel(0, 4), None);
    }

    #[test]
    fn empty_plane_has_no_pixels() {
        let pm = PlaneMapper::new(0, 4, Complex::new(-1.0, -1.0), Complex::new(1.0, 1.0)).unwrap();
        assert_eq!(pm.pixel(0, 0), None);
    }

    #[test]
    fn single_precision_samples_are_narrowed_first() {
        let pm = PlaneMapper::new(8, 4, Complex::new(-1.6, -0.9), Complex::new(1.6, 0.9)).unwrap();
        let single = pm.pixel_to_point::<f32>(&Pixel(0, 0));
        assert_eq!(single, Complex::new(-1.6f32, -0.9f32));
        let center = pm.pixel_to_point::<f32>(&Pixel(4, 2));
        assert_eq!(center, Complex::new(0.0f32, 0.0f32));
        let wide = pm.pixel_to_point::<f64>(&Pixel(3, 1));
        let narrow = pm.pixel_to_point::<f32>(&Pixel(3, 1));
        assert!((wide.re - narrow.re.widen()).abs() < 1e-6);
        assert!((wide.im - narrow.im.widen()).abs() < 1e-6);
    }
}
