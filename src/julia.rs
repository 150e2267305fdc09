// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Escape-time Julia renderer
//!
//! A Julia set is drawn by taking each pixel's point `z` on the complex
//! plane and repeatedly replacing it with `z² + c` for one fixed `c`.
//! Points whose orbit runs off past the escape radius are colored by
//! how quickly they fled; points that survive the whole iteration
//! budget are painted one flat color.
//!
//! The renderer is deliberately just a strategy behind the
//! [`PixelRenderer`] trait.  The partitioning and the ordered write
//! never look inside it.

use num::Complex;
use std::str::FromStr;

use crate::errors::{JuliaError, Result};
use crate::planes::{Pixel, PlaneMapper, Real};

/// Three bytes, in the order they are stored in the file.
pub type Rgb = [u8; 3];

/// Anything that can color a single pixel of a `width` x `height`
/// image.  Implementations must be pure: the same arguments always
/// produce the same bytes, no matter which worker asks.
pub trait PixelRenderer: Sync {
    /// Color the pixel at column `x`, row `y`.  Coordinates outside
    /// the image are an error, and nothing is produced for them.
    fn render(&self, x: i64, y: i64, width: u32, height: u32, tint_bias: f64) -> Result<Rgb>;
}

/// One output channel: `offset + scale * tint^k * bias^exponent`, where
/// `bias` is the fraction of the iteration budget left when the orbit
/// escaped and `k` is the shared tint exponent (or 0 for an untinted
/// channel).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ChannelCurve {
    /// Constant added after scaling
    pub offset: f64,
    /// Multiplier of the shaped value
    pub scale: f64,
    /// Whether the tint bias participates
    pub tinted: bool,
    /// Power the escape bias is raised to
    pub exponent: f64,
}

impl ChannelCurve {
    fn shade(&self, tint: f64, bias: f64) -> u8 {
        let tint = if self.tinted { tint } else { 1.0 };
        to_byte(self.offset + self.scale * tint * bias.powf(self.exponent))
    }
}

// Truncate toward zero, then keep the low eight bits.  Out-of-range
// intensities wrap instead of clamping.
fn to_byte(value: f64) -> u8 {
    value as i64 as u8
}

/// Width of the floats the escape loop and the viewport mapping run
/// in.  The coloring curves are always evaluated in double precision.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Precision {
    /// `f32`, which reproduces the classic renderer's bytes
    Single,
    /// `f64`
    Double,
}

impl FromStr for Precision {
    type Err = JuliaError;

    fn from_str(s: &str) -> Result<Precision> {
        match s {
            "single" => Ok(Precision::Single),
            "double" => Ok(Precision::Double),
            _ => Err(JuliaError::InvalidInput(format!(
                "'{}' is not a precision; use single or double",
                s
            ))),
        }
    }
}

/// Every constant the renderer uses.  `Default` gives the classic view
/// of the `c = -0.79 + 0.15i` set.
#[derive(Clone, Debug, PartialEq)]
pub struct JuliaParams {
    /// Left-lower corner of the viewport
    pub leftlower: Complex<f64>,
    /// Right-upper corner of the viewport
    pub rightupper: Complex<f64>,
    /// The constant that selects which Julia set we draw
    pub c: Complex<f64>,
    /// Iteration budget per pixel
    pub max_iterations: u32,
    /// Orbits at or beyond this distance from the origin have escaped
    pub escape_radius: f64,
    /// Power the tint bias is raised to for tinted channels
    pub tint_exponent: f64,
    /// Shaping curves for the three stored channels, in file order
    pub channels: [ChannelCurve; 3],
    /// Color of points that never escape
    pub interior: Rgb,
    /// Float width of the escape loop
    pub precision: Precision,
}

impl Default for JuliaParams {
    fn default() -> Self {
        JuliaParams {
            leftlower: Complex::new(-1.6, -0.9),
            rightupper: Complex::new(1.6, 0.9),
            c: Complex::new(-0.79, 0.15),
            max_iterations: 300,
            escape_radius: 2.0,
            tint_exponent: 1.2,
            channels: [
                ChannelCurve {
                    offset: 0.0,
                    scale: -500.0,
                    tinted: true,
                    exponent: 1.6,
                },
                ChannelCurve {
                    offset: 0.0,
                    scale: -255.0,
                    tinted: false,
                    exponent: 0.3,
                },
                ChannelCurve {
                    offset: 255.0,
                    scale: -255.0,
                    tinted: true,
                    exponent: 3.0,
                },
            ],
            interior: [200, 100, 100],
            precision: Precision::Single,
        }
    }
}

impl JuliaParams {
    /// Build the pixel-to-viewport mapping for an image of this size.
    pub fn viewport(&self, width: u32, height: u32) -> Result<PlaneMapper> {
        PlaneMapper::new(width, height, self.leftlower, self.rightupper)
    }
}

/// The stock escape-time renderer.
#[derive(Clone, Debug)]
pub struct JuliaRenderer {
    params: JuliaParams,
}

impl JuliaRenderer {
    /// Checks the parameters once, up front, so that a bad viewport or
    /// an empty iteration budget is reported before any worker starts.
    pub fn new(params: JuliaParams) -> Result<Self> {
        params.viewport(1, 1)?;
        if params.max_iterations == 0 {
            return Err(JuliaError::InvalidInput(
                "the iteration budget must be at least 1".to_string(),
            ));
        }
        if !(params.escape_radius > 0.0) {
            return Err(JuliaError::InvalidInput(
                "the escape radius must be positive".to_string(),
            ));
        }
        Ok(JuliaRenderer { params })
    }

    /// Fraction of the iteration budget left when the orbit of `pixel`
    /// escaped, or `None` if it never did.  The loop runs in `T`.
    fn escape_bias<T: Real>(&self, plane: &PlaneMapper, pixel: &Pixel) -> Option<f64> {
        let c = Complex::new(T::narrow(self.params.c.re), T::narrow(self.params.c.im));
        let radius = T::narrow(self.params.escape_radius);
        let escape = radius * radius;
        let mut z: Complex<T> = plane.pixel_to_point(pixel);
        let mut remaining = self.params.max_iterations;
        while z.norm_sqr() < escape && remaining > 0 {
            z = z * z + c;
            remaining -= 1;
        }
        if remaining == 0 {
            return None;
        }
        Some((T::count(remaining) / T::count(self.params.max_iterations)).widen())
    }
}

impl Default for JuliaRenderer {
    fn default() -> Self {
        JuliaRenderer {
            params: JuliaParams::default(),
        }
    }
}

impl PixelRenderer for JuliaRenderer {
    fn render(&self, x: i64, y: i64, width: u32, height: u32, tint_bias: f64) -> Result<Rgb> {
        let plane = self.params.viewport(width, height)?;
        let pixel = plane
            .pixel(x, y)
            .ok_or(JuliaError::CoordinateOutOfRange {
                x,
                y,
                width,
                height,
            })?;

        let bias = match self.params.precision {
            Precision::Single => self.escape_bias::<f32>(&plane, &pixel),
            Precision::Double => self.escape_bias::<f64>(&plane, &pixel),
        };
        let bias = match bias {
            Some(bias) => bias,
            None => return Ok(self.params.interior),
        };
        let tint = tint_bias.powf(self.params.tint_exponent);
        let [c0, c1, c2] = self.params.channels;
        Ok([
            c0.shade(tint, bias),
            c1.shade(tint, bias),
            c2.shade(tint, bias),
        ])
    }
}
