// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Renders one worker's strip of rows into the exact bytes that strip
//! occupies in the output file.

use std::iter;

use itertools::iproduct;

use crate::bitmap::ImageSpec;
use crate::errors::{JuliaError, Result};
use crate::julia::PixelRenderer;
use crate::partition::RowRange;

/// The stored rows of one strip: three bytes per pixel, left to right,
/// rows in ascending order, each row followed by its padding.  Owned by
/// the worker that rendered it until it is handed to the writer.
#[derive(Clone, Debug, PartialEq)]
pub struct PixelBuffer {
    rows: RowRange,
    bytes: Vec<u8>,
}

impl PixelBuffer {
    /// The strip these bytes belong to.
    pub fn rows(&self) -> RowRange {
        self.rows
    }

    /// The bytes, ready to be written.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True when the strip had no rows.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Render every pixel of `rows` with `renderer`.  Any renderer error
/// aborts the strip; it means the strip did not fit the image.
pub fn build_block<R>(
    renderer: &R,
    spec: &ImageSpec,
    rows: RowRange,
    tint_bias: f64,
) -> Result<PixelBuffer>
where
    R: PixelRenderer + ?Sized,
{
    if rows.end > spec.height || rows.start > rows.end {
        return Err(JuliaError::CoordinateOutOfRange {
            x: 0,
            y: i64::from(rows.start.max(spec.height)),
            width: spec.width,
            height: spec.height,
        });
    }

    let padding = spec.row_padding();
    let mut bytes = Vec::with_capacity(spec.strip_bytes(rows.len()));
    for (y, x) in iproduct!(rows.rows(), 0..spec.width) {
        let rgb = renderer.render(
            i64::from(x),
            i64::from(y),
            spec.width,
            spec.height,
            tint_bias,
        )?;
        bytes.extend_from_slice(&rgb);
        if x + 1 == spec.width {
            bytes.extend(iter::repeat(0u8).take(padding));
        }
    }
    Ok(PixelBuffer { rows, bytes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::julia::{JuliaRenderer, Rgb};

    // Encodes the coordinate into the pixel so ordering is visible.
    struct Coordinates;

    impl PixelRenderer for Coordinates {
        fn render(&self, x: i64, y: i64, _: u32, _: u32, _: f64) -> Result<Rgb> {
            Ok([x as u8, y as u8, 0xAA])
        }
    }

    #[test]
    fn pixels_are_row_major() {
        let spec = ImageSpec::from_height(2).unwrap();
        let block = build_block(&Coordinates, &spec, RowRange { start: 0, end: 2 }, 1.0).unwrap();
        let expected: Vec<u8> = vec![
            0, 0, 0xAA, 1, 0, 0xAA, 2, 0, 0xAA, 3, 0, 0xAA, //
            0, 1, 0xAA, 1, 1, 0xAA, 2, 1, 0xAA, 3, 1, 0xAA,
        ];
        assert_eq!(block.as_bytes(), &expected[..]);
    }

    #[test]
    fn odd_heights_get_padded_rows() {
        let spec = ImageSpec::from_height(1).unwrap();
        let block = build_block(&Coordinates, &spec, RowRange { start: 0, end: 1 }, 1.0).unwrap();
        assert_eq!(block.as_bytes(), &[0, 0, 0xAA, 1, 0, 0xAA, 0, 0][..]);
    }

    #[test]
    fn strip_length_matches_the_layout() {
        let spec = ImageSpec::from_height(5).unwrap();
        let rows = RowRange { start: 1, end: 4 };
        let block = build_block(&JuliaRenderer::default(), &spec, rows, 1.0).unwrap();
        assert_eq!(block.len(), spec.strip_bytes(3));
        assert_eq!(block.rows(), rows);
    }

    #[test]
    fn empty_strip_is_empty() {
        let spec = ImageSpec::from_height(3).unwrap();
        let block = build_block(&Coordinates, &spec, RowRange { start: 3, end: 3 }, 1.0).unwrap();
        assert!(block.is_empty());
    }

    #[test]
    fn strip_past_the_image_is_refused() {
        let spec = ImageSpec::from_height(4).unwrap();
        match build_block(&Coordinates, &spec, RowRange { start: 2, end: 5 }, 1.0) {
            Err(JuliaError::CoordinateOutOfRange { y, .. }) => assert_eq!(y, 4),
            other => panic!("expected CoordinateOutOfRange, got {:?}", other),
        }
    }

    #[test]
    fn renderer_errors_propagate() {
        struct Broken;
        impl PixelRenderer for Broken {
            fn render(&self, x: i64, y: i64, width: u32, height: u32, _: f64) -> Result<Rgb> {
                Err(JuliaError::CoordinateOutOfRange {
                    x,
                    y,
                    width,
                    height,
                })
            }
        }
        let spec = ImageSpec::from_height(2).unwrap();
        assert!(build_block(&Broken, &spec, RowRange { start: 0, end: 1 }, 1.0).is_err());
    }

    #[test]
    fn strips_concatenate_to_the_whole_image() {
        let spec = ImageSpec::from_height(6).unwrap();
        let r = JuliaRenderer::default();
        let whole = build_block(&r, &spec, RowRange { start: 0, end: 6 }, 1.0).unwrap();
        let top = build_block(&r, &spec, RowRange { start: 0, end: 2 }, 1.0).unwrap();
        let bottom = build_block(&r, &spec, RowRange { start: 2, end: 6 }, 1.0).unwrap();
        let joined: Vec<u8> = top
            .as_bytes()
            .iter()
            .chain(bottom.as_bytes())
            .cloned()
            .collect();
        assert_eq!(whole.as_bytes(), &joined[..]);
    }
}
