// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The uncompressed 24-bit bitmap we write: a 54-byte header followed
//! by the rows, each padded with zeros to a multiple of four bytes.
//! The header's size fields count the padding too, so the numbers in
//! the header always agree with the bytes that follow it.

use std::io::Write;

use crate::errors::{JuliaError, Result};

/// Size of the file header plus the info header.
pub const HEADER_BYTES: usize = 54;
/// Size of the info header alone.
pub const INFO_HEADER_BYTES: u32 = 40;
/// Bytes per stored pixel.
pub const BYTES_PER_PIXEL: usize = 3;

const MAGIC: [u8; 2] = *b"BM";
const PLANES: u16 = 1;
const BITS_PER_PIXEL: u16 = 24;
const ROW_ALIGNMENT: usize = 4;

/// The dimensions of the image.  The width is always twice the height.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ImageSpec {
    /// Columns
    pub width: u32,
    /// Rows
    pub height: u32,
}

impl ImageSpec {
    /// Derive the image from the one number the user gives us.  The
    /// height must be positive and small enough that the file size
    /// still fits the header's 32-bit field.
    pub fn from_height(height: u32) -> Result<ImageSpec> {
        if height == 0 {
            return Err(JuliaError::InvalidInput(
                "the image height must be a positive integer".to_string(),
            ));
        }
        let width = height.checked_mul(2).ok_or_else(|| too_large(height))?;
        let spec = ImageSpec { width, height };
        if spec.width > i32::max_value() as u32 || spec.file_bytes() > u64::from(u32::max_value()) {
            return Err(too_large(height));
        }
        Ok(spec)
    }

    /// Pixel bytes in one row, without padding.
    pub fn row_bytes(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }

    /// Zero bytes appended to each row.
    pub fn row_padding(&self) -> usize {
        (ROW_ALIGNMENT - self.row_bytes() % ROW_ALIGNMENT) % ROW_ALIGNMENT
    }

    /// Bytes in one stored row, padding included.
    pub fn padded_row_bytes(&self) -> usize {
        self.row_bytes() + self.row_padding()
    }

    /// Bytes in `rows` stored rows.
    pub fn strip_bytes(&self, rows: u32) -> usize {
        self.padded_row_bytes() * rows as usize
    }

    /// All pixel data in the file.
    pub fn image_bytes(&self) -> u64 {
        self.padded_row_bytes() as u64 * u64::from(self.height)
    }

    /// The whole file.
    pub fn file_bytes(&self) -> u64 {
        HEADER_BYTES as u64 + self.image_bytes()
    }
}

fn too_large(height: u32) -> JuliaError {
    JuliaError::InvalidInput(format!(
        "an image {} pixels high is too large for a bitmap",
        height
    ))
}

/// The fields of the header.  Everything not listed is zero.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BmpHeader {
    /// Size of the whole file
    pub file_size: u32,
    /// Where the pixel data begins
    pub pixel_offset: u32,
    /// Size of the info header
    pub info_size: u32,
    /// Columns
    pub width: i32,
    /// Rows
    pub height: i32,
    /// Color planes, always 1
    pub planes: u16,
    /// Bits per pixel
    pub bits_per_pixel: u16,
    /// Compression scheme, 0 for none
    pub compression: u32,
    /// Size of the pixel data
    pub image_size: u32,
}

impl BmpHeader {
    /// The header describing `spec`.
    pub fn for_image(spec: &ImageSpec) -> BmpHeader {
        BmpHeader {
            file_size: spec.file_bytes() as u32,
            pixel_offset: HEADER_BYTES as u32,
            info_size: INFO_HEADER_BYTES,
            width: spec.width as i32,
            height: spec.height as i32,
            planes: PLANES,
            bits_per_pixel: BITS_PER_PIXEL,
            compression: 0,
            image_size: spec.image_bytes() as u32,
        }
    }

    /// The header as it appears on disk, little-endian throughout.
    pub fn to_bytes(&self) -> [u8; HEADER_BYTES] {
        let mut bytes = [0u8; HEADER_BYTES];
        bytes[0..2].copy_from_slice(&MAGIC);
        bytes[2..6].copy_from_slice(&self.file_size.to_le_bytes());
        // 6..10 reserved
        bytes[10..14].copy_from_slice(&self.pixel_offset.to_le_bytes());
        bytes[14..18].copy_from_slice(&self.info_size.to_le_bytes());
        bytes[18..22].copy_from_slice(&self.width.to_le_bytes());
        bytes[22..26].copy_from_slice(&self.height.to_le_bytes());
        bytes[26..28].copy_from_slice(&self.planes.to_le_bytes());
        bytes[28..30].copy_from_slice(&self.bits_per_pixel.to_le_bytes());
        bytes[30..34].copy_from_slice(&self.compression.to_le_bytes());
        bytes[34..38].copy_from_slice(&self.image_size.to_le_bytes());
        // 38..54 resolution and palette counts
        bytes
    }

    /// Read a header back.  Only the layout is checked, not whether the
    /// numbers make sense together.
    pub fn parse(bytes: &[u8]) -> Result<BmpHeader> {
        if bytes.len() < HEADER_BYTES {
            return Err(JuliaError::InvalidInput(format!(
                "a bitmap header needs {} bytes, found {}",
                HEADER_BYTES,
                bytes.len()
            )));
        }
        if bytes[0..2] != MAGIC {
            return Err(JuliaError::InvalidInput(
                "missing the BM magic number".to_string(),
            ));
        }
        Ok(BmpHeader {
            file_size: le_u32(&bytes[2..6]),
            pixel_offset: le_u32(&bytes[10..14]),
            info_size: le_u32(&bytes[14..18]),
            width: le_u32(&bytes[18..22]) as i32,
            height: le_u32(&bytes[22..26]) as i32,
            planes: le_u16(&bytes[26..28]),
            bits_per_pixel: le_u16(&bytes[28..30]),
            compression: le_u32(&bytes[30..34]),
            image_size: le_u32(&bytes[34..38]),
        })
    }
}

fn le_u32(b: &[u8]) -> u32 {
    u32::from_le_bytes([b[0], b[1], b[2], b[3]])
}

fn le_u16(b: &[u8]) -> u16 {
    u16::from_le_bytes([b[0], b[1]])
}

/// Write the header for `spec` to the start of `sink`.  This must
/// happen, exactly once, before any pixel data is appended.
pub fn write_header<W: Write>(spec: &ImageSpec, sink: &mut W) -> std::io::Result<()> {
    sink.write_all(&BmpHeader::for_image(spec).to_bytes())?;
    sink.flush()
}
