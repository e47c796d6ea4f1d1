//! Frame conversion and transformation utilities.

use std::time::Instant;

use image::{imageops, RgbImage};

use super::error::ConvertError;
use super::types::{Frame, FrameFormat, PixelFormat, RawFrame};

/// Convert a driver buffer to our RGB Frame format.
///
/// The returned frame owns its pixels; nothing is shared with the driver.
pub fn convert(raw: RawFrame, sequence: u64) -> Result<Frame, ConvertError> {
    let pixels = raw.width as usize * raw.height as usize;
    let expected = pixels * raw.format.channels();
    if raw.data.len() != expected {
        return Err(ConvertError::SizeMismatch {
            expected,
            actual: raw.data.len(),
        });
    }

    let data = match raw.format {
        PixelFormat::Rgb8 => raw.data,
        PixelFormat::Bgr8 => {
            let mut data = raw.data;
            for px in data.chunks_exact_mut(3) {
                px.swap(0, 2);
            }
            data
        }
        PixelFormat::Mono8 => {
            let mut data = Vec::with_capacity(pixels * 3);
            for &v in &raw.data {
                data.extend_from_slice(&[v, v, v]);
            }
            data
        }
    };

    Ok(Frame {
        data,
        width: raw.width,
        height: raw.height,
        format: FrameFormat::Rgb,
        sequence,
        timestamp: Instant::now(),
    })
}

impl Frame {
    /// Copy the pixels into an [`RgbImage`].
    ///
    /// Fails when the buffer does not hold exactly `width * height` pixels.
    pub fn to_image(&self) -> Result<RgbImage, ConvertError> {
        let expected = self.width as usize * self.height as usize * self.bytes_per_pixel();
        let mismatch = ConvertError::SizeMismatch {
            expected,
            actual: self.data.len(),
        };
        if self.data.len() != expected {
            return Err(mismatch);
        }
        RgbImage::from_raw(self.width, self.height, self.data.clone()).ok_or(mismatch)
    }

    /// Image of this frame flipped along the requested axes.
    pub fn mirrored(&self, horizontal: bool, vertical: bool) -> Result<RgbImage, ConvertError> {
        let mut image = self.to_image()?;
        if horizontal {
            imageops::flip_horizontal_in_place(&mut image);
        }
        if vertical {
            imageops::flip_vertical_in_place(&mut image);
        }
        Ok(image)
    }
}
