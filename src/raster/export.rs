//! Conversion of rasters into `image` buffers and raw sample streams.

use std::io::Write;

use byteorder::{BigEndian, WriteBytesExt};
use image::{DynamicImage, ImageBuffer, Luma, LumaA, Rgb, Rgba};

use super::{Raster, SampleKind};
use crate::error::{ReaderError, Result};

fn buffer_error(raster: &Raster) -> ReaderError {
    ReaderError::Export(format!(
        "Sample buffer does not match a {}x{} image with {} bands",
        raster.width(),
        raster.height(),
        raster.bands()
    ))
}

impl Raster {
    /// Convert to an [`image::DynamicImage`].
    ///
    /// Byte and unsigned short layouts with one to four bands map onto the
    /// gray, gray-alpha, RGB and RGBA buffer types. Packed layouts are
    /// expanded to 8-bit gray over the full range.
    pub fn to_dynamic_image(&self) -> Result<DynamicImage> {
        let (w, h) = (self.width(), self.height());

        match self.layout().kind {
            SampleKind::Packed { bits } => {
                let top = (1u32 << bits) - 1;
                let mut pixels = Vec::with_capacity(w as usize * h as usize);
                let bounds = self.bounds();
                for y in bounds.y..bounds.y + h {
                    for x in bounds.x..bounds.x + w {
                        let v = self.sample(x, y, 0).unwrap_or(0) as u32;
                        pixels.push((v * 255 / top) as u8);
                    }
                }
                ImageBuffer::<Luma<u8>, _>::from_raw(w, h, pixels)
                    .map(DynamicImage::ImageLuma8)
                    .ok_or_else(|| buffer_error(self))
            }
            SampleKind::Byte => {
                let data = self.as_bytes().ok_or_else(|| buffer_error(self))?.to_vec();
                let image = match self.bands() {
                    1 => ImageBuffer::<Luma<u8>, _>::from_raw(w, h, data)
                        .map(DynamicImage::ImageLuma8),
                    2 => ImageBuffer::<LumaA<u8>, _>::from_raw(w, h, data)
                        .map(DynamicImage::ImageLumaA8),
                    3 => ImageBuffer::<Rgb<u8>, _>::from_raw(w, h, data)
                        .map(DynamicImage::ImageRgb8),
                    4 => ImageBuffer::<Rgba<u8>, _>::from_raw(w, h, data)
                        .map(DynamicImage::ImageRgba8),
                    n => {
                        return Err(ReaderError::Export(format!(
                            "Cannot export {} bands as an image",
                            n
                        )))
                    }
                };
                image.ok_or_else(|| buffer_error(self))
            }
            SampleKind::Short { signed: false } => {
                let data = self.as_shorts().ok_or_else(|| buffer_error(self))?.to_vec();
                let image = match self.bands() {
                    1 => ImageBuffer::<Luma<u16>, _>::from_raw(w, h, data)
                        .map(DynamicImage::ImageLuma16),
                    2 => ImageBuffer::<LumaA<u16>, _>::from_raw(w, h, data)
                        .map(DynamicImage::ImageLumaA16),
                    3 => ImageBuffer::<Rgb<u16>, _>::from_raw(w, h, data)
                        .map(DynamicImage::ImageRgb16),
                    4 => ImageBuffer::<Rgba<u16>, _>::from_raw(w, h, data)
                        .map(DynamicImage::ImageRgba16),
                    n => {
                        return Err(ReaderError::Export(format!(
                            "Cannot export {} bands as an image",
                            n
                        )))
                    }
                };
                image.ok_or_else(|| buffer_error(self))
            }
            kind => Err(ReaderError::Export(format!(
                "{:?} samples have no image representation; use raw output",
                kind
            ))),
        }
    }

    /// Write the sample storage as-is: bytes for packed and byte layouts,
    /// big-endian 16 or 32-bit words otherwise.
    pub fn write_raw<W: Write>(&self, mut out: W) -> Result<()> {
        if let Some(bytes) = self.as_bytes() {
            out.write_all(bytes)?;
        } else if let Some(shorts) = self.as_shorts() {
            for &v in shorts {
                out.write_u16::<BigEndian>(v)?;
            }
        } else if let Some(ints) = self.as_ints() {
            for &v in ints {
                out.write_i32::<BigEndian>(v)?;
            }
        }
        out.flush()?;
        Ok(())
    }
}
