//! Decoded sprite sheets and the thumbnails cropped out of them.

use std::sync::Arc;

use image::RgbaImage;
use parking_lot::Mutex;

use crate::tile::TileRect;
use crate::Result;

/// A single cropped tile. Cheap to clone.
pub type Thumbnail = Arc<RgbaImage>;

/// A decoded sprite sheet that tiles can be cropped from.
///
/// The pixel buffer is owned until [`SpriteSheet::recycle`] is called; after
/// that every crop yields nothing. The big-image cache recycles sheets as
/// they leave it so the memory is returned even while other holders of the
/// `Arc` are still alive.
#[derive(Debug)]
pub struct SpriteSheet {
    pixels: Mutex<Option<RgbaImage>>,
    width: u32,
    height: u32,
}

impl SpriteSheet {
    /// Decode an encoded image (JPEG in practice). CPU bound; async callers
    /// should go through `spawn_blocking`.
    pub fn decode(encoded: &[u8]) -> Result<Self> {
        let decoded = image::load_from_memory(encoded)?.to_rgba8();
        Ok(Self::from_image(decoded))
    }

    #[must_use]
    pub fn from_image(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            pixels: Mutex::new(Some(image)),
            width,
            height,
        }
    }

    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Copy out one tile.
    ///
    /// A rectangle hanging over the sheet edge is clipped; one entirely
    /// outside the sheet, or any crop after recycling, yields `None`.
    #[must_use]
    pub fn crop(&self, rect: TileRect) -> Option<Thumbnail> {
        if rect.left >= self.width || rect.top >= self.height || rect.width() == 0 || rect.height() == 0 {
            return None;
        }
        let width = rect.right.min(self.width) - rect.left;
        let height = rect.bottom.min(self.height) - rect.top;

        let pixels = self.pixels.lock();
        let sheet = pixels.as_ref()?;
        let tile = image::imageops::crop_imm(sheet, rect.left, rect.top, width, height).to_image();
        Some(Arc::new(tile))
    }

    /// Release the pixel buffer. Returns `true` only for the call that
    /// actually freed it.
    pub fn recycle(&self) -> bool {
        self.pixels.lock().take().is_some()
    }

    #[must_use]
    pub fn is_recycled(&self) -> bool {
        self.pixels.lock().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    /// 4x2 grid of 10x5 tiles, each tile filled with a colour derived from its index.
    fn grid_sheet() -> SpriteSheet {
        let img = RgbaImage::from_fn(40, 10, |x, y| {
            let index = (y / 5) * 4 + (x / 10);
            Rgba([index as u8 * 10, 0, 0, 255])
        });
        SpriteSheet::from_image(img)
    }

    #[test]
    fn test_crop_returns_requested_tile() {
        let sheet = grid_sheet();
        let tile = sheet
            .crop(TileRect { left: 20, top: 5, right: 30, bottom: 10 })
            .unwrap();

        assert_eq!(tile.dimensions(), (10, 5));
        // row 1, col 2 -> index 6
        assert_eq!(tile.get_pixel(0, 0)[0], 60);
        assert_eq!(tile.get_pixel(9, 4)[0], 60);
    }

    #[test]
    fn test_crop_clips_at_edge() {
        let sheet = grid_sheet();
        let tile = sheet
            .crop(TileRect { left: 35, top: 8, right: 45, bottom: 13 })
            .unwrap();
        assert_eq!(tile.dimensions(), (5, 2));
    }

    #[test]
    fn test_crop_outside_is_none() {
        let sheet = grid_sheet();
        assert!(sheet.crop(TileRect { left: 40, top: 0, right: 50, bottom: 5 }).is_none());
        assert!(sheet.crop(TileRect { left: 0, top: 10, right: 10, bottom: 15 }).is_none());
    }

    #[test]
    fn test_recycle_once() {
        let sheet = grid_sheet();
        assert!(!sheet.is_recycled());
        assert!(sheet.recycle());
        assert!(!sheet.recycle());
        assert!(sheet.is_recycled());
        assert!(sheet.crop(TileRect { left: 0, top: 0, right: 10, bottom: 5 }).is_none());
        assert_eq!(sheet.dimensions(), (40, 10));
    }

    #[test]
    fn test_decode_roundtrip_through_png() {
        let img = RgbaImage::from_pixel(8, 4, Rgba([1, 2, 3, 255]));
        let mut encoded = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut encoded, image::ImageOutputFormat::Png)
            .unwrap();

        let sheet = SpriteSheet::decode(encoded.get_ref()).unwrap();
        assert_eq!(sheet.dimensions(), (8, 4));
    }

    #[test]
    fn test_decode_garbage_fails() {
        let err = SpriteSheet::decode(b"definitely not a jpeg").unwrap_err();
        assert_eq!(err.code(), crate::FetchCode::ServerError);
    }
}
