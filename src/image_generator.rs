//! Placeholder images for TEST mode.
//!
//! Produces uncompressed 24-bit BMPs filled with a single color: a dark
//! full-scene frame and a light plate crop, each base64 encoded the way
//! Vidar serves its own images.

use base64::Engine;

/// Full-scene stub dimensions.
pub const SCENE_SIZE: (u32, u32) = (1920, 1080);
/// Plate-crop stub dimensions.
pub const PLATE_SIZE: (u32, u32) = (400, 100);

const SCENE_COLOR: [u8; 3] = [0, 0, 0];
const PLATE_COLOR: [u8; 3] = [240, 240, 240];

const FILE_HEADER_LEN: u32 = 14;
const INFO_HEADER_LEN: u32 = 40;
/// 72 DPI expressed in pixels per meter.
const PIXELS_PER_METER: i32 = 2835;

/// Stub images, rendered once and reused for every TEST-mode answer.
#[derive(Debug, Clone)]
pub struct StubImageGenerator {
    scene_b64: String,
    plate_b64: String,
}

impl StubImageGenerator {
    pub fn new() -> Self {
        Self {
            scene_b64: encode(&solid_bmp(SCENE_SIZE.0, SCENE_SIZE.1, SCENE_COLOR)),
            plate_b64: encode(&solid_bmp(PLATE_SIZE.0, PLATE_SIZE.1, PLATE_COLOR)),
        }
    }

    /// Base64 full-scene image.
    pub fn scene_image_b64(&self) -> &str {
        &self.scene_b64
    }

    /// Base64 plate-crop image.
    pub fn plate_image_b64(&self) -> &str {
        &self.plate_b64
    }
}

impl Default for StubImageGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn encode(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// A bottom-up BMP of `width` x `height` pixels, all `rgb`.
pub fn solid_bmp(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    // Rows are padded to a multiple of four bytes.
    let row_len = (width * 3).div_ceil(4) * 4;
    let pixel_len = row_len * height;
    let offset = FILE_HEADER_LEN + INFO_HEADER_LEN;
    let file_len = offset + pixel_len;

    let mut out = Vec::with_capacity(file_len as usize);
    out.extend_from_slice(b"BM");
    out.extend_from_slice(&file_len.to_le_bytes());
    out.extend_from_slice(&[0u8; 4]);
    out.extend_from_slice(&offset.to_le_bytes());

    out.extend_from_slice(&INFO_HEADER_LEN.to_le_bytes());
    out.extend_from_slice(&(width as i32).to_le_bytes());
    out.extend_from_slice(&(height as i32).to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&24u16.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&pixel_len.to_le_bytes());
    out.extend_from_slice(&PIXELS_PER_METER.to_le_bytes());
    out.extend_from_slice(&PIXELS_PER_METER.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());

    let [r, g, b] = rgb;
    let mut row = Vec::with_capacity(row_len as usize);
    for _ in 0..width {
        row.extend_from_slice(&[b, g, r]);
    }
    row.resize(row_len as usize, 0);
    for _ in 0..height {
        out.extend_from_slice(&row);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u32_at(bytes: &[u8], at: usize) -> u32 {
        u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
    }

    #[test]
    fn test_bmp_header() {
        let bmp = solid_bmp(400, 100, PLATE_COLOR);
        assert_eq!(&bmp[0..2], b"BM");
        assert_eq!(u32_at(&bmp, 2) as usize, bmp.len());
        assert_eq!(u32_at(&bmp, 10), 54);
        assert_eq!(u32_at(&bmp, 18), 400);
        assert_eq!(u32_at(&bmp, 22), 100);
        assert_eq!(bmp.len(), 54 + 400 * 3 * 100);
        // first pixel, BGR
        assert_eq!(&bmp[54..57], &[240, 240, 240]);
    }

    #[test]
    fn test_row_padding() {
        let bmp = solid_bmp(3, 2, [1, 2, 3]);
        // 9 bytes of pixels padded to 12 per row
        assert_eq!(bmp.len(), 54 + 12 * 2);
        assert_eq!(&bmp[54..57], &[3, 2, 1]);
        assert_eq!(&bmp[63..66], &[0, 0, 0]);
    }

    #[test]
    fn test_generator_images_decode() {
        let generator = StubImageGenerator::new();
        let engine = base64::engine::general_purpose::STANDARD;

        let scene = engine.decode(generator.scene_image_b64()).unwrap();
        assert_eq!(u32_at(&scene, 18), SCENE_SIZE.0);
        assert_eq!(u32_at(&scene, 22), SCENE_SIZE.1);

        let plate = engine.decode(generator.plate_image_b64()).unwrap();
        assert_eq!(u32_at(&plate, 18), PLATE_SIZE.0);
    }
}
