//! HSV color masks and morphological cleanup.
//!
//! HSV follows the OpenCV convention the configured ranges were tuned
//! against: hue 0–180 (degrees halved), saturation and value 0–255.

use image::{GrayImage, Luma, RgbaImage};

use crate::config::HsvRange;

const ON: u8 = 255;
const OFF: u8 = 0;

/// Converts one RGB pixel to (hue, saturation, value).
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let rf = r as f64;
    let gf = g as f64;
    let bf = b as f64;
    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let delta = max - min;

    let value = max;
    let saturation = if max > 0.0 { 255.0 * delta / max } else { 0.0 };

    let hue_deg = if delta == 0.0 {
        0.0
    } else if max == rf {
        60.0 * ((gf - bf) / delta).rem_euclid(6.0)
    } else if max == gf {
        60.0 * ((bf - rf) / delta + 2.0)
    } else {
        60.0 * ((rf - gf) / delta + 4.0)
    };

    // Hues just under 360° round to 180 after halving; fold back to 0 so
    // the result stays in the 0..=179 convention
    let hue = (hue_deg / 2.0).round() as u16 % 180;
    (hue as u8, saturation.round() as u8, value.round() as u8)
}

/// Binary mask of pixels whose HSV falls inside the range.
pub fn build_mask(image: &RgbaImage, range: &HsvRange) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let p = image.get_pixel(x, y);
        let (h, s, v) = rgb_to_hsv(p[0], p[1], p[2]);
        if p[3] > 0 && range.contains(h, s, v) {
            Luma([ON])
        } else {
            Luma([OFF])
        }
    })
}

/// Morphological opening then closing with a 3x3 square element, removing
/// speckle noise and sealing pinholes before component extraction.
pub fn clean_mask(mask: &GrayImage) -> GrayImage {
    let opened = dilate(&erode(mask));
    erode(&dilate(&opened))
}

fn erode(mask: &GrayImage) -> GrayImage {
    morph(mask, |all_on, _| if all_on { ON } else { OFF })
}

fn dilate(mask: &GrayImage) -> GrayImage {
    morph(mask, |_, any_on| if any_on { ON } else { OFF })
}

fn morph(mask: &GrayImage, combine: fn(bool, bool) -> u8) -> GrayImage {
    let (w, h) = mask.dimensions();
    GrayImage::from_fn(w, h, |x, y| {
        let mut all_on = true;
        let mut any_on = false;
        for dy in -1i64..=1 {
            for dx in -1i64..=1 {
                let nx = x as i64 + dx;
                let ny = y as i64 + dy;
                let on = nx >= 0
                    && ny >= 0
                    && nx < w as i64
                    && ny < h as i64
                    && mask.get_pixel(nx as u32, ny as u32)[0] == ON;
                all_on &= on;
                any_on |= on;
            }
        }
        Luma([combine(all_on, any_on)])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_rgb_to_hsv_known_colors() {
        // Pure red: hue 0, fully saturated
        assert_eq!(rgb_to_hsv(255, 0, 0), (0, 255, 255));
        // Orange (255, 128, 0): hue 30° -> 15 in OpenCV scale
        let (h, s, v) = rgb_to_hsv(255, 128, 0);
        assert_eq!(h, 15);
        assert_eq!(s, 255);
        assert_eq!(v, 255);
        // Gray: no saturation
        let (_, s, v) = rgb_to_hsv(128, 128, 128);
        assert_eq!(s, 0);
        assert_eq!(v, 128);
    }

    #[test]
    fn test_hue_wraps_at_red_boundary() {
        // Hue 359.76° halves to 179.88, which must fold to 0, not 180
        let (h, _, _) = rgb_to_hsv(255, 0, 1);
        assert_eq!(h, 0);
        // Hue 357.9° halves to 178.94 and stays at 179
        let (h, _, _) = rgb_to_hsv(255, 0, 9);
        assert_eq!(h, 179);
    }

    #[test]
    fn test_build_mask_selects_orange() {
        let range = HsvRange {
            lower: [10, 100, 100],
            upper: [25, 255, 255],
        };
        let mut img = RgbaImage::from_pixel(4, 1, Rgba([40, 40, 40, 255]));
        img.put_pixel(1, 0, Rgba([255, 100, 0, 255])); // deep orange
        img.put_pixel(2, 0, Rgba([0, 0, 255, 255])); // blue

        let mask = build_mask(&img, &range);
        assert_eq!(mask.get_pixel(0, 0)[0], 0);
        assert_eq!(mask.get_pixel(1, 0)[0], 255);
        assert_eq!(mask.get_pixel(2, 0)[0], 0);
    }

    #[test]
    fn test_clean_mask_removes_speckle() {
        // A single isolated pixel is speckle: opening removes it
        let mut mask = GrayImage::new(9, 9);
        mask.put_pixel(4, 4, Luma([255]));
        let cleaned = clean_mask(&mask);
        assert!(cleaned.pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn test_clean_mask_keeps_solid_block() {
        let mut mask = GrayImage::new(12, 12);
        for y in 2..10 {
            for x in 2..10 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        let cleaned = clean_mask(&mask);
        // Interior survives opening and closing
        assert_eq!(cleaned.get_pixel(5, 5)[0], 255);
        assert_eq!(cleaned.get_pixel(0, 0)[0], 0);
    }
}
