//! Blending used when both videos are merged into a single view.

use image::{Rgba, RgbaImage};

/// 50% mix of `top` over `base`. The result has the size of `base`; the
/// part of `base` not covered by `top` is kept as is.
pub fn blend(base: &RgbaImage, top: &RgbaImage) -> RgbaImage {
    let mut out = base.clone();
    let width = base.width().min(top.width());
    let height = base.height().min(top.height());
    for y in 0..height {
        for x in 0..width {
            let a = base.get_pixel(x, y);
            let b = top.get_pixel(x, y);
            let mixed = Rgba([
                mix(a[0], b[0]),
                mix(a[1], b[1]),
                mix(a[2], b[2]),
                a[3].max(b[3]),
            ]);
            out.put_pixel(x, y, mixed);
        }
    }
    out
}

fn mix(a: u8, b: u8) -> u8 {
    ((a as u16 + b as u16) / 2) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, value: u8) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([value, value, value, 255]))
    }

    #[test]
    fn blend_averages_overlap() {
        let mixed = blend(&solid(2, 2, 100), &solid(1, 1, 200));
        assert_eq!(mixed.get_pixel(0, 0)[0], 150);
        assert_eq!(mixed.get_pixel(1, 1)[0], 100);
    }

    #[test]
    fn blend_keeps_base_size() {
        let mixed = blend(&solid(2, 3, 10), &solid(5, 5, 30));
        assert_eq!(mixed.dimensions(), (2, 3));
        assert_eq!(mixed.get_pixel(1, 2)[0], 20);
    }
}
