//! Frame compositor: combines the two players' images into one raster.
//!
//! Used both for live display snapshots and for export. Export output must
//! have an even height because common video containers reject odd sizes.

use image::imageops;
use image::{Rgba, RgbaImage};

pub use dualsync_player_core::merge::blend;

/// Produces a single raster frame from the two players' frames.
pub trait Compositor: Send {
    /// Combine `left` and `right`. When `for_export` is set, the result
    /// height is even.
    fn render(
        &self,
        left: &RgbaImage,
        right: &RgbaImage,
        for_export: bool,
        horizontal: bool,
    ) -> RgbaImage;
}

impl<C: Compositor + ?Sized> Compositor for Box<C> {
    fn render(
        &self,
        left: &RgbaImage,
        right: &RgbaImage,
        for_export: bool,
        horizontal: bool,
    ) -> RgbaImage {
        (**self).render(left, right, for_export, horizontal)
    }
}

/// Places the two images next to each other (or stacked), each centred in
/// its half of the canvas.
#[derive(Debug, Clone, Copy)]
pub struct SideBySideCompositor {
    /// Fill for the area not covered by either image.
    pub background: Rgba<u8>,
}

impl Default for SideBySideCompositor {
    fn default() -> Self {
        Self {
            background: Rgba([0, 0, 0, 255]),
        }
    }
}

impl Compositor for SideBySideCompositor {
    fn render(
        &self,
        left: &RgbaImage,
        right: &RgbaImage,
        for_export: bool,
        horizontal: bool,
    ) -> RgbaImage {
        let (width, mut height) = if horizontal {
            (
                left.width() + right.width(),
                left.height().max(right.height()),
            )
        } else {
            (
                left.width().max(right.width()),
                left.height() + right.height(),
            )
        };
        if for_export {
            height = even(height);
        }

        let mut canvas = RgbaImage::from_pixel(width.max(1), height.max(1), self.background);

        if horizontal {
            let left_y = centre_offset(height, left.height());
            let right_y = centre_offset(height, right.height());
            imageops::replace(&mut canvas, left, 0, left_y);
            imageops::replace(&mut canvas, right, left.width() as i64, right_y);
        } else {
            let left_x = centre_offset(width, left.width());
            let right_x = centre_offset(width, right.width());
            imageops::replace(&mut canvas, left, left_x, 0);
            imageops::replace(&mut canvas, right, right_x, left.height() as i64);
        }

        canvas
    }
}

/// Grow the image by one transparent-black row when its height is odd.
pub fn pad_to_even_height(image: RgbaImage) -> RgbaImage {
    if image.height() % 2 == 0 {
        return image;
    }
    let mut padded = RgbaImage::from_pixel(image.width(), image.height() + 1, Rgba([0, 0, 0, 255]));
    imageops::replace(&mut padded, &image, 0, 0);
    padded
}

fn even(value: u32) -> u32 {
    value + value % 2
}

fn centre_offset(outer: u32, inner: u32) -> i64 {
    (outer.saturating_sub(inner) / 2) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, value: u8) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([value, value, value, 255]))
    }

    #[test]
    fn horizontal_layout_places_right_after_left() {
        let composite =
            SideBySideCompositor::default().render(&solid(4, 2, 10), &solid(6, 2, 20), false, true);
        assert_eq!(composite.dimensions(), (10, 2));
        assert_eq!(composite.get_pixel(0, 0)[0], 10);
        assert_eq!(composite.get_pixel(4, 0)[0], 20);
    }

    #[test]
    fn vertical_layout_stacks() {
        let composite =
            SideBySideCompositor::default().render(&solid(4, 2, 10), &solid(4, 3, 20), false, false);
        assert_eq!(composite.dimensions(), (4, 5));
        assert_eq!(composite.get_pixel(0, 2)[0], 20);
    }

    #[test]
    fn export_height_is_even() {
        let composite =
            SideBySideCompositor::default().render(&solid(4, 3, 10), &solid(4, 5, 20), true, true);
        assert_eq!(composite.height() % 2, 0);
        assert_eq!(composite.height(), 6);

        let live =
            SideBySideCompositor::default().render(&solid(4, 3, 10), &solid(4, 5, 20), false, true);
        assert_eq!(live.height(), 5);
    }

    #[test]
    fn shorter_image_is_centred() {
        let composite =
            SideBySideCompositor::default().render(&solid(2, 2, 50), &solid(2, 6, 90), false, true);
        assert_eq!(composite.get_pixel(0, 0)[0], 0);
        assert_eq!(composite.get_pixel(0, 2)[0], 50);
    }

    #[test]
    fn padding_only_when_odd() {
        assert_eq!(pad_to_even_height(solid(3, 4, 1)).height(), 4);
        assert_eq!(pad_to_even_height(solid(3, 5, 1)).height(), 6);
    }
}
