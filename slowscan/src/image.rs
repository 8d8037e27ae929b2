//! Pixel access for encoder input and decoder output.

use image::{
    Rgb,
    RgbImage,
    Rgba,
    RgbaImage,
};

/// Read access to the raster an encoder transmits. Alpha, if present, is
/// ignored; SSTV carries no transparency.
pub trait FrameSource {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn rgb(&self, x: u32, y: u32) -> [u8; 3];
}

impl<F> FrameSource for &F
where
    F: FrameSource,
{
    #[inline]
    fn width(&self) -> u32 {
        (**self).width()
    }

    #[inline]
    fn height(&self) -> u32 {
        (**self).height()
    }

    #[inline]
    fn rgb(&self, x: u32, y: u32) -> [u8; 3] {
        (**self).rgb(x, y)
    }
}

impl FrameSource for RgbaImage {
    #[inline]
    fn width(&self) -> u32 {
        RgbaImage::width(self)
    }

    #[inline]
    fn height(&self) -> u32 {
        RgbaImage::height(self)
    }

    #[inline]
    fn rgb(&self, x: u32, y: u32) -> [u8; 3] {
        let Rgba([r, g, b, _]) = *self.get_pixel(x, y);
        [r, g, b]
    }
}

impl FrameSource for RgbImage {
    #[inline]
    fn width(&self) -> u32 {
        RgbImage::width(self)
    }

    #[inline]
    fn height(&self) -> u32 {
        RgbImage::height(self)
    }

    #[inline]
    fn rgb(&self, x: u32, y: u32) -> [u8; 3] {
        let Rgb(rgb) = *self.get_pixel(x, y);
        rgb
    }
}

/// The decoder's output raster: black with every pixel already opaque, so
/// partially decoded frames still composite correctly.
pub fn opaque_frame(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255]))
}
