//! Color-space conversion between RGB and the transmitted YUV / PD planes.
//!
//! Everything here is full range: luma and chroma span 0..255, chroma is
//! centered on 128. Mixing these matrices with video-range (16..235)
//! conversions on the other end of the link produces a visible green cast.

use image::RgbaImage;

/// Transient chroma storage for YUV and PD decoding, sized to the full
/// raster. Cells default to 128 so lines that never get their chroma
/// decoded reconstruct as neutral gray instead of a color cast.
#[derive(Clone, Debug)]
pub struct ChromaPlanes {
    width: u32,
    u: Vec<u8>,
    v: Vec<u8>,
}

impl ChromaPlanes {
    pub fn new(width: u32, lines: u32) -> Self {
        let size = width as usize * lines as usize;
        Self {
            width,
            u: vec![128; size],
            v: vec![128; size],
        }
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    #[inline]
    pub fn u(&self, x: u32, y: u32) -> u8 {
        self.u[self.index(x, y)]
    }

    #[inline]
    pub fn v(&self, x: u32, y: u32) -> u8 {
        self.v[self.index(x, y)]
    }

    #[inline]
    pub fn set_u(&mut self, x: u32, y: u32, value: u8) {
        let index = self.index(x, y);
        self.u[index] = value;
    }

    #[inline]
    pub fn set_v(&mut self, x: u32, y: u32, value: u8) {
        let index = self.index(x, y);
        self.v[index] = value;
    }

    /// Writes one half-resolution chroma sample into both columns it covers.
    pub fn set_u_pair(&mut self, cx: u32, y: u32, value: u8) {
        self.set_u(cx * 2, y, value);
        if cx * 2 + 1 < self.width {
            self.set_u(cx * 2 + 1, y, value);
        }
    }

    pub fn set_v_pair(&mut self, cx: u32, y: u32, value: u8) {
        self.set_v(cx * 2, y, value);
        if cx * 2 + 1 < self.width {
            self.set_v(cx * 2 + 1, y, value);
        }
    }
}

#[inline]
pub fn luma([r, g, b]: [u8; 3]) -> f32 {
    0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32
}

/// V (R-Y, scaled) as transmitted on even Robot 36 lines.
#[inline]
pub fn chroma_v([r, g, b]: [u8; 3]) -> f32 {
    128.0 + 0.615 * r as f32 - 0.51499 * g as f32 - 0.10001 * b as f32
}

/// U (B-Y, scaled) as transmitted on odd Robot 36 lines.
#[inline]
pub fn chroma_u([r, g, b]: [u8; 3]) -> f32 {
    128.0 - 0.14713 * r as f32 - 0.28886 * g as f32 + 0.436 * b as f32
}

/// R-Y as transmitted in a PD component.
#[inline]
pub fn pd_red_minus_y(rgb: [u8; 3]) -> f32 {
    128.0 + 0.701 * (rgb[0] as f32 - luma(rgb))
}

/// B-Y as transmitted in a PD component.
#[inline]
pub fn pd_blue_minus_y(rgb: [u8; 3]) -> f32 {
    128.0 + 0.886 * (rgb[2] as f32 - luma(rgb))
}

/// Clamps to the byte range and rounds.
#[inline]
pub(crate) fn quantize(value: f32) -> u8 {
    value.clamp(0.0, 255.0).round() as u8
}

/// Rebuilds RGB for a YUV frame from the provisional grayscale luma and the
/// chroma planes. Each line pair shares one (U, V): V comes from the even
/// line's plane, U from the odd line's.
pub fn reconstruct_yuv(image: &mut RgbaImage, planes: &ChromaPlanes) {
    let (width, height) = image.dimensions();
    let mut y0 = 0;
    while y0 < height {
        let y1 = (y0 + 1).min(height - 1);
        for x in 0..width {
            let v = planes.v(x, y0) as f32 - 128.0;
            let u = planes.u(x, y1) as f32 - 128.0;
            for y in [y0, y1] {
                let pixel = image.get_pixel_mut(x, y);
                let luma = pixel.0[0] as f32;
                pixel.0[0] = quantize(luma + 1.402 * v);
                pixel.0[1] = quantize(luma - 0.344136 * u - 0.714136 * v);
                pixel.0[2] = quantize(luma + 1.772 * u);
            }
        }
        y0 += 2;
    }
}

/// Rebuilds RGB for a PD frame. The planes hold R-Y (v) and B-Y (u) per
/// row, already duplicated across each line pair by the line decoder.
pub fn reconstruct_pd(image: &mut RgbaImage, planes: &ChromaPlanes) {
    let (width, height) = image.dimensions();
    for y in 0..height {
        for x in 0..width {
            let ry = planes.v(x, y) as f32 - 128.0;
            let by = planes.u(x, y) as f32 - 128.0;
            let pixel = image.get_pixel_mut(x, y);
            let luma = pixel.0[0] as f32;
            pixel.0[0] = quantize(luma + ry);
            pixel.0[1] = quantize(luma - 0.194 * by - 0.509 * ry);
            pixel.0[2] = quantize(luma + by);
        }
    }
}
