//! Per-line demodulation.
//!
//! One cursor walks the sample buffer through each line's tone layout.
//! Pixel boundaries inside a scan come from absolute `floor(k/N * total)`
//! positions, the mirror image of how the encoder laid the tones down, so
//! a scan never drifts against its own pixels. Estimation windows open at
//! the slot boundary and are widened toward the end of the scan when a
//! slot alone is too short for a stable Goertzel estimate.

use image::RgbaImage;

use crate::{
    CHANNEL_HIGH_TONE,
    CHANNEL_LOW_TONE,
    color::{
        self,
        ChromaPlanes,
    },
    decoder::sync::find_sync_pulse,
    goertzel::detect_frequency_range,
    modes::{
        self,
        ColorFormat,
        ModeSpecification,
    },
    util::{
        duration_to_samples,
        median_filter_5,
        slot_boundary,
        unlerp,
    },
};

/// Estimation windows never get narrower than this many samples; at the
/// pixel rates of the supported modes a bare slot is 9 to 22 samples, far
/// too short to resolve a frequency.
const MIN_SCAN_WINDOW: usize = 96;

#[derive(Clone, Copy, Debug)]
pub struct SweepOutcome {
    pub lines_decoded: u32,
    /// The buffer ran out before the full raster was decoded.
    pub overflowed: bool,
}

pub struct LineDecoder<'a> {
    samples: &'a [f32],
    sample_rate: u32,
    mode: &'static ModeSpecification,
    freq_offset: f32,
    auto_calibrate: bool,
}

impl<'a> LineDecoder<'a> {
    pub fn new(
        samples: &'a [f32],
        sample_rate: u32,
        mode: &'static ModeSpecification,
        freq_offset: f32,
        auto_calibrate: bool,
    ) -> Self {
        Self {
            samples,
            sample_rate,
            mode,
            freq_offset,
            auto_calibrate,
        }
    }

    /// Decodes scan lines starting at the first sync pulse. YUV and PD
    /// modes write luma into the image (as provisional grayscale) and
    /// chroma into the planes; RGB modes fill the image directly.
    pub fn decode(
        &self,
        image: &mut RgbaImage,
        chroma: &mut ChromaPlanes,
        first_sync: usize,
    ) -> SweepOutcome {
        let period = self.mode.line_samples(self.sample_rate);
        let tolerance = period / 10;
        let step = if self.mode.is_line_paired() { 2 } else { 1 };

        let mut cursor = first_sync;
        let mut y = 0;
        while y < self.mode.num_lines {
            if cursor + period > self.samples.len() {
                tracing::debug!(line = y, "sample buffer exhausted before the full raster");
                return SweepOutcome {
                    lines_decoded: y,
                    overflowed: true,
                };
            }

            match self.mode.color_format {
                ColorFormat::Rgb => self.decode_rgb_line(image, cursor, y),
                ColorFormat::Yuv => self.decode_yuv_line(image, chroma, cursor, y),
                ColorFormat::Pd => self.decode_pd_pair(image, chroma, cursor, y),
            }

            cursor += period;
            y += step;

            // Slow sample-clock drift shows up as a slanted image. Snapping
            // the cursor to the next sync, when one is where it should be,
            // corrects that without introducing jumps on clean signals.
            if self.auto_calibrate && y < self.mode.num_lines {
                if let Some(found) = find_sync_pulse(
                    self.samples,
                    self.sample_rate,
                    cursor.saturating_sub(tolerance),
                    cursor + tolerance,
                    self.mode.sync_time,
                    self.freq_offset,
                ) {
                    cursor = found;
                }
            }
        }

        SweepOutcome {
            lines_decoded: self.mode.num_lines,
            overflowed: false,
        }
    }

    /// Maps a measured tone back to a byte value with the full-range
    /// 1500..2300 Hz contract, corrected for the transmission's offset.
    #[inline]
    fn pixel_value(&self, frequency: f32) -> u8 {
        let low = CHANNEL_LOW_TONE + self.freq_offset;
        let high = CHANNEL_HIGH_TONE + self.freq_offset;
        color::quantize(unlerp(frequency, low, high) * 255.0)
    }

    /// Estimated frequency of slot `k` of `n` in a scan of `total` samples
    /// starting at `scan_start`. The window never extends past the scan.
    fn slot_frequency(&self, scan_start: usize, total: usize, k: usize, n: usize) -> f32 {
        let begin = slot_boundary(k, n, total);
        let slot = slot_boundary(k + 1, n, total) - begin;
        let len = slot
            .max(MIN_SCAN_WINDOW.max(4 * (total / n)))
            .min(total - begin);
        detect_frequency_range(self.samples, scan_start + begin, len, self.sample_rate)
    }

    fn decode_rgb_line(&self, image: &mut RgbaImage, line_start: usize, y: u32) {
        let d = |duration| duration_to_samples(duration, self.sample_rate);
        let mode = self.mode;
        let width = mode.pixels_per_line as usize;
        let total = d(mode.scan_time);

        let mut pos = line_start + d(mode.sync_time) + d(mode.porch_time);
        // Channel order on the wire is green, blue, red.
        for channel in [1usize, 2, 0] {
            for x in 0..width {
                let frequency = self.slot_frequency(pos, total, x, width);
                image.get_pixel_mut(x as u32, y).0[channel] = self.pixel_value(frequency);
            }
            pos += total;
            if channel != 0 {
                pos += d(mode.sep_time);
            }
        }
    }

    fn decode_yuv_line(
        &self,
        image: &mut RgbaImage,
        chroma: &mut ChromaPlanes,
        line_start: usize,
        y: u32,
    ) {
        let d = |duration| duration_to_samples(duration, self.sample_rate);
        let width = self.mode.pixels_per_line as usize;

        let mut pos = line_start + d(self.mode.sync_time) + d(self.mode.porch_time);
        let total = d(modes::YUV_LUMA_TIME);
        for x in 0..width {
            let frequency = self.slot_frequency(pos, total, x, width);
            let value = self.pixel_value(frequency);
            let pixel = image.get_pixel_mut(x as u32, y);
            pixel.0[0] = value;
            pixel.0[1] = value;
            pixel.0[2] = value;
        }
        pos += total;

        // The separator tone nominally announces which chroma plane
        // follows (1500 Hz for V, 2300 Hz for U), but line parity is the
        // more reliable signal on real-world recordings, so the separator
        // is skipped rather than interpreted.
        pos += d(modes::YUV_SEPARATOR_TIME) + d(modes::YUV_PORCH_TIME);

        let half = width / 2;
        let total = d(modes::YUV_CHROMA_TIME);
        let raw: Vec<f32> = (0..half)
            .map(|cx| self.slot_frequency(pos, total, cx, half))
            .collect();
        for (cx, &frequency) in median_filter_5(&raw).iter().enumerate() {
            let value = self.pixel_value(frequency);
            if y % 2 == 0 {
                chroma.set_v_pair(cx as u32, y, value);
            }
            else {
                chroma.set_u_pair(cx as u32, y, value);
            }
        }
    }

    fn decode_pd_pair(
        &self,
        image: &mut RgbaImage,
        chroma: &mut ChromaPlanes,
        line_start: usize,
        y: u32,
    ) {
        let d = |duration| duration_to_samples(duration, self.sample_rate);
        let mode = self.mode;
        let width = mode.pixels_per_line as usize;
        let total = d(mode.component_time);
        let y1 = (y + 1).min(mode.num_lines - 1);

        let mut pos = line_start + d(mode.sync_time) + d(mode.porch_time);

        // Y0
        for x in 0..width {
            let frequency = self.slot_frequency(pos, total, x, width);
            let value = self.pixel_value(frequency);
            let pixel = image.get_pixel_mut(x as u32, y);
            pixel.0[0] = value;
            pixel.0[1] = value;
            pixel.0[2] = value;
        }
        pos += total;

        // R-Y and B-Y cover both rows of the pair.
        let raw: Vec<f32> = (0..width)
            .map(|x| self.slot_frequency(pos, total, x, width))
            .collect();
        for (x, &frequency) in median_filter_5(&raw).iter().enumerate() {
            let value = self.pixel_value(frequency);
            chroma.set_v(x as u32, y, value);
            chroma.set_v(x as u32, y1, value);
        }
        pos += total;

        let raw: Vec<f32> = (0..width)
            .map(|x| self.slot_frequency(pos, total, x, width))
            .collect();
        for (x, &frequency) in median_filter_5(&raw).iter().enumerate() {
            let value = self.pixel_value(frequency);
            chroma.set_u(x as u32, y, value);
            chroma.set_u(x as u32, y1, value);
        }
        pos += total;

        // Y1
        for x in 0..width {
            let frequency = self.slot_frequency(pos, total, x, width);
            let value = self.pixel_value(frequency);
            let pixel = image.get_pixel_mut(x as u32, y1);
            pixel.0[0] = value;
            pixel.0[1] = value;
            pixel.0[2] = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use image::RgbaImage;

    use crate::{
        color::ChromaPlanes,
        decoder::line::LineDecoder,
        image::opaque_frame,
        modes::ModeSpecification,
        synth::ToneGenerator,
    };

    const SAMPLE_RATE: u32 = 48000;

    /// A single Robot 36 line with flat luma and chroma tones.
    fn flat_yuv_line(luma_tone: f32, chroma_tone: f32, lines: usize) -> Vec<f32> {
        let mut generator = ToneGenerator::new(SAMPLE_RATE);
        for _ in 0..lines {
            generator.add_tone(1200.0, 9e-3);
            generator.add_tone(1500.0, 3e-3);
            generator.add_tone(luma_tone, 0.088);
            generator.add_tone(1500.0, 4.5e-3);
            generator.add_tone(1500.0, 1.5e-3);
            generator.add_tone(chroma_tone, 0.044);
        }
        generator.finish()
    }

    fn decode_lines(samples: &[f32], lines: u32) -> (RgbaImage, ChromaPlanes) {
        let mode = &ModeSpecification::R36;
        let mut image = opaque_frame(mode.pixels_per_line, mode.num_lines);
        let mut chroma = ChromaPlanes::new(mode.pixels_per_line, mode.num_lines);
        let decoder = LineDecoder::new(samples, SAMPLE_RATE, mode, 0.0, false);
        let outcome = decoder.decode(&mut image, &mut chroma, 0);
        assert!(outcome.overflowed);
        assert_eq!(outcome.lines_decoded, lines);
        (image, chroma)
    }

    #[test]
    fn neutral_chroma_decodes_to_128() {
        // 1900 Hz maps to 127.5, which rounds up to the neutral 128. Short
        // estimation windows scatter single cells by a few levels, but the
        // line as a whole must stay neutral.
        let samples = flat_yuv_line(1900.0, 1900.0, 2);
        let (image, chroma) = decode_lines(&samples, 2);

        for x in [5u32, 160, 315] {
            let luma = image.get_pixel(x, 0).0[0];
            assert!((118..=138).contains(&luma), "luma {luma} at {x}");
            assert!((120..=136).contains(&chroma.v(x, 0)), "v at {x}");
            assert!((120..=136).contains(&chroma.u(x, 1)), "u at {x}");
        }

        let width = ModeSpecification::R36.pixels_per_line;
        let v_mean = (0..width).map(|x| chroma.v(x, 0) as f32).sum::<f32>() / width as f32;
        let u_mean = (0..width).map(|x| chroma.u(x, 1) as f32).sum::<f32>() / width as f32;
        assert!((v_mean - 128.0).abs() < 3.0, "v mean {v_mean}");
        assert!((u_mean - 128.0).abs() < 3.0, "u mean {u_mean}");
    }

    #[test]
    fn luma_black_and_white_extremes() {
        let samples = flat_yuv_line(1500.0, 1900.0, 1);
        let (image, _) = decode_lines(&samples, 1);
        assert!(image.get_pixel(160, 0).0[0] <= 8);

        let samples = flat_yuv_line(2300.0, 1900.0, 1);
        let (image, _) = decode_lines(&samples, 1);
        assert!(image.get_pixel(160, 0).0[0] >= 246);
    }

    #[test]
    fn partial_buffer_reports_overflow() {
        let samples = flat_yuv_line(1900.0, 1900.0, 3);
        let mode = &ModeSpecification::R36;
        let mut image = opaque_frame(mode.pixels_per_line, mode.num_lines);
        let mut chroma = ChromaPlanes::new(mode.pixels_per_line, mode.num_lines);
        let outcome = LineDecoder::new(&samples, SAMPLE_RATE, mode, 0.0, false).decode(
            &mut image,
            &mut chroma,
            0,
        );
        assert!(outcome.overflowed);
        assert_eq!(outcome.lines_decoded, 3);
        // Lines that were never reached keep their prefill.
        assert_eq!(image.get_pixel(0, 100).0, [0, 0, 0, 255]);
    }
}
