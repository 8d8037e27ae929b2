//! Decoding pipeline: VIS detection, sync acquisition, line demodulation,
//! color reconstruction and quality analysis.

pub mod line;
pub mod sync;
pub mod vis;

use std::time::{
    Duration,
    Instant,
};

use image::RgbaImage;

use crate::{
    color::{
        self,
        ChromaPlanes,
    },
    decoder::{
        line::LineDecoder,
        vis::VisDetection,
    },
    image::opaque_frame,
    modes::ColorFormat,
    quality::{
        self,
        QualityReport,
    },
};

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Could not find sync pulse. Make sure this is a valid SSTV transmission.")]
    NoSyncFound,
    /// Only surfaced when the caller demanded a readable header; the
    /// default path falls back to timing analysis and then to Robot 36.
    #[error("no VIS header found in the recording")]
    NoVisFound,
}

/// Everything known about a decode besides the pixels.
#[derive(Clone, Debug)]
pub struct Diagnostics {
    pub mode_name: &'static str,
    pub vis_code: Option<u8>,
    pub sample_rate: u32,
    /// Length of the recording in seconds.
    pub duration: f32,
    /// Frequency offset applied during demodulation, in Hz.
    pub freq_offset: f32,
    /// The offset came from the sync-pulse estimator rather than the VIS
    /// header alone.
    pub auto_calibrated: bool,
    /// Sample index of the first line sync.
    pub first_sync: usize,
    pub decode_time: Duration,
    pub lines_decoded: u32,
    pub warnings: Vec<String>,
    pub quality: QualityReport,
}

#[derive(Clone, Debug)]
pub struct DecodeResult {
    pub image: RgbaImage,
    pub diagnostics: Diagnostics,
}

/// Decodes one SSTV transmission from a sample buffer.
///
/// The decoder owns no state beyond its configuration; pixels are a
/// deterministic function of the samples and the sample rate.
#[derive(Clone, Debug)]
pub struct SstvDecoder<'a> {
    samples: &'a [f32],
    sample_rate: u32,
    auto_calibrate: bool,
    require_vis: bool,
}

impl<'a> SstvDecoder<'a> {
    pub fn new(samples: &'a [f32], sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
            auto_calibrate: true,
            require_vis: false,
        }
    }

    /// Per-line sync tracking and frequency-offset estimation. On by
    /// default; turning it off decodes strictly on the nominal timing.
    pub fn auto_calibrate(mut self, enabled: bool) -> Self {
        self.auto_calibrate = enabled;
        self
    }

    /// Fail with [`DecodeError::NoVisFound`] instead of guessing a mode
    /// when the recording has no readable VIS header.
    pub fn require_vis(mut self, required: bool) -> Self {
        self.require_vis = required;
        self
    }

    /// Runs header detection only.
    pub fn detect_mode(&self) -> VisDetection {
        vis::detect_mode(self.samples, self.sample_rate)
    }

    pub fn decode(&self) -> Result<DecodeResult, DecodeError> {
        let started = Instant::now();

        let detection = self.detect_mode();
        if self.require_vis && detection.vis_code.is_none() {
            return Err(DecodeError::NoVisFound);
        }
        let mode = detection.mode;

        let mut image = opaque_frame(mode.pixels_per_line, mode.num_lines);
        let mut chroma = ChromaPlanes::new(mode.pixels_per_line, mode.num_lines);

        let first_sync = self
            .acquire_first_sync(&detection)
            .ok_or(DecodeError::NoSyncFound)?;

        let mut freq_offset = detection.freq_shift;
        let mut auto_calibrated = false;
        if self.auto_calibrate {
            let refined = sync::estimate_frequency_offset(
                self.samples,
                self.sample_rate,
                first_sync,
                mode,
                detection.freq_shift,
            );
            if refined != 0.0 {
                freq_offset = refined;
                auto_calibrated = true;
            }
        }

        let outcome = LineDecoder::new(
            self.samples,
            self.sample_rate,
            mode,
            freq_offset,
            self.auto_calibrate,
        )
        .decode(&mut image, &mut chroma, first_sync);

        match mode.color_format {
            ColorFormat::Rgb => {}
            ColorFormat::Yuv => color::reconstruct_yuv(&mut image, &chroma),
            ColorFormat::Pd => color::reconstruct_pd(&mut image, &chroma),
        }

        let mut warnings = Vec::new();
        if outcome.overflowed {
            warnings.push(format!(
                "Transmission ends after line {} of {}; the rest of the frame is blank",
                outcome.lines_decoded, mode.num_lines
            ));
        }

        let quality = quality::analyze(&image);
        let decode_time = started.elapsed();
        tracing::info!(
            mode = %mode.name,
            freq_offset,
            lines = outcome.lines_decoded,
            ?decode_time,
            "decode finished"
        );

        Ok(DecodeResult {
            image,
            diagnostics: Diagnostics {
                mode_name: mode.name,
                vis_code: detection.vis_code,
                sample_rate: self.sample_rate,
                duration: self.samples.len() as f32 / self.sample_rate as f32,
                freq_offset,
                auto_calibrated,
                first_sync,
                decode_time,
                lines_decoded: outcome.lines_decoded,
                warnings,
                quality,
            },
        })
    }

    /// First-line sync acquisition: a short forward window after the
    /// header, a longer one, then the whole buffer. Never backward; the
    /// VIS data and stop bits sit at or near 1200 Hz and would match.
    fn acquire_first_sync(&self, detection: &VisDetection) -> Option<usize> {
        let mode = detection.mode;
        let period = mode.line_samples(self.sample_rate);
        let vis_end = detection.vis_end;

        for (start, end) in [
            (vis_end, vis_end + period),
            (vis_end, vis_end + 3 * period),
            (0, self.samples.len()),
        ] {
            if let Some(found) = sync::find_sync_pulse(
                self.samples,
                self.sample_rate,
                start,
                end,
                mode.sync_time,
                detection.freq_shift,
            ) {
                return Some(found);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use crate::decoder::{
        DecodeError,
        SstvDecoder,
    };

    #[test]
    fn tiny_buffer_has_no_sync() {
        let samples = vec![0.0f32; 100];
        let result = SstvDecoder::new(&samples, 48000).decode();
        assert!(matches!(result, Err(DecodeError::NoSyncFound)));
    }

    #[test]
    fn require_vis_rejects_headerless_audio() {
        let samples = vec![0.0f32; 48000];
        let result = SstvDecoder::new(&samples, 48000).require_vis(true).decode();
        assert!(matches!(result, Err(DecodeError::NoVisFound)));
    }
}
