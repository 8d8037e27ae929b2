//! SSTV transmission synthesis.

use crate::{
    CHANNEL_HIGH_TONE,
    CHANNEL_LOW_TONE,
    LEADER_BREAK_TIME,
    LEADER_TIME,
    LEADER_TONE,
    PORCH_TONE,
    SYNC_TONE,
    VIS_BIT_TIME,
    VIS_HIGH_TONE,
    VIS_LOW_TONE,
    color,
    image::FrameSource,
    modes::{
        self,
        ColorFormat,
        ModeSpecification,
    },
    synth::ToneGenerator,
    util::{
        duration_to_samples,
        lerp,
        slot_boundary,
    },
    wave,
};

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error(
        "frame is {width}x{height}, but {mode} transmits {expected_width}x{expected_height}; \
         scale the input first"
    )]
    FrameTooSmall {
        width: u32,
        height: u32,
        expected_width: u32,
        expected_height: u32,
        mode: &'static str,
    },
    #[error(transparent)]
    Wave(#[from] wave::WaveError),
}

/// Renders a raster image as SSTV audio: VIS header first, then the
/// per-line tone layout of the selected mode.
#[derive(Clone, Debug)]
pub struct SstvEncoder {
    sample_rate: u32,
    frequency_offset: f32,
}

impl SstvEncoder {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            frequency_offset: 0.0,
        }
    }

    /// Shifts every emitted tone by `offset` Hz, like a mistuned (or
    /// Doppler-shifted) transmitter. Useful to pre-compensate a known error
    /// or to exercise a receiver's offset tracking.
    pub fn with_frequency_offset(mut self, offset: f32) -> Self {
        self.frequency_offset = offset;
        self
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Encodes `frame` in `mode`, returning the raw float samples.
    pub fn encode<F>(&self, frame: &F, mode: &ModeSpecification) -> Result<Vec<f32>, EncodeError>
    where
        F: FrameSource,
    {
        if frame.width() < mode.pixels_per_line || frame.height() < mode.num_lines {
            return Err(EncodeError::FrameTooSmall {
                width: frame.width(),
                height: frame.height(),
                expected_width: mode.pixels_per_line,
                expected_height: mode.num_lines,
                mode: mode.name,
            });
        }

        let mut tones = ToneGenerator::new(self.sample_rate);
        self.push_vis_header(&mut tones, mode.vis_code);
        match mode.color_format {
            ColorFormat::Rgb => self.push_rgb_lines(&mut tones, frame, mode),
            ColorFormat::Yuv => self.push_yuv_lines(&mut tones, frame, mode),
            ColorFormat::Pd => self.push_pd_lines(&mut tones, frame, mode),
        }

        tracing::debug!(
            mode = %mode.name,
            samples = tones.len(),
            seconds = tones.len() as f32 / self.sample_rate as f32,
            "encoded transmission"
        );
        Ok(tones.finish())
    }

    /// Encodes `frame` and serializes the result as a WAV.
    pub fn encode_to_wav<F>(
        &self,
        frame: &F,
        mode: &ModeSpecification,
    ) -> Result<Vec<u8>, EncodeError>
    where
        F: FrameSource,
    {
        let samples = self.encode(frame, mode)?;
        Ok(wave::write_samples(&samples, self.sample_rate)?)
    }

    #[inline]
    fn tone(&self, tones: &mut ToneGenerator, frequency: f32, duration: f32) {
        tones.add_tone(frequency + self.frequency_offset, duration);
    }

    #[inline]
    fn tone_samples(&self, tones: &mut ToneGenerator, frequency: f32, num_samples: usize) {
        tones.add_tone_samples(frequency + self.frequency_offset, num_samples);
    }

    fn push_vis_header(&self, tones: &mut ToneGenerator, vis_code: u8) {
        self.tone(tones, LEADER_TONE, LEADER_TIME);
        self.tone(tones, SYNC_TONE, LEADER_BREAK_TIME);
        self.tone(tones, LEADER_TONE, VIS_BIT_TIME);

        let mut parity = false;
        for bit in 0..7 {
            let set = vis_code >> bit & 1 != 0;
            parity ^= set;
            let tone = if set { VIS_HIGH_TONE } else { VIS_LOW_TONE };
            self.tone(tones, tone, VIS_BIT_TIME);
        }
        let tone = if parity { VIS_HIGH_TONE } else { VIS_LOW_TONE };
        self.tone(tones, tone, VIS_BIT_TIME);

        self.tone(tones, SYNC_TONE, VIS_BIT_TIME);
    }

    #[inline]
    fn pixel_tone(value: f32) -> f32 {
        lerp(value / 255.0, CHANNEL_LOW_TONE, CHANNEL_HIGH_TONE)
    }

    /// Emits one scan of `values` over `duration`. Tone lengths come from
    /// absolute slot boundaries, so the scan occupies exactly
    /// `floor(duration * sample_rate)` samples regardless of pixel count.
    fn push_scan(&self, tones: &mut ToneGenerator, values: &[f32], duration: f32) {
        let total = duration_to_samples(duration, self.sample_rate);
        let n = values.len();
        for (k, &value) in values.iter().enumerate() {
            let num_samples = slot_boundary(k + 1, n, total) - slot_boundary(k, n, total);
            self.tone_samples(tones, Self::pixel_tone(value), num_samples);
        }
    }

    fn push_rgb_lines<F>(&self, tones: &mut ToneGenerator, frame: &F, mode: &ModeSpecification)
    where
        F: FrameSource,
    {
        let width = mode.pixels_per_line;
        for y in 0..mode.num_lines {
            self.tone(tones, SYNC_TONE, mode.sync_time);
            self.tone(tones, PORCH_TONE, mode.porch_time);

            // Channel order on the wire is green, blue, red.
            for (index, channel) in [1usize, 2, 0].into_iter().enumerate() {
                if index > 0 {
                    self.tone(tones, SYNC_TONE, mode.sep_time);
                }
                let values: Vec<f32> = (0..width)
                    .map(|x| frame.rgb(x, y)[channel] as f32)
                    .collect();
                self.push_scan(tones, &values, mode.scan_time);
            }
        }
    }

    fn push_yuv_lines<F>(&self, tones: &mut ToneGenerator, frame: &F, mode: &ModeSpecification)
    where
        F: FrameSource,
    {
        let width = mode.pixels_per_line;
        for y in 0..mode.num_lines {
            self.tone(tones, SYNC_TONE, mode.sync_time);
            self.tone(tones, PORCH_TONE, mode.porch_time);

            let luma: Vec<f32> = (0..width).map(|x| color::luma(frame.rgb(x, y))).collect();
            self.push_scan(tones, &luma, modes::YUV_LUMA_TIME);

            // Chroma alternates by line parity: even lines carry V (R-Y)
            // behind a 1500 Hz separator, odd lines carry U (B-Y) behind a
            // 2300 Hz one.
            let even = y % 2 == 0;
            let separator = if even { PORCH_TONE } else { CHANNEL_HIGH_TONE };
            self.tone(tones, separator, modes::YUV_SEPARATOR_TIME);
            self.tone(tones, PORCH_TONE, modes::YUV_PORCH_TIME);

            let chroma: Vec<f32> = (0..width / 2)
                .map(|cx| {
                    let left = frame.rgb(cx * 2, y);
                    let right = frame.rgb((cx * 2 + 1).min(width - 1), y);
                    if even {
                        (color::chroma_v(left) + color::chroma_v(right)) / 2.0
                    }
                    else {
                        (color::chroma_u(left) + color::chroma_u(right)) / 2.0
                    }
                })
                .collect();
            self.push_scan(tones, &chroma, modes::YUV_CHROMA_TIME);
        }
    }

    fn push_pd_lines<F>(&self, tones: &mut ToneGenerator, frame: &F, mode: &ModeSpecification)
    where
        F: FrameSource,
    {
        let width = mode.pixels_per_line;
        let mut y = 0;
        while y < mode.num_lines {
            let y1 = (y + 1).min(mode.num_lines - 1);

            self.tone(tones, SYNC_TONE, mode.sync_time);
            self.tone(tones, PORCH_TONE, mode.porch_time);

            let luma0: Vec<f32> = (0..width).map(|x| color::luma(frame.rgb(x, y))).collect();
            self.push_scan(tones, &luma0, mode.component_time);

            // Both rows of the pair share one chroma scan each way.
            let red_minus_y: Vec<f32> = (0..width)
                .map(|x| {
                    (color::pd_red_minus_y(frame.rgb(x, y))
                        + color::pd_red_minus_y(frame.rgb(x, y1)))
                        / 2.0
                })
                .collect();
            self.push_scan(tones, &red_minus_y, mode.component_time);

            let blue_minus_y: Vec<f32> = (0..width)
                .map(|x| {
                    (color::pd_blue_minus_y(frame.rgb(x, y))
                        + color::pd_blue_minus_y(frame.rgb(x, y1)))
                        / 2.0
                })
                .collect();
            self.push_scan(tones, &blue_minus_y, mode.component_time);

            let luma1: Vec<f32> = (0..width).map(|x| color::luma(frame.rgb(x, y1))).collect();
            self.push_scan(tones, &luma1, mode.component_time);

            y += 2;
        }
    }
}

/// Samples the VIS header occupies: leader, break, start bit, 7 data bits,
/// parity and stop.
pub fn vis_samples(sample_rate: u32) -> usize {
    duration_to_samples(LEADER_TIME, sample_rate)
        + duration_to_samples(LEADER_BREAK_TIME, sample_rate)
        + 10 * duration_to_samples(VIS_BIT_TIME, sample_rate)
}
