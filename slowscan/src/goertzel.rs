//! Single-bin frequency estimation.
//!
//! The Goertzel recurrence evaluates one DFT bin in a single pass, which is
//! much cheaper than an FFT when only a handful of frequencies matter. The
//! bin index may be fractional, so the probe frequency is not quantized to
//! the window length; that matters for the very short windows used during
//! pixel demodulation.

use num_complex::Complex;

use crate::PORCH_TONE;

/// Normalized magnitude of the `frequency` component over
/// `samples[start..start + len]`. Windows that run past the buffer are
/// truncated; an empty window reports zero.
pub fn goertzel_magnitude(
    samples: &[f32],
    start: usize,
    len: usize,
    frequency: f32,
    sample_rate: u32,
) -> f32 {
    let Some(window) = samples.get(start..) else {
        return 0.0;
    };
    let window = &window[..len.min(window.len())];
    if window.is_empty() {
        return 0.0;
    }

    let omega = std::f64::consts::TAU * frequency as f64 / sample_rate as f64;
    let coefficient = 2.0 * omega.cos();

    let mut s1 = 0.0f64;
    let mut s2 = 0.0f64;
    for &sample in window {
        let s0 = sample as f64 + coefficient * s1 - s2;
        s2 = s1;
        s1 = s0;
    }

    let bin = Complex::new(s1 - s2 * omega.cos(), s2 * omega.sin());
    (bin.norm() / window.len() as f64) as f32
}

/// Shortest window that still yields a usable estimate.
const MIN_WINDOW: usize = 10;

const SWEEP_LOW: f32 = 1100.0;
const SWEEP_HIGH: f32 = 2500.0;
const SWEEP_COARSE_STEP: f32 = 25.0;
const SWEEP_FINE_SPAN: f32 = 30.0;

/// Sweeps the whole SSTV band for the dominant tone: 25 Hz coarse pass from
/// 1100 to 2500 Hz, then a 1 Hz fine pass within ±30 Hz of the coarse
/// winner. Ties keep the lowest frequency. Windows shorter than 10 samples
/// report 1500 Hz.
pub fn detect_frequency_range(samples: &[f32], start: usize, len: usize, sample_rate: u32) -> f32 {
    let len = len.min(samples.len().saturating_sub(start));
    if len < MIN_WINDOW {
        return PORCH_TONE;
    }

    let coarse_steps = ((SWEEP_HIGH - SWEEP_LOW) / SWEEP_COARSE_STEP) as u32;
    let mut best = SWEEP_LOW;
    let mut best_magnitude = f32::NEG_INFINITY;
    for k in 0..=coarse_steps {
        let frequency = SWEEP_LOW + k as f32 * SWEEP_COARSE_STEP;
        let magnitude = goertzel_magnitude(samples, start, len, frequency, sample_rate);
        if magnitude > best_magnitude {
            best_magnitude = magnitude;
            best = frequency;
        }
    }

    let coarse = best;
    for k in 0..=(2.0 * SWEEP_FINE_SPAN) as u32 {
        let frequency = coarse - SWEEP_FINE_SPAN + k as f32;
        let magnitude = goertzel_magnitude(samples, start, len, frequency, sample_rate);
        if magnitude > best_magnitude {
            best_magnitude = magnitude;
            best = frequency;
        }
    }

    best
}

/// The control tones a header or sync probe can encounter.
const PROBE_TONES: [f32; 13] = [
    1100.0, 1200.0, 1300.0, 1400.0, 1500.0, 1600.0, 1700.0, 1800.0, 1900.0, 2000.0, 2100.0,
    2200.0, 2300.0,
];

const PROBE_REFINE_THRESHOLD: f32 = 0.05;

/// Picks the strongest of the fixed control-tone probes and, when the signal
/// is strong enough to be more than noise, refines within ±100 Hz in 10 Hz
/// steps. Used for sync and VIS detection where only coarse classification
/// is needed.
pub fn detect_frequency(samples: &[f32], start: usize, len: usize, sample_rate: u32) -> f32 {
    let len = len.min(samples.len().saturating_sub(start));
    if len < MIN_WINDOW {
        return PORCH_TONE;
    }

    let mut best = PROBE_TONES[0];
    let mut best_magnitude = f32::NEG_INFINITY;
    for &frequency in &PROBE_TONES {
        let magnitude = goertzel_magnitude(samples, start, len, frequency, sample_rate);
        if magnitude > best_magnitude {
            best_magnitude = magnitude;
            best = frequency;
        }
    }

    if best_magnitude > PROBE_REFINE_THRESHOLD {
        let coarse = best;
        for k in 0..=20 {
            let frequency = coarse - 100.0 + k as f32 * 10.0;
            let magnitude = goertzel_magnitude(samples, start, len, frequency, sample_rate);
            if magnitude > best_magnitude {
                best_magnitude = magnitude;
                best = frequency;
            }
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use crate::{
        goertzel::{
            detect_frequency,
            detect_frequency_range,
            goertzel_magnitude,
        },
        synth::ToneGenerator,
    };

    const SAMPLE_RATE: u32 = 48000;

    fn tone(frequency: f32, duration: f32) -> Vec<f32> {
        let mut generator = ToneGenerator::new(SAMPLE_RATE);
        generator.add_tone(frequency, duration);
        generator.finish()
    }

    #[test]
    fn magnitude_peaks_at_the_tone() {
        let samples = tone(1900.0, 0.010);
        let on = goertzel_magnitude(&samples, 0, samples.len(), 1900.0, SAMPLE_RATE);
        let off = goertzel_magnitude(&samples, 0, samples.len(), 1400.0, SAMPLE_RATE);
        assert!(on > 0.4, "on-bin magnitude {on}");
        assert!(off < 0.05, "off-bin magnitude {off}");
    }

    #[test]
    fn range_sweep_is_accurate() {
        // The negative-frequency image of a real tone leaves a small ripple
        // on the sweep, so a 10 ms window resolves to within a few hertz.
        for &frequency in &[1500.0f32, 1765.0, 1900.0, 2042.0, 2300.0] {
            let samples = tone(frequency, 0.010);
            let detected = detect_frequency_range(&samples, 0, samples.len(), SAMPLE_RATE);
            assert!(
                (detected - frequency).abs() <= 3.0,
                "{frequency} detected as {detected}"
            );
        }
    }

    #[test]
    fn undersized_window_reports_porch() {
        let samples = tone(2300.0, 0.010);
        assert_eq!(detect_frequency_range(&samples, 0, 5, SAMPLE_RATE), 1500.0);
        assert_eq!(detect_frequency(&samples, 0, 5, SAMPLE_RATE), 1500.0);
        assert_eq!(
            detect_frequency_range(&samples, samples.len() + 10, 480, SAMPLE_RATE),
            1500.0
        );
    }

    #[test]
    fn probe_detector_refines_strong_tones() {
        let samples = tone(1230.0, 0.010);
        let detected = detect_frequency(&samples, 0, samples.len(), SAMPLE_RATE);
        assert!((detected - 1230.0).abs() <= 10.0, "detected {detected}");
    }

    #[test]
    fn probe_detector_skips_refinement_on_noise_floor() {
        let samples = vec![0.0f32; 480];
        // All probes tie at zero magnitude; the first probe wins.
        assert_eq!(detect_frequency(&samples, 0, 480, SAMPLE_RATE), 1100.0);
    }
}
