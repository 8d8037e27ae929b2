//! Sync pulse acquisition and frequency offset measurement.

use crate::{
    SYNC_TONE,
    goertzel::{
        detect_frequency,
        goertzel_magnitude,
    },
    modes::ModeSpecification,
    util::duration_to_samples,
};

const SYNC_TOLERANCE: f32 = 200.0;
const SCAN_STEP: f32 = 0.2e-3;
/// Short sync pulses still get a usable measurement window.
const MIN_SYNC_WINDOW: f32 = 4e-3;

/// Forward scan for a 1200 Hz sync pulse in `[start, end)`. The measurement
/// window is the mode's sync duration (at least 4 ms); a hit must also hold
/// across three sub-windows so a brief dip through 1200 Hz does not pass.
///
/// The scan only ever runs forward; callers that want tolerance on both
/// sides widen the range themselves.
pub fn find_sync_pulse(
    samples: &[f32],
    sample_rate: u32,
    start: usize,
    end: usize,
    sync_time: f32,
    freq_shift: f32,
) -> Option<usize> {
    let window = duration_to_samples(sync_time.max(MIN_SYNC_WINDOW), sample_rate);
    let step = duration_to_samples(SCAN_STEP, sample_rate).max(1);
    let target = SYNC_TONE + freq_shift;
    let end = end.min(samples.len());

    let mut pos = start;
    while pos + window <= end {
        let freq = detect_frequency(samples, pos, window, sample_rate);
        if (freq - target).abs() <= SYNC_TOLERANCE
            && validate_sync(samples, sample_rate, pos, window, target)
        {
            return Some(pos);
        }
        pos += step;
    }
    None
}

fn validate_sync(
    samples: &[f32],
    sample_rate: u32,
    pos: usize,
    window: usize,
    target: f32,
) -> bool {
    let sub = window / 3;
    if sub < 10 {
        return true;
    }
    for k in 0..3 {
        let freq = detect_frequency(samples, pos + k * sub, sub, sample_rate);
        if (freq - target).abs() > SYNC_TOLERANCE {
            return false;
        }
    }
    true
}

/// Lines inspected when estimating the offset.
const OFFSET_LINES: usize = 20;
/// Offsets below this are measurement noise, not a mistuned transmitter.
const OFFSET_SIGNIFICANCE: f32 = 50.0;

/// Measures the systematic tuning error of a transmission by re-finding up
/// to 20 successive line syncs and sweeping each pulse's center frequency.
/// The median deviation suppresses the outliers a noisy broadcast throws
/// in; values within ±50 Hz are reported as zero.
pub fn estimate_frequency_offset(
    samples: &[f32],
    sample_rate: u32,
    first_sync: usize,
    mode: &ModeSpecification,
    freq_shift: f32,
) -> f32 {
    let period = mode.line_samples(sample_rate);
    let tolerance = period / 20;
    let window = duration_to_samples(mode.sync_time.max(MIN_SYNC_WINDOW), sample_rate);

    let mut deviations = Vec::new();
    let mut anchor = first_sync;
    for _ in 0..OFFSET_LINES {
        let predicted = anchor + period;
        let Some(found) = find_sync_pulse(
            samples,
            sample_rate,
            predicted.saturating_sub(tolerance),
            predicted + tolerance + window,
            mode.sync_time,
            freq_shift,
        )
        else {
            break;
        };
        let center = measure_sync_frequency(samples, sample_rate, found, window, freq_shift);
        deviations.push(center - SYNC_TONE);
        anchor = found;
    }

    if deviations.is_empty() {
        return 0.0;
    }
    deviations.sort_unstable_by(f32::total_cmp);
    let median = deviations[deviations.len() / 2];
    tracing::debug!(median, lines = deviations.len(), "sync frequency deviation");
    if median.abs() > OFFSET_SIGNIFICANCE {
        median
    }
    else {
        0.0
    }
}

/// 1 Hz sweep ±100 Hz around the (already shifted) sync tone.
fn measure_sync_frequency(
    samples: &[f32],
    sample_rate: u32,
    pos: usize,
    window: usize,
    freq_shift: f32,
) -> f32 {
    let center = SYNC_TONE + freq_shift;
    let mut best = center;
    let mut best_magnitude = f32::NEG_INFINITY;
    for k in 0..=200 {
        let frequency = center - 100.0 + k as f32;
        let magnitude = goertzel_magnitude(samples, pos, window, frequency, sample_rate);
        if magnitude > best_magnitude {
            best_magnitude = magnitude;
            best = frequency;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use crate::{
        decoder::sync::find_sync_pulse,
        synth::ToneGenerator,
        util::duration_to_samples,
    };

    const SAMPLE_RATE: u32 = 48000;

    #[test]
    fn finds_a_sync_pulse_in_porch_tone() {
        let mut generator = ToneGenerator::new(SAMPLE_RATE);
        generator.add_tone(1500.0, 0.050);
        generator.add_tone(1200.0, 9e-3);
        generator.add_tone(1500.0, 0.050);
        let samples = generator.finish();

        let expected = duration_to_samples(0.050, SAMPLE_RATE);
        let found = find_sync_pulse(&samples, SAMPLE_RATE, 0, samples.len(), 9e-3, 0.0)
            .expect("sync pulse present");
        // Forward scanning accepts once the window is dominated by the
        // pulse, which can be slightly before its true start.
        assert!(
            found <= expected && expected - found < duration_to_samples(2e-3, SAMPLE_RATE),
            "found {found}, pulse starts at {expected}"
        );
    }

    #[test]
    fn ignores_pulses_that_are_too_short() {
        let mut generator = ToneGenerator::new(SAMPLE_RATE);
        generator.add_tone(1500.0, 0.050);
        generator.add_tone(1200.0, 1e-3);
        generator.add_tone(1500.0, 0.050);
        let samples = generator.finish();

        assert_eq!(
            find_sync_pulse(&samples, SAMPLE_RATE, 0, samples.len(), 9e-3, 0.0),
            None
        );
    }

    #[test]
    fn respects_the_search_range() {
        let mut generator = ToneGenerator::new(SAMPLE_RATE);
        generator.add_tone(1200.0, 9e-3);
        generator.add_tone(1500.0, 0.100);
        let samples = generator.finish();

        assert_eq!(
            find_sync_pulse(
                &samples,
                SAMPLE_RATE,
                duration_to_samples(0.020, SAMPLE_RATE),
                samples.len(),
                9e-3,
                0.0
            ),
            None
        );
    }

    #[test]
    fn honors_the_frequency_shift() {
        let mut generator = ToneGenerator::new(SAMPLE_RATE);
        generator.add_tone(1371.0, 0.050);
        generator.add_tone(1071.0, 9e-3);
        generator.add_tone(1371.0, 0.050);
        let samples = generator.finish();

        assert!(find_sync_pulse(&samples, SAMPLE_RATE, 0, samples.len(), 9e-3, -129.0).is_some());
        assert_eq!(
            find_sync_pulse(&samples, SAMPLE_RATE, 0, samples.len(), 9e-3, -500.0),
            None
        );
    }
}
