//! VIS header detection.
//!
//! The header is a 300 ms 1900 Hz leader, a 10 ms 1200 Hz break, a 30 ms
//! start bit back at 1900 Hz, seven 30 ms data bits (1100 Hz = 1, 1300 Hz =
//! 0, LSB first), an even parity bit and a 30 ms 1200 Hz stop bit. The
//! detector walks the buffer looking for a break candidate, validates the
//! leader behind it, decodes the bits and checks parity. Recordings without
//! a readable header fall back to timing analysis of the line sync pulses.

use crate::{
    LEADER_TONE,
    PORCH_TONE,
    SYNC_TONE,
    VIS_BIT_TIME,
    decoder::sync::find_sync_pulse,
    goertzel::{
        detect_frequency,
        detect_frequency_range,
    },
    modes::{
        self,
        ModeSpecification,
    },
    util::duration_to_samples,
};

/// Outcome of scanning a sample buffer for an SSTV header.
#[derive(Clone, Copy, Debug)]
pub struct VisDetection {
    pub mode: &'static ModeSpecification,
    /// Decoded VIS code, or `None` when the mode came from timing analysis
    /// or the default.
    pub vis_code: Option<u8>,
    /// First sample after the VIS stop bit, where image sync may begin.
    pub vis_end: usize,
    /// Measured deviation of the break tone from 1200 Hz.
    pub freq_shift: f32,
}

/// How far into the recording to look for a header. Off-air captures often
/// start many seconds before the transmission.
const SCAN_WINDOW: f32 = 60.0;
const SCAN_STRIDE: f32 = 0.5e-3;

const BREAK_PROBE: f32 = 0.010;
const BREAK_TOLERANCE: f32 = 150.0;
const LEADER_PROBE: f32 = 0.020;
const LEADER_TOLERANCE: f32 = 200.0;
const EXTENT_STEP: f32 = 5e-3;
const EXTENT_MAX: f32 = 0.300;
const EXTENT_TOLERANCE: f32 = 80.0;
const MIN_BREAK: f32 = 5e-3;

pub fn detect_mode(samples: &[f32], sample_rate: u32) -> VisDetection {
    let stride = duration_to_samples(SCAN_STRIDE, sample_rate).max(1);
    let probe = duration_to_samples(BREAK_PROBE, sample_rate);
    let scan_end = samples
        .len()
        .min(duration_to_samples(SCAN_WINDOW, sample_rate));

    let mut pos = 0;
    while pos + probe <= scan_end {
        let break_freq = detect_frequency(samples, pos, probe, sample_rate);
        if (break_freq - SYNC_TONE).abs() <= BREAK_TOLERANCE {
            if let Some(detection) = try_candidate(samples, sample_rate, pos, break_freq) {
                return detection;
            }
        }
        pos += stride;
    }

    if let Some(detection) = detect_by_timing(samples, sample_rate, scan_end) {
        return detection;
    }

    tracing::debug!("no VIS header or sync cadence found, assuming Robot 36");
    VisDetection {
        mode: &ModeSpecification::R36,
        vis_code: None,
        vis_end: 0,
        freq_shift: 0.0,
    }
}

fn try_candidate(
    samples: &[f32],
    sample_rate: u32,
    pos: usize,
    break_freq: f32,
) -> Option<VisDetection> {
    let d = |duration| duration_to_samples(duration, sample_rate);
    let shift = break_freq - SYNC_TONE;

    // Two independent probes into the leader behind the break. A single
    // probe false-triggers on noise and on 1200 Hz bursts inside silence.
    for back in [0.200, 0.100] {
        let probe_pos = pos.checked_sub(d(back))?;
        let freq = detect_frequency(samples, probe_pos, d(LEADER_PROBE), sample_rate);
        if (freq - (LEADER_TONE + shift)).abs() > LEADER_TOLERANCE {
            return None;
        }
    }

    // Establish how far the break tone extends around the candidate.
    let step = d(EXTENT_STEP);
    let max_extent = d(EXTENT_MAX);
    let probe = d(BREAK_PROBE);

    let mut break_start = pos;
    while let Some(before) = break_start.checked_sub(step) {
        if pos - before > max_extent {
            break;
        }
        let freq = detect_frequency(samples, before, probe, sample_rate);
        if (freq - break_freq).abs() > EXTENT_TOLERANCE {
            break;
        }
        break_start = before;
    }

    let mut break_end = pos;
    loop {
        let after = break_end + step;
        if after - pos > max_extent || after + probe > samples.len() {
            break;
        }
        let freq = detect_frequency(samples, after, probe, sample_rate);
        if (freq - break_freq).abs() > EXTENT_TOLERANCE {
            break;
        }
        break_end = after;
    }

    if break_end - break_start < d(MIN_BREAK) {
        return None;
    }

    // A 30 ms tone back at leader frequency is the start bit; some
    // transmitters omit it and go straight into the data bits.
    let bit = d(VIS_BIT_TIME);
    let mut bits_start = break_end;
    let after_break = detect_frequency(samples, bits_start, bit, sample_rate);
    if (after_break - (LEADER_TONE + shift)).abs() <= BREAK_TOLERANCE {
        bits_start += bit;
    }

    // The first data bit must not look like another start bit and must sit
    // in the low VIS band.
    let first = detect_frequency(samples, bits_start, bit, sample_rate);
    if (first - (LEADER_TONE + shift)).abs() <= BREAK_TOLERANCE {
        return None;
    }
    if first < 1000.0 + shift || first > 1500.0 + shift {
        return None;
    }

    // Seven data bits, LSB first, then even parity over the data bits.
    let mut code = 0u8;
    let mut ones = 0u32;
    for index in 0..7 {
        let freq = detect_frequency(samples, bits_start + index * bit, bit, sample_rate);
        if freq < SYNC_TONE + shift {
            code |= 1 << index;
            ones += 1;
        }
    }
    let parity_freq = detect_frequency(samples, bits_start + 7 * bit, bit, sample_rate);
    let parity = parity_freq < SYNC_TONE + shift;
    if parity != (ones % 2 == 1) {
        tracing::debug!(code, pos, "VIS parity mismatch, continuing scan");
        return None;
    }

    // Data bits, parity and stop bit make nine bit periods to the end of
    // the header.
    let nominal_end = bits_start + 9 * bit;
    let vis_end = refine_vis_end(samples, sample_rate, nominal_end, shift);

    let Some(mode) = modes::from_vis_code(code) else {
        tracing::debug!(code, pos, "valid parity but unknown VIS code, continuing scan");
        return None;
    };

    tracing::debug!(mode = %mode.name, code, shift, vis_end, "VIS header decoded");
    Some(VisDetection {
        mode,
        vis_code: Some(code),
        vis_end,
        freq_shift: shift,
    })
}

/// Searches ±60 ms around the nominal header end for the first line's porch
/// tone; a hit pins the header end to 9 ms (one sync pulse) before it. The
/// nominal position stands when no clean porch shows up.
fn refine_vis_end(samples: &[f32], sample_rate: u32, nominal: usize, shift: f32) -> usize {
    let d = |duration| duration_to_samples(duration, sample_rate);
    let span = d(0.060);
    let step = d(0.002).max(1);
    let probe = d(0.003);

    let mut p = nominal.saturating_sub(span);
    while p <= nominal + span {
        if p + probe <= samples.len() {
            let freq = detect_frequency_range(samples, p, probe, sample_rate);
            if (freq - (PORCH_TONE + shift)).abs() < 60.0 {
                return p.saturating_sub(d(9e-3));
            }
        }
        p += step;
    }
    nominal
}

const TIMING_LEADER_TOLERANCE: f32 = 100.0;
const TIMING_PERIOD_TOLERANCE: f32 = 0.10;

/// Header-less fallback: find a sustained leader, skip the region where the
/// VIS bits would be, then measure the cadence of the line sync pulses and
/// match it against the known modes.
fn detect_by_timing(samples: &[f32], sample_rate: u32, scan_end: usize) -> Option<VisDetection> {
    let d = |duration| duration_to_samples(duration, sample_rate);
    let probe = d(LEADER_PROBE);
    let step = d(0.010);

    let mut run_start = None;
    let mut leader_end = None;
    let mut pos = 0;
    while pos + probe <= scan_end {
        let freq = detect_frequency(samples, pos, probe, sample_rate);
        if (freq - LEADER_TONE).abs() <= TIMING_LEADER_TOLERANCE {
            run_start.get_or_insert(pos);
        }
        else {
            if let Some(start) = run_start.take() {
                if pos - start >= d(0.200) {
                    leader_end = Some(pos);
                    break;
                }
            }
        }
        pos += step;
    }
    let leader_end = leader_end?;

    let mut syncs = Vec::new();
    let mut from = leader_end + d(0.500);
    while syncs.len() < 3 {
        let until = (from + d(1.0)).min(samples.len());
        let Some(found) = find_sync_pulse(samples, sample_rate, from, until, 5e-3, 0.0) else {
            break;
        };
        syncs.push(found);
        from = found + d(0.050);
    }
    if syncs.len() < 2 {
        return None;
    }

    let period =
        (syncs[syncs.len() - 1] - syncs[0]) as f32 / (syncs.len() - 1) as f32 / sample_rate as f32;
    for mode in &modes::ALL {
        let expected = mode.line_period();
        if (period - expected).abs() <= expected * TIMING_PERIOD_TOLERANCE {
            tracing::debug!(mode = %mode.name, period, "mode matched by sync timing");
            return Some(VisDetection {
                mode,
                vis_code: None,
                vis_end: syncs[0],
                freq_shift: 0.0,
            });
        }
    }
    None
}
