//! End-to-end encode/decode scenarios.

use image::{
    Rgba,
    RgbaImage,
};

use crate::{
    DecodeResult,
    SstvDecoder,
    SstvEncoder,
    decoder::sync::find_sync_pulse,
    encoder::vis_samples,
    goertzel::detect_frequency_range,
    modes::ModeSpecification,
    quality::Verdict,
    synth::ToneGenerator,
    util::unlerp,
    wave,
};

const SAMPLE_RATE: u32 = 48000;

fn uniform_frame(width: u32, height: u32, rgb: [u8; 3]) -> RgbaImage {
    RgbaImage::from_pixel(width, height, Rgba([rgb[0], rgb[1], rgb[2], 255]))
}

/// Top-left, top-right, bottom-left, bottom-right.
fn quadrant_frame(width: u32, height: u32, colors: [[u8; 3]; 4]) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        let index = (y >= height / 2) as usize * 2 + (x >= width / 2) as usize;
        let [r, g, b] = colors[index];
        Rgba([r, g, b, 255])
    })
}

fn decode(samples: &[f32]) -> DecodeResult {
    SstvDecoder::new(samples, SAMPLE_RATE)
        .decode()
        .expect("decode failed")
}

fn assert_opaque(image: &RgbaImage) {
    assert!(image.pixels().all(|pixel| pixel.0[3] == 255));
}

fn rgb_at(image: &RgbaImage, x: u32, y: u32) -> [u8; 3] {
    let Rgba([r, g, b, _]) = *image.get_pixel(x, y);
    [r, g, b]
}

#[test]
fn full_range_mapping_round_trips() {
    // Every pixel value survives the trip through its tone and back within
    // one level at 48 kHz.
    for v in 0u32..=255 {
        let tone = 1500.0 + v as f32 / 255.0 * 800.0;
        let mut generator = ToneGenerator::new(SAMPLE_RATE);
        generator.add_tone(tone, 0.010);
        let samples = generator.finish();

        let detected = detect_frequency_range(&samples, 0, samples.len(), SAMPLE_RATE);
        let decoded = (unlerp(detected, 1500.0, 2300.0) * 255.0).round();
        assert!(
            (decoded - v as f32).abs() <= 1.0,
            "value {v} came back as {decoded}"
        );
    }
}

#[test]
fn gray_robot36_round_trip() {
    let frame = uniform_frame(320, 240, [128, 128, 128]);
    let wav = SstvEncoder::new(SAMPLE_RATE)
        .encode_to_wav(&frame, &ModeSpecification::R36)
        .unwrap();
    let (samples, sample_rate) = wave::read_samples(&wav).unwrap();
    assert_eq!(sample_rate, SAMPLE_RATE);

    let result = decode(&samples);
    let d = &result.diagnostics;
    assert_eq!(d.mode_name, "Robot 36");
    assert_eq!(d.vis_code, Some(0x08));
    assert_eq!(d.lines_decoded, 240);
    assert!(d.warnings.is_empty());
    assert_opaque(&result.image);

    let q = &d.quality;
    for mean in [q.r_avg, q.g_avg, q.b_avg] {
        assert!((115.0..=140.0).contains(&mean), "channel mean {mean}");
    }
    // The green-tint regression: full-range chroma on both ends keeps the
    // channels together.
    assert!((q.g_avg - q.r_avg).abs() + (q.g_avg - q.b_avg).abs() < 20.0);
    let imbalance = q.r_avg.max(q.g_avg).max(q.b_avg) - q.r_avg.min(q.g_avg).min(q.b_avg);
    assert!(imbalance < 20.0, "imbalance {imbalance}");
    assert_eq!(q.verdict, Verdict::Good);
}

fn assert_robot36_quadrants(result: &DecodeResult) {
    let image = &result.image;
    assert_opaque(image);

    let [r, g, b] = rgb_at(image, 80, 60);
    assert!(r > 200 && g < 50 && b < 50, "red quadrant: {r} {g} {b}");

    let [r, g, b] = rgb_at(image, 240, 60);
    assert!(g > 150 && r < 180 && b < 50, "green quadrant: {r} {g} {b}");

    let [r, g, b] = rgb_at(image, 80, 180);
    assert!(b > 200 && r < 50 && g < 50, "blue quadrant: {r} {g} {b}");

    let [r, g, b] = rgb_at(image, 240, 180);
    assert!(
        r > 200 && g > 200 && b > 200,
        "white quadrant: {r} {g} {b}"
    );
}

fn robot36_quadrant_signal() -> Vec<f32> {
    let frame = quadrant_frame(
        320,
        240,
        [[255, 0, 0], [0, 255, 0], [0, 0, 255], [255, 255, 255]],
    );
    SstvEncoder::new(SAMPLE_RATE)
        .encode(&frame, &ModeSpecification::R36)
        .unwrap()
}

#[test]
fn primary_quadrants_robot36() {
    let samples = robot36_quadrant_signal();
    let result = decode(&samples);
    assert_eq!(result.diagnostics.vis_code, Some(0x08));
    assert_robot36_quadrants(&result);
}

#[test]
fn pd120_round_trip() {
    let frame = quadrant_frame(
        640,
        496,
        [[255, 0, 0], [0, 0, 255], [128, 128, 128], [128, 128, 128]],
    );
    let samples = SstvEncoder::new(SAMPLE_RATE)
        .encode(&frame, &ModeSpecification::PD120)
        .unwrap();
    let result = decode(&samples);

    assert_eq!(result.diagnostics.mode_name, "PD 120");
    assert_eq!(result.diagnostics.vis_code, Some(0x5d));
    assert_opaque(&result.image);

    let [r, g, b] = rgb_at(&result.image, 160, 124);
    assert!(r > 150 && g < 80 && b < 50, "red sample: {r} {g} {b}");

    let [r, g, b] = rgb_at(&result.image, 480, 124);
    assert!(b > 120 && r < 50 && g < 60, "blue sample: {r} {g} {b}");

    let [r, g, b] = rgb_at(&result.image, 160, 372);
    let imbalance = r.max(g).max(b) - r.min(g).min(b);
    assert!(
        (100..=155).contains(&r) && imbalance < 40,
        "gray sample: {r} {g} {b}"
    );
}

#[test]
fn late_vis_decodes_identically() {
    let samples = robot36_quadrant_signal();
    let mut delayed = vec![0.0f32; 10 * SAMPLE_RATE as usize];
    delayed.extend_from_slice(&samples);

    let reference = decode(&samples);
    let late = decode(&delayed);

    assert_eq!(late.diagnostics.vis_code, Some(0x08));
    assert_eq!(
        late.diagnostics.first_sync,
        reference.diagnostics.first_sync + 10 * SAMPLE_RATE as usize
    );
    // Same transmission, same pixels; only the position moved.
    assert_eq!(reference.image, late.image);
}

#[test]
fn frequency_offset_is_tracked() {
    let frame = quadrant_frame(
        320,
        240,
        [[255, 0, 0], [0, 255, 0], [0, 0, 255], [255, 255, 255]],
    );
    let samples = SstvEncoder::new(SAMPLE_RATE)
        .with_frequency_offset(-129.0)
        .encode(&frame, &ModeSpecification::R36)
        .unwrap();
    let result = decode(&samples);

    let d = &result.diagnostics;
    assert_eq!(d.vis_code, Some(0x08));
    assert!(
        (-140.0..=-115.0).contains(&d.freq_offset),
        "offset {}",
        d.freq_offset
    );
    assert!(d.auto_calibrated);
    assert_robot36_quadrants(&result);
}

#[test]
fn glitched_leader_is_ignored() {
    // A long leader with a 1200 Hz burst in the middle. The burst looks
    // like a VIS break but fails the break-extent check; the real header
    // follows.
    let mut generator = ToneGenerator::new(SAMPLE_RATE);
    generator.add_tone(1900.0, 0.296);
    generator.add_tone(1200.0, 0.008);
    generator.add_tone(1900.0, 0.296);
    let mut samples = generator.finish();
    samples.extend_from_slice(&robot36_quadrant_signal());

    let result = decode(&samples);
    assert_eq!(result.diagnostics.vis_code, Some(0x08));
    assert_robot36_quadrants(&result);
}

#[test]
fn sync_follows_the_stop_bit() {
    let frame = uniform_frame(320, 240, [128, 128, 128]);
    let mode = ModeSpecification::R36;
    let samples = SstvEncoder::new(SAMPLE_RATE).encode(&frame, &mode).unwrap();

    // Immediately after the stop bit comes the first line's sync pulse.
    let vis_end = vis_samples(SAMPLE_RATE);
    let found = find_sync_pulse(
        &samples,
        SAMPLE_RATE,
        vis_end,
        vis_end + mode.line_samples(SAMPLE_RATE),
        mode.sync_time,
        0.0,
    );
    assert_eq!(found, Some(vis_end));
}

#[test]
fn gray_martin_round_trip() {
    let frame = uniform_frame(320, 256, [128, 128, 128]);
    let samples = SstvEncoder::new(SAMPLE_RATE)
        .encode(&frame, &ModeSpecification::M1)
        .unwrap();
    let result = decode(&samples);

    let d = &result.diagnostics;
    assert_eq!(d.mode_name, "Martin M1");
    assert_eq!(d.vis_code, Some(0x2c));
    assert_opaque(&result.image);

    let q = &d.quality;
    for mean in [q.r_avg, q.g_avg, q.b_avg] {
        assert!((112.0..=140.0).contains(&mean), "channel mean {mean}");
    }
    assert_eq!(q.verdict, Verdict::Good);
}

#[test]
fn vis_round_trip() {
    for mode in [
        &ModeSpecification::R36,
        &ModeSpecification::M1,
        &ModeSpecification::S1,
    ] {
        let frame = uniform_frame(mode.pixels_per_line, mode.num_lines, [128, 128, 128]);
        let samples = SstvEncoder::new(SAMPLE_RATE).encode(&frame, mode).unwrap();
        let detection = SstvDecoder::new(&samples, SAMPLE_RATE).detect_mode();
        assert_eq!(detection.vis_code, Some(mode.vis_code), "{}", mode.name);
        assert_eq!(detection.mode.vis_code, mode.vis_code, "{}", mode.name);
        assert!(
            detection.freq_shift.abs() < 20.0,
            "{}: shift {}",
            mode.name,
            detection.freq_shift
        );
    }
}

#[test]
fn truncated_transmission_degrades_to_partial_frame() {
    let frame = uniform_frame(320, 240, [128, 128, 128]);
    let samples = SstvEncoder::new(SAMPLE_RATE)
        .encode(&frame, &ModeSpecification::R36)
        .unwrap();
    let half = &samples[..samples.len() / 2];

    let result = SstvDecoder::new(half, SAMPLE_RATE).decode().unwrap();
    let d = &result.diagnostics;
    assert!(d.lines_decoded < 240 && d.lines_decoded > 100);
    assert_eq!(d.warnings.len(), 1);
    assert!(d.warnings[0].contains("Transmission ends"));

    // Undelivered lines keep the opaque black prefill.
    assert_eq!(rgb_at(&result.image, 160, 239), [0, 0, 0]);
    assert_opaque(&result.image);
}
