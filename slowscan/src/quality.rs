//! Decode quality heuristics.
//!
//! A handful of whole-image statistics catch the common failure shapes:
//! no sync lock (black frame), full-range/video-range mismatch (green
//! cast), frequency offset and chroma misalignment (channel imbalance).

use image::RgbaImage;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Good,
    Warn,
    Bad,
}

#[derive(Clone, Debug)]
pub struct QualityReport {
    pub r_avg: f32,
    pub g_avg: f32,
    pub b_avg: f32,
    pub brightness: f32,
    pub verdict: Verdict,
    pub warnings: Vec<String>,
}

pub fn analyze(image: &RgbaImage) -> QualityReport {
    let mut sums = [0.0f64; 3];
    for pixel in image.pixels() {
        sums[0] += pixel.0[0] as f64;
        sums[1] += pixel.0[1] as f64;
        sums[2] += pixel.0[2] as f64;
    }
    let count = (image.width() as f64 * image.height() as f64).max(1.0);
    let r_avg = (sums[0] / count) as f32;
    let g_avg = (sums[1] / count) as f32;
    let b_avg = (sums[2] / count) as f32;
    let brightness = (r_avg + g_avg + b_avg) / 3.0;

    let green_dominance = g_avg - (r_avg + b_avg) / 2.0;
    let imbalance =
        r_avg.max(g_avg).max(b_avg) - r_avg.min(g_avg).min(b_avg);

    let mut warnings = Vec::new();
    let verdict = if brightness < 10.0 {
        warnings.push("Image is almost entirely black, likely a sync or timing issue".to_owned());
        Verdict::Bad
    }
    else if green_dominance > 40.0 {
        warnings.push(format!(
            "Heavy green tint (G dominates by {green_dominance:.0}), likely a chroma decode error"
        ));
        Verdict::Bad
    }
    else if imbalance > 80.0 && brightness < 40.0 {
        warnings.push("Unusual color balance, possible frequency offset".to_owned());
        Verdict::Warn
    }
    else if imbalance > 120.0 {
        warnings.push("High color imbalance, possible chroma misalignment".to_owned());
        Verdict::Warn
    }
    else {
        Verdict::Good
    };

    QualityReport {
        r_avg,
        g_avg,
        b_avg,
        brightness,
        verdict,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use image::{
        Rgba,
        RgbaImage,
    };

    use crate::quality::{
        Verdict,
        analyze,
    };

    fn uniform(rgb: [u8; 3]) -> RgbaImage {
        RgbaImage::from_pixel(16, 16, Rgba([rgb[0], rgb[1], rgb[2], 255]))
    }

    #[test]
    fn black_frame_is_bad() {
        let report = analyze(&uniform([2, 2, 2]));
        assert_eq!(report.verdict, Verdict::Bad);
        assert!(report.warnings[0].contains("black"));
    }

    #[test]
    fn green_cast_is_bad() {
        let report = analyze(&uniform([60, 180, 60]));
        assert_eq!(report.verdict, Verdict::Bad);
        assert!(report.warnings[0].contains("green"));
    }

    #[test]
    fn dim_imbalance_warns() {
        let report = analyze(&uniform([100, 10, 5]));
        assert_eq!(report.verdict, Verdict::Warn);
    }

    #[test]
    fn strong_imbalance_warns() {
        let report = analyze(&uniform([250, 120, 110]));
        assert_eq!(report.verdict, Verdict::Warn);
    }

    #[test]
    fn gray_frame_is_good() {
        let report = analyze(&uniform([128, 128, 128]));
        assert_eq!(report.verdict, Verdict::Good);
        assert!(report.warnings.is_empty());
        assert!((report.brightness - 128.0).abs() < 0.5);
    }
}
