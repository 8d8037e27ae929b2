pub mod args;

use clap::Parser;
use color_eyre::eyre::{
    Error,
    bail,
};
use image::ImageReader;
use slowscan::{
    SstvDecoder,
    SstvEncoder,
    modes,
    wave,
};
use tracing_subscriber::EnvFilter;

use crate::args::{
    Args,
    Command,
};

fn main() -> Result<(), Error> {
    let _ = dotenvy::dotenv();
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    tracing::debug!(?args);

    match args.command {
        Command::Encode {
            image,
            output,
            mode,
            sample_rate,
            frequency_offset,
        } => {
            let mode = modes::from_key(&mode)?;
            let frame = ImageReader::open(&image)?.decode()?.into_rgba8();
            if frame.width() != mode.pixels_per_line || frame.height() != mode.num_lines {
                bail!(
                    "{} transmits {}x{}, but {} is {}x{}; resize the image first",
                    mode.name,
                    mode.pixels_per_line,
                    mode.num_lines,
                    image.display(),
                    frame.width(),
                    frame.height()
                );
            }

            let samples = SstvEncoder::new(sample_rate)
                .with_frequency_offset(frequency_offset)
                .encode(&frame, mode)?;
            wave::write_samples_to(&output, &samples, sample_rate)?;

            println!(
                "{}: {:.1} s of {} audio -> {}",
                mode.name,
                samples.len() as f32 / sample_rate as f32,
                mode.short_name,
                output.display()
            );
        }
        Command::Decode {
            input,
            output,
            no_auto_calibrate,
        } => {
            let (samples, sample_rate) = wave::read_samples_from(&input)?;
            let result = SstvDecoder::new(&samples, sample_rate)
                .auto_calibrate(!no_auto_calibrate)
                .decode()?;
            result.image.save(&output)?;

            let d = &result.diagnostics;
            let vis = d
                .vis_code
                .map(|code| format!("{code:#04x}"))
                .unwrap_or_else(|| "none".to_owned());
            println!("mode:         {} (VIS {vis})", d.mode_name);
            println!("sample rate:  {} Hz", d.sample_rate);
            println!("duration:     {:.2} s", d.duration);
            println!(
                "freq offset:  {:+.1} Hz{}",
                d.freq_offset,
                if d.auto_calibrated {
                    " (auto-calibrated)"
                }
                else {
                    ""
                }
            );
            println!("first sync:   sample {}", d.first_sync);
            println!("lines:        {}/{}", d.lines_decoded, result.image.height());
            println!("decode time:  {:.2?}", d.decode_time);
            println!(
                "quality:      {:?} (R {:.1}, G {:.1}, B {:.1}, brightness {:.1})",
                d.quality.verdict, d.quality.r_avg, d.quality.g_avg, d.quality.b_avg,
                d.quality.brightness
            );
            for warning in d.warnings.iter().chain(&d.quality.warnings) {
                println!("warning:      {warning}");
            }
            println!("saved {}", output.display());
        }
    }

    Ok(())
}
