use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[clap(about = "Encode images as SSTV audio and decode SSTV recordings")]
pub struct Args {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Encode an image into an SSTV WAV file.
    Encode {
        /// Input image (any format the image crate reads). Must match the
        /// mode's native resolution.
        image: PathBuf,

        /// Output WAV path.
        output: PathBuf,

        /// SSTV mode: robot36, martin1, scottie1 or pd120.
        #[clap(short, long, default_value = "robot36")]
        mode: String,

        #[clap(short, long = "samplerate", default_value = "48000")]
        sample_rate: u32,

        /// Shift every tone by this many Hz, like a mistuned transmitter.
        #[clap(long, default_value = "0")]
        frequency_offset: f32,
    },

    /// Decode an SSTV WAV recording into an image.
    Decode {
        /// Input WAV (mono 16-bit PCM).
        input: PathBuf,

        /// Output image path; the format follows the extension.
        output: PathBuf,

        /// Decode on nominal timing only, without per-line sync tracking
        /// and frequency-offset correction.
        #[clap(long)]
        no_auto_calibrate: bool,
    },
}
