// Copyright (C) 2022 Christoph Reichenbach (creichen@gmail.com)
// Licenced under the GNU General Public Licence, v3.  Please refer to the file "COPYING" for details.

use std::path::PathBuf;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Sample rate for generated signals
    #[arg(short, long, default_value_t = 8000)]
    pub rate: u32,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
pub enum Waveform {
    Sine,
    Cosine,
    Square,
    Saw,
    Comb,
    Noise,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
pub enum FilterKind {
    /// Windowed-sinc FIR
    Fir,
    /// First-order IIR low-pass
    Iir,
}

#[derive(Subcommand, Clone)]
pub enum Command {
    /// Synthesize a signal into a 16-bit PCM WAV file
    Gen {
	output: PathBuf,
	#[arg(short, long, value_enum, default_value_t = Waveform::Sine)]
	waveform: Waveform,
	/// Frequency in Hz
	#[arg(short, long, default_value_t = 440)]
	frequency: u32,
	/// Peak amplitude in [0, 1)
	#[arg(short, long, default_value_t = 0.5)]
	amplitude: f64,
	/// Duration in milliseconds
	#[arg(short, long, default_value_t = 1000)]
	duration: u32,
    },
    /// Low-pass filter a WAV file
    Filter {
	input: PathBuf,
	output: PathBuf,
	/// Cut-off frequency in Hz
	#[arg(short, long, default_value_t = 1000)]
	cutoff: u32,
	#[arg(short, long, value_enum, default_value_t = FilterKind::Fir)]
	kind: FilterKind,
	/// FIR taps
	#[arg(short, long, default_value_t = 31)]
	taps: usize,
    },
    /// Print the spectrum of a WAV file (or of a generated tone)
    Fft {
	input: Option<PathBuf>,
	/// Tone frequency when no input file is given
	#[arg(short, long, default_value_t = 1000)]
	frequency: u32,
	/// log2 of the FFT size
	#[arg(short, long, default_value_t = 8)]
	nlog: u32,
	/// Compare against a floating point FFT
	#[arg(long)]
	reference: bool,
    },
    /// Convert the sample rate of a WAV file
    Resample {
	input: PathBuf,
	output: PathBuf,
	/// Output sample rate in Hz
	#[arg(short, long)]
	to: u32,
	/// Filter order (taps per polyphase branch)
	#[arg(short, long, default_value_t = 16)]
	order: usize,
	/// Samples per block
	#[arg(short, long, default_value_t = 240)]
	block: usize,
	/// Compare against a floating point sinc resampler
	#[arg(long)]
	reference: bool,
    },
    /// Identify an unknown FIR system with LMS and NLMS
    Lms {
	/// Filter taps
	#[arg(short, long, default_value_t = 8)]
	taps: usize,
	#[arg(short, long, default_value_t = 4000)]
	iterations: usize,
	#[arg(short, long, default_value_t = 1)]
	seed: u32,
    },
    /// Encode a 16-bit mono WAV file into an ADPCM packet stream
    AdpcmEncode {
	input: PathBuf,
	output: PathBuf,
    },
    /// Decode an ADPCM packet stream into a 16-bit mono WAV file
    AdpcmDecode {
	input: PathBuf,
	output: PathBuf,
	/// Sample rate of the stream
	#[arg(short, long, default_value_t = 8000)]
	rate: u32,
    },
    /// Decode a DVI ADPCM WAV file into 16-bit PCM
    AdpcmWav {
	input: PathBuf,
	output: PathBuf,
    },
    /// Print MFCCs for each frame of a mono WAV file
    Mfcc {
	input: PathBuf,
	#[arg(long, default_value_t = 24)]
	filters: usize,
	#[arg(long, default_value_t = 13)]
	coefficients: usize,
	/// Also print first and second differences
	#[arg(long)]
	deltas: bool,
    },
    /// Interactive fixed-point calculator
    Shell,
}
