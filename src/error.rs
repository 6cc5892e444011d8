// Copyright (C) 2022 Christoph Reichenbach (creichen@gmail.com)
// Licenced under the GNU General Public Licence, v3.  Please refer to the file "COPYING" for details.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DspError {
    #[error("unsupported FFT size: 2^{nlog} (need an even exponent in 2..={max})")]
    FftSize { nlog : u32, max : u32 },

    #[error("unsupported resampling ratio: {fs_in} Hz -> {fs_out} Hz")]
    ResamplingRatio { fs_in : u32, fs_out : u32 },

    #[error("cannot link resamplers: {message}")]
    ResamplingLink { message : String },

    #[error("invalid filter design: {message}")]
    FilterDesign { message : String },

    #[error("invalid configuration: {message}")]
    Config { message : String },

    #[error("malformed ADPCM data: {message}")]
    Adpcm { message : String },

    #[error("unsupported WAV file: {message}")]
    WavFormat { message : String },

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DspError>;

impl DspError {
    pub fn config(message : impl Into<String>) -> DspError {
	return DspError::Config { message : message.into() };
    }
}
