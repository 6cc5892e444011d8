// Copyright (C) 2022 Christoph Reichenbach (creichen@gmail.com)
// Licenced under the GNU General Public Licence, v3.  Please refer to the file "COPYING" for details.

//! Fixed-point digital signal processing
//!
//! Q1.15 (`Dsp16`) and Q1.31 (`Dsp32`) arithmetic, vectors, filters, FFTs, windows,
//! signal generators, sample-rate conversion, IMA ADPCM and an MFCC front end.

#[macro_use(lazy_static)]
extern crate lazy_static;

pub mod util;
pub mod error;
pub mod dsp;

pub use error::{DspError, Result};
pub use dsp::qformat::{Q, Dsp16, Dsp32, Complex};
