// Copyright (C) 2022 Christoph Reichenbach (creichen@gmail.com)
// Licenced under the GNU General Public Licence, v3.  Please refer to the file "COPYING" for details.

pub mod qformat;
pub mod operators;
pub mod vectors;
pub mod filters;
pub mod transforms;
pub mod windowing;
pub mod generation;
pub mod resampling;
pub mod adpcm;
pub mod mfcc;

pub use resampling::{Resampler, Coefficients, DynamicCoefficients};
pub use mfcc::{Mfcc, MfccConfig};
