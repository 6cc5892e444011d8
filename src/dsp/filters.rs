// Copyright (C) 2022 Christoph Reichenbach (creichen@gmail.com)
// Licenced under the GNU General Public Licence, v3.  Please refer to the file "COPYING" for details.

//! Filters: FIR, IIR, adaptive (N)LMS, polyphase interpolation, low-pass FIR design

use crate::dsp::qformat::Q;
use crate::dsp::vectors;

pub mod iir;
pub mod lms;
pub mod interpolation;
pub mod design;

pub use iir::{Iir, iirpart};
pub use lms::{Lms, Nlms};
pub use interpolation::{interpolation_coefsort, interpolation};
pub use design::{lpfirdesign, lpfirdesign_windowed_sinc};

/// FIR filter over a block: `out.len()` must be `x.len() - h.len() + 1`
///
/// The first `h.len() - 1` samples of `x` are history for the first output.
pub fn fir<T : Q>(out : &mut [T], x : &[T], h : &[T]) {
    vectors::convpart(out, x, h);
}

#[cfg(test)]
use crate::dsp::qformat::q16;

#[cfg(test)]
#[test]
fn test_fir_impulse_response() {
    let h = [q16(0.1), q16(0.2), q16(0.3), q16(0.4)];
    let mut x = [0i16; 10];
    x[3] = i16::MAX;
    let mut out = [0; 7];
    fir(&mut out, &x, &h);
    for k in 0..4 {
	assert!((out[k] - h[k]).abs() <= 1, "{:?}", out);
    }
    assert_eq!([0, 0, 0], out[4..]);
}

#[cfg(test)]
#[test]
fn test_fir_moving_average() {
    let h = [q16(0.25); 4];
    let x = [q16(0.5); 8];
    let mut out = [0; 5];
    fir(&mut out, &x, &h);
    assert_eq!([q16(0.5); 5], out);
}
