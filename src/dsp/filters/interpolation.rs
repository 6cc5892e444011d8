// Copyright (C) 2022 Christoph Reichenbach (creichen@gmail.com)
// Licenced under the GNU General Public Licence, v3.  Please refer to the file "COPYING" for details.

//! Polyphase interpolation
//!
//! A prototype low-pass filter of `n_tap * ratio` coefficients is split into `ratio`
//! sub-filters of `n_tap` coefficients each; sub-filter `k` produces output phase `k`.

use crate::dsp::qformat::Q;

/// Reorders prototype coefficients in place so that `h[k * n_tap + i] = old[i * ratio + k]`
pub fn interpolation_coefsort<T : Q>(h : &mut [T], n_tap : usize, ratio : usize) {
    assert_eq!(h.len(), n_tap * ratio, "interpolation_coefsort: need n_tap * ratio coefficients");
    let old = h.to_vec();
    for k in 0..ratio {
	for i in 0..n_tap {
	    h[k * n_tap + i] = old[i * ratio + k];
	}
    }
}

/// Interpolates `x` by `ratio` with coefficients sorted by [`interpolation_coefsort`]
///
/// `out.len()` must be `x.len() * ratio`; samples before `x[0]` count as zero.
pub fn interpolation<T : Q>(out : &mut [T], x : &[T], h : &[T], ratio : usize) {
    assert!(ratio > 0 && h.len() % ratio == 0,
	    "interpolation: {} coefficients do not split into {} phases", h.len(), ratio);
    assert_eq!(out.len(), x.len() * ratio, "interpolation: output must be input length times ratio");
    let n_tap = h.len() / ratio;
    for n in 0..x.len() {
	let taps = usize::min(n_tap, n + 1);
	for k in 0..ratio {
	    let phase = &h[k * n_tap..(k + 1) * n_tap];
	    let mut acc : i64 = 0;
	    for i in 0..taps {
		acc = acc.wrapping_add(phase[i].to_i64() * x[n - i].to_i64());
	    }
	    out[n * ratio + k] = T::wrap(acc >> T::QB);
	}
    }
}

#[cfg(test)]
use crate::dsp::qformat::{q16, Dsp16};

#[cfg(test)]
#[test]
fn test_coefsort() {
    let mut h : Vec<Dsp16> = (0..6).collect();
    interpolation_coefsort(&mut h, 3, 2);
    assert_eq!(vec![0, 2, 4, 1, 3, 5], h);
}

#[cfg(test)]
#[test]
fn test_interpolation_zero_order_hold() {
    // every phase passes the current sample through: sample-and-hold
    let mut h = vec![q16(0.5), q16(0.5), q16(0.5), 0, 0, 0];
    interpolation_coefsort(&mut h, 2, 3);
    assert_eq!(vec![q16(0.5), 0, q16(0.5), 0, q16(0.5), 0], h);
    let x = [q16(0.5), q16(-0.25)];
    let mut out = [0; 6];
    interpolation(&mut out, &x, &h, 3);
    assert_eq!([q16(0.25), q16(0.25), q16(0.25), q16(-0.125), q16(-0.125), q16(-0.125)], out);
}

#[cfg(test)]
#[test]
fn test_interpolation_linear() {
    // triangular prototype [0.5, 1, 0.5] scaled by 1/2, ratio 2
    let mut h = vec![0, q16(0.25), q16(0.5), q16(0.25)];
    interpolation_coefsort(&mut h, 2, 2);
    let x = [q16(0.5), q16(0.5), q16(0.5)];
    let mut out = [0; 6];
    interpolation(&mut out, &x, &h, 2);
    assert_eq!(0, out[0]);
    assert_eq!(q16(0.25), out[2]);
    assert_eq!(q16(0.25), out[3]);
    assert_eq!(q16(0.25), out[5]);
}
