// Copyright (C) 2022 Christoph Reichenbach (creichen@gmail.com)
// Licenced under the GNU General Public Licence, v3.  Please refer to the file "COPYING" for details.

//! Window functions
//!
//! Windows are evaluated in floating point, converted to Q format and then multiplied
//! into the signal.  All windows peak at (or just below) 1.

use std::f64::consts::PI;

use crate::dsp::qformat::Q;
use crate::dsp::operators;
use crate::error::{DspError, Result};

pub const DEFAULT_GAUSS_TETA : f64 = 0.4;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Window {
    Rectangular,
    Bartlett,
    Blackman,
    Hamming,
    /// Gaussian window with standard deviation `teta * (N - 1) / 2`, `teta` in (0, 0.5]
    Gauss { teta : f64 },
    Hann,
    /// Kaiser window with shape parameter `alpha` (beta = pi * alpha)
    Kaiser { alpha : f64 },
    Welch,
}

impl Default for Window {
    fn default() -> Window {
	return Window::Hann;
    }
}

/// Zeroth-order modified Bessel function of the first kind
fn bessel_i0(x : f64) -> f64 {
    let half = x / 2.0;
    let mut term = 1.0;
    let mut sum = 1.0;
    for k in 1..64 {
	term *= half / k as f64;
	sum += term * term;
	if term * term < sum * 1e-17 {
	    break;
	}
    }
    return sum;
}

impl Window {
    pub fn gauss() -> Window {
	return Window::Gauss { teta : DEFAULT_GAUSS_TETA };
    }

    pub fn validate(&self) -> Result<()> {
	match self {
	    Window::Gauss { teta } if !(*teta > 0.0 && *teta <= 0.5) =>
		return Err(DspError::config(format!("Gauss window teta {teta} outside (0, 0.5]"))),
	    Window::Kaiser { alpha } if !(*alpha >= 0.0) =>
		return Err(DspError::config(format!("Kaiser window alpha {alpha} must not be negative"))),
	    _ => return Ok(()),
	}
    }

    /// Window amplitude at position `i` of `size`
    pub fn value(&self, i : usize, size : usize) -> f64 {
	if size <= 1 {
	    return 1.0;
	}
	let m = (size - 1) as f64;
	let r = i as f64 / m;            // 0 ..= 1
	let c = 2.0 * r - 1.0;           // -1 ..= 1
	match *self {
	    Window::Rectangular        => 1.0,
	    Window::Bartlett           => 1.0 - c.abs(),
	    Window::Blackman           => 0.42 - 0.5 * (2.0 * PI * r).cos() + 0.08 * (4.0 * PI * r).cos(),
	    Window::Hamming            => 0.54 - 0.46 * (2.0 * PI * r).cos(),
	    Window::Gauss { teta }     => (-0.5 * (c / teta) * (c / teta)).exp(),
	    Window::Hann               => 0.5 * (1.0 - (2.0 * PI * r).cos()),
	    Window::Kaiser { alpha }   => bessel_i0(PI * alpha * (1.0 - c * c).max(0.0).sqrt()) / bessel_i0(PI * alpha),
	    Window::Welch              => 1.0 - c * c,
	}
    }

    /// The bare window of `size` samples
    pub fn generate<T : Q>(&self, size : usize) -> Result<Vec<T>> {
	self.validate()?;
	return Ok((0..size).map(|i| T::from_f64(self.value(i, size))).collect());
    }

    /// `out[i] = input[i] * w(i)`
    pub fn apply<T : Q>(&self, out : &mut [T], input : &[T]) -> Result<()> {
	assert_eq!(out.len(), input.len(), "window: output and input lengths differ");
	let w = self.generate::<T>(input.len())?;
	for ((o, x), c) in out.iter_mut().zip(input).zip(w) {
	    *o = operators::mul(*x, c);
	}
	return Ok(());
    }

    /// Applies the window in place
    pub fn apply_in_place<T : Q>(&self, v : &mut [T]) -> Result<()> {
	let w = self.generate::<T>(v.len())?;
	for (x, c) in v.iter_mut().zip(w) {
	    *x = operators::mul(*x, c);
	}
	return Ok(());
    }
}

#[cfg(test)]
use crate::dsp::qformat::{q16, Dsp16, Dsp32};

#[cfg(test)]
#[test]
fn test_window_shapes() {
    let n = 65;
    for w in [Window::Bartlett, Window::Blackman, Window::Hamming, Window::gauss(),
	      Window::Hann, Window::Kaiser { alpha : 3.0 }, Window::Welch] {
	let v : Vec<Dsp16> = w.generate(n).unwrap();
	// symmetric, peak in the middle
	for i in 0..n / 2 {
	    assert!((v[i] - v[n - 1 - i]).abs() <= 1, "{:?} at {i}", w);
	    assert!(v[i] <= v[n / 2]);
	}
	assert!(v[n / 2] >= q16(0.999), "{:?}", w);
    }
    assert!(Window::Hann.value(0, n).abs() < 1e-12);
    assert!((Window::Hamming.value(0, n) - 0.08).abs() < 1e-12);
    assert!((Window::Blackman.value(0, n)).abs() < 1e-12);
    assert!(Window::Welch.value(0, n).abs() < 1e-12);
    assert!((Window::gauss().value(0, n) - (-0.5f64 / 0.16).exp()).abs() < 1e-12);
}

#[cfg(test)]
#[test]
fn test_kaiser_alpha_zero_is_rectangular() {
    let v : Vec<Dsp32> = Window::Kaiser { alpha : 0.0 }.generate(16).unwrap();
    assert!(v.iter().all(|x| *x == i32::MAX));
}

#[cfg(test)]
#[test]
fn test_apply() {
    let input = [q16(0.5); 5];
    let mut out = [0; 5];
    Window::Bartlett.apply(&mut out, &input).unwrap();
    assert_eq!([0, q16(0.25), q16(0.5) - 1, q16(0.25), 0], out);
    Window::Rectangular.apply(&mut out, &input).unwrap();
    assert_eq!([q16(0.5) - 1; 5], out);

    let mut v = input;
    Window::Hann.apply_in_place(&mut v).unwrap();
    assert_eq!(0, v[0]);
}

#[cfg(test)]
#[test]
fn test_invalid_gauss() {
    assert!(Window::Gauss { teta : 0.0 }.generate::<Dsp16>(8).is_err());
    assert!(Window::Gauss { teta : 0.7 }.generate::<Dsp16>(8).is_err());
    assert!(Window::Kaiser { alpha : -1.0 }.validate().is_err());
}
