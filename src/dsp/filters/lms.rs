// Copyright (C) 2022 Christoph Reichenbach (creichen@gmail.com)
// Licenced under the GNU General Public Licence, v3.  Please refer to the file "COPYING" for details.

//! Adaptive least-mean-square filters
//!
//! Both filters keep the last `size` input samples and `size` weights.  Each `step` feeds
//! one input sample and the matching reference sample, and returns `(y, e)`: the filter
//! output and the error `d - y` that drove the weight update.

use crate::dsp::qformat::Q;

pub const DEFAULT_LMS_MU_SHIFT : u32 = 6;
pub const DEFAULT_NLMS_MU_SHIFT : u32 = 1;

#[derive(Clone, Debug)]
struct History<T : Q> {
    x : Vec<T>,
    head : usize, // position of the most recent sample
}

impl<T : Q> History<T> {
    fn new(size : usize) -> History<T> {
	assert!(size > 0, "adaptive filter needs at least one tap");
	return History { x : vec![T::ZERO; size], head : 0 };
    }

    fn push(&mut self, v : T) {
	self.head = if self.head == 0 { self.x.len() - 1 } else { self.head - 1 };
	self.x[self.head] = v;
    }

    /// x[n - k]
    #[inline]
    fn get(&self, k : usize) -> T {
	let mut i = self.head + k;
	if i >= self.x.len() {
	    i -= self.x.len();
	}
	return self.x[i];
    }

    fn output(&self, w : &[T]) -> T {
	let mut acc : i64 = 0;
	for (k, c) in w.iter().enumerate() {
	    acc = acc.wrapping_add(c.to_i64() * self.get(k).to_i64());
	}
	return T::wrap(acc >> T::QB);
    }
}

// ================================================================================
// LMS

/// LMS filter with step size 2^-mu_shift
#[derive(Clone, Debug)]
pub struct Lms<T : Q> {
    hist : History<T>,
    w : Vec<T>,
    mu_shift : u32,
}

impl<T : Q> Lms<T> {
    pub fn new(size : usize) -> Lms<T> {
	return Lms::with_mu_shift(size, DEFAULT_LMS_MU_SHIFT);
    }

    pub fn with_mu_shift(size : usize, mu_shift : u32) -> Lms<T> {
	return Lms {
	    hist : History::new(size),
	    w : vec![T::ZERO; size],
	    mu_shift,
	};
    }

    pub fn weights(&self) -> &[T] {
	return &self.w;
    }

    pub fn step(&mut self, new_x : T, d : T) -> (T, T) {
	self.hist.push(new_x);
	let y = self.hist.output(&self.w);
	let e = T::saturate(d.to_i64() - y.to_i64());
	let shift = T::QB + self.mu_shift;
	for k in 0..self.w.len() {
	    let delta = (e.to_i64() * self.hist.get(k).to_i64()) >> shift;
	    self.w[k] = T::saturate(self.w[k].to_i64() + delta);
	}
	return (y, e);
    }
}

// ================================================================================
// NLMS

/// LMS filter with the step size normalised by the input power
#[derive(Clone, Debug)]
pub struct Nlms<T : Q> {
    hist : History<T>,
    w : Vec<T>,
    mu_shift : u32,
}

impl<T : Q> Nlms<T> {
    pub fn new(size : usize) -> Nlms<T> {
	return Nlms::with_mu_shift(size, DEFAULT_NLMS_MU_SHIFT);
    }

    pub fn with_mu_shift(size : usize, mu_shift : u32) -> Nlms<T> {
	return Nlms {
	    hist : History::new(size),
	    w : vec![T::ZERO; size],
	    mu_shift,
	};
    }

    pub fn weights(&self) -> &[T] {
	return &self.w;
    }

    pub fn step(&mut self, new_x : T, d : T) -> (T, T) {
	self.hist.push(new_x);
	let y = self.hist.output(&self.w);
	let e = T::saturate(d.to_i64() - y.to_i64());

	let mut power : i64 = 0;
	for k in 0..self.w.len() {
	    let v = self.hist.get(k).to_i64();
	    power += (v * v) >> T::QB;
	}
	if power == 0 {
	    return (y, e);
	}
	for k in 0..self.w.len() {
	    let delta = (e.to_i64() * self.hist.get(k).to_i64()) / power;
	    self.w[k] = T::saturate(self.w[k].to_i64() + (delta >> self.mu_shift));
	}
	return (y, e);
    }
}

#[cfg(test)]
use crate::dsp::{qformat::{q16, q32, Dsp16, Dsp32}, operators::Rng};

#[cfg(test)]
fn identify<T : Q>(mut step : impl FnMut(T, T) -> (T, T), iterations : usize) -> f64 {
    let h = [0.3, -0.2, 0.1, 0.05];
    let mut rng = Rng::new(1234);
    let mut past = [0.0f64; 4];
    let mut last_err = 0.0;
    for _ in 0..iterations {
	let x = T::wrap(rng.rand::<T>().to_i64() >> 1);
	past.rotate_right(1);
	past[0] = x.to_f64();
	let d : f64 = h.iter().zip(past.iter()).map(|(a, b)| a * b).sum();
	let (_, e) = step(x, T::from_f64(d));
	last_err = e.to_f64().abs();
    }
    return last_err;
}

#[cfg(test)]
#[test]
fn test_lms_identifies_system() {
    let mut lms = Lms::<Dsp32>::new(4);
    let err = identify(|x, d| lms.step(x, d), 20000);
    assert!(err < 0.01, "residual error {err}");
    let expected = [0.3, -0.2, 0.1, 0.05];
    for (w, h) in lms.weights().iter().zip(expected) {
	assert!((w.to_f64() - h).abs() < 0.01, "{:?}", lms.weights());
    }
}

#[cfg(test)]
#[test]
fn test_nlms_identifies_system() {
    let mut nlms = Nlms::<Dsp16>::new(4);
    identify(|x, d| nlms.step(x, d), 4000);
    let expected = [0.3, -0.2, 0.1, 0.05];
    for (w, h) in nlms.weights().iter().zip(expected) {
	assert!((w.to_f64() - h).abs() < 0.02, "{:?}", nlms.weights());
    }
}

#[cfg(test)]
#[test]
fn test_lms_first_output() {
    let mut lms = Lms::<Dsp16>::with_mu_shift(8, 0);
    let (y, e) = lms.step(q16(0.5), q16(0.25));
    assert_eq!(0, y);
    assert_eq!(q16(0.25), e);
    // w[0] += e * x = 0.125
    assert_eq!(q16(0.125), lms.weights()[0]);
    assert!(lms.weights()[1..].iter().all(|w| *w == 0));
}

#[cfg(test)]
#[test]
fn test_nlms_silent_input() {
    let mut nlms = Nlms::<Dsp32>::new(4);
    let (y, e) = nlms.step(0, q32(0.5));
    assert_eq!(0, y);
    assert_eq!(q32(0.5), e);
    assert!(nlms.weights().iter().all(|w| *w == 0));
}
