// Copyright (C) 2022 Christoph Reichenbach (creichen@gmail.com)
// Licenced under the GNU General Public Licence, v3.  Please refer to the file "COPYING" for details.

//! Vector operations
//!
//! Results go to a caller-supplied output slice; all slices involved in one call must have
//! matching lengths.

use crate::dsp::qformat::{Q, Complex};
use crate::dsp::operators;
use crate::util::isqrt;

#[inline]
fn check_len(op : &str, out : usize, input : usize) {
    assert_eq!(out, input, "{op}: output has {out} elements, input has {input}");
}

fn map1<T : Q>(op : &str, out : &mut [T], v : &[T], f : impl Fn(T) -> T) {
    check_len(op, out.len(), v.len());
    for (o, x) in out.iter_mut().zip(v) {
	*o = f(*x);
    }
}

fn map2<T : Q>(op : &str, out : &mut [T], a : &[T], b : &[T], f : impl Fn(T, T) -> T) {
    check_len(op, out.len(), a.len());
    check_len(op, out.len(), b.len());
    for ((o, x), y) in out.iter_mut().zip(a).zip(b) {
	*o = f(*x, *y);
    }
}

/// Wrapping sum of products, shifted back to the sample format
#[inline]
pub(crate) fn mac<T : Q>(pairs : impl Iterator<Item = (T, T)>) -> T {
    let mut acc : i64 = 0;
    for (a, b) in pairs {
	acc = acc.wrapping_add(a.to_i64() * b.to_i64());
    }
    return T::wrap(acc >> T::QB);
}

// ----------------------------------------
// Element-wise arithmetic

/// Wrapping addition
pub fn add<T : Q>(out : &mut [T], a : &[T], b : &[T]) {
    map2("add", out, a, b, |x, y| T::wrap(x.to_i64() + y.to_i64()));
}

pub fn add_and_sat<T : Q>(out : &mut [T], a : &[T], b : &[T]) {
    map2("add_and_sat", out, a, b, |x, y| T::saturate(x.to_i64() + y.to_i64()));
}

pub fn sub<T : Q>(out : &mut [T], a : &[T], b : &[T]) {
    map2("sub", out, a, b, |x, y| T::wrap(x.to_i64() - y.to_i64()));
}

pub fn realadd<T : Q>(out : &mut [T], v : &[T], real : T) {
    map1("realadd", out, v, |x| T::wrap(x.to_i64() + real.to_i64()));
}

pub fn realsub<T : Q>(out : &mut [T], v : &[T], real : T) {
    map1("realsub", out, v, |x| T::wrap(x.to_i64() - real.to_i64()));
}

pub fn realmul<T : Q>(out : &mut [T], v : &[T], real : T) {
    map1("realmul", out, v, |x| operators::mul(x, real));
}

pub fn realdiv<T : Q>(out : &mut [T], v : &[T], real : T) {
    map1("realdiv", out, v, |x| operators::div(x, real));
}

/// Multiplication by a plain integer, wrapping
pub fn intmul<T : Q>(out : &mut [T], v : &[T], integer : i32) {
    map1("intmul", out, v, |x| T::wrap(x.to_i64() * integer as i64));
}

/// Division by a plain integer; a zero divisor saturates
pub fn intdiv<T : Q>(out : &mut [T], v : &[T], integer : i32) {
    map1("intdiv", out, v, |x| {
	if integer == 0 {
	    return T::saturate(x.to_i64().signum() * i64::MAX);
	}
	T::wrap(x.to_i64() / integer as i64)
    });
}

/// Element-wise product
pub fn dotmul<T : Q>(out : &mut [T], a : &[T], b : &[T]) {
    map2("dotmul", out, a, b, operators::mul);
}

/// Element-wise quotient
pub fn dotdiv<T : Q>(out : &mut [T], a : &[T], b : &[T]) {
    map2("dotdiv", out, a, b, operators::div);
}

/// Raises every element to the power `real`
pub fn pow<T : Q>(out : &mut [T], v : &[T], real : T) {
    map1("pow", out, v, |x| operators::pow(x, real));
}

/// Saturating negation
pub fn neg<T : Q>(out : &mut [T], v : &[T]) {
    map1("neg", out, v, |x| T::saturate(-x.to_i64()));
}

pub fn copy<T : Q>(out : &mut [T], v : &[T]) {
    check_len("copy", out.len(), v.len());
    out.copy_from_slice(v);
}

/// Clears the last `num_zero` elements
pub fn zeropad<T : Q>(v : &mut [T], num_zero : usize) {
    let start = v.len().saturating_sub(num_zero);
    for x in &mut v[start..] {
	*x = T::ZERO;
    }
}

pub fn min<T : Q>(v : &[T]) -> Option<T> {
    return v.iter().copied().min();
}

pub fn max<T : Q>(v : &[T]) -> Option<T> {
    return v.iter().copied().max();
}

// ----------------------------------------
// Convolution

/// Partial convolution: only the outputs for which `h` fully overlaps `x`
///
/// `out.len()` must be `x.len() - h.len() + 1`; `out[n] = sum_k x[n + k] * h[h.len() - 1 - k]`.
pub fn convpart<T : Q>(out : &mut [T], x : &[T], h : &[T]) {
    assert!(h.len() > 0 && x.len() >= h.len(),
	    "convpart: input of {} elements is shorter than the {}-tap kernel", x.len(), h.len());
    check_len("convpart", out.len(), x.len() - h.len() + 1);
    for (n, o) in out.iter_mut().enumerate() {
	*o = mac(x[n..n + h.len()].iter().copied().zip(h.iter().rev().copied()));
    }
}

/// Full convolution; `out.len()` must be `x.len() + h.len() - 1`
pub fn conv<T : Q>(out : &mut [T], x : &[T], h : &[T]) {
    if x.len() == 0 || h.len() == 0 {
	check_len("conv", out.len(), 0);
	return;
    }
    check_len("conv", out.len(), x.len() + h.len() - 1);
    for (n, o) in out.iter_mut().enumerate() {
	let k_lo = (n + 1).saturating_sub(x.len());
	let k_hi = usize::min(n, h.len() - 1);
	*o = mac((k_lo..=k_hi).map(|k| (x[n - k], h[k])));
    }
}

// ----------------------------------------
// Complex vectors

pub fn complex_add<T : Q>(out : &mut [Complex<T>], a : &[Complex<T>], b : &[Complex<T>]) {
    check_len("complex_add", out.len(), a.len());
    check_len("complex_add", out.len(), b.len());
    for ((o, x), y) in out.iter_mut().zip(a).zip(b) {
	o.re = T::wrap(x.re.to_i64() + y.re.to_i64());
	o.im = T::wrap(x.im.to_i64() + y.im.to_i64());
    }
}

pub fn complex_sub<T : Q>(out : &mut [Complex<T>], a : &[Complex<T>], b : &[Complex<T>]) {
    check_len("complex_sub", out.len(), a.len());
    check_len("complex_sub", out.len(), b.len());
    for ((o, x), y) in out.iter_mut().zip(a).zip(b) {
	o.re = T::wrap(x.re.to_i64() - y.re.to_i64());
	o.im = T::wrap(x.im.to_i64() - y.im.to_i64());
    }
}

/// Magnitude of each element, saturated
pub fn complex_abs<T : Q>(out : &mut [T], v : &[Complex<T>]) {
    check_len("complex_abs", out.len(), v.len());
    for (o, z) in out.iter_mut().zip(v) {
	let (re, im) = (z.re.to_i64() as i128, z.im.to_i64() as i128);
	let power = (re * re + im * im) as u64;
	*o = T::saturate(isqrt(power) as i64);
    }
}

/// Complex conjugate, saturating the negated imaginary part
pub fn complex_conj<T : Q>(out : &mut [Complex<T>], v : &[Complex<T>]) {
    check_len("complex_conj", out.len(), v.len());
    for (o, z) in out.iter_mut().zip(v) {
	*o = Complex::new(z.re, T::saturate(-z.im.to_i64()));
    }
}

#[cfg(test)]
use crate::dsp::qformat::{q16, q32, Dsp16, Dsp32};

#[cfg(test)]
#[test]
fn test_add_wraps_and_saturates() {
    let a = [q16(0.75), q16(-0.75), q16(0.1)];
    let b = [q16(0.5), q16(-0.5), q16(0.2)];
    let mut out = [0; 3];
    add(&mut out, &a, &b);
    assert_eq!(q16(0.75).wrapping_add(q16(0.5)), out[0]);
    assert_eq!(q16(0.1) + q16(0.2), out[2]);
    add_and_sat(&mut out, &a, &b);
    assert_eq!([i16::MAX, i16::MIN, q16(0.1) + q16(0.2)], out);
    sub(&mut out, &a, &b);
    assert_eq!(q16(0.75) - q16(0.5), out[0]);
}

#[cfg(test)]
#[test]
fn test_real_ops() {
    let v = [q16(0.5), q16(-0.25), 0];
    let mut out = [0; 3];
    realmul(&mut out, &v, q16(0.5));
    assert_eq!([q16(0.25), q16(-0.125), 0], out);
    realdiv(&mut out, &[q16(0.125), q16(-0.125), 0], q16(0.5));
    assert_eq!([q16(0.25), q16(-0.25), 0], out);
    realadd(&mut out, &v, q16(0.25));
    assert_eq!([q16(0.75), 0, q16(0.25)], out);
    realsub(&mut out, &v, q16(0.25));
    assert_eq!([q16(0.25), q16(-0.5), q16(-0.25)], out);
    intmul(&mut out, &v, 3);
    assert_eq!(q16(-0.75), out[1]);
    intdiv(&mut out, &v, 2);
    assert_eq!([q16(0.25), q16(-0.125), 0], out);
    intdiv(&mut out, &v, 0);
    assert_eq!([i16::MAX, i16::MIN, 0], out);
}

#[cfg(test)]
#[test]
fn test_dot_ops() {
    let a = [q32(0.5), q32(-0.5)];
    let b = [q32(0.5), q32(0.5)];
    let mut out = [0; 2];
    dotmul(&mut out, &a, &b);
    assert_eq!([q32(0.25), q32(-0.25)], out);
    dotdiv(&mut out, &[q32(0.25), q32(-0.25)], &b);
    assert_eq!([q32(0.5), q32(-0.5)], out);
    pow(&mut out, &[q32(0.25), q32(-0.25)], q32(0.5));
    assert!((out[0].to_f64() - 0.5).abs() < 1e-6);
    assert_eq!(i32::MIN, out[1]);
}

#[cfg(test)]
#[test]
fn test_neg_minmax_zeropad() {
    let v : [Dsp16; 4] = [i16::MIN, q16(0.5), q16(-0.25), q16(0.75)];
    let mut out = [0; 4];
    neg(&mut out, &v);
    assert_eq!([i16::MAX, q16(-0.5), q16(0.25), q16(-0.75)], out);
    assert_eq!(Some(i16::MIN), min(&v));
    assert_eq!(Some(q16(0.75)), max(&v));
    assert_eq!(None, max::<Dsp16>(&[]));
    copy(&mut out, &v);
    zeropad(&mut out, 2);
    assert_eq!([i16::MIN, q16(0.5), 0, 0], out);
    zeropad(&mut out, 10);
    assert_eq!([0; 4], out);
}

#[cfg(test)]
#[test]
fn test_convpart() {
    let x = [q16(0.5), q16(0.25), q16(-0.5), q16(0.125)];
    let h = [q16(0.5), q16(0.25)];
    let mut out = [0; 3];
    convpart(&mut out, &x, &h);
    // out[n] = x[n] * h[1] + x[n + 1] * h[0]
    assert_eq!(q16(0.5 * 0.25 + 0.25 * 0.5), out[0]);
    assert_eq!(q16(0.25 * 0.25 - 0.5 * 0.5), out[1]);
    assert_eq!(q16(-0.5 * 0.25 + 0.125 * 0.5), out[2]);
}

#[cfg(test)]
#[test]
fn test_conv_impulse() {
    let x = [i16::MAX, 0, 0];
    let h = [q16(0.5), q16(-0.25), q16(0.125)];
    let mut out = [0; 5];
    conv(&mut out, &x, &h);
    for k in 0..3 {
	assert!((out[k] - h[k]).abs() <= 1);
    }
    assert_eq!([0, 0], out[3..]);

    let mut full = [0; 5];
    conv(&mut full, &[q16(0.5), q16(0.5)], &[q16(0.5), q16(0.5), q16(0.5), q16(0.5)]);
    assert_eq!([q16(0.25), q16(0.5), q16(0.5), q16(0.5), q16(0.25)], full);
}

#[cfg(test)]
#[test]
#[should_panic]
fn test_length_mismatch_panics() {
    let mut out = [0i16; 2];
    add(&mut out, &[1, 2, 3], &[1, 2, 3]);
}

#[cfg(test)]
#[test]
fn test_complex_ops() {
    let a = [Complex::new(q16(0.5), q16(0.25))];
    let b = [Complex::new(q16(0.25), q16(-0.5))];
    let mut out = [Complex::new(0, 0)];
    complex_add(&mut out, &a, &b);
    assert_eq!(Complex::new(q16(0.75), q16(-0.25)), out[0]);
    complex_sub(&mut out, &a, &b);
    assert_eq!(Complex::new(q16(0.25), q16(0.75)), out[0]);
    complex_conj(&mut out, &[Complex::new(q16(0.5), i16::MIN)]);
    assert_eq!(Complex::new(q16(0.5), i16::MAX), out[0]);

    let mut mag : [Dsp16; 2] = [0; 2];
    complex_abs(&mut mag, &[Complex::new(q16(0.6), q16(0.8)), Complex::new(q16(0.9), q16(0.9))]);
    assert!((mag[0].to_f64() - 1.0).abs() < 0.001);
    assert_eq!(i16::MAX, mag[1]);

    let mut mag32 : [Dsp32; 1] = [0];
    complex_abs(&mut mag32, &[Complex::new(q32(0.3), q32(-0.4))]);
    assert!((mag32[0].to_f64() - 0.5).abs() < 1e-8);
}
