// Copyright (C) 2022 Christoph Reichenbach (creichen@gmail.com)
// Licenced under the GNU General Public Licence, v3.  Please refer to the file "COPYING" for details.

//! Scalar fixed-point operators
//!
//! All operators are generic over the sample type.  Internally they work on Q30 values held
//! in `i64`, so one code path serves both Q1.15 and Q1.31.
//!
//! Angles are scaled so that [-1, 1) covers [-pi, pi).

use crate::dsp::qformat::Q;
use crate::util::{shift, isqrt};

// ================================================================================
// Internal Q30 arithmetic

pub(crate) const F : u32 = 30;
pub(crate) const ONE : i64 = 1 << F;

const PI_Q30 : i64 = 3373259426;
const HALF_PI_Q30 : i64 = 1686629713;
const INV_PI_Q30 : i64 = 341782638;
const LN2_Q30 : i64 = 744261118;
const LOG10_2_Q30 : i64 = 323228497;
const LOG2_E_Q30 : i64 = 1549082005;

#[inline]
pub(crate) fn widen<T : Q>(x : T) -> i64 {
    return shift(x.to_i64(), F as i32 - T::QB as i32);
}

/// Q30 to sample, rounding to nearest and saturating
#[inline]
pub(crate) fn narrow<T : Q>(v : i64) -> T {
    let s = F as i32 - T::QB as i32;
    if s > 0 {
	return T::saturate((v + (1 << (s - 1))) >> s);
    }
    return T::saturate(shift(v, -s));
}

#[inline]
fn mul30(a : i64, b : i64) -> i64 {
    // log2 results of tiny values exceed 2^34, so the product is taken in 128 bits
    return ((a as i128 * b as i128) >> F) as i64;
}

/// sin(t * pi) for a Q30 `t` in [-1, 1)
pub(crate) fn sin_q30(t : i64) -> i64 {
    let mut t = t;
    if t == ONE / 2 {
	return ONE;
    } else if t == -ONE / 2 {
	return -ONE;
    }
    if t > ONE / 2 {
	t = ONE - t;
    } else if t < -ONE / 2 {
	t = -ONE - t;
    }
    let theta = mul30(t, PI_Q30);
    let theta2 = mul30(theta, theta);
    let mut acc = ONE;
    for k in [210, 156, 110, 72, 42, 20, 6] {
	acc = ONE - mul30(theta2, acc) / k;
    }
    return mul30(theta, acc);
}

/// asin(x) in radians, for a Q30 `x` with |x| <= 1/2
fn asin_series_q30(x : i64) -> i64 {
    let x2 = mul30(x, x);
    let mut term = x;
    let mut sum = x;
    for n in 0..14i64 {
	term = mul30(term, x2) * (2 * n + 1) * (2 * n + 1) / ((2 * n + 2) * (2 * n + 3));
	if term == 0 {
	    break;
	}
	sum += term;
    }
    return sum;
}

/// asin(x) / pi for Q30 `x` in [-1, 1]
pub(crate) fn asin_q30(x : i64) -> i64 {
    let a = x.abs();
    let rad = if a <= ONE / 2 {
	asin_series_q30(a)
    } else {
	// asin(a) = pi/2 - 2 asin(sqrt((1 - a) / 2))
	let y = isqrt((((ONE - a) / 2) << F) as u64) as i64;
	HALF_PI_Q30 - 2 * asin_series_q30(y)
    };
    let r = mul30(rad, INV_PI_Q30);
    return if x < 0 { -r } else { r };
}

/// log2 of a positive value with `qb` fractional bits, as Q30
pub(crate) fn log2_q30(v : i64, qb : u32) -> i64 {
    let p = 63 - v.leading_zeros() as i32;
    let mut m = shift(v, F as i32 - p);
    let mut frac = 0;
    for i in 1..=F {
	m = mul30(m, m);
	if m >= 2 * ONE {
	    m >>= 1;
	    frac |= 1 << (F - i);
	}
    }
    return ((p as i64 - qb as i64) << F) + frac;
}

/// 2^v for Q30 `v`, as Q30; saturates at 2^32
pub(crate) fn exp2_q30(v : i64) -> i64 {
    let k = v >> F;
    if k > 32 {
	return ONE << 32;
    }
    if k < -(F as i64) - 1 {
	return 0;
    }
    let z = mul30(v - (k << F), LN2_Q30);
    // e^z for z in [0, ln 2)
    let mut acc = ONE;
    for n in (1..=10).rev() {
	acc = ONE + mul30(z, acc) / n;
    }
    return shift(acc, k as i32);
}

/// ln of a positive value with `qb` fractional bits, as Q30
pub(crate) fn ln_q30(v : i64, qb : u32) -> i64 {
    return mul30(log2_q30(v, qb), LN2_Q30);
}

// ================================================================================
// Operators

/// (a * b) >> QB, wrapping on overflow (only for MIN * MIN)
pub fn mul<T : Q>(a : T, b : T) -> T {
    return T::wrap((a.to_i64() * b.to_i64()) >> T::QB);
}

/// (num << QB) / den, wrapping; division by zero saturates
pub fn div<T : Q>(num : T, den : T) -> T {
    let d = den.to_i64();
    if d == 0 {
	let n = num.to_i64();
	return if n > 0 { T::MAX } else if n < 0 { T::MIN } else { T::ZERO };
    }
    return T::wrap((num.to_i64() << T::QB) / d);
}

pub fn sin<T : Q>(angle : T) -> T {
    return narrow(sin_q30(widen(angle)));
}

pub fn cos<T : Q>(angle : T) -> T {
    let quarter = T::wrap(1 << (T::QB - 1));
    return sin(T::wrap(angle.to_i64() + quarter.to_i64()));
}

/// Arc sine, scaled to [-0.5, 0.5]
pub fn asin<T : Q>(x : T) -> T {
    return narrow(asin_q30(widen(x)));
}

/// Arc cosine, scaled to [0, 1)
pub fn acos<T : Q>(x : T) -> T {
    let half_less_one = (1i64 << (T::QB - 1)) - 1;
    return T::saturate(half_less_one - asin(x).to_i64());
}

pub fn abs<T : Q>(x : T) -> T {
    return T::saturate(x.to_i64().abs());
}

/// Square root; non-positive input yields zero
pub fn sqrt<T : Q>(x : T) -> T {
    let v = x.to_i64();
    if v <= 0 {
	return T::ZERO;
    }
    return T::saturate(isqrt((v << T::QB) as u64) as i64);
}

/// log2 with `QB` fractional bits, not saturated to the sample range
///
/// Non-positive input yields `T::MIN`.
pub fn log2_wide<T : Q>(x : T) -> i64 {
    let v = x.to_i64();
    if v <= 0 {
	return T::MIN.to_i64();
    }
    return shift(log2_q30(v, T::QB), T::QB as i32 - F as i32);
}

/// Natural logarithm with `QB` fractional bits, not saturated to the sample range
///
/// Non-positive input yields `T::MIN`.
pub fn ln_wide<T : Q>(x : T) -> i64 {
    let v = x.to_i64();
    if v <= 0 {
	return T::MIN.to_i64();
    }
    return shift(ln_q30(v, T::QB), T::QB as i32 - F as i32);
}

pub fn log2<T : Q>(x : T) -> T {
    if x.to_i64() <= 0 {
	return T::MIN;
    }
    return narrow(log2_q30(x.to_i64(), T::QB));
}

pub fn ln<T : Q>(x : T) -> T {
    if x.to_i64() <= 0 {
	return T::MIN;
    }
    return narrow(ln_q30(x.to_i64(), T::QB));
}

pub fn log10<T : Q>(x : T) -> T {
    if x.to_i64() <= 0 {
	return T::MIN;
    }
    return narrow(mul30(log2_q30(x.to_i64(), T::QB), LOG10_2_Q30));
}

/// e^x, saturated (so only meaningful for x < 0)
pub fn exp<T : Q>(x : T) -> T {
    return narrow(exp2_q30(mul30(widen(x), LOG2_E_Q30)));
}

/// x^y; negative `x` yields `T::MIN`
pub fn pow<T : Q>(x : T, y : T) -> T {
    let v = x.to_i64();
    if v < 0 {
	return T::MIN;
    }
    if v == 0 {
	return T::ZERO;
    }
    return narrow(exp2_q30(mul30(log2_q30(v, T::QB), widen(y))));
}

// ================================================================================
// Pseudo-random numbers

/// Linear congruential generator covering [-1, 1)
#[derive(Clone, Debug)]
pub struct Rng {
    seed : u32,
}

impl Rng {
    pub fn new(seed : u32) -> Rng {
	return Rng { seed };
    }

    pub fn srand(&mut self, seed : u32) {
	self.seed = seed;
    }

    fn next(&mut self) -> u32 {
	self.seed = self.seed.wrapping_mul(1664525).wrapping_add(1013904223);
	return self.seed;
    }

    pub fn rand32(&mut self) -> i32 {
	return self.next() as i32;
    }

    pub fn rand16(&mut self) -> i16 {
	return (self.next() >> 16) as i16;
    }

    pub fn rand<T : Q>(&mut self) -> T {
	return T::wrap((self.rand32() as i64) >> (32 - T::BITS));
    }
}

impl Default for Rng {
    fn default() -> Rng {
	return Rng::new(0);
    }
}

// ================================================================================
// Tests

#[cfg(test)]
use crate::dsp::qformat::{q16, q32, Dsp16, Dsp32};

#[cfg(test)]
fn assert_close<T : Q>(expected : f64, actual : T, ulps : f64) {
    let tolerance = ulps * T::resolution();
    assert!((expected - actual.to_f64()).abs() <= tolerance,
	    "expected {expected}, got {} (tolerance {tolerance})", actual.to_f64());
}

#[cfg(test)]
#[test]
fn test_mul_div() {
    assert_eq!(q16(0.25), mul(q16(0.5), q16(0.5)));
    assert_eq!(q16(-0.25), mul(q16(-0.5), q16(0.5)));
    assert_eq!(i16::MIN, mul(i16::MIN, i16::MIN));
    assert_eq!(q32(0.125), mul(q32(0.25), q32(0.5)));
    assert_eq!(q16(0.5), div(q16(0.25), q16(0.5)));
    assert_eq!(i16::MAX, div(q16(0.25), 0));
    assert_eq!(i16::MIN, div(q16(-0.25), 0));
    assert_eq!(0, div::<Dsp16>(0, 0));
}

#[cfg(test)]
#[test]
fn test_sin_cos() {
    for i in -64..64 {
	let t = i as f64 / 64.0;
	assert_close((t * std::f64::consts::PI).sin(), sin(q16(t)), 3.0);
	assert_close((t * std::f64::consts::PI).cos(), cos(q16(t)), 3.0);
	assert_close((t * std::f64::consts::PI).sin(), sin(q32(t)), 512.0);
    }
    assert_eq!(0, sin::<Dsp16>(0));
    assert_eq!(i16::MAX, sin(q16(0.5)));
    assert_eq!(i32::MAX, sin(q32(0.5)));
    assert_eq!(i32::MIN, sin(q32(-0.5)));
    assert_eq!(i32::MAX, cos::<Dsp32>(0));
}

#[cfg(test)]
#[test]
fn test_asin_acos() {
    for i in -32..=32 {
	let x = i as f64 / 32.0;
	let expected = x.max(-1.0).min(1.0 - 1.0 / 32768.0);
	assert_close(expected.asin() / std::f64::consts::PI, asin(q16(x)), 3.0);
	assert_close(expected.acos() / std::f64::consts::PI, acos(q16(x)), 4.0);
    }
    assert_close(1.0 / 6.0, asin(q32(0.5)), 256.0);
}

#[cfg(test)]
#[test]
fn test_abs_sqrt() {
    assert_eq!(i16::MAX, abs(i16::MIN));
    assert_eq!(q16(0.3), abs(q16(-0.3)));
    assert_eq!(0, sqrt(q16(-0.5)));
    assert_eq!(q16(0.5), sqrt(q16(0.25)));
    assert_close(0.1f64.sqrt(), sqrt(q32(0.1)), 4.0);
    assert_close(0.9f64.sqrt(), sqrt(q16(0.9)), 2.0);
}

#[cfg(test)]
#[test]
fn test_logarithms() {
    for x in [0.001f64, 0.1, 0.25, 0.5, 0.7, 0.99] {
	assert_close(x.ln().max(-1.0), ln(q16(x)), 4.0);
	assert_close(x.log2().max(-1.0), log2(q16(x)), 4.0);
	assert_close(x.log10().max(-1.0), log10(q16(x)), 4.0);
	assert_close(x.ln().max(-1.0), ln(q32(x)), 4096.0);
	let wide = ln_wide(q16(x)) as f64 / 32768.0;
	assert!((wide - q16(x).to_f64().ln()).abs() < 0.001, "ln_wide({x}) = {wide}");
    }
    assert_eq!(i16::MIN, ln::<Dsp16>(0));
    assert_eq!(i32::MIN, log10(q32(-0.5)));
    assert_eq!(i16::MIN as i64, ln_wide::<Dsp16>(-3));
    assert_eq!(-(1i64 << 31), log2_wide(q32(0.5)));
}

#[cfg(test)]
#[test]
fn test_logarithms_of_tiny_values() {
    // one LSB: the log is far below -1
    assert_eq!(i16::MIN, ln::<Dsp16>(1));
    assert_eq!(i16::MIN, log10::<Dsp16>(1));
    assert_eq!(i32::MIN, log10::<Dsp32>(1));
    assert_eq!(i32::MIN, ln::<Dsp32>(1000));
    let wide = ln_wide::<Dsp32>(1) as f64 / (1u64 << 31) as f64;
    assert!((wide + 31.0 * std::f64::consts::LN_2).abs() < 1e-6, "ln_wide(1) = {wide}");
    let wide = ln_wide::<Dsp16>(3) as f64 / 32768.0;
    assert!((wide - (3.0f64 / 32768.0).ln()).abs() < 0.001, "ln_wide(3) = {wide}");
    assert_close((3.0f64 / 32768.0).powf(q16(0.9).to_f64()), pow::<Dsp16>(3, q16(0.9)), 2.0);
    assert_close((1000.0f64 / 2147483648.0).sqrt(), pow::<Dsp32>(1000, q32(0.5)), 4096.0);
}

#[cfg(test)]
#[test]
fn test_exp_pow() {
    for x in [-1.0f64, -0.7, -0.3, -0.01] {
	assert_close(f64::exp(x), exp(q16(x)), 3.0);
	assert_close(f64::exp(x), exp(q32(x)), 4096.0);
    }
    assert_eq!(i16::MAX, exp(q16(0.5)));
    assert_close(0.25f64.powf(0.5), pow(q16(0.25), q16(0.5)), 4.0);
    assert_close(0.8f64.powf(0.9), pow(q16(0.8), q16(0.9)), 4.0);
    assert_eq!(i16::MAX, pow(q16(0.5), q16(-0.5)));
    assert_eq!(i16::MIN, pow(q16(-0.5), q16(0.5)));
    assert_eq!(0, pow(0, q16(0.5)));
}

#[cfg(test)]
#[test]
fn test_rand() {
    let mut rng = Rng::new(42);
    let samples : Vec<Dsp16> = (0..4096).map(|_| rng.rand()).collect();
    let mean = samples.iter().map(|x| x.to_f64()).sum::<f64>() / 4096.0;
    assert!(mean.abs() < 0.05);
    assert!(samples.iter().any(|x| *x < q16(-0.9)));
    assert!(samples.iter().any(|x| *x > q16(0.9)));

    let mut a = Rng::new(7);
    let mut b = Rng::new(7);
    assert_eq!(a.rand32(), b.rand32());
    let _ : Dsp32 = a.rand();
}
