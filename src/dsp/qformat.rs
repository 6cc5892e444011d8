// Copyright (C) 2022 Christoph Reichenbach (creichen@gmail.com)
// Licenced under the GNU General Public Licence, v3.  Please refer to the file "COPYING" for details.

//! Q-format sample types
//!
//! A `Qa.b` number has `a` integer bits (including the sign) and `b` fractional bits.
//! Both sample types here use a single integer bit, so they cover [-1, 1).

use std::fmt::Debug;

pub use rustfft::num_complex::Complex;

/// Q1.15 sample
pub type Dsp16 = i16;
/// Q1.31 sample
pub type Dsp32 = i32;

pub type Complex16 = Complex<Dsp16>;
pub type Complex32 = Complex<Dsp32>;

pub const PI : f64 = std::f64::consts::PI;
pub const E : f64 = std::f64::consts::E;
pub const SQRT2 : f64 = std::f64::consts::SQRT_2;
pub const INV_SQRT2 : f64 = std::f64::consts::FRAC_1_SQRT_2;
pub const LN2 : f64 = std::f64::consts::LN_2;
pub const LN10 : f64 = std::f64::consts::LN_10;

pub trait Q : Copy + Clone + PartialEq + Eq + PartialOrd + Ord + Default + Debug + Send + Sync + 'static {
    const BITS : u32;
    /// Integer bits, including the sign bit
    const QA : u32;
    /// Fractional bits
    const QB : u32;
    const MAX : Self;
    const MIN : Self;
    const ZERO : Self;

    fn to_i64(self) -> i64;

    /// Narrows by dropping the high bits
    fn wrap(v : i64) -> Self;

    /// Narrows by clamping to [MIN, MAX]
    fn saturate(v : i64) -> Self {
	if v > Self::MAX.to_i64() {
	    return Self::MAX;
	}
	if v < Self::MIN.to_i64() {
	    return Self::MIN;
	}
	return Self::wrap(v);
    }

    /// Smallest representable step
    fn resolution() -> f64 {
	return 1.0 / (1u64 << Self::QB) as f64;
    }

    /// Largest representable value as float
    fn fp_max() -> f64 {
	return (1u64 << (Self::QA - 1)) as f64 - Self::resolution();
    }

    /// Smallest representable value as float
    fn fp_min() -> f64 {
	return -((1u64 << (Self::QA - 1)) as f64);
    }

    /// Converts from float, clamping near the range limits and truncating otherwise
    fn from_f64(f : f64) -> Self {
	let res = Self::resolution();
	if f >= Self::fp_max() - res {
	    return Self::MAX;
	}
	if f <= Self::fp_min() + res {
	    return Self::MIN;
	}
	return Self::wrap((f * (1u64 << Self::QB) as f64) as i64);
    }

    fn to_f64(self) -> f64 {
	return self.to_i64() as f64 * Self::resolution();
    }

    fn is_negative(self) -> bool {
	return self.to_i64() < 0;
    }
}

impl Q for Dsp16 {
    const BITS : u32 = 16;
    const QA : u32 = 1;
    const QB : u32 = 15;
    const MAX : Dsp16 = i16::MAX;
    const MIN : Dsp16 = i16::MIN;
    const ZERO : Dsp16 = 0;

    #[inline]
    fn to_i64(self) -> i64 {
	return self as i64;
    }

    #[inline]
    fn wrap(v : i64) -> Dsp16 {
	return v as i16;
    }
}

impl Q for Dsp32 {
    const BITS : u32 = 32;
    const QA : u32 = 1;
    const QB : u32 = 31;
    const MAX : Dsp32 = i32::MAX;
    const MIN : Dsp32 = i32::MIN;
    const ZERO : Dsp32 = 0;

    #[inline]
    fn to_i64(self) -> i64 {
	return self as i64;
    }

    #[inline]
    fn wrap(v : i64) -> Dsp32 {
	return v as i32;
    }
}

pub fn q16(f : f64) -> Dsp16 {
    return Dsp16::from_f64(f);
}

pub fn q32(f : f64) -> Dsp32 {
    return Dsp32::from_f64(f);
}

/// Converts a float slice into Q format
pub fn from_f64_slice<T : Q>(v : &[f64]) -> Vec<T> {
    return v.iter().map(|f| T::from_f64(*f)).collect();
}

pub fn to_f64_vec<T : Q>(v : &[T]) -> Vec<f64> {
    return v.iter().map(|x| x.to_f64()).collect();
}

/// Converts between sample widths, keeping the value
pub fn convert<S : Q, T : Q>(x : S) -> T {
    return T::wrap(crate::util::shift(x.to_i64(), T::QB as i32 - S::QB as i32));
}

#[cfg(test)]
#[test]
fn test_from_f64_limits() {
    assert_eq!(i16::MAX, q16(1.0));
    assert_eq!(i16::MAX, q16(3.5));
    assert_eq!(i16::MIN, q16(-1.0));
    assert_eq!(i16::MIN, q16(-1.0 + 1.0 / 32768.0));
    assert_eq!(i32::MAX, q32(1.0));
    assert_eq!(i32::MIN, q32(-7.0));
}

#[cfg(test)]
#[test]
fn test_from_f64_truncates() {
    assert_eq!(16384, q16(0.5));
    assert_eq!(-16384, q16(-0.5));
    assert_eq!(0, q16(0.00002));
    assert_eq!(1, q16(0.00004));
    assert_eq!(1 << 30, q32(0.5));
    assert_eq!(3276, q16(0.1));
}

#[cfg(test)]
#[test]
fn test_to_f64() {
    assert_eq!(0.5, (16384 as Dsp16).to_f64());
    assert_eq!(-1.0, Dsp16::MIN.to_f64());
    assert_eq!(-1.0, Dsp32::MIN.to_f64());
    for f in [-0.75, -0.3, 0.0, 0.123, 0.9] {
	assert!((q16(f).to_f64() - f).abs() <= Dsp16::resolution());
	assert!((q32(f).to_f64() - f).abs() <= Dsp32::resolution());
    }
}

#[cfg(test)]
#[test]
fn test_saturate() {
    assert_eq!(i16::MAX, Dsp16::saturate(40000));
    assert_eq!(i16::MIN, Dsp16::saturate(-40000));
    assert_eq!(-123, Dsp16::saturate(-123));
    assert_eq!(-25536, Dsp16::wrap(40000));
}

#[cfg(test)]
#[test]
fn test_convert() {
    let x : Dsp32 = convert(q16(0.25));
    assert_eq!(1 << 29, x);
    let y : Dsp16 = convert(q32(-0.5));
    assert_eq!(-16384, y);
}
