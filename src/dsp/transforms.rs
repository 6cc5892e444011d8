// Copyright (C) 2022 Christoph Reichenbach (creichen@gmail.com)
// Licenced under the GNU General Public Licence, v3.  Please refer to the file "COPYING" for details.

//! Radix-4 FFT
//!
//! Decimation in time over `4^k` points, not in place.  Every radix-4 stage divides by 4, so
//! the forward transform yields the DFT divided by N and cannot overflow for inputs in range.
//! The inverse transform is scaled the same way: `ifft(fft(x)) = x / N`.

#[allow(unused)]
use log::{Level, log_enabled, trace, debug, info, warn, error};
#[allow(unused)]
use crate::{ptrace, pdebug, pinfo, pwarn, perror};

use crate::dsp::qformat::{Q, Complex};
use crate::error::{DspError, Result};

mod twiddle;

pub use twiddle::{FftSample, TWIDDLE_NLOG, TWIDDLE_SIZE};

pub const MAX_NLOG : u32 = TWIDDLE_NLOG;

/// Number of points for `nlog`, or `DspError::FftSize` if the transforms cannot handle it
pub fn check_nlog(nlog : u32) -> Result<usize> {
    if nlog < 2 || nlog > MAX_NLOG || nlog % 2 != 0 {
	return Err(DspError::FftSize { nlog, max : MAX_NLOG });
    }
    return Ok(1 << nlog);
}

/// Index with its base-4 digits reversed
fn digit_reverse4(i : usize, digits : u32) -> usize {
    let mut v = i;
    let mut r = 0;
    for _ in 0..digits {
	r = (r << 2) | (v & 3);
	v >>= 2;
    }
    return r;
}

#[inline]
fn cmul<T : Q>(a : Complex<T>, w : Complex<T>) -> (i64, i64) {
    let (ar, ai) = (a.re.to_i64() as i128, a.im.to_i64() as i128);
    let (wr, wi) = (w.re.to_i64() as i128, w.im.to_i64() as i128);
    let re = (ar * wr - ai * wi) >> T::QB;
    let im = (ar * wi + ai * wr) >> T::QB;
    return (re as i64, im as i64);
}

fn radix4<T : FftSample>(out : &mut [Complex<T>], nlog : u32, inverse : bool) {
    let n = out.len();
    let twiddles = T::twiddles();
    let mut len = 4;
    while len <= n {
	let quarter = len / 4;
	let stride = TWIDDLE_SIZE / len;
	for j in (0..n).step_by(len) {
	    for k in 0..quarter {
		let mut a = [(0i64, 0i64); 4];
		for q in 0..4 {
		    let v = out[j + k + q * quarter];
		    // the k = 0 butterfly has unit twiddles, and MAX is one LSB short of 1
		    if q == 0 || k == 0 {
			a[q] = (v.re.to_i64(), v.im.to_i64());
		    } else {
			let mut w = twiddles[(q * k * stride) % TWIDDLE_SIZE];
			if inverse {
			    w.im = T::saturate(-w.im.to_i64());
			}
			a[q] = cmul(v, w);
		    }
		}
		// multiplication by -i maps (re, im) to (im, -re)
		let (s02, d02) = ((a[0].0 + a[2].0, a[0].1 + a[2].1), (a[0].0 - a[2].0, a[0].1 - a[2].1));
		let (s13, d13) = ((a[1].0 + a[3].0, a[1].1 + a[3].1), (a[1].0 - a[3].0, a[1].1 - a[3].1));
		let mi_d13 = if inverse { (-d13.1, d13.0) } else { (d13.1, -d13.0) };
		let y = [
		    (s02.0 + s13.0, s02.1 + s13.1),
		    (d02.0 + mi_d13.0, d02.1 + mi_d13.1),
		    (s02.0 - s13.0, s02.1 - s13.1),
		    (d02.0 - mi_d13.0, d02.1 - mi_d13.1),
		];
		for q in 0..4 {
		    out[j + k + q * quarter] = Complex::new(T::wrap(y[q].0 >> 2), T::wrap(y[q].1 >> 2));
		}
	    }
	}
	len *= 4;
    }
    ptrace!("[radix4] {} points, {} stages", n, nlog / 2);
}

fn transform<T : FftSample>(out : &mut [Complex<T>], input : &[Complex<T>], nlog : u32, inverse : bool) -> Result<()> {
    let n = check_nlog(nlog)?;
    assert_eq!(n, input.len(), "FFT input must have 2^nlog elements");
    assert_eq!(n, out.len(), "FFT output must have 2^nlog elements");
    let digits = nlog / 2;
    for (i, v) in input.iter().enumerate() {
	out[digit_reverse4(i, digits)] = *v;
    }
    radix4(out, nlog, inverse);
    return Ok(());
}

/// Forward complex FFT of `2^nlog` points, scaled by 1/N
pub fn complex_fft<T : FftSample>(out : &mut [Complex<T>], input : &[Complex<T>], nlog : u32) -> Result<()> {
    return transform(out, input, nlog, false);
}

/// Inverse complex FFT of `2^nlog` points, scaled by 1/N
pub fn complex_ifft<T : FftSample>(out : &mut [Complex<T>], input : &[Complex<T>], nlog : u32) -> Result<()> {
    return transform(out, input, nlog, true);
}

/// Forward FFT of a real signal
pub fn real_complex_fft<T : FftSample>(out : &mut [Complex<T>], input : &[T], nlog : u32) -> Result<()> {
    let n = check_nlog(nlog)?;
    assert_eq!(n, input.len(), "FFT input must have 2^nlog elements");
    assert_eq!(n, out.len(), "FFT output must have 2^nlog elements");
    let digits = nlog / 2;
    for (i, v) in input.iter().enumerate() {
	out[digit_reverse4(i, digits)] = Complex::new(*v, T::ZERO);
    }
    radix4(out, nlog, false);
    return Ok(());
}

#[cfg(test)]
use crate::dsp::qformat::{q16, q32, Dsp16, Dsp32};
#[cfg(test)]
use rustfft::FftPlanner;

#[cfg(test)]
fn reference_fft(input : &[Complex<f64>]) -> Vec<Complex<f64>> {
    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(input.len());
    let mut buf = input.to_vec();
    fft.process(&mut buf);
    let n = input.len() as f64;
    return buf.iter().map(|c| *c / n).collect();
}

#[cfg(test)]
#[test]
fn test_digit_reverse() {
    assert_eq!(0, digit_reverse4(0, 2));
    assert_eq!(4, digit_reverse4(1, 2));
    assert_eq!(1, digit_reverse4(4, 2));
    assert_eq!(0b11_10_01, digit_reverse4(0b01_10_11, 3));
}

#[cfg(test)]
#[test]
fn test_fft_size_checks() {
    let input = vec![Complex::new(0i16, 0); 8];
    let mut out = input.clone();
    assert!(complex_fft(&mut out, &input, 3).is_err());
    assert!(complex_fft::<Dsp16>(&mut [], &[], 0).is_err());
    assert!(complex_fft::<Dsp16>(&mut [], &[], 12).is_err());
    assert_eq!(1024, check_nlog(10).unwrap());
    for nlog in [0, 3, 12, 40, 64] {
	assert!(matches!(check_nlog(nlog), Err(DspError::FftSize { max : MAX_NLOG, .. })), "nlog {nlog}");
    }
}

#[cfg(test)]
#[test]
fn test_fft_dc() {
    let input = vec![Complex::new(q16(0.5), 0); 64];
    let mut out = input.clone();
    complex_fft(&mut out, &input, 6).unwrap();
    assert!((out[0].re - q16(0.5)).abs() <= 2);
    for v in &out[1..] {
	assert!(v.re.abs() <= 2 && v.im.abs() <= 2, "{:?}", v);
    }
}

#[cfg(test)]
#[test]
fn test_fft_dc_is_exact_at_every_size() {
    for nlog in [2, 4, 6, 8, 10] {
	let n = 1usize << nlog;
	let input = vec![Complex::new(q16(0.5), 0); n];
	let mut out = input.clone();
	complex_fft(&mut out, &input, nlog).unwrap();
	assert_eq!(Complex::new(q16(0.5), 0), out[0], "nlog {nlog}");
	assert!(out[1..].iter().all(|v| v.re == 0 && v.im == 0), "nlog {nlog}");

	let real = vec![q32(-0.25); n];
	let mut spectrum = vec![Complex::new(0 as Dsp32, 0); n];
	real_complex_fft(&mut spectrum, &real, nlog).unwrap();
	assert_eq!(q32(-0.25), spectrum[0].re, "nlog {nlog}");
    }
}

#[cfg(test)]
#[test]
fn test_fft_tone_bin() {
    let n = 256;
    let input : Vec<Dsp32> = (0..n).map(|i| q32(0.8 * (2.0 * std::f64::consts::PI * 10.0 * i as f64 / n as f64).cos())).collect();
    let mut out = vec![Complex::new(0, 0); n];
    real_complex_fft(&mut out, &input, 8).unwrap();
    // 0.8 cos splits into two bins of 0.4 each
    assert!((out[10].re.to_f64() - 0.4).abs() < 1e-4);
    assert!((out[n - 10].re.to_f64() - 0.4).abs() < 1e-4);
    for (k, v) in out.iter().enumerate() {
	if k != 10 && k != n - 10 {
	    assert!(v.re.to_f64().abs() < 1e-4 && v.im.to_f64().abs() < 1e-4, "bin {k}: {:?}", v);
	}
    }
}

#[cfg(test)]
#[test]
fn test_fft_matches_reference() {
    for nlog in [2, 4, 6, 8, 10] {
	let n = 1usize << nlog;
	let input : Vec<Complex<Dsp16>> = (0..n).map(|i| Complex::new(
	    q16(0.9 * ((i * 7919) % 101) as f64 / 101.0 - 0.45),
	    q16(0.6 * ((i * 104729) % 37) as f64 / 37.0 - 0.3))).collect();
	let mut out = input.clone();
	complex_fft(&mut out, &input, nlog).unwrap();
	let expected = reference_fft(&input.iter().map(|c| Complex::new(c.re.to_f64(), c.im.to_f64())).collect::<Vec<_>>());
	for (a, e) in out.iter().zip(expected) {
	    assert!((a.re.to_f64() - e.re).abs() < 0.002, "nlog {nlog}: {:?} vs {:?}", a, e);
	    assert!((a.im.to_f64() - e.im).abs() < 0.002, "nlog {nlog}: {:?} vs {:?}", a, e);
	}
    }
}

#[cfg(test)]
#[test]
fn test_ifft_inverts_scaled() {
    let n = 64;
    let input : Vec<Complex<Dsp32>> = (0..n).map(|i| Complex::new(q32(((i * 13) % 17) as f64 / 20.0 - 0.4), q32(0.1))).collect();
    let mut spectrum = input.clone();
    complex_fft(&mut spectrum, &input, 6).unwrap();
    let mut back = input.clone();
    complex_ifft(&mut back, &spectrum, 6).unwrap();
    for (b, x) in back.iter().zip(&input) {
	assert!((b.re.to_f64() * 64.0 - x.re.to_f64()).abs() < 1e-6);
	assert!((b.im.to_f64() * 64.0 - x.im.to_f64()).abs() < 1e-6);
    }
}
